use std::collections::BTreeMap;

use deploy_contracts::FileTreeNode;

/// Static, in-process template registry. `initFiles` is always re-derived
/// server-side from here, keyed off the provider-resolved template name
/// (`deploy_sandbox::providers::template_for`'s output) — any client-supplied
/// value in `DeploymentParams` is ignored (§9).
pub fn load(template: &str) -> BTreeMap<String, FileTreeNode> {
    match template {
        "libra-vite-shadcn-e2b" | "libra-vite-shadcn-daytona" | "libra-vite-shadcn-default" => {
            vite_shadcn_base()
        }
        _ => vite_shadcn_base(),
    }
}

fn vite_shadcn_base() -> BTreeMap<String, FileTreeNode> {
    fn file(content: &str) -> FileTreeNode {
        FileTreeNode::File { content: content.to_string(), is_binary: false }
    }

    let mut root = BTreeMap::new();
    root.insert("package.json".to_string(), file(PACKAGE_JSON));
    root.insert("vite.config.ts".to_string(), file(VITE_CONFIG));
    root.insert("index.html".to_string(), file(INDEX_HTML));
    root.insert("tsconfig.json".to_string(), file(TSCONFIG));

    let mut src = BTreeMap::new();
    src.insert("main.tsx".to_string(), file(MAIN_TSX));
    src.insert("App.tsx".to_string(), file(APP_TSX));
    root.insert("src".to_string(), FileTreeNode::Dir(src));

    root
}

const PACKAGE_JSON: &str = r#"{
  "name": "libra-project",
  "private": true,
  "scripts": {
    "dev": "vite",
    "build": "vite build"
  }
}
"#;

const VITE_CONFIG: &str = "import { defineConfig } from 'vite'\n\nexport default defineConfig({})\n";

const INDEX_HTML: &str = "<!doctype html>\n<html>\n  <body>\n    <div id=\"root\"></div>\n    <script type=\"module\" src=\"/src/main.tsx\"></script>\n  </body>\n</html>\n";

const TSCONFIG: &str = r#"{
  "compilerOptions": {
    "target": "ES2020",
    "jsx": "react-jsx",
    "module": "ESNext"
  }
}
"#;

const MAIN_TSX: &str = "import { createRoot } from 'react-dom/client'\nimport App from './App'\n\ncreateRoot(document.getElementById('root')!).render(<App />)\n";

const APP_TSX: &str = "export default function App() {\n  return <div>Hello</div>\n}\n";

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_contracts::flatten_tree;

    #[test]
    fn known_templates_flatten_to_a_buildable_baseline() {
        for name in ["libra-vite-shadcn-default", "libra-vite-shadcn-e2b", "libra-vite-shadcn-daytona"] {
            let flat = flatten_tree(&load(name));
            assert!(flat.contains_key("package.json"));
            assert!(flat.contains_key("src/main.tsx"));
        }
    }

    #[test]
    fn unknown_template_falls_back_to_the_default_baseline() {
        let flat = flatten_tree(&load("some-unconfigured-template"));
        assert!(flat.contains_key("package.json"));
    }
}
