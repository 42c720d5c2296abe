use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use deploy_contracts::{CoreError, FileMap};
use serde::{Deserialize, Serialize};

/// A live sandbox handle. Exclusively owned by one workflow run from
/// `create-sandbox` until `update-database-and-cleanup`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxHandle {
    pub id: String,
    pub provider: String,
}

impl SandboxHandle {
    /// Local/test sandboxes use this prefix and are skipped on termination.
    pub const MOCK_PREFIX: &'static str = "sandbox-";

    pub fn is_mock(&self) -> bool {
        self.id.starts_with(Self::MOCK_PREFIX)
    }
}

#[derive(Debug, Clone)]
pub struct CreateSandboxOptions {
    pub template: String,
    pub timeout: Duration,
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct WriteFilesOutcome {
    pub success: bool,
    pub results: Vec<FileWriteResult>,
}

#[derive(Debug, Clone)]
pub struct FileWriteResult {
    pub path: String,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// A remote Linux-like execution environment. Implementations are pluggable
/// (e2b, daytona, ...); the core never depends on a provider SDK directly.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn create(&self, options: CreateSandboxOptions) -> Result<SandboxHandle, CoreError>;

    async fn connect(&self, id: &str) -> Result<SandboxHandle, CoreError>;

    async fn write_files(
        &self,
        handle: &SandboxHandle,
        files: &FileMap,
    ) -> Result<WriteFilesOutcome, CoreError>;

    async fn execute_command(
        &self,
        handle: &SandboxHandle,
        command: &str,
        options: ExecOptions,
    ) -> Result<ExecOutcome, CoreError>;

    async fn terminate(&self, handle: &SandboxHandle, timeout: Duration) -> Result<bool, CoreError>;
}

/// Paths the workflow never writes to the sandbox: UI-library boilerplate,
/// tsconfigs, and anything under `public/`.
pub fn is_excluded_path(path: &str) -> bool {
    const EXCLUDED: &[&str] = &[
        "tailwind.config.ts",
        "components.json",
        "src/hooks/use-toast.ts",
        "src/lib/utils.ts",
        "src/assets/react.svg",
        "READEME.md",
        "READEME-ZH.md",
        ".gitignore",
    ];
    if EXCLUDED.contains(&path) {
        return true;
    }
    if path.starts_with("public/") {
        return true;
    }
    if path.starts_with("tsconfig") && path.ends_with(".json") {
        return true;
    }
    if path.starts_with("src/components/ui/") && path.ends_with(".tsx") {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_ui_boilerplate_and_public_assets() {
        assert!(is_excluded_path("src/components/ui/button.tsx"));
        assert!(is_excluded_path("public/favicon.ico"));
        assert!(is_excluded_path("tsconfig.app.json"));
        assert!(is_excluded_path("tailwind.config.ts"));
        assert!(!is_excluded_path("src/App.tsx"));
    }

    #[test]
    fn mock_sandbox_detected_by_prefix() {
        let handle = SandboxHandle { id: "sandbox-abc123".into(), provider: "mock".into() };
        assert!(handle.is_mock());
        let handle = SandboxHandle { id: "e2b-real-id".into(), provider: "e2b".into() };
        assert!(!handle.is_mock());
    }
}
