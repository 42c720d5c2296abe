use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single file as it should exist in the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub content: String,
    pub is_binary: bool,
    pub parent_path: Option<String>,
}

/// Flat path-keyed snapshot of project files after folding history onto a
/// template. `BTreeMap` keeps iteration order deterministic, which matters
/// for reproducible sandbox writes and tests.
pub type FileMap = BTreeMap<String, FileEntry>;

/// The initial project template, as a nested tree. Leaves are files,
/// interior nodes are directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum FileTreeNode {
    File {
        content: String,
        #[serde(default)]
        is_binary: bool,
    },
    Dir(BTreeMap<String, FileTreeNode>),
}

/// Flatten a nested template tree into a [`FileMap`], deriving `parent_path`
/// from each file's position in the tree.
pub fn flatten_tree(root: &BTreeMap<String, FileTreeNode>) -> FileMap {
    let mut out = FileMap::new();
    flatten_into(root, None, &mut out);
    out
}

fn flatten_into(node: &BTreeMap<String, FileTreeNode>, prefix: Option<&str>, out: &mut FileMap) {
    for (name, child) in node {
        let path = match prefix {
            Some(p) => format!("{p}/{name}"),
            None => name.clone(),
        };
        match child {
            FileTreeNode::File { content, is_binary } => {
                out.insert(
                    path.clone(),
                    FileEntry {
                        content: content.clone(),
                        is_binary: *is_binary,
                        parent_path: prefix.map(str::to_string),
                    },
                );
            }
            FileTreeNode::Dir(children) => flatten_into(children, Some(path.as_str()), out),
        }
    }
}

/// Derive the dirname of a `/`-separated path, or `None` at the root.
pub fn parent_path_of(path: &str) -> Option<String> {
    path.rsplit_once('/').map(|(dir, _)| dir.to_string())
}
