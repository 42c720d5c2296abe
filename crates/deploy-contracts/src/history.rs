use serde::{Deserialize, Serialize};

/// One entry in a project's message history. Entries are ordered and later
/// entries override earlier ones when they touch the same file path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    /// Plan description / model "thinking" text. Opaque to the materializer.
    Thinking { plan_id: Option<String>, content: String },
    /// A plan's concrete file/command actions.
    Actions {
        plan_id: String,
        actions: Vec<Action>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    File(FileAction),
    Command(CommandAction),
}

/// A file create or edit. `is_new` and `original` are redundant signals for
/// "this path did not exist before" - callers may set either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAction {
    pub path: String,
    pub modified: String,
    #[serde(default)]
    pub original: Option<String>,
    #[serde(default)]
    pub is_new: bool,
    pub basename: String,
    pub dirname: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl FileAction {
    /// True if either signal says this path is a fresh create.
    pub fn creates_new_file(&self) -> bool {
        self.is_new || self.original.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandAction {
    pub command: String,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Parse a project's raw `message_history` JSON value into a history log.
/// A non-array value is treated as an empty log. Entries are deserialized
/// one at a time so a single malformed entry (e.g. a `modified` field that
/// isn't a string) is skipped with a warning instead of discarding the rest
/// of the log.
pub fn parse_history(raw: &serde_json::Value) -> Vec<HistoryEntry> {
    let items = match raw {
        serde_json::Value::Array(items) => items,
        _ => return Vec::new(),
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<HistoryEntry>(item.clone()) {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping malformed history entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_array_value_is_an_empty_log() {
        assert!(parse_history(&serde_json::json!({"not": "an array"})).is_empty());
    }

    #[test]
    fn one_malformed_entry_does_not_discard_the_rest_of_the_log() {
        let raw = serde_json::json!([
            {
                "kind": "actions",
                "plan_id": "plan-1",
                "actions": [
                    {
                        "type": "file",
                        "path": "src/App.tsx",
                        "modified": 12345,
                        "original": null,
                        "is_new": true,
                        "basename": "App.tsx",
                        "dirname": "src"
                    }
                ]
            },
            {
                "kind": "thinking",
                "plan_id": "plan-2",
                "content": "looks good"
            }
        ]);

        let entries = parse_history(&raw);
        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0], HistoryEntry::Thinking { .. }));
    }
}
