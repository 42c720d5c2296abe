use deploy_contracts::{parent_path_of, Action, FileEntry, FileMap, HistoryEntry};

/// Fold an ordered action log onto a template file map. Later entries win:
/// if a path is touched more than once, the most recent `modified` content
/// is what ends up in the result. Pure and restartable — the same
/// `(init_files, history)` pair always produces the same `FileMap`.
pub fn materialize(init_files: &FileMap, history: &[HistoryEntry]) -> FileMap {
    let mut files = init_files.clone();

    for entry in history {
        let HistoryEntry::Actions { actions, .. } = entry else {
            continue;
        };
        for action in actions {
            if let Action::File(file_action) = action {
                let parent_path = parent_path_of(&file_action.path);
                files.insert(
                    file_action.path.clone(),
                    FileEntry {
                        content: file_action.modified.clone(),
                        is_binary: false,
                        parent_path,
                    },
                );
            }
            // Command actions carry install intent, not file content; they
            // are surfaced separately via `collect_package_installs`.
        }
    }

    files
}

/// Collect `command` actions from the history as a flat list, preserving
/// order, for the build step to run before `bun run build`.
pub fn collect_package_installs(history: &[HistoryEntry]) -> Vec<String> {
    let mut commands = Vec::new();
    for entry in history {
        if let HistoryEntry::Actions { actions, .. } = entry {
            for action in actions {
                if let Action::Command(cmd) = action {
                    commands.push(cmd.command.clone());
                }
            }
        }
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_contracts::{CommandAction, FileAction, FileMap};

    fn template() -> FileMap {
        let mut m = FileMap::new();
        m.insert(
            "src/App.tsx".to_string(),
            FileEntry {
                content: "template".into(),
                is_binary: false,
                parent_path: Some("src".into()),
            },
        );
        m
    }

    fn file_action(path: &str, modified: &str, is_new: bool) -> Action {
        Action::File(FileAction {
            path: path.into(),
            modified: modified.into(),
            original: None,
            is_new,
            basename: path.rsplit('/').next().unwrap().into(),
            dirname: parent_path_of(path).unwrap_or_default(),
            description: None,
        })
    }

    #[test]
    fn later_edit_overrides_earlier_content() {
        let history = vec![
            HistoryEntry::Actions {
                plan_id: "p1".into(),
                actions: vec![file_action("src/App.tsx", "v1", false)],
            },
            HistoryEntry::Actions {
                plan_id: "p2".into(),
                actions: vec![file_action("src/App.tsx", "v2", false)],
            },
        ];
        let result = materialize(&template(), &history);
        assert_eq!(result["src/App.tsx"].content, "v2");
    }

    #[test]
    fn new_file_is_inserted_with_derived_parent() {
        let history = vec![HistoryEntry::Actions {
            plan_id: "p1".into(),
            actions: vec![file_action("src/components/Widget.tsx", "widget", true)],
        }];
        let result = materialize(&template(), &history);
        let entry = &result["src/components/Widget.tsx"];
        assert_eq!(entry.content, "widget");
        assert_eq!(entry.parent_path.as_deref(), Some("src/components"));
    }

    #[test]
    fn empty_history_returns_template_unchanged() {
        let result = materialize(&template(), &[]);
        assert_eq!(result, template());
    }

    #[test]
    fn determinism_across_repeated_calls() {
        let history = vec![HistoryEntry::Actions {
            plan_id: "p1".into(),
            actions: vec![file_action("src/App.tsx", "v1", false)],
        }];
        let a = materialize(&template(), &history);
        let b = materialize(&template(), &history);
        assert_eq!(a, b);
    }

    #[test]
    fn command_actions_do_not_touch_file_map_but_are_collected() {
        let history = vec![HistoryEntry::Actions {
            plan_id: "p1".into(),
            actions: vec![Action::Command(CommandAction {
                command: "bun install lodash".into(),
                packages: vec!["lodash".into()],
                description: None,
            })],
        }];
        let files = materialize(&template(), &history);
        assert_eq!(files, template());
        let commands = collect_package_installs(&history);
        assert_eq!(commands, vec!["bun install lodash".to_string()]);
    }
}
