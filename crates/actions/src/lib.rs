//! Action parsing and dispatch for Codewright.
//!
//! The model acts on the workspace by emitting XML-like action tags in its
//! responses. This crate extracts those tags, validates them against each
//! action's blueprint, and runs the matching handlers:
//! write and move files, read them, search, diff, fetch URLs, correct
//! relative paths, and end the task or the current phase.

pub mod blueprint;
pub mod handlers;
pub mod registry;
pub mod tags;

#[cfg(test)]
mod test_helpers;

pub use blueprint::{ActionBlueprint, ParamBag, ParamKind, ParamSource, ParamSpec, ParamValue};
pub use registry::{ActionHandler, ActionRegistry, Dispatch, DispatchRecord};
pub use tags::{StructureIssue, TagSpan};

use codewright_core::workspace::Workspace;
use std::sync::Arc;

/// Knobs for the built-in handlers.
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    /// Pathspecs `git_diff` always excludes
    pub diff_exclude: Vec<String>,
    /// Cap on lines `search_string` returns
    pub search_max_results: usize,
    /// Similarity threshold when `relative_path_lookup` is given none
    pub path_threshold: f64,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            diff_exclude: Vec::new(),
            search_max_results: 200,
            path_threshold: 0.6,
        }
    }
}

/// Create a registry with every built-in action wired to `workspace`.
pub fn builtin_registry(workspace: &Workspace, settings: HandlerSettings) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    registry.register(Arc::new(handlers::WriteFileHandler::new(workspace.fs.clone())));
    registry.register(Arc::new(handlers::ReadFileHandler::new(workspace.fs.clone())));
    registry.register(Arc::new(handlers::MoveFileHandler::new(workspace.fs.clone())));
    registry.register(Arc::new(handlers::GitDiffHandler::new(
        workspace.git.clone(),
        settings.diff_exclude,
    )));
    registry.register(Arc::new(handlers::SearchStringHandler::new(
        workspace.search.clone(),
        settings.search_max_results,
    )));
    registry.register(Arc::new(handlers::RelativePathLookupHandler::new(
        workspace.fs.clone(),
        workspace.paths.clone(),
        settings.path_threshold,
    )));
    registry.register(Arc::new(handlers::FetchUrlHandler::new(workspace.fetch.clone())));
    registry.register(Arc::new(handlers::EndTaskHandler::new()));
    registry.register(Arc::new(handlers::CompletePhaseHandler::new()));
    registry
}

/// A prompt section describing every registered action and its syntax.
pub fn describe_actions(registry: &ActionRegistry) -> String {
    let mut out = String::from("Available actions (one XML-like tag per action):\n");
    for bp in registry.blueprints() {
        let params: Vec<String> = bp
            .parameters
            .iter()
            .map(|p| {
                if p.required {
                    p.name.to_string()
                } else {
                    format!("{}?", p.name)
                }
            })
            .collect();
        out.push_str(&format!("\n- {} ({})\n  {}\n", bp.tag, params.join(", "), bp.example));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestWorkspace;
    use codewright_core::action::{ActionErrorKind, ActionResult};

    fn registry() -> (TestWorkspace, ActionRegistry) {
        let ws = TestWorkspace::default();
        let reg = builtin_registry(&ws.workspace(), HandlerSettings::default());
        (ws, reg)
    }

    #[test]
    fn all_builtins_registered() {
        let (_, reg) = registry();
        assert_eq!(
            reg.names(),
            vec![
                "complete_phase",
                "end_task",
                "fetch_url",
                "git_diff",
                "move_file",
                "read_file",
                "relative_path_lookup",
                "search_string",
                "write_file",
            ]
        );
    }

    #[tokio::test]
    async fn end_task_completes() {
        let (_, reg) = registry();
        let result = reg
            .execute_action("<end_task>Task completed</end_task>")
            .await;
        assert_eq!(result, ActionResult::ok("Task completed"));
    }

    #[tokio::test]
    async fn empty_end_task_fails() {
        let (_, reg) = registry();
        let result = reg.execute_action("<end_task></end_task>").await;
        assert!(!result.success);
        assert_eq!(result.error_message(), Some("No message provided"));
    }

    #[tokio::test]
    async fn bare_write_file_is_malformed() {
        let (_, reg) = registry();
        let result = reg.execute_action("write_file some content").await;
        let err = result.error.unwrap();
        assert_eq!(err.kind, ActionErrorKind::MalformedTag);
        assert!(err.message.contains("without proper XML tag structure"));
        assert!(err.message.contains("<write_file><path>"));
    }

    #[tokio::test]
    async fn write_then_end_runs_in_priority_order() {
        let (ws, reg) = registry();
        let dispatch = reg
            .dispatch(
                "<end_task>done</end_task>\n\
                 <write_file><path>a.txt</path><content>hello</content></write_file>",
            )
            .await;

        assert!(dispatch.result.success);
        assert_eq!(ws.fs.content("a.txt").as_deref(), Some("hello\n"));
        let data = dispatch.result.data.unwrap();
        assert_eq!(data[0]["action"], "end_task");
        assert_eq!(data[1]["action"], "write_file");
        assert!(dispatch.records[1].requires_post_processing);
    }

    #[tokio::test]
    async fn written_content_may_mention_action_tags() {
        let (ws, reg) = registry();
        let result = reg
            .execute_action(
                "<write_file><path>README.md</path>\
                 <content>Finish by emitting <end_task> with a summary.</content></write_file>",
            )
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            ws.fs.content("README.md").as_deref(),
            Some("Finish by emitting <end_task> with a summary.\n")
        );
    }

    #[tokio::test]
    async fn missing_parameter_is_named() {
        let (_, reg) = registry();
        let result = reg
            .execute_action("<write_file><content>x</content></write_file>")
            .await;
        assert_eq!(
            result.error_message(),
            Some("Invalid parameter 'path' for write_file: not provided")
        );
    }

    #[test]
    fn description_lists_examples() {
        let (_, reg) = registry();
        let text = describe_actions(&reg);
        assert!(text.contains("- write_file (path, content)"));
        assert!(text.contains("- git_diff (fromCommit?, toCommit?, exclude?)"));
    }
}
