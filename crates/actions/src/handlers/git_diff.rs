//! `git_diff` — show repository changes between two refs.

use async_trait::async_trait;
use codewright_core::action::ActionResult;
use codewright_core::error::ActionError;
use codewright_core::workspace::GitClient;
use std::sync::Arc;

use crate::blueprint::{ActionBlueprint, ParamBag, ParamSpec};
use crate::registry::ActionHandler;

pub const TAG: &str = "git_diff";

pub struct GitDiffHandler {
    git: Arc<dyn GitClient>,
    /// Pathspecs always excluded (lockfiles and the like)
    default_exclude: Vec<String>,
    blueprint: ActionBlueprint,
}

impl GitDiffHandler {
    pub fn new(git: Arc<dyn GitClient>, default_exclude: Vec<String>) -> Self {
        let blueprint = ActionBlueprint::new(TAG, 1)
            .parallel()
            .with_param(ParamSpec::text("fromCommit").optional())
            .with_param(ParamSpec::text("toCommit").optional())
            .with_param(ParamSpec::lines("exclude").optional())
            .with_example(
                "<git_diff><fromCommit>HEAD~1</fromCommit><toCommit>HEAD</toCommit></git_diff>",
            );
        Self {
            git,
            default_exclude,
            blueprint,
        }
    }
}

#[async_trait]
impl ActionHandler for GitDiffHandler {
    fn blueprint(&self) -> &ActionBlueprint {
        &self.blueprint
    }

    fn validate(&self, params: &ParamBag) -> Result<(), ActionError> {
        if params.text("toCommit").is_some() && params.text("fromCommit").is_none() {
            return Err(ActionError::missing(TAG, "fromCommit"));
        }
        Ok(())
    }

    async fn execute(&self, params: ParamBag) -> Result<ActionResult, ActionError> {
        let mut exclude = self.default_exclude.clone();
        if let Some(extra) = params.lines("exclude") {
            exclude.extend(extra.iter().cloned());
        }

        let diff = self
            .git
            .diff(params.text("fromCommit"), params.text("toCommit"), &exclude)
            .await
            .map_err(|e| ActionError::handler(TAG, e))?;

        if diff.trim().is_empty() {
            return Ok(ActionResult::ok("No changes"));
        }
        Ok(ActionResult::ok(diff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::FakeGit;

    #[tokio::test]
    async fn passes_refs_and_merges_excludes() {
        let git = Arc::new(FakeGit {
            output: "diff --git a/x b/x\n".into(),
            ..FakeGit::default()
        });
        let handler = GitDiffHandler::new(git.clone(), vec!["Cargo.lock".into()]);
        let params = handler
            .blueprint()
            .parse_params(
                "<fromCommit>main</fromCommit><toCommit>HEAD</toCommit><exclude>dist/</exclude>",
            )
            .unwrap();

        let result = handler.execute(params).await.unwrap();
        assert_eq!(result.to_feedback(), "diff --git a/x b/x\n");

        let calls = git.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            (
                Some("main".to_string()),
                Some("HEAD".to_string()),
                vec!["Cargo.lock".to_string(), "dist/".to_string()]
            )
        );
    }

    #[tokio::test]
    async fn empty_diff_reports_no_changes() {
        let handler = GitDiffHandler::new(Arc::new(FakeGit::default()), Vec::new());
        let params = handler.blueprint().parse_params("").unwrap();
        let result = handler.execute(params).await.unwrap();
        assert_eq!(result.to_feedback(), "No changes");
    }

    #[test]
    fn to_without_from_is_rejected() {
        let handler = GitDiffHandler::new(Arc::new(FakeGit::default()), Vec::new());
        let params = handler
            .blueprint()
            .parse_params("<toCommit>HEAD</toCommit>")
            .unwrap();
        let err = handler.validate(&params).unwrap_err();
        assert!(err.to_string().contains("'fromCommit'"));
    }
}
