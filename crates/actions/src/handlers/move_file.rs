//! `move_file` — rename a file within the workspace.

use async_trait::async_trait;
use codewright_core::action::ActionResult;
use codewright_core::error::{ActionError, CollaboratorError, ParamProblem};
use codewright_core::workspace::FileSystem;
use std::path::Path;
use std::sync::Arc;

use crate::blueprint::{ActionBlueprint, ParamBag, ParamSpec};
use crate::registry::ActionHandler;

pub const TAG: &str = "move_file";

pub struct MoveFileHandler {
    fs: Arc<dyn FileSystem>,
    blueprint: ActionBlueprint,
}

impl MoveFileHandler {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        let blueprint = ActionBlueprint::new(TAG, 2)
            .with_param(ParamSpec::text("source_path"))
            .with_param(ParamSpec::text("destination_path"))
            .with_example(
                "<move_file><source_path>src/old.rs</source_path>\
                 <destination_path>src/new.rs</destination_path></move_file>",
            );
        Self { fs, blueprint }
    }
}

#[async_trait]
impl ActionHandler for MoveFileHandler {
    fn blueprint(&self) -> &ActionBlueprint {
        &self.blueprint
    }

    fn validate(&self, params: &ParamBag) -> Result<(), ActionError> {
        if params.text("source_path") == params.text("destination_path") {
            return Err(ActionError::Validation {
                action: TAG.into(),
                param: "destination_path".into(),
                problem: ParamProblem::WrongType {
                    expected: "a path different from source_path".into(),
                    found: params.text("destination_path").unwrap_or_default().into(),
                },
            });
        }
        Ok(())
    }

    async fn execute(&self, params: ParamBag) -> Result<ActionResult, ActionError> {
        let from = params.require_text(TAG, "source_path")?;
        let to = params.require_text(TAG, "destination_path")?;

        if self.fs.exists(Path::new(to)).await {
            return Err(ActionError::handler(
                TAG,
                CollaboratorError::Io {
                    path: to.to_string(),
                    reason: "destination already exists".into(),
                },
            ));
        }

        self.fs
            .rename(Path::new(from), Path::new(to))
            .await
            .map_err(|e| ActionError::handler(TAG, e))?;

        Ok(ActionResult::ok(format!("Moved {from} to {to}")))
    }
}
