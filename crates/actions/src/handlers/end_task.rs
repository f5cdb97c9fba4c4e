//! `end_task` — finish the task with a message for the user.

use async_trait::async_trait;
use codewright_core::action::{ActionErrorKind, ActionResult};
use codewright_core::error::ActionError;

use crate::blueprint::{ActionBlueprint, ParamBag, ParamSpec};
use crate::registry::ActionHandler;

pub const TAG: &str = "end_task";

pub struct EndTaskHandler {
    blueprint: ActionBlueprint,
}

impl EndTaskHandler {
    pub fn new() -> Self {
        let blueprint = ActionBlueprint::new(TAG, 9)
            .with_param(ParamSpec::text("message").body().optional())
            .with_example("<end_task>Fixed the failing test in src/parser.rs</end_task>");
        Self { blueprint }
    }
}

impl Default for EndTaskHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for EndTaskHandler {
    fn blueprint(&self) -> &ActionBlueprint {
        &self.blueprint
    }

    async fn execute(&self, params: ParamBag) -> Result<ActionResult, ActionError> {
        match params.text("message") {
            Some(message) => Ok(ActionResult::ok(message)),
            None => Ok(ActionResult::failure(
                ActionErrorKind::Validation,
                "No message provided",
            )),
        }
    }
}
