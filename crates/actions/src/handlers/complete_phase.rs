//! `complete_phase` — hand the current phase's findings to the next phase.
//!
//! The handler only validates and echoes the findings; the runner records
//! them and performs the transition.

use async_trait::async_trait;
use codewright_core::action::{ActionErrorKind, ActionResult};
use codewright_core::error::ActionError;

use crate::blueprint::{ActionBlueprint, ParamBag, ParamSpec};
use crate::registry::ActionHandler;

pub const TAG: &str = "complete_phase";

pub struct CompletePhaseHandler {
    blueprint: ActionBlueprint,
}

impl CompletePhaseHandler {
    pub fn new() -> Self {
        let blueprint = ActionBlueprint::new(TAG, 8)
            .with_param(ParamSpec::text("findings").body().optional())
            .with_example(
                "<complete_phase>The parser lives in src/parse.rs; tests in tests/parse.rs</complete_phase>",
            );
        Self { blueprint }
    }
}

impl Default for CompletePhaseHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for CompletePhaseHandler {
    fn blueprint(&self) -> &ActionBlueprint {
        &self.blueprint
    }

    async fn execute(&self, params: ParamBag) -> Result<ActionResult, ActionError> {
        match params.text("findings") {
            Some(findings) => Ok(ActionResult::ok(findings)),
            None => Ok(ActionResult::failure(
                ActionErrorKind::Validation,
                "No findings provided",
            )),
        }
    }
}
