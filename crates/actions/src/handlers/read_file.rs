//! `read_file` — return a file's contents.

use async_trait::async_trait;
use codewright_core::action::ActionResult;
use codewright_core::error::ActionError;
use codewright_core::workspace::FileSystem;
use std::path::Path;
use std::sync::Arc;

use crate::blueprint::{ActionBlueprint, ParamBag, ParamSpec};
use crate::registry::ActionHandler;

pub const TAG: &str = "read_file";

pub struct ReadFileHandler {
    fs: Arc<dyn FileSystem>,
    blueprint: ActionBlueprint,
}

impl ReadFileHandler {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        let blueprint = ActionBlueprint::new(TAG, 1)
            .parallel()
            .with_param(ParamSpec::text("path"))
            .with_example("<read_file><path>src/main.rs</path></read_file>");
        Self { fs, blueprint }
    }
}

#[async_trait]
impl ActionHandler for ReadFileHandler {
    fn blueprint(&self) -> &ActionBlueprint {
        &self.blueprint
    }

    async fn execute(&self, params: ParamBag) -> Result<ActionResult, ActionError> {
        let path = params.require_text(TAG, "path")?;
        let content = self
            .fs
            .read(Path::new(path))
            .await
            .map_err(|e| ActionError::handler(TAG, e))?;
        Ok(ActionResult::ok(content))
    }
}
