//! `write_file` — create or overwrite a file in the workspace.

use async_trait::async_trait;
use codewright_core::action::ActionResult;
use codewright_core::error::ActionError;
use codewright_core::workspace::FileSystem;
use std::path::Path;
use std::sync::Arc;

use crate::blueprint::{ActionBlueprint, ParamBag, ParamSpec};
use crate::registry::ActionHandler;

pub const TAG: &str = "write_file";

pub struct WriteFileHandler {
    fs: Arc<dyn FileSystem>,
    blueprint: ActionBlueprint,
}

impl WriteFileHandler {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        let blueprint = ActionBlueprint::new(TAG, 2)
            .post_processed()
            .with_param(ParamSpec::text("path"))
            .with_param(ParamSpec::text("content"))
            .with_example("<write_file><path>src/main.rs</path><content>fn main() {}</content></write_file>");
        Self { fs, blueprint }
    }
}

#[async_trait]
impl ActionHandler for WriteFileHandler {
    fn blueprint(&self) -> &ActionBlueprint {
        &self.blueprint
    }

    async fn execute(&self, params: ParamBag) -> Result<ActionResult, ActionError> {
        let path = params.require_text(TAG, "path")?;
        let content = params.require_text(TAG, "content")?;

        // Tag extraction trims, so restore the final newline
        let mut content = content.to_string();
        content.push('\n');

        let written = self
            .fs
            .write(Path::new(path), &content)
            .await
            .map_err(|e| ActionError::handler(TAG, e))?;

        Ok(ActionResult::ok(format!("Wrote {written} bytes to {path}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MemoryFs;

    #[tokio::test]
    async fn writes_content_with_trailing_newline() {
        let fs = Arc::new(MemoryFs::default());
        let handler = WriteFileHandler::new(fs.clone());

        let params = handler
            .blueprint()
            .parse_params("<path>src/lib.rs</path><content>\npub fn f() {}\n</content>")
            .unwrap();
        let result = handler.execute(params).await.unwrap();

        assert!(result.success);
        assert_eq!(fs.content("src/lib.rs").as_deref(), Some("pub fn f() {}\n"));
        assert_eq!(result.to_feedback(), "Wrote 14 bytes to src/lib.rs");
    }

    #[test]
    fn blueprint_requests_post_processing() {
        let handler = WriteFileHandler::new(Arc::new(MemoryFs::default()));
        let bp = handler.blueprint();
        assert!(bp.requires_post_processing);
        assert!(!bp.can_run_in_parallel);
    }
}
