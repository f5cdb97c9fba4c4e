//! `relative_path_lookup` — resolve an import-style path against the file
//! that mentions it, correcting near misses with the fuzzy path index.

use async_trait::async_trait;
use codewright_core::action::ActionResult;
use codewright_core::error::{ActionError, CollaboratorError};
use codewright_core::workspace::{FileSystem, PathAdjuster};
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::blueprint::{ActionBlueprint, ParamBag, ParamSpec};
use crate::registry::ActionHandler;

pub const TAG: &str = "relative_path_lookup";

pub struct RelativePathLookupHandler {
    fs: Arc<dyn FileSystem>,
    paths: Arc<dyn PathAdjuster>,
    default_threshold: f64,
    blueprint: ActionBlueprint,
}

impl RelativePathLookupHandler {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        paths: Arc<dyn PathAdjuster>,
        default_threshold: f64,
    ) -> Self {
        let blueprint = ActionBlueprint::new(TAG, 1)
            .parallel()
            .with_param(ParamSpec::text("source_path"))
            .with_param(ParamSpec::text("path"))
            .with_param(ParamSpec::number("threshold", Some(0.0), Some(1.0)).optional())
            .with_example(
                "<relative_path_lookup><source_path>src/app.ts</source_path>\
                 <path>./utils/format</path><threshold>0.6</threshold></relative_path_lookup>",
            );
        Self {
            fs,
            paths,
            default_threshold,
            blueprint,
        }
    }
}

#[async_trait]
impl ActionHandler for RelativePathLookupHandler {
    fn blueprint(&self) -> &ActionBlueprint {
        &self.blueprint
    }

    async fn execute(&self, params: ParamBag) -> Result<ActionResult, ActionError> {
        let source = params.require_text(TAG, "source_path")?;
        let relative = params.require_text(TAG, "path")?;
        let threshold = params.number("threshold").unwrap_or(self.default_threshold);

        let base = Path::new(source).parent().unwrap_or(Path::new(""));
        let joined = normalize(&base.join(relative));

        if self.fs.exists(&joined).await {
            return Ok(ActionResult::ok(json!({
                "path": self.fs.resolve(&joined),
                "adjusted": false,
            })));
        }

        let candidate = joined.to_string_lossy();
        match self.paths.adjust_path(&candidate, threshold).await {
            Some(found) => {
                debug!(candidate = %candidate, found = %found.display(), "Adjusted path");
                Ok(ActionResult::ok(json!({
                    "path": found,
                    "adjusted": true,
                })))
            }
            None => Err(ActionError::handler(
                TAG,
                CollaboratorError::NotFound(format!(
                    "{candidate} (no similar path above threshold {threshold})"
                )),
            )),
        }
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}
