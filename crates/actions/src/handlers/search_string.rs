//! `search_string` — find lines containing a term under a directory.

use async_trait::async_trait;
use codewright_core::action::ActionResult;
use codewright_core::error::ActionError;
use codewright_core::workspace::Searcher;
use std::path::Path;
use std::sync::Arc;

use crate::blueprint::{ActionBlueprint, ParamBag, ParamSpec};
use crate::registry::ActionHandler;

pub const TAG: &str = "search_string";

pub struct SearchStringHandler {
    search: Arc<dyn Searcher>,
    max_results: usize,
    blueprint: ActionBlueprint,
}

impl SearchStringHandler {
    pub fn new(search: Arc<dyn Searcher>, max_results: usize) -> Self {
        let blueprint = ActionBlueprint::new(TAG, 1)
            .parallel()
            .with_param(ParamSpec::text("directory").optional())
            .with_param(ParamSpec::text("term"))
            .with_example(
                "<search_string><directory>src</directory><term>fn main</term></search_string>",
            );
        Self {
            search,
            max_results,
            blueprint,
        }
    }
}

#[async_trait]
impl ActionHandler for SearchStringHandler {
    fn blueprint(&self) -> &ActionBlueprint {
        &self.blueprint
    }

    async fn execute(&self, params: ParamBag) -> Result<ActionResult, ActionError> {
        let term = params.require_text(TAG, "term")?;
        let directory = params.text("directory").unwrap_or(".");

        let matches = self
            .search
            .search(term, Path::new(directory))
            .await
            .map_err(|e| ActionError::handler(TAG, e))?;

        if matches.is_empty() {
            return Ok(ActionResult::ok(format!(
                "No matches found for '{term}' in {directory}"
            )));
        }

        let total = matches.len();
        let mut lines: Vec<String> = matches
            .iter()
            .take(self.max_results)
            .map(ToString::to_string)
            .collect();
        if total > self.max_results {
            lines.push(format!(
                "... {} more matches not shown",
                total - self.max_results
            ));
        }

        Ok(ActionResult::ok(lines.join("\n")))
    }
}
