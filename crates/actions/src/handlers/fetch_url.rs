//! `fetch_url` — retrieve a web page as text.

use async_trait::async_trait;
use codewright_core::action::ActionResult;
use codewright_core::error::ActionError;
use codewright_core::workspace::Fetcher;
use std::sync::Arc;

use crate::blueprint::{ActionBlueprint, ParamBag, ParamSpec};
use crate::registry::ActionHandler;

pub const TAG: &str = "fetch_url";

pub struct FetchUrlHandler {
    fetch: Arc<dyn Fetcher>,
    blueprint: ActionBlueprint,
}

impl FetchUrlHandler {
    pub fn new(fetch: Arc<dyn Fetcher>) -> Self {
        let blueprint = ActionBlueprint::new(TAG, 1)
            .parallel()
            .with_param(ParamSpec::url("url"))
            .with_example("<fetch_url><url>https://docs.rs/tokio</url></fetch_url>");
        Self { fetch, blueprint }
    }
}

#[async_trait]
impl ActionHandler for FetchUrlHandler {
    fn blueprint(&self) -> &ActionBlueprint {
        &self.blueprint
    }

    async fn execute(&self, params: ParamBag) -> Result<ActionResult, ActionError> {
        let url = params.require_text(TAG, "url")?;
        let body = self
            .fetch
            .fetch(url)
            .await
            .map_err(|e| ActionError::handler(TAG, e))?;
        Ok(ActionResult::ok(body))
    }
}
