//! Action handler trait, registry, and dispatcher.
//!
//! The registry maps tag names to handlers. [`ActionRegistry::dispatch`]
//! turns one model response into executed actions:
//!
//! 1. Check the gross tag structure against the registered names
//! 2. Collect the registered action tags actually present
//! 3. Parse and validate every invocation's parameters
//! 4. Execute: concurrently when every action is parallel-safe, otherwise
//!    sequentially by priority, stopping at the first hard failure
//!
//! Nothing here returns an error. Every failure becomes an
//! [`ActionResult`] with `success: false`.

use async_trait::async_trait;
use codewright_core::action::ActionResult;
use codewright_core::error::ActionError;
use futures::future::join_all;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::blueprint::{ActionBlueprint, ParamBag};
use crate::tags::{top_level_tags, validate_structure};

/// One action kind: its blueprint plus the side effect it performs.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    fn blueprint(&self) -> &ActionBlueprint;

    /// Checks beyond the per-parameter types declared in the blueprint.
    fn validate(&self, _params: &ParamBag) -> Result<(), ActionError> {
        Ok(())
    }

    async fn execute(&self, params: ParamBag) -> Result<ActionResult, ActionError>;
}

/// The record of one executed (or rejected) invocation.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub tag: String,
    pub params: ParamBag,
    pub priority: u8,
    pub requires_post_processing: bool,
    pub best_effort: bool,
    pub result: ActionResult,
    pub duration_ms: u64,
}

/// Everything one dispatch round produced.
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Per-invocation records in original invocation order
    pub records: Vec<DispatchRecord>,
    /// The single action's result, or the merged result of several
    pub result: ActionResult,
}

impl Dispatch {
    fn failed(err: ActionError) -> Self {
        Self {
            records: Vec::new(),
            result: err.into(),
        }
    }

    /// Whether an invocation of `tag` ran and succeeded.
    pub fn succeeded(&self, tag: &str) -> Option<&DispatchRecord> {
        self.records
            .iter()
            .find(|r| r.tag == tag && r.result.success)
    }
}

struct Invocation<'a> {
    handler: &'a dyn ActionHandler,
    params: ParamBag,
}

/// A registry of action handlers, keyed by tag.
pub struct ActionRegistry {
    handlers: BTreeMap<&'static str, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Register a handler. Replaces any existing handler with the same tag.
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        let tag = handler.blueprint().tag;
        self.handlers.insert(tag, handler);
    }

    pub fn get(&self, tag: &str) -> Option<&dyn ActionHandler> {
        self.handlers.get(tag).map(|h| h.as_ref())
    }

    /// Registered tag names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    pub fn blueprints(&self) -> impl Iterator<Item = &ActionBlueprint> {
        self.handlers.values().map(|h| h.blueprint())
    }

    /// Execute the actions in a model response and return the outcome.
    pub async fn execute_action(&self, response: &str) -> ActionResult {
        self.dispatch(response).await.result
    }

    /// Execute the actions in a model response, keeping per-action records.
    pub async fn dispatch(&self, response: &str) -> Dispatch {
        let names = self.names();

        if let Err(issue) = validate_structure(response, &names) {
            warn!(tag = %issue.tag, "Malformed action markup");
            let mut message = issue.message;
            if let Some(handler) = self.get(&issue.tag)
                && !handler.blueprint().example.is_empty()
            {
                message.push_str("\nExample of correct syntax:\n");
                message.push_str(handler.blueprint().example);
            }
            return Dispatch::failed(ActionError::MalformedTag { message });
        }

        let (found, unknown) = self.collect(response);
        if found.is_empty() {
            let err = match unknown {
                Some(tag) => ActionError::UnknownAction { tag },
                None => ActionError::MalformedTag {
                    message: format!(
                        "No action tags found. Use one of: {}",
                        names.join(", ")
                    ),
                },
            };
            return Dispatch::failed(err);
        }

        let mut invocations = Vec::with_capacity(found.len());
        let mut rejected = Vec::new();
        for (index, (handler, inner)) in found.into_iter().enumerate() {
            let parsed = handler
                .blueprint()
                .parse_params(&inner)
                .and_then(|params| handler.validate(&params).map(|()| params));

            match parsed {
                Ok(params) => invocations.push((index, Invocation { handler, params })),
                Err(err) if handler.blueprint().best_effort => {
                    debug!(action = handler.blueprint().tag, error = %err, "Skipping best-effort action");
                    rejected.push((index, record(handler, ParamBag::new(), err.into(), 0)));
                }
                Err(err) => return Dispatch::failed(err),
            }
        }

        let total = invocations.len() + rejected.len();
        let all_parallel = invocations
            .iter()
            .all(|(_, inv)| inv.handler.blueprint().can_run_in_parallel);

        let mut executed = if all_parallel {
            join_all(
                invocations
                    .into_iter()
                    .map(|(index, inv)| async move { (index, run(inv).await) }),
            )
            .await
        } else {
            run_sequential(invocations).await
        };

        executed.extend(rejected);
        executed.sort_by_key(|(index, _)| *index);
        let records: Vec<DispatchRecord> = executed.into_iter().map(|(_, r)| r).collect();

        let result = if total == 1 && records.len() == 1 {
            records[0].result.clone()
        } else {
            merge(&records)
        };

        Dispatch { records, result }
    }

    /// Registered action tags in document order, descending into unknown
    /// wrapper elements. Also returns the first unknown top-level tag.
    fn collect(&self, text: &str) -> (Vec<(&dyn ActionHandler, String)>, Option<String>) {
        let mut found = Vec::new();
        let mut unknown = None;
        self.collect_into(text, &mut found, &mut unknown);
        (found, unknown)
    }

    fn collect_into<'a>(
        &'a self,
        text: &str,
        found: &mut Vec<(&'a dyn ActionHandler, String)>,
        unknown: &mut Option<String>,
    ) {
        for span in top_level_tags(text) {
            match self.get(&span.name) {
                Some(handler) => found.push((handler, span.inner)),
                None => {
                    if unknown.is_none() {
                        *unknown = Some(span.name.clone());
                    }
                    self.collect_into(&span.inner, found, unknown);
                }
            }
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

async fn run(inv: Invocation<'_>) -> DispatchRecord {
    let blueprint = inv.handler.blueprint();
    let start = Instant::now();
    let result = match inv.handler.execute(inv.params.clone()).await {
        Ok(result) => result,
        Err(err) => err.into(),
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    info!(
        action = blueprint.tag,
        success = result.success,
        duration_ms,
        "Action executed"
    );

    record(inv.handler, inv.params, result, duration_ms)
}

async fn run_sequential(mut invocations: Vec<(usize, Invocation<'_>)>) -> Vec<(usize, DispatchRecord)> {
    // Stable: equal priorities keep invocation order
    invocations.sort_by_key(|(_, inv)| inv.handler.blueprint().priority);

    let mut done = Vec::with_capacity(invocations.len());
    for (index, inv) in invocations {
        let best_effort = inv.handler.blueprint().best_effort;
        let rec = run(inv).await;
        let stop = !rec.result.success && !best_effort;
        done.push((index, rec));
        if stop {
            debug!("Stopping sequential round after failed action");
            break;
        }
    }
    done
}

fn record(
    handler: &dyn ActionHandler,
    params: ParamBag,
    result: ActionResult,
    duration_ms: u64,
) -> DispatchRecord {
    let blueprint = handler.blueprint();
    DispatchRecord {
        tag: blueprint.tag.to_string(),
        params,
        priority: blueprint.priority,
        requires_post_processing: blueprint.requires_post_processing,
        best_effort: blueprint.best_effort,
        result,
        duration_ms,
    }
}

/// Merge several records into one result, keeping invocation order.
fn merge(records: &[DispatchRecord]) -> ActionResult {
    let entries: Vec<serde_json::Value> = records
        .iter()
        .map(|r| {
            json!({
                "action": r.tag,
                "success": r.result.success,
                "data": r.result.data,
                "error": r.result.error,
            })
        })
        .collect();

    let hard_failure = records
        .iter()
        .find(|r| !r.result.success && !r.best_effort);

    match hard_failure {
        Some(failed) => ActionResult {
            success: false,
            data: Some(serde_json::Value::Array(entries)),
            error: failed.result.error.clone(),
        },
        None => ActionResult::ok(serde_json::Value::Array(entries)),
    }
}
