//! Model escalation policy.
//!
//! Each target (usually a file path) has a try count. The global count is
//! the highest count across all targets, so one file that keeps failing
//! escalates every later call. Tiers are scanned in order with a running
//! sum of `max_write_tries`; the first tier that still has room for both
//! counts wins, and the last tier is the ceiling.
//!
//! Entering a phase pins a floor at the phase's model: retries within the
//! phase can climb above it but never drop below it.

use chrono::Utc;
use codewright_core::agent::ModelTier;
use codewright_core::event::{DomainEvent, EventBus};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ModelEscalation {
    tiers: Vec<ModelTier>,
    counts: HashMap<String, u32>,
    current_model: String,
    floor: Floor,
    events: Option<Arc<EventBus>>,
}

/// Lowest position on the ladder the policy may resolve to.
#[derive(Debug, Clone, Default)]
struct Floor {
    index: usize,
    /// Model served at the floor tier; set when a phase names a model
    /// outside the ladder
    model: Option<String>,
}

impl ModelEscalation {
    pub fn new(tiers: Vec<ModelTier>) -> Self {
        let current_model = tiers.first().map(|t| t.model.clone()).unwrap_or_default();
        Self {
            tiers,
            counts: HashMap::new(),
            current_model,
            floor: Floor::default(),
            events: None,
        }
    }

    /// Publish a `ModelEscalation` event for every try-count update.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn tiers(&self) -> &[ModelTier] {
        &self.tiers
    }

    fn ladder_index(&self, local_tries: u32, global_tries: u32) -> usize {
        let mut cumulative = 0u32;
        for (i, tier) in self.tiers.iter().enumerate() {
            cumulative = cumulative.saturating_add(tier.max_write_tries);
            if local_tries < cumulative && global_tries < tier.max_global_tries {
                return i;
            }
        }
        self.tiers.len().saturating_sub(1)
    }

    fn tier_index(&self, local_tries: u32, global_tries: u32) -> usize {
        self.ladder_index(local_tries, global_tries)
            .max(self.floor.index)
    }

    fn model_at(&self, index: usize) -> &str {
        if index == self.floor.index
            && let Some(model) = &self.floor.model
        {
            return model;
        }
        self.tiers
            .get(index)
            .map(|t| t.model.as_str())
            .unwrap_or_default()
    }

    /// The model for a target with `local_tries` while the highest count
    /// anywhere is `global_tries`.
    pub fn model_for_try_count(&self, local_tries: u32, global_tries: u32) -> &str {
        self.model_at(self.tier_index(local_tries, global_tries))
    }

    pub fn try_count(&self, target: &str) -> u32 {
        self.counts.get(target).copied().unwrap_or(0)
    }

    /// Highest try count across all targets.
    pub fn global_try_count(&self) -> u32 {
        self.counts.values().copied().max().unwrap_or(0)
    }

    pub fn current_model(&self) -> &str {
        &self.current_model
    }

    /// Clear every count and pin the floor at `model`.
    ///
    /// A model on the ladder floors escalation at its tier. Any other model
    /// stands in for the first tier until a retry climbs past it.
    pub fn enter_phase(&mut self, model: &str) {
        self.counts.clear();
        self.floor = match self.tiers.iter().position(|t| t.model == model) {
            Some(index) => Floor { index, model: None },
            None => Floor {
                index: 0,
                model: Some(model.to_string()),
            },
        };
        self.current_model = model.to_string();
        debug!(model, floor = self.floor.index, "Escalation floor set");
    }

    pub fn set_try_count(&mut self, target: &str, count: u32) -> &str {
        self.counts.insert(target.to_string(), count);
        self.resolve(target)
    }

    pub fn increment_try_count(&mut self, target: &str) -> &str {
        let count = self.try_count(target).saturating_add(1);
        self.set_try_count(target, count)
    }

    /// Clear every count and any phase floor, and return to the first tier.
    pub fn reset(&mut self) {
        self.counts.clear();
        self.floor = Floor::default();
        self.current_model = self.model_at(0).to_string();
        debug!(model = %self.current_model, "Escalation reset");
    }

    fn resolve(&mut self, target: &str) -> &str {
        let count = self.try_count(target);
        let index = self.tier_index(count, self.global_try_count());
        let model = self.model_at(index).to_string();
        let max_tries = self.tiers.get(index).map_or(0, |t| t.max_write_tries);
        let changed = model != self.current_model;

        if changed {
            info!(resource = %target, count, max_tries, model = %model, "Escalating model");
        } else {
            debug!(resource = %target, count, max_tries, model = %model, "Model unchanged");
        }

        if let Some(events) = &self.events {
            events.publish(DomainEvent::ModelEscalation {
                target: target.to_string(),
                count,
                max_tries,
                model: model.clone(),
                changed,
                timestamp: Utc::now(),
            });
        }

        self.current_model = model;
        &self.current_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codewright_core::agent::default_model_tiers;

    fn ladder() -> ModelEscalation {
        ModelEscalation::new(default_model_tiers())
    }

    #[test]
    fn starts_on_first_tier() {
        let esc = ladder();
        assert_eq!(esc.current_model(), "anthropic/claude-3.5-haiku");
        assert_eq!(esc.try_count("f.ts"), 0);
    }

    #[test]
    fn escalates_at_first_tier_boundary() {
        let mut esc = ladder();
        assert_eq!(esc.set_try_count("f.ts", 1), "anthropic/claude-3.5-haiku");
        assert_eq!(esc.set_try_count("f.ts", 2), "anthropic/claude-sonnet-4");
        assert_eq!(esc.current_model(), "anthropic/claude-sonnet-4");
    }

    #[test]
    fn cumulative_local_limits() {
        let esc = ladder();
        // tier limits: 2, 2+3=5, 5+3=8, 8+5=13
        assert_eq!(esc.model_for_try_count(4, 4), "anthropic/claude-sonnet-4");
        assert_eq!(esc.model_for_try_count(5, 5), "openai/o3-mini");
        assert_eq!(esc.model_for_try_count(8, 8), "anthropic/claude-opus-4");
    }

    #[test]
    fn global_count_forces_escalation() {
        let esc = ladder();
        // A fresh file still escalates when another file is at 4 tries
        assert_eq!(esc.model_for_try_count(0, 4), "anthropic/claude-sonnet-4");
    }

    #[test]
    fn exhausted_ladder_stays_on_last_tier() {
        let esc = ladder();
        assert_eq!(esc.model_for_try_count(100, 100), "anthropic/claude-opus-4");
    }

    #[test]
    fn global_is_max_not_sum() {
        let mut esc = ladder();
        esc.set_try_count("a.rs", 1);
        esc.set_try_count("b.rs", 1);
        esc.set_try_count("c.rs", 1);
        assert_eq!(esc.global_try_count(), 1);
        assert_eq!(esc.current_model(), "anthropic/claude-3.5-haiku");
    }

    #[test]
    fn escalation_is_monotonic_per_target() {
        let mut esc = ladder();
        let index_of = |esc: &ModelEscalation| {
            esc.tiers()
                .iter()
                .position(|t| t.model == esc.current_model())
                .unwrap()
        };

        let mut last = index_of(&esc);
        for _ in 0..30 {
            esc.increment_try_count("src/lib.rs");
            let now = index_of(&esc);
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last, 3);
    }

    #[test]
    fn reset_returns_to_tier_zero() {
        let mut esc = ladder();
        for _ in 0..6 {
            esc.increment_try_count("x");
        }
        assert_ne!(esc.current_model(), "anthropic/claude-3.5-haiku");

        esc.reset();
        assert_eq!(esc.current_model(), "anthropic/claude-3.5-haiku");
        assert_eq!(esc.try_count("x"), 0);
        assert_eq!(esc.global_try_count(), 0);
    }

    #[tokio::test]
    async fn every_update_publishes_an_event() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let mut esc = ladder().with_events(bus.clone());

        esc.set_try_count("f.ts", 1);
        esc.set_try_count("f.ts", 2);

        let first = rx.recv().await.unwrap();
        match first.as_ref() {
            DomainEvent::ModelEscalation {
                target,
                count,
                max_tries,
                changed,
                ..
            } => {
                assert_eq!(target, "f.ts");
                assert_eq!(*count, 1);
                assert_eq!(*max_tries, 2);
                assert!(!changed);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let second = rx.recv().await.unwrap();
        match second.as_ref() {
            DomainEvent::ModelEscalation { model, changed, .. } => {
                assert_eq!(model, "anthropic/claude-sonnet-4");
                assert!(changed);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn phase_floor_holds_through_retries() {
        let mut esc = ladder();
        esc.enter_phase("anthropic/claude-sonnet-4");
        assert_eq!(esc.current_model(), "anthropic/claude-sonnet-4");

        assert_eq!(esc.increment_try_count("src/lib.rs"), "anthropic/claude-sonnet-4");
        assert_eq!(esc.try_count("src/lib.rs"), 1);

        // Retries still climb above the floor
        esc.set_try_count("src/lib.rs", 5);
        assert_eq!(esc.current_model(), "openai/o3-mini");
    }

    #[test]
    fn off_ladder_phase_model_stands_in_for_first_tier() {
        let mut esc = ladder();
        esc.enter_phase("local/qwen-coder");

        assert_eq!(esc.increment_try_count("a.rs"), "local/qwen-coder");
        assert_eq!(esc.increment_try_count("a.rs"), "anthropic/claude-sonnet-4");
    }

    #[test]
    fn reset_drops_the_phase_floor() {
        let mut esc = ladder();
        esc.enter_phase("anthropic/claude-opus-4");
        esc.reset();
        assert_eq!(esc.current_model(), "anthropic/claude-3.5-haiku");
        assert_eq!(esc.set_try_count("f.ts", 1), "anthropic/claude-3.5-haiku");
    }

    #[test]
    fn empty_ladder_yields_empty_model() {
        let mut esc = ModelEscalation::new(Vec::new());
        assert_eq!(esc.increment_try_count("x"), "");
    }
}
