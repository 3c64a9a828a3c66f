//! Result aggregation across completed spawns.
//!
//! Aggregation is commutative and idempotent: handoffs live in a map keyed
//! by task id and the token total is recomputed from the map, so merging
//! the same result twice, or in a different order, yields the same context.

use conductor_core::Handoff;
use std::collections::BTreeMap;

/// The outcome of one spawn, as reported back to the engine.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// The subtask the spawn executed.
    pub task_id: String,
    /// The agent's handoff, when it completed.
    pub handoff: Option<Handoff>,
    /// Terminal error text, when it did not.
    pub error: Option<String>,
}

impl ExecutionResult {
    /// A successful spawn result.
    pub fn completed(task_id: impl Into<String>, handoff: Handoff) -> Self {
        Self {
            task_id: task_id.into(),
            handoff: Some(handoff),
            error: None,
        }
    }

    /// A failed spawn result.
    pub fn failed(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            handoff: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregated upstream context consumed by placeholder injection and
/// downstream dispatch.
#[derive(Debug, Clone, Default)]
pub struct AggregatedContext {
    /// Completed handoffs keyed by task id.
    pub handoffs: BTreeMap<String, Handoff>,
    /// Terminal errors keyed by task id.
    pub errors: BTreeMap<String, String>,
    /// Sum of `tokenUsage.total` across the handoffs map.
    pub total_tokens: u64,
}

impl AggregatedContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one spawn result into the context.
    pub fn merge(&mut self, result: ExecutionResult) {
        if let Some(handoff) = result.handoff {
            self.handoffs.insert(result.task_id.clone(), handoff);
        }
        if let Some(error) = result.error {
            self.errors.insert(result.task_id, error);
        }
        self.recompute_totals();
    }

    /// Builds a context from any iteration order of results.
    pub fn aggregate(results: impl IntoIterator<Item = ExecutionResult>) -> Self {
        let mut context = Self::new();
        for result in results {
            context.merge(result);
        }
        context
    }

    /// The handoff for a task, when one was aggregated.
    pub fn handoff(&self, task_id: &str) -> Option<&Handoff> {
        self.handoffs.get(task_id)
    }

    fn recompute_totals(&mut self) {
        self.total_tokens = self
            .handoffs
            .values()
            .filter_map(|h| h.token_usage.as_ref())
            .map(|u| u.total)
            .sum();
    }
}
