//! Deterministic dependency layering.
//!
//! A phase's subtasks are peeled into topological layers: at each step,
//! every task whose dependencies are all satisfied joins the frontier.
//! The frontier is sorted by a stable key (priority descending, ties by
//! lexicographic id) and chunked into groups no larger than the
//! concurrency cap, preserving order. A non-empty remainder with an empty
//! frontier is a dependency cycle.

use conductor_core::{phase_dependency_cycle, ConductorError, ConductorResult, Phase, Subtask};
use std::collections::HashSet;

/// One set of subtasks emitted together for concurrent execution.
#[derive(Debug, Clone)]
pub struct ParallelGroup {
    /// The group's subtasks, in dispatch order.
    pub tasks: Vec<Subtask>,
}

impl ParallelGroup {
    /// Sum of the group's token estimates.
    pub fn estimated_tokens(&self) -> u64 {
        self.tasks.iter().filter_map(|t| t.estimated_tokens).sum()
    }

    /// Ids of the group's tasks.
    pub fn task_ids(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.id.as_str()).collect()
    }
}

/// Layers a phase into ordered parallel groups.
///
/// Every subtask appears exactly once, and each task's dependencies are
/// covered by strictly earlier groups. Fails with `dependency_cycle`
/// (listing the participating ids) when the graph cannot be peeled.
pub fn layer_phase(phase: &Phase, max_group_size: usize) -> ConductorResult<Vec<ParallelGroup>> {
    let max_group_size = max_group_size.max(1);
    let mut emitted: HashSet<&str> = HashSet::new();
    let mut groups = Vec::new();

    while emitted.len() < phase.subtasks.len() {
        let mut frontier: Vec<&Subtask> = phase
            .subtasks
            .iter()
            .filter(|t| !emitted.contains(t.id.as_str()))
            .filter(|t| {
                t.dependencies
                    .iter()
                    .all(|dep| emitted.contains(dep.as_str()))
            })
            .collect();

        if frontier.is_empty() {
            let cycle = phase_dependency_cycle(phase).unwrap_or_else(|| {
                let mut remaining: Vec<String> = phase
                    .subtasks
                    .iter()
                    .filter(|t| !emitted.contains(t.id.as_str()))
                    .map(|t| t.id.clone())
                    .collect();
                remaining.sort();
                remaining
            });
            return Err(ConductorError::DependencyCycle(cycle));
        }

        frontier.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

        for task in &frontier {
            emitted.insert(task.id.as_str());
        }
        for chunk in frontier.chunks(max_group_size) {
            groups.push(ParallelGroup {
                tasks: chunk.iter().map(|t| (*t).clone()).collect(),
            });
        }
    }

    Ok(groups)
}
