//! Dispatch instruction emission and placeholder injection.
//!
//! The engine never spawns anything: for each parallel group it yields a
//! [`DispatchInstruction`] the external spawner consumes. Before a group
//! is authorised, `{result:<taskId>}` placeholders in task prompts are
//! substituted with the formatted handoff of the referenced upstream task.

use crate::aggregate::AggregatedContext;
use crate::layering::ParallelGroup;
use conductor_core::{AgentType, Handoff, Phase, Subtask};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::debug;

/// One spawn the external spawner should perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnDirective {
    /// The subtask being dispatched.
    pub task_id: String,
    /// The agent kind to spawn.
    pub agent_type: AgentType,
    /// Opaque spawn command; identifies the agent type and payload.
    pub command: String,
    /// Whether the spawner should run the agent detached.
    pub run_in_background: bool,
    /// The task prompt with upstream placeholders resolved, when the
    /// subtask carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// The engine's output for one parallel group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchInstruction {
    /// Stable group identifier (`<phaseId>-group-<k>`).
    pub group_id: String,
    /// Number of agents the group spawns.
    pub agent_count: usize,
    /// Whether the spawner must wait for the whole group before the next
    /// group starts.
    pub wait_for_all: bool,
    /// The spawns, in dispatch order.
    pub spawns: Vec<SpawnDirective>,
    /// Sum of the group's token estimates.
    pub estimated_tokens: u64,
    /// Human-readable description of the group.
    pub summary: String,
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| {
        Regex::new(r"\{result:([A-Za-z0-9_.\-]+)\}").expect("placeholder pattern is valid")
    })
}

/// Renders a handoff into the text substituted for `{result:…}`
/// placeholders: summary lines per task result, discoveries, and warnings.
pub fn format_handoff(handoff: &Handoff) -> String {
    let mut parts = Vec::new();
    parts.push(format!(
        "--- result from {} ---",
        handoff.from_agent.agent_type
    ));
    for result in &handoff.results {
        parts.push(format!("[{}] {}", result.task_id, result.summary));
    }
    if let Some(discoveries) = &handoff.discoveries {
        for discovery in discoveries {
            parts.push(format!("discovered: {discovery}"));
        }
    }
    if let Some(warnings) = &handoff.context.warnings {
        for warning in warnings {
            parts.push(format!("warning: {warning}"));
        }
    }
    parts.push(format!("resume: {}", handoff.context.resume_instructions));
    parts.join("\n")
}

/// Substitutes every `{result:<taskId>}` placeholder in `prompt` with the
/// formatted upstream handoff. A placeholder whose task has no aggregated
/// handoff is replaced with a literal warning marker; that is not an error.
pub fn inject_placeholders(prompt: &str, context: &AggregatedContext) -> String {
    placeholder_regex()
        .replace_all(prompt, |caps: &regex::Captures<'_>| {
            let task_id = &caps[1];
            match context.handoff(task_id) {
                Some(handoff) => format_handoff(handoff),
                None => {
                    debug!(task_id, "placeholder references a task with no handoff");
                    format!("[missing result for task '{task_id}']")
                }
            }
        })
        .into_owned()
}

/// Builds the opaque spawn command for a subtask. The only contract is
/// that the string uniquely identifies the agent type and the payload.
pub fn spawn_command(task: &Subtask) -> String {
    format!("agent --type {} --task {}", task.agent_type, task.id)
}

/// Builds the dispatch instruction for group `index` of a phase,
/// resolving prompt placeholders from the aggregated upstream context.
pub fn build_instruction(
    phase: &Phase,
    index: usize,
    group: &ParallelGroup,
    context: &AggregatedContext,
    wait_for_all: bool,
) -> DispatchInstruction {
    let spawns: Vec<SpawnDirective> = group
        .tasks
        .iter()
        .map(|task| SpawnDirective {
            task_id: task.id.clone(),
            agent_type: task.agent_type,
            command: spawn_command(task),
            run_in_background: group.tasks.len() > 1,
            prompt: task
                .context
                .as_ref()
                .and_then(|c| c.prompt.as_deref())
                .map(|p| inject_placeholders(p, context)),
        })
        .collect();

    DispatchInstruction {
        group_id: format!("{}-group-{}", phase.id, index),
        agent_count: spawns.len(),
        wait_for_all,
        estimated_tokens: group.estimated_tokens(),
        summary: format!(
            "phase '{}' group {}: {}",
            phase.name,
            index,
            group
                .tasks
                .iter()
                .map(|t| t.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        spawns,
    }
}
