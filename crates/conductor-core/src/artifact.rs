//! Typed contracts for every artifact persisted in a session directory.
//!
//! All structs serialize with camelCase field names; that is the on-disk
//! JSON contract shared with external collaborators (planners, spawners,
//! dashboards). Timestamps are UTC with millisecond precision and ids are
//! v4 uuids.

use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The kind of agent a subtask is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    /// Studies code and produces memories, symbol maps, and data-flow maps.
    Analyst,
    /// Drives a browser to validate behaviour end-to-end.
    Browser,
    /// Writes long-form content and documentation.
    Composer,
    /// Resolves library documentation lookups.
    Context7,
    /// Modifies source code.
    Developer,
    /// Coordinates other agents.
    Orchestrator,
    /// Builds UI components.
    Shadcn,
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentType::Analyst => "analyst",
            AgentType::Browser => "browser",
            AgentType::Composer => "composer",
            AgentType::Context7 => "context7",
            AgentType::Developer => "developer",
            AgentType::Orchestrator => "orchestrator",
            AgentType::Shadcn => "shadcn",
        };
        f.write_str(s)
    }
}

/// Scheduling priority of a subtask. Ordering is most-urgent-first, so
/// sorting a slice of priorities ascending puts `Critical` ahead of `Low`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Must run as early as its dependencies allow.
    Critical,
    /// Ahead of routine work.
    High,
    /// Routine work.
    Medium,
    /// Fill-in work.
    Low,
}

/// Why an agent handed control back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffReason {
    /// The assigned task finished.
    TaskComplete,
    /// The agent ran out of token budget mid-task.
    TokenLimit,
    /// A whole phase finished.
    PhaseComplete,
    /// The agent cannot proceed without outside help.
    Blocked,
    /// The agent failed.
    Error,
    /// A human interrupted the run.
    UserIntervention,
}

/// Lifecycle status of the orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// State record created, no phase started yet.
    Initializing,
    /// Phases are executing.
    Running,
    /// Suspended by a human or a blocked gate.
    Paused,
    /// All phases passed their gates.
    Completed,
    /// Terminal failure.
    Failed,
}

/// Status of a single task result reported in a handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskResultStatus {
    /// Finished successfully.
    Completed,
    /// Some acceptance criteria remain open.
    Partial,
    /// The task failed.
    Failed,
    /// The task is waiting on something external.
    Blocked,
}

/// Status of a task in the orchestrator's queue snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuedTaskStatus {
    /// Waiting on dependencies or a free agent.
    Pending,
    /// Dispatched to an agent.
    Running,
    /// Finished successfully.
    Completed,
    /// Failed terminally.
    Failed,
    /// Waiting on something external.
    Blocked,
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// The user request that seeds a session. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    /// Unique id; also keys the on-disk filename.
    pub id: Uuid,
    /// Session the prompt belongs to.
    pub session_id: SessionId,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// What the caller asked for.
    pub request: PromptRequest,
    /// Optional supporting context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<PromptContext>,
}

/// The request portion of a [`Prompt`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    /// Free-text description of the work.
    pub description: String,
    /// Structured arguments, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<String>>,
    /// Hard constraints the result must honour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<String>>,
    /// How the caller will judge success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_criteria: Option<Vec<String>>,
}

/// Supporting context attached to a [`Prompt`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptContext {
    /// Files relevant to the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    /// Memory-store artifacts relevant to the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memories: Option<Vec<String>>,
    /// Results of earlier sessions the caller wants considered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_results: Option<Vec<String>>,
}

impl Prompt {
    /// Creates a prompt with a fresh id and the current time.
    pub fn new(session_id: SessionId, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            timestamp: Utc::now(),
            request: PromptRequest {
                description: description.into(),
                arguments: None,
                constraints: None,
                success_criteria: None,
            },
            context: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A unit of agent work inside a phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    /// Phase-unique identifier; referenced by sibling dependencies.
    pub id: String,
    /// What the agent should do.
    pub description: String,
    /// Which agent kind executes this subtask.
    pub agent_type: AgentType,
    /// Scheduling priority within its layer.
    pub priority: Priority,
    /// Ids of sibling subtasks that must complete first.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Expected token consumption, used for budget checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_tokens: Option<u64>,
    /// Optional context handed to the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<SubtaskContext>,
    /// What "done" means for this subtask.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<Vec<String>>,
}

/// Context attached to a [`Subtask`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskContext {
    /// Files the agent should look at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    /// Memory-store artifacts the agent should load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memories: Option<Vec<String>>,
    /// Symbols the agent should focus on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols: Option<Vec<String>>,
    /// Prompt template; may contain `{result:<taskId>}` placeholders that
    /// the engine substitutes with upstream handoffs before dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl Subtask {
    /// Creates a subtask with medium priority and no dependencies.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        agent_type: AgentType,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            agent_type,
            priority: Priority::Medium,
            dependencies: Vec::new(),
            estimated_tokens: None,
            context: None,
            acceptance_criteria: None,
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the sibling dependencies.
    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    /// Sets the estimated token consumption.
    pub fn with_estimated_tokens(mut self, tokens: u64) -> Self {
        self.estimated_tokens = Some(tokens);
        self
    }

    /// Sets the prompt template.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.context
            .get_or_insert_with(SubtaskContext::default)
            .prompt = Some(prompt.into());
        self
    }
}

/// An ordered stage of a plan; its subtasks form a DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    /// Plan-unique identifier.
    pub id: String,
    /// Short display name.
    pub name: String,
    /// What the phase accomplishes.
    pub description: String,
    /// The phase's work items.
    pub subtasks: Vec<Subtask>,
    /// Whether independent subtasks may run concurrently.
    pub parallelizable: bool,
    /// Gate condition that must pass before the next phase starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_condition: Option<String>,
}

impl Phase {
    /// Creates an empty, parallelizable phase.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            description: name.clone(),
            name,
            subtasks: Vec::new(),
            parallelizable: true,
            gate_condition: None,
        }
    }

    /// Appends a subtask.
    pub fn with_subtask(mut self, subtask: Subtask) -> Self {
        self.subtasks.push(subtask);
        self
    }

    /// Sets the gate condition.
    pub fn with_gate(mut self, condition: impl Into<String>) -> Self {
        self.gate_condition = Some(condition.into());
        self
    }
}

/// The declarative execution plan for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Unique id; also keys the on-disk filename.
    pub id: Uuid,
    /// The prompt this plan answers.
    pub prompt_id: Uuid,
    /// Session the plan belongs to.
    pub session_id: SessionId,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// One-paragraph summary of the approach.
    pub summary: String,
    /// Ordered phases.
    pub phases: Vec<Phase>,
    /// Sum of subtask estimates, if the planner provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_estimated_tokens: Option<u64>,
    /// Known risks the planner flagged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risks: Option<Vec<String>>,
}

impl Plan {
    /// Creates a plan with a fresh id and the current time.
    pub fn new(prompt_id: Uuid, session_id: SessionId, summary: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt_id,
            session_id,
            timestamp: Utc::now(),
            summary: summary.into(),
            phases: Vec::new(),
            total_estimated_tokens: None,
            risks: None,
        }
    }

    /// Appends a phase.
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phases.push(phase);
        self
    }

    /// Finds a phase by id.
    pub fn phase(&self, phase_id: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == phase_id)
    }

    /// The phase following `phase_id` in plan order, if any.
    pub fn next_phase(&self, phase_id: &str) -> Option<&Phase> {
        let idx = self.phases.iter().position(|p| p.id == phase_id)?;
        self.phases.get(idx + 1)
    }
}

// ---------------------------------------------------------------------------
// Handoff
// ---------------------------------------------------------------------------

/// An agent reference inside a handoff (`fromAgent` / `toAgent`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRef {
    /// The agent kind.
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    /// Per-run instance id; required on `fromAgent`, optional on `toAgent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Token accounting reported by a completed agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Total tokens consumed.
    pub total: u64,
    /// Input-side tokens, when the agent reports the split.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<u64>,
    /// Output-side tokens, when the agent reports the split.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<u64>,
}

/// Progress snapshot carried inside a handoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffState {
    /// Phase the agent was working in.
    pub current_phase: String,
    /// Task the agent was working on when it stopped, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    /// Tasks the agent completed.
    pub completed_tasks: Vec<String>,
    /// Tasks still outstanding.
    pub pending_tasks: Vec<String>,
    /// Tasks blocked on something external.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_tasks: Option<Vec<String>>,
}

/// Result of a single task, reported inside a handoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    /// Which subtask this result belongs to.
    pub task_id: String,
    /// Outcome of the task.
    pub status: TaskResultStatus,
    /// One-paragraph summary of what happened.
    pub summary: String,
    /// Structured output; field names depend on the agent kind
    /// (e.g. `filesModified` for developers, `memoryName` for analysts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Evidence references (file paths, memory names, screenshots).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Vec<String>>,
    /// What is blocking the task, when status is `blocked`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockers: Option<Vec<String>>,
}

/// Resume context carried inside a handoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffContext {
    /// Facts the next agent must not lose.
    pub critical_context: String,
    /// How to pick the work back up.
    pub resume_instructions: String,
    /// Caveats discovered along the way.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

/// A follow-up the completing agent recommends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextAction {
    /// What should happen next.
    pub action: String,
    /// Which agent kind should do it.
    pub agent_type: AgentType,
    /// How urgent it is.
    pub priority: Priority,
}

/// The message a completed agent writes back to the hub. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handoff {
    /// Unique id; also keys the on-disk filename.
    pub id: Uuid,
    /// Session the handoff belongs to.
    pub session_id: SessionId,
    /// Plan the agent was executing.
    pub plan_id: Uuid,
    /// The completing agent.
    pub from_agent: AgentRef,
    /// The intended receiver.
    pub to_agent: AgentRef,
    /// Completion time.
    pub timestamp: DateTime<Utc>,
    /// Why the agent stopped.
    pub reason: HandoffReason,
    /// Token accounting, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    /// Progress snapshot.
    pub state: HandoffState,
    /// Per-task results.
    pub results: Vec<TaskResult>,
    /// Things learned that were not asked for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discoveries: Option<Vec<String>>,
    /// Files the agent touched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_modifications: Option<Vec<String>>,
    /// Resume context.
    pub context: HandoffContext,
    /// Recommended follow-ups.
    pub next_actions: Vec<NextAction>,
}

// ---------------------------------------------------------------------------
// Orchestrator state
// ---------------------------------------------------------------------------

/// Progress through the current phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseProgress {
    /// Id of a phase in the owning plan.
    pub id: String,
    /// Display name of that phase.
    pub name: String,
    /// Percent complete, 0–100.
    pub progress: u8,
}

/// A live agent instance tracked by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInstance {
    /// Per-run instance id.
    pub id: String,
    /// The agent kind.
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    /// Task the instance is working on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
}

/// A task-queue entry in the orchestrator state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedTask {
    /// The subtask id.
    pub task_id: String,
    /// Where the task is in its lifecycle.
    pub status: QueuedTaskStatus,
    /// Agent instance the task is assigned to, if dispatched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,
}

/// The single mutable record tracking an orchestration run.
///
/// Exactly one per session; mutated only by phase advancement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorState {
    /// Unique id of this state record.
    pub id: Uuid,
    /// Session the run belongs to.
    pub session_id: SessionId,
    /// Plan being executed.
    pub plan_id: Uuid,
    /// Run lifecycle status.
    pub status: RunStatus,
    /// The phase currently executing.
    pub current_phase: PhaseProgress,
    /// Live agent instances.
    pub agents: Vec<AgentInstance>,
    /// Queue snapshot.
    pub task_queue: Vec<QueuedTask>,
    /// Ids of handoffs observed so far, oldest first.
    pub handoff_history: Vec<Uuid>,
    /// Errors the run has accumulated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    /// Last mutation time.
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Gate result
// ---------------------------------------------------------------------------

/// Outcome of one evaluated check leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// Canonical text of the check (e.g. `typecheck`, `memory:auth-*`).
    pub check: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Diagnostic message, present on failures and informative passes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Persisted outcome of a phase-gate evaluation. Append-only per phase,
/// with a `-latest` pointer mirroring the most recent record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    /// The gated phase.
    pub phase_id: String,
    /// Whether the whole gate passed.
    pub passed: bool,
    /// Evaluation time.
    pub checked_at: DateTime<Utc>,
    /// One entry per check leaf that was actually evaluated.
    pub results: Vec<CheckResult>,
    /// Failing results' messages (or check text where no message exists).
    pub blockers: Vec<String>,
}

// ---------------------------------------------------------------------------
// Evidence chain
// ---------------------------------------------------------------------------

/// The requirement a chain traces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    /// The subtask that carries the requirement.
    pub task_id: String,
    /// What was required.
    pub description: String,
    /// The acceptance criteria the validation section verifies against.
    pub acceptance_criteria: Vec<String>,
}

/// Analysis-stage evidence, typically linked from an analyst handoff.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisEvidence {
    /// Name of the memory artifact the analysis produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_name: Option<String>,
    /// Symbols the analysis covered.
    #[serde(default)]
    pub analyzed_symbols: Vec<String>,
    /// Entry points the analysis identified.
    #[serde(default)]
    pub entry_points: Vec<String>,
    /// Data-flow map, in whatever shape the analyst produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_flow_map: Option<serde_json::Value>,
    /// When the section was linked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_at: Option<DateTime<Utc>>,
}

/// Implementation-stage evidence, typically linked from a developer handoff.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationEvidence {
    /// Files the implementation touched.
    #[serde(default)]
    pub files_modified: Vec<String>,
    /// Symbols the implementation changed.
    #[serde(default)]
    pub symbols_changed: Vec<String>,
    /// Whether the type checker passed after the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typecheck_passed: Option<bool>,
    /// When the section was linked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_at: Option<DateTime<Utc>>,
}

/// One acceptance criterion and whether validation verified it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionCheck {
    /// The criterion text.
    pub criterion: String,
    /// Whether validation verified it.
    pub verified: bool,
}

/// The verification record a validation section links to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    /// Per-criterion verification outcomes.
    #[serde(default)]
    pub acceptance_criteria_verified: Vec<CriterionCheck>,
}

/// Links from a validation section to its verification record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationLinks {
    /// The verification record.
    #[serde(default)]
    pub verification: VerificationRecord,
}

/// Validation-stage evidence, typically linked from a browser handoff.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationEvidence {
    /// Number of tests that passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests_passed: Option<u64>,
    /// Number of tests that failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests_failed: Option<u64>,
    /// Screenshot references captured during validation.
    #[serde(default)]
    pub screenshots: Vec<String>,
    /// Links to the verification record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links_to: Option<VerificationLinks>,
    /// When the section was linked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_at: Option<DateTime<Utc>>,
}

/// Aggregate linkage status of a chain; recomputed on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatus {
    /// Whether the analysis section is present.
    pub analysis_linked: bool,
    /// Whether the implementation section is present.
    pub implementation_linked: bool,
    /// Whether the validation section is present.
    pub validation_linked: bool,
    /// `round((linked / 3) * 100)` — one of 0, 33, 67, 100.
    pub coverage_percent: u8,
    /// Criteria the validation section verified.
    pub acceptance_criteria_verified: u32,
    /// Total criteria on the requirement.
    pub acceptance_criteria_total: u32,
}

/// The per-task linkage of requirement → analysis → implementation →
/// validation. Exactly one per task per session, keyed by
/// `requirement.taskId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceChain {
    /// Unique chain id.
    pub id: Uuid,
    /// Session the chain belongs to.
    pub session_id: SessionId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// The requirement being traced.
    pub requirement: Requirement,
    /// Analysis-stage evidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisEvidence>,
    /// Implementation-stage evidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<ImplementationEvidence>,
    /// Validation-stage evidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationEvidence>,
    /// Aggregate linkage status.
    pub chain_status: ChainStatus,
}

impl EvidenceChain {
    /// Number of linked sections (0–3).
    pub fn linked_count(&self) -> u8 {
        u8::from(self.analysis.is_some())
            + u8::from(self.implementation.is_some())
            + u8::from(self.validation.is_some())
    }

    /// Coverage percent for a given linked-section count.
    pub fn coverage_for(linked: u8) -> u8 {
        (f64::from(linked) / 3.0 * 100.0).round() as u8
    }

    /// Recomputes `chain_status` from the sections currently present.
    pub fn recompute_status(&mut self) {
        let linked = self.linked_count();
        let verified = self
            .validation
            .as_ref()
            .and_then(|v| v.links_to.as_ref())
            .map(|l| {
                l.verification
                    .acceptance_criteria_verified
                    .iter()
                    .filter(|c| c.verified)
                    .count() as u32
            })
            .unwrap_or(0);
        self.chain_status = ChainStatus {
            analysis_linked: self.analysis.is_some(),
            implementation_linked: self.implementation.is_some(),
            validation_linked: self.validation.is_some(),
            coverage_percent: Self::coverage_for(linked),
            acceptance_criteria_verified: verified,
            acceptance_criteria_total: self.requirement.acceptance_criteria.len() as u32,
        };
    }
}

// ---------------------------------------------------------------------------
// Token state
// ---------------------------------------------------------------------------

/// Cumulative token accounting persisted at the session root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenState {
    /// Session the accounting belongs to.
    pub session_id: SessionId,
    /// Tokens consumed so far.
    pub used_tokens: u64,
    /// The configured cumulative cap, when one applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_budget: Option<u64>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionId {
        SessionId::generate()
    }

    #[test]
    fn test_priority_orders_most_urgent_first() {
        let mut ps = vec![Priority::Low, Priority::Critical, Priority::Medium, Priority::High];
        ps.sort();
        assert_eq!(
            ps,
            vec![Priority::Critical, Priority::High, Priority::Medium, Priority::Low]
        );
    }

    #[test]
    fn test_agent_type_serialization() {
        assert_eq!(
            serde_json::to_string(&AgentType::Context7).unwrap(),
            "\"context7\""
        );
        let back: AgentType = serde_json::from_str("\"developer\"").unwrap();
        assert_eq!(back, AgentType::Developer);
    }

    #[test]
    fn test_handoff_reason_snake_case() {
        assert_eq!(
            serde_json::to_string(&HandoffReason::TaskComplete).unwrap(),
            "\"task_complete\""
        );
        assert_eq!(
            serde_json::to_string(&HandoffReason::UserIntervention).unwrap(),
            "\"user_intervention\""
        );
    }

    #[test]
    fn test_plan_phase_lookup() {
        let sid = session();
        let plan = Plan::new(Uuid::new_v4(), sid, "two phases")
            .with_phase(Phase::new("p1", "Analysis"))
            .with_phase(Phase::new("p2", "Implementation"));

        assert_eq!(plan.phase("p1").unwrap().name, "Analysis");
        assert_eq!(plan.next_phase("p1").unwrap().id, "p2");
        assert!(plan.next_phase("p2").is_none());
        assert!(plan.phase("p3").is_none());
    }

    #[test]
    fn test_subtask_builder() {
        let task = Subtask::new("t1", "analyze auth", AgentType::Analyst)
            .with_priority(Priority::Critical)
            .with_dependencies(vec!["t0".into()])
            .with_estimated_tokens(4000)
            .with_prompt("Use {result:t0} as the starting point");

        assert_eq!(task.priority, Priority::Critical);
        assert_eq!(task.dependencies, vec!["t0".to_string()]);
        assert_eq!(task.estimated_tokens, Some(4000));
        assert!(task.context.unwrap().prompt.unwrap().contains("{result:t0}"));
    }

    #[test]
    fn test_plan_serializes_camel_case() {
        let sid = session();
        let plan = Plan::new(Uuid::new_v4(), sid, "camel case check")
            .with_phase(Phase::new("p1", "Only").with_gate("typecheck"));
        let json = serde_json::to_value(&plan).unwrap();

        assert!(json.get("promptId").is_some());
        assert!(json.get("sessionId").is_some());
        assert_eq!(json["phases"][0]["gateCondition"], "typecheck");
        // snake_case must not leak onto the wire
        assert!(json.get("prompt_id").is_none());
    }

    #[test]
    fn test_agent_ref_uses_type_key() {
        let r = AgentRef {
            agent_type: AgentType::Analyst,
            id: Some("analyst-1".into()),
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["type"], "analyst");
        assert_eq!(json["id"], "analyst-1");
    }

    #[test]
    fn test_coverage_rounding() {
        assert_eq!(EvidenceChain::coverage_for(0), 0);
        assert_eq!(EvidenceChain::coverage_for(1), 33);
        assert_eq!(EvidenceChain::coverage_for(2), 67);
        assert_eq!(EvidenceChain::coverage_for(3), 100);
    }

    #[test]
    fn test_recompute_status_counts_verified_criteria() {
        let sid = session();
        let now = Utc::now();
        let mut chain = EvidenceChain {
            id: Uuid::new_v4(),
            session_id: sid,
            created_at: now,
            updated_at: now,
            requirement: Requirement {
                task_id: "t1".into(),
                description: "login works".into(),
                acceptance_criteria: vec!["renders".into(), "submits".into()],
            },
            analysis: None,
            implementation: Some(ImplementationEvidence::default()),
            validation: Some(ValidationEvidence {
                links_to: Some(VerificationLinks {
                    verification: VerificationRecord {
                        acceptance_criteria_verified: vec![
                            CriterionCheck {
                                criterion: "renders".into(),
                                verified: true,
                            },
                            CriterionCheck {
                                criterion: "submits".into(),
                                verified: false,
                            },
                        ],
                    },
                }),
                ..Default::default()
            }),
            chain_status: ChainStatus {
                analysis_linked: false,
                implementation_linked: false,
                validation_linked: false,
                coverage_percent: 0,
                acceptance_criteria_verified: 0,
                acceptance_criteria_total: 0,
            },
        };

        chain.recompute_status();
        assert!(!chain.chain_status.analysis_linked);
        assert!(chain.chain_status.implementation_linked);
        assert!(chain.chain_status.validation_linked);
        assert_eq!(chain.chain_status.coverage_percent, 67);
        assert_eq!(chain.chain_status.acceptance_criteria_verified, 1);
        assert_eq!(chain.chain_status.acceptance_criteria_total, 2);
    }

    #[test]
    fn test_gate_result_round_trip() {
        let result = GateResult {
            phase_id: "p1".into(),
            passed: false,
            checked_at: Utc::now(),
            results: vec![CheckResult {
                check: "typecheck".into(),
                passed: false,
                message: Some("exit code 2".into()),
            }],
            blockers: vec!["exit code 2".into()],
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("phaseId"));
        assert!(json.contains("checkedAt"));
        let back: GateResult = serde_json::from_str(&json).unwrap();
        assert!(!back.passed);
        assert_eq!(back.results.len(), 1);
    }
}
