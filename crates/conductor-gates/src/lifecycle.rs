//! Gate lifecycle: evaluate a phase's gate, persist the result, and advance
//! the orchestrator state only after the gate passes.
//!
//! Gate failure is a return value, never an error — the caller decides
//! policy. Genuine faults (I/O, missing plan) surface as errors.

use crate::eval::{GateEvaluator, GateOutcome};
use chrono::Utc;
use conductor_core::{
    ConductorError, ConductorResult, GateResult, OrchestratorState, Plan, PhaseProgress,
    QueuedTask, QueuedTaskStatus, RunStatus, SessionId, ValidationIssue,
};
use conductor_hub::ContextHub;
use tracing::info;
use uuid::Uuid;

/// History entry id recorded when the final phase completes.
const TERMINAL_PHASE_MARKER: &str = "complete";

/// Outcome of a phase-advance attempt.
#[derive(Debug, Clone)]
pub enum PhaseAdvance {
    /// The gate passed and the state moved on.
    Advanced {
        /// Id of the phase now current, or `None` when the plan finished.
        next_phase: Option<String>,
        /// The persisted gate result.
        gate: GateResult,
    },
    /// The gate failed; state was not mutated.
    Blocked {
        /// Human-readable failure summary (`Gate check failed: …`).
        reason: String,
        /// The persisted gate result.
        gate: GateResult,
    },
}

impl PhaseAdvance {
    /// True iff the state advanced.
    pub fn advanced(&self) -> bool {
        matches!(self, PhaseAdvance::Advanced { .. })
    }

    /// The persisted gate result, whichever way the attempt went.
    pub fn gate(&self) -> &GateResult {
        match self {
            PhaseAdvance::Advanced { gate, .. } | PhaseAdvance::Blocked { gate, .. } => gate,
        }
    }
}

/// Binds the gate evaluator to the Context Hub.
pub struct GateLifecycle {
    hub: ContextHub,
    evaluator: GateEvaluator,
}

impl GateLifecycle {
    /// Creates the lifecycle controller.
    pub fn new(hub: ContextHub, evaluator: GateEvaluator) -> Self {
        Self { hub, evaluator }
    }

    /// Bootstraps the orchestrator state for a plan: status `running`,
    /// first phase current, task queue seeded with every subtask pending.
    pub async fn initialize_state(&self, plan: &Plan) -> ConductorResult<OrchestratorState> {
        let first = plan.phases.first().ok_or_else(|| {
            ConductorError::ValidationFailed {
                artifact: "plan".to_string(),
                issues: vec![ValidationIssue::new(
                    "phases",
                    "cannot orchestrate a plan with no phases",
                    "required",
                )],
            }
        })?;

        let task_queue: Vec<QueuedTask> = plan
            .phases
            .iter()
            .flat_map(|p| &p.subtasks)
            .map(|t| QueuedTask {
                task_id: t.id.clone(),
                status: QueuedTaskStatus::Pending,
                assigned_agent: None,
            })
            .collect();

        let state = OrchestratorState {
            id: Uuid::new_v4(),
            session_id: plan.session_id.clone(),
            plan_id: plan.id,
            status: RunStatus::Running,
            current_phase: PhaseProgress {
                id: first.id.clone(),
                name: first.name.clone(),
                progress: 0,
            },
            agents: Vec::new(),
            task_queue,
            handoff_history: Vec::new(),
            errors: None,
            timestamp: Utc::now(),
        };

        self.hub.write_orchestrator_state(&state).await?;
        info!(session = %plan.session_id, phase = %first.id, "orchestrator state initialized");
        Ok(state)
    }

    /// Evaluates the gate for `phase_id` and advances the state iff it
    /// passes.
    ///
    /// The condition is resolved in order: `override_condition`, then the
    /// phase's `gateCondition`, then "no condition" (trivially passes).
    /// The gate result is persisted either way; state is mutated only on
    /// success.
    pub async fn advance_phase(
        &self,
        session_id: &SessionId,
        phase_id: &str,
        override_condition: Option<&str>,
    ) -> ConductorResult<PhaseAdvance> {
        let plan = self.hub.read_plan(session_id, None).await?;
        let phase = plan
            .phase(phase_id)
            .ok_or_else(|| ConductorError::NotFound(format!("phase '{phase_id}' in plan")))?;

        let condition = override_condition
            .or(phase.gate_condition.as_deref())
            .unwrap_or("");

        let outcome = self.evaluator.evaluate(condition).await?;
        self.finish_advance(session_id, &plan, phase_id, outcome)
            .await
    }

    /// The sync-fallback path: evaluates via [`GateEvaluator::evaluate_sync`]
    /// and persists the deterministic result just like the async path, so
    /// consumers of the `-latest` pointer always see a record.
    pub async fn record_sync_fallback(
        &self,
        session_id: &SessionId,
        phase_id: &str,
        condition: &str,
    ) -> ConductorResult<GateResult> {
        let outcome = GateEvaluator::evaluate_sync(condition);
        let gate = GateResult {
            phase_id: phase_id.to_string(),
            passed: outcome.passed,
            checked_at: Utc::now(),
            results: outcome.results,
            blockers: outcome.blockers,
        };
        self.hub.write_gate_result(session_id, &gate).await?;
        Ok(gate)
    }

    async fn finish_advance(
        &self,
        session_id: &SessionId,
        plan: &Plan,
        phase_id: &str,
        outcome: GateOutcome,
    ) -> ConductorResult<PhaseAdvance> {
        let gate = GateResult {
            phase_id: phase_id.to_string(),
            passed: outcome.passed,
            checked_at: Utc::now(),
            results: outcome.results,
            blockers: outcome.blockers,
        };
        self.hub.write_gate_result(session_id, &gate).await?;

        if !gate.passed {
            let reason = format!("Gate check failed: {}", gate.blockers.join("; "));
            info!(session = %session_id, phase = phase_id, %reason, "phase advance blocked");
            return Ok(PhaseAdvance::Blocked { reason, gate });
        }

        let mut state = self.hub.read_orchestrator_state(session_id).await?;
        let next_phase = plan.next_phase(phase_id);

        match next_phase {
            Some(next) => {
                state.current_phase = PhaseProgress {
                    id: next.id.clone(),
                    name: next.name.clone(),
                    progress: 0,
                };
            }
            None => {
                // Terminal phase: keep it current, mark it complete.
                state.current_phase.progress = 100;
                state.status = RunStatus::Completed;
            }
        }
        state.timestamp = Utc::now();
        self.hub.write_orchestrator_state(&state).await?;

        let next_id = next_phase.map(|p| p.id.clone());
        self.hub
            .append_history(
                session_id,
                "phase_advance",
                next_id.clone().unwrap_or_else(|| TERMINAL_PHASE_MARKER.to_string()),
            )
            .await?;

        info!(
            session = %session_id,
            from = phase_id,
            to = next_id.as_deref().unwrap_or(TERMINAL_PHASE_MARKER),
            "phase advanced"
        );
        Ok(PhaseAdvance::Advanced {
            next_phase: next_id,
            gate,
        })
    }
}
