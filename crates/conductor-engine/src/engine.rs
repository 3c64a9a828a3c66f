//! The parallel execution engine facade.
//!
//! Single-threaded cooperative: the engine turns a phase into ordered
//! dispatch instructions and absorbs results; the external spawner it
//! drives is what actually runs agents in parallel. Between groups the
//! engine relies on the `wait_for_all` barrier — a group is only prepared
//! once every spawn of the previous group has reported back.

use crate::aggregate::AggregatedContext;
use crate::budget::TokenBudget;
use crate::config::EngineConfig;
use crate::dispatch::{build_instruction, DispatchInstruction};
use crate::layering::{layer_phase, ParallelGroup};
use crate::retry::{retry_spawn, RetryMetrics, RetryPolicy};
use conductor_core::{ConductorResult, Phase};
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Transforms phases into dispatch instructions under a concurrency cap
/// and a cumulative token budget.
#[derive(Debug)]
pub struct ParallelEngine {
    config: EngineConfig,
    budget: TokenBudget,
}

impl ParallelEngine {
    /// Creates an engine after validating the configuration.
    pub fn new(config: EngineConfig) -> ConductorResult<Self> {
        config.validate()?;
        let budget = TokenBudget::new(config.token_budget);
        Ok(Self { config, budget })
    }

    /// Resumes an engine with tokens already consumed in this phase.
    pub fn resume(config: EngineConfig, used_tokens: u64) -> ConductorResult<Self> {
        config.validate()?;
        let budget = TokenBudget::resume(config.token_budget, used_tokens);
        Ok(Self { config, budget })
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The cumulative token counter.
    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    /// Layers a phase into ordered parallel groups.
    pub fn plan_phase(&self, phase: &Phase) -> ConductorResult<Vec<ParallelGroup>> {
        let groups = layer_phase(phase, self.config.max_concurrent_agents)?;
        info!(
            phase = %phase.id,
            subtasks = phase.subtasks.len(),
            groups = groups.len(),
            "phase layered"
        );
        Ok(groups)
    }

    /// Authorises a group against the token budget and emits its dispatch
    /// instruction with prompt placeholders resolved from the aggregated
    /// upstream context.
    pub fn dispatch_group(
        &self,
        phase: &Phase,
        index: usize,
        group: &ParallelGroup,
        context: &AggregatedContext,
    ) -> ConductorResult<DispatchInstruction> {
        self.budget.authorize(group.estimated_tokens())?;
        let instruction =
            build_instruction(phase, index, group, context, self.config.wait_for_all);
        info!(
            group = %instruction.group_id,
            agents = instruction.agent_count,
            estimated_tokens = instruction.estimated_tokens,
            "group dispatched"
        );
        Ok(instruction)
    }

    /// Records tokens reported by completed agents against the budget.
    pub fn record_usage(&mut self, tokens: u64) {
        self.budget.record(tokens);
    }

    /// Runs one spawn operation under the configured retry discipline.
    ///
    /// With `retry_on_failure` disabled the operation runs exactly once and
    /// no metrics are emitted.
    pub async fn run_spawn<T, F, Fut>(
        &self,
        task_id: Option<String>,
        mut op: F,
    ) -> (ConductorResult<T>, Option<RetryMetrics>)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = ConductorResult<T>>,
    {
        if !self.config.retry_on_failure {
            return (op(1).await, None);
        }
        let policy = RetryPolicy {
            max_attempts: self.config.max_retry_attempts.max(1),
            ..RetryPolicy::default()
        };
        let (result, metrics) = retry_spawn(task_id, &policy, op).await;
        (result, Some(metrics))
    }

    /// The per-spawn hard ceiling as a [`Duration`].
    pub fn spawn_timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }
}
