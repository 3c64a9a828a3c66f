//! Engine configuration and its validation.

use conductor_core::{ConductorError, ConductorResult, ValidationIssue};

/// Upper bound on a parallel group's size by default.
pub const DEFAULT_MAX_CONCURRENT_AGENTS: usize = 3;
/// Per-spawn hard ceiling by default (5 minutes).
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;
/// Maximum retry attempts by default.
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;
/// Cumulative token cap across a phase by default.
pub const DEFAULT_TOKEN_BUDGET: u64 = 100_000;

/// Tunables of the parallel execution engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on group size.
    pub max_concurrent_agents: usize,
    /// Barrier discipline: the next group may not start until every spawn
    /// in the current group has produced a handoff or failed terminally.
    /// Disabling the barrier is rejected until its interaction with
    /// placeholder injection is specified.
    pub wait_for_all: bool,
    /// Per-spawn hard ceiling.
    pub timeout_ms: u64,
    /// Enables the transient-error retry wrapper.
    pub retry_on_failure: bool,
    /// Maximum attempts per wrapped spawn.
    pub max_retry_attempts: u32,
    /// Cumulative token cap across the phase.
    pub token_budget: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_agents: DEFAULT_MAX_CONCURRENT_AGENTS,
            wait_for_all: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_on_failure: true,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            token_budget: DEFAULT_TOKEN_BUDGET,
        }
    }
}

impl EngineConfig {
    /// Sets the group-size bound.
    pub fn with_max_concurrent_agents(mut self, max: usize) -> Self {
        self.max_concurrent_agents = max;
        self
    }

    /// Sets the cumulative token cap.
    pub fn with_token_budget(mut self, budget: u64) -> Self {
        self.token_budget = budget;
        self
    }

    /// Sets the per-spawn ceiling.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Enables or disables the retry wrapper.
    pub fn with_retry_on_failure(mut self, retry: bool) -> Self {
        self.retry_on_failure = retry;
        self
    }

    /// Checks the configuration is usable.
    pub fn validate(&self) -> ConductorResult<()> {
        let mut issues = Vec::new();
        if self.max_concurrent_agents == 0 {
            issues.push(ValidationIssue::new(
                "maxConcurrentAgents",
                "must be at least 1",
                "out_of_range",
            ));
        }
        if !self.wait_for_all {
            issues.push(ValidationIssue::new(
                "waitForAll",
                "running without the group barrier is not supported: a downstream \
                 task could start before the upstream handoff its placeholders need",
                "unsupported",
            ));
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConductorError::ValidationFailed {
                artifact: "engine_config".to_string(),
                issues,
            })
        }
    }
}
