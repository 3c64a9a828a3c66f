//! Parallel execution engine for the Conductor orchestration core.
//!
//! Transforms a plan phase into an ordered sequence of parallel groups —
//! each a set of subtasks whose dependencies are satisfied by earlier
//! groups — and emits one dispatch instruction per group for the external
//! spawner. The engine enforces the concurrency cap and the cumulative
//! token budget, injects upstream handoffs into downstream prompts, and
//! aggregates spawn results commutatively and idempotently.
//!
//! # Main types
//!
//! - [`ParallelEngine`] — Facade: layer, authorise, dispatch, absorb.
//! - [`EngineConfig`] — Tunables (concurrency, barrier, timeouts, budget).
//! - [`ParallelGroup`] / [`DispatchInstruction`] — Layering output and the
//!   spawner contract.
//! - [`AggregatedContext`] — Order-insensitive result aggregation.
//! - [`retry_spawn`] / [`RetryMetrics`] — Transient-failure backoff wrapper.
//! - [`TokenBudget`] — Cumulative token accounting.

/// Order-insensitive result aggregation.
pub mod aggregate;
/// Token budget accounting.
pub mod budget;
/// Engine configuration.
pub mod config;
/// Dispatch instructions and placeholder injection.
pub mod dispatch;
/// The engine facade.
pub mod engine;
/// Deterministic dependency layering.
pub mod layering;
/// Exponential-backoff retry wrapper.
pub mod retry;

pub use aggregate::{AggregatedContext, ExecutionResult};
pub use budget::{within_token_budget, TokenBudget};
pub use config::{
    EngineConfig, DEFAULT_MAX_CONCURRENT_AGENTS, DEFAULT_MAX_RETRY_ATTEMPTS,
    DEFAULT_TIMEOUT_MS, DEFAULT_TOKEN_BUDGET,
};
pub use dispatch::{
    build_instruction, format_handoff, inject_placeholders, spawn_command, DispatchInstruction,
    SpawnDirective,
};
pub use engine::ParallelEngine;
pub use layering::{layer_phase, ParallelGroup};
pub use retry::{
    is_transient, retry_spawn, RetryError, RetryMetrics, RetryOutcome, RetryPolicy,
    TRANSIENT_PATTERNS,
};
