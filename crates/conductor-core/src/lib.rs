//! Core types, schemas, and capability contracts for the Conductor
//! orchestration engine.
//!
//! This crate provides the foundational pieces shared across all Conductor
//! crates: the unified error enum, session identifiers, typed artifact
//! contracts with schema validation, and the capability interface through
//! which the engine touches the outside world.
//!
//! # Main types
//!
//! - [`ConductorError`] — Unified error enum for all Conductor subsystems.
//! - [`ConductorResult`] — Convenience alias for `Result<T, ConductorError>`.
//! - [`SessionId`] — Directory-scoped run identifier (`YYYYMMDD_HH-MM_<uuid>`).
//! - [`Plan`] / [`Phase`] / [`Subtask`] — The declarative execution plan.
//! - [`Handoff`] — The message a completed agent writes back.
//! - [`OrchestratorState`] — The single mutable run record.
//! - [`GateResult`] / [`EvidenceChain`] — Gate and traceability artifacts.
//! - [`ExecCapabilities`] — The injected capability object for commands,
//!   memory lookups, and chain listing.

/// Typed artifact contracts (Prompt, Plan, Handoff, state, gates, evidence).
pub mod artifact;
/// The capability interface and the process-backed command runner.
pub mod capability;
/// Unified error enum and validation issue records.
pub mod error;
/// Session identifiers and filename-safe timestamps.
pub mod session;
/// Schema registry and per-artifact validators.
pub mod validate;

pub use artifact::{
    AgentInstance, AgentRef, AgentType, AnalysisEvidence, ChainStatus, CheckResult,
    CriterionCheck, EvidenceChain, GateResult, Handoff, HandoffContext, HandoffReason,
    HandoffState, ImplementationEvidence, NextAction, OrchestratorState, Phase, PhaseProgress,
    Plan, Priority, Prompt, PromptContext, PromptRequest, QueuedTask, QueuedTaskStatus,
    Requirement, RunStatus, Subtask, SubtaskContext, TaskResult, TaskResultStatus, TokenState,
    TokenUsage, ValidationEvidence, VerificationLinks, VerificationRecord,
};
pub use capability::{
    wildcard_match, wildcard_regex, CommandOutput, ExecCapabilities, ProcessRunner,
    DEFAULT_COMMAND_TIMEOUT_MS,
};
pub use error::{ConductorError, ConductorResult, ValidationIssue};
pub use session::{filename_timestamp, SessionId};
pub use validate::{detect_artifact, phase_dependency_cycle, validate_value, ArtifactKind, Validate};
