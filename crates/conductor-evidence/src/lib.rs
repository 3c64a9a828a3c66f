//! Evidence chains: append-only traceability from requirement to
//! analysis, implementation, and validation artifacts.
//!
//! # Main types
//!
//! - [`create_evidence_chain`] / [`EvidenceChainBuilder`] — Fluent chain
//!   construction with recomputed coverage.
//! - [`auto_populate_evidence`] — Derives chain sections from completed
//!   handoffs, keyed by the completing agent's kind.

/// The chain builder.
pub mod chain;
/// The handoff-driven auto-populator.
pub mod populate;

pub use chain::{create_evidence_chain, ChainLinkReport, EvidenceChainBuilder};
pub use populate::{auto_populate_evidence, AutoPopulateOutcome};
