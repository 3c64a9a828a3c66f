//! Session-scoped persistent storage for orchestration artifacts.
//!
//! The hub owns a base directory (default `<cwd>/ORCHESTRATION`) holding one
//! directory per session. Every artifact write validates against its schema,
//! serializes with stable indentation, and lands atomically via
//! tmp-then-rename; every write is also recorded in the session's
//! append-only history ledger.
//!
//! # Main types
//!
//! - [`ContextHub`] — The store: per-artifact read/write/list, gate-result
//!   latest pointers, evidence chain enumeration, file validation.
//! - [`SessionPaths`] — Resolved directory layout for one session.
//! - [`HistoryEntry`] — One line of the `history.jsonl` ledger.
//! - [`FileValidation`] — Result of checking a file against the registry.

/// Atomic JSON read/write helpers.
pub mod atomic;
/// The append-only history ledger.
pub mod history;
/// The hub itself.
pub mod hub;
/// Session directory layout and filename derivation.
pub mod paths;

pub use history::HistoryEntry;
pub use hub::{ContextHub, FileValidation, DEFAULT_BASE_DIR, DEFAULT_MAX_HISTORY_ITEMS};
pub use paths::{check_component, SessionPaths};
