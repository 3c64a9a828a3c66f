//! Gate DSL and phase-advancement lifecycle for the Conductor engine.
//!
//! A gate condition is a boolean expression over declarative predicates
//! (`"typecheck AND tests"`, `"evidence[coverage] >= 80"`). This crate
//! compiles conditions to an expression tree, evaluates them with
//! short-circuit semantics against an injected capability object, and
//! binds the result to the Context Hub: the gate result is persisted and
//! the orchestrator state advances only after the gate passes.
//!
//! # Main types
//!
//! - [`GateExpr`] / [`GateCheck`] — The parsed condition tree.
//! - [`parse`] — Condition string → tree; errors carry position + lexeme.
//! - [`GateEvaluator`] — Async short-circuit evaluator with an aggregate
//!   deadline and cancellation; includes the documented-failure sync entry.
//! - [`LegacyValidation`] — Adapter for pre-DSL comma-separated conditions.
//! - [`GateLifecycle`] — Evaluate → persist → advance, atomically.
//! - [`SessionCapabilities`] — The deployment capability object.

/// Expression tree and canonical printing.
pub mod ast;
/// The deployment capability object.
pub mod capabilities;
/// Async evaluator and sync fallback.
pub mod eval;
/// Legacy comma-separated condition adapter.
pub mod legacy;
/// Lexer with position-carrying tokens.
pub mod lexer;
/// Gate lifecycle and phase advancement.
pub mod lifecycle;
/// Recursive-descent parser.
pub mod parser;

pub use ast::{format_number, CmpOp, GateCheck, GateExpr, Threshold};
pub use capabilities::SessionCapabilities;
pub use eval::{
    parse_passed_count, CheckCommands, GateEvaluator, GateOutcome, CANCELLED_BLOCKER,
    DEFAULT_GATE_TIMEOUT, SYNC_FALLBACK_BLOCKER, TIMEOUT_BLOCKER,
};
pub use legacy::{is_legacy_condition, parse_legacy, LegacyValidation};
pub use lexer::{lex, Token, TokenKind};
pub use lifecycle::{GateLifecycle, PhaseAdvance};
pub use parser::parse;
