//! Adapter for legacy comma-separated gate conditions.
//!
//! Before the expression DSL existed, gate conditions were written as a
//! comma-separated list of validation flags (`"typecheck, tests,
//! coverage: 80"`). A string is legacy iff it contains no boolean keyword
//! and no comparison operator; such strings are adapted onto the same
//! expression tree the DSL parser produces, so both formats share one
//! evaluator.

use crate::ast::{CmpOp, GateCheck, GateExpr, Threshold};
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

fn keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r"(?i)\b(AND|OR|NOT)\b").expect("keyword pattern is valid"))
}

/// True iff the condition predates the DSL: no `AND`/`OR`/`NOT` keyword
/// (as a whole word, any case) and no `<`, `>`, or `=`.
pub fn is_legacy_condition(condition: &str) -> bool {
    !keyword_regex().is_match(condition) && !condition.contains(['<', '>', '='])
}

/// The validation flags a legacy condition can carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyValidation {
    /// Run the type checker.
    pub typecheck: bool,
    /// Run the tests.
    pub tests: bool,
    /// Minimum evidence coverage, interpreted as `>= N`.
    pub coverage: Option<f64>,
    /// Memory-store patterns that must match.
    pub memory_patterns: Vec<String>,
    /// Evidence chain ids that must exist.
    pub evidence_ids: Vec<String>,
}

impl LegacyValidation {
    /// Adapts the flags onto the DSL expression tree (an `AND` chain).
    /// Returns `None` when no flags were recognised.
    pub fn into_expr(self) -> Option<GateExpr> {
        let mut checks = Vec::new();
        if self.typecheck {
            checks.push(GateCheck::Typecheck);
        }
        if self.tests {
            checks.push(GateCheck::Tests);
        }
        if let Some(value) = self.coverage {
            checks.push(GateCheck::EvidenceCoverage(Threshold {
                op: CmpOp::Ge,
                value,
                percent: true,
            }));
        }
        for pattern in self.memory_patterns {
            checks.push(GateCheck::MemoryPattern(pattern));
        }
        for id in self.evidence_ids {
            checks.push(GateCheck::EvidenceExists(id));
        }
        GateExpr::all(checks)
    }
}

/// Parses a legacy comma-separated condition. Unrecognised items are
/// skipped with a warning, never fatal.
pub fn parse_legacy(condition: &str) -> LegacyValidation {
    let mut validation = LegacyValidation::default();

    for raw in condition.split(',') {
        let item = raw.trim();
        if item.is_empty() {
            continue;
        }

        let (key, value) = match item.split_once(':') {
            Some((key, value)) => (key.trim(), Some(value.trim())),
            None => (item, None),
        };

        match (key, value) {
            ("typecheck", _) => validation.typecheck = true,
            ("tests", _) => validation.tests = true,
            ("coverage", Some(value)) => {
                let number = value.trim_end_matches('%').trim();
                match number.parse::<f64>() {
                    Ok(n) => validation.coverage = Some(n),
                    Err(_) => {
                        warn!(item, "skipping legacy coverage item with unparseable value");
                    }
                }
            }
            ("memory", Some(pattern)) if !pattern.is_empty() => {
                validation.memory_patterns.push(pattern.to_string());
            }
            ("evidence", Some(id)) if !id.is_empty() => {
                validation.evidence_ids.push(id.to_string());
            }
            _ if key.contains('*') => {
                // A bare pattern means a memory-store match, as in the DSL.
                validation.memory_patterns.push(key.to_string());
            }
            _ => {
                warn!(item, "skipping unrecognised legacy validation item");
            }
        }
    }

    validation
}
