//! The gate condition expression tree and its canonical printed form.
//!
//! Printing is the inverse of parsing: for any parsable condition `c`,
//! `parse(print(parse(c)))` yields an equivalent tree. `AND`/`OR` are
//! left-associative at the same precedence, so only right-hand compound
//! operands need parentheses when printing.

use std::fmt;

/// A comparison operator in a threshold check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `=`
    Eq,
}

impl CmpOp {
    /// The operator's source text.
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Ge => ">=",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Lt => "<",
            CmpOp::Eq => "=",
        }
    }

    /// Applies the comparison.
    pub fn compare(&self, left: f64, right: f64) -> bool {
        match self {
            CmpOp::Ge => left >= right,
            CmpOp::Le => left <= right,
            CmpOp::Gt => left > right,
            CmpOp::Lt => left < right,
            CmpOp::Eq => (left - right).abs() < f64::EPSILON,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A numeric threshold with its comparison operator.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    /// The comparison.
    pub op: CmpOp,
    /// The right-hand value.
    pub value: f64,
    /// Whether the source wrote a trailing `%`.
    pub percent: bool,
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, format_number(self.value))?;
        if self.percent {
            f.write_str("%")?;
        }
        Ok(())
    }
}

/// Prints a number without a trailing `.0` when it is integral.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// A single predicate leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum GateCheck {
    /// `typecheck` — the platform type-checking command exits 0.
    Typecheck,
    /// `tests` — the test command exits 0.
    Tests,
    /// `memory:PATTERN` (or a bare pattern) — at least one memory-store
    /// artifact matches the wildcard.
    MemoryPattern(String),
    /// `traceability:FIELD` — the named traceability field is non-empty.
    Traceability(String),
    /// `evidence:ID exists` — an evidence chain with that id exists.
    EvidenceExists(String),
    /// `evidence:coverage OP N` / `coverage OP N` / `evidence[coverage] OP N`
    /// — the minimum coverage across all chains satisfies the threshold.
    EvidenceCoverage(Threshold),
    /// `SUBJECT[METRIC] OP N` — a generic metric threshold
    /// (e.g. `tests[passed] >= 5`).
    Metric {
        /// The check that produces the metric.
        subject: String,
        /// The metric name.
        metric: String,
        /// The threshold to satisfy.
        threshold: Threshold,
    },
}

impl fmt::Display for GateCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateCheck::Typecheck => f.write_str("typecheck"),
            GateCheck::Tests => f.write_str("tests"),
            GateCheck::MemoryPattern(pattern) => write!(f, "memory:{pattern}"),
            GateCheck::Traceability(field) => write!(f, "traceability:{field}"),
            GateCheck::EvidenceExists(id) => write!(f, "evidence:{id} exists"),
            GateCheck::EvidenceCoverage(t) => write!(f, "evidence:coverage {t}"),
            GateCheck::Metric {
                subject,
                metric,
                threshold,
            } => write!(f, "{subject}[{metric}] {threshold}"),
        }
    }
}

/// A parsed gate condition.
#[derive(Debug, Clone, PartialEq)]
pub enum GateExpr {
    /// Short-circuit conjunction.
    And(Box<GateExpr>, Box<GateExpr>),
    /// Short-circuit disjunction.
    Or(Box<GateExpr>, Box<GateExpr>),
    /// Negation.
    Not(Box<GateExpr>),
    /// A predicate leaf.
    Check(GateCheck),
}

impl GateExpr {
    /// Builds a left-leaning `AND` chain from checks; `None` when empty.
    pub fn all(checks: Vec<GateCheck>) -> Option<GateExpr> {
        let mut iter = checks.into_iter();
        let first = GateExpr::Check(iter.next()?);
        Some(iter.fold(first, |acc, check| {
            GateExpr::And(Box::new(acc), Box::new(GateExpr::Check(check)))
        }))
    }

    fn is_compound(&self) -> bool {
        matches!(self, GateExpr::And(..) | GateExpr::Or(..))
    }
}

impl fmt::Display for GateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateExpr::And(left, right) => {
                write!(f, "{left} AND ")?;
                write_operand(f, right)
            }
            GateExpr::Or(left, right) => {
                write!(f, "{left} OR ")?;
                write_operand(f, right)
            }
            GateExpr::Not(inner) => {
                f.write_str("NOT ")?;
                write_operand(f, inner)
            }
            GateExpr::Check(check) => write!(f, "{check}"),
        }
    }
}

/// Wraps compound right-hand operands in parentheses so the printed form
/// reparses to the same left-associative tree.
fn write_operand(f: &mut fmt::Formatter<'_>, expr: &GateExpr) -> fmt::Result {
    if expr.is_compound() {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}
