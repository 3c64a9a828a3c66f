use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A convenience `Result` alias using [`ConductorError`].
pub type ConductorResult<T> = Result<T, ConductorError>;

/// A single problem found while validating an artifact against its schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path to the offending field (e.g. `phases[0].subtasks[2].id`).
    pub path: String,
    /// Human-readable description of the problem.
    pub message: String,
    /// Stable machine-readable code (e.g. `required`, `bad_format`, `cycle`).
    pub code: String,
}

impl ValidationIssue {
    /// Creates a new issue for the given field path.
    pub fn new(
        path: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.path, self.message, self.code)
    }
}

/// Top-level error type for the orchestration core.
///
/// Each variant corresponds to one of the error kinds surfaced at the public
/// boundary; [`ConductorError::kind`] yields the stable external code.
#[derive(Debug, Error)]
pub enum ConductorError {
    /// An artifact failed schema validation at a write ingress.
    #[error("Validation failed for {artifact}: {}", format_issues(.issues))]
    ValidationFailed {
        /// Which artifact schema was violated.
        artifact: String,
        /// The structured issue list.
        issues: Vec<ValidationIssue>,
    },

    /// A read targeted an artifact or pointer that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A phase gate evaluated to failure.
    #[error("Gate check failed: {0}")]
    GateFailed(String),

    /// Subtask dependencies contain a cycle; participating ids are listed.
    #[error("Dependency cycle among tasks: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    /// Authorising a dispatch would exceed the cumulative token budget.
    #[error("Token budget exceeded: {used} used + {estimated} estimated > {budget}")]
    BudgetExceeded {
        /// Tokens already consumed in this phase.
        used: u64,
        /// Tokens the next group is estimated to need.
        estimated: u64,
        /// The configured cumulative cap.
        budget: u64,
    },

    /// An operation exceeded its time budget.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// An operation was aborted by a cancellation signal.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// A gate condition failed to parse; the condition is rejected wholesale.
    #[error("Parse error at position {position} near '{lexeme}': {message}")]
    Parse {
        /// Zero-based character offset of the offending lexeme.
        position: usize,
        /// The lexeme that triggered the error.
        lexeme: String,
        /// What the parser expected instead.
        message: String,
    },

    /// A fault in the context hub outside the enumerated kinds.
    #[error("Hub error: {0}")]
    Hub(String),

    /// A fault in the parallel execution engine outside the enumerated kinds.
    #[error("Engine error: {0}")]
    Engine(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConductorError {
    /// The stable error code propagated to external collaborators.
    pub fn kind(&self) -> &'static str {
        match self {
            ConductorError::ValidationFailed { .. } => "validation_failed",
            ConductorError::NotFound(_) => "not_found",
            ConductorError::GateFailed(_) => "gate_failed",
            ConductorError::DependencyCycle(_) => "dependency_cycle",
            ConductorError::BudgetExceeded { .. } => "budget_exceeded",
            ConductorError::Timeout(_) => "timeout",
            ConductorError::Cancelled(_) => "cancelled",
            ConductorError::Parse { .. } => "validation_failed",
            ConductorError::Hub(_) | ConductorError::Io(_) => "io_error",
            ConductorError::Engine(_) => "io_error",
            ConductorError::Json(_) => "validation_failed",
        }
    }

    /// True when the error is the benign absent-artifact signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConductorError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failed_message_lists_issues() {
        let err = ConductorError::ValidationFailed {
            artifact: "plan".to_string(),
            issues: vec![
                ValidationIssue::new("summary", "must not be empty", "required"),
                ValidationIssue::new("phases", "at least one phase required", "required"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("plan"));
        assert!(msg.contains("summary"));
        assert!(msg.contains("at least one phase"));
        assert_eq!(err.kind(), "validation_failed");
    }

    #[test]
    fn test_dependency_cycle_lists_participants() {
        let err = ConductorError::DependencyCycle(vec!["a".into(), "b".into(), "c".into()]);
        assert!(err.to_string().contains("a, b, c"));
        assert_eq!(err.kind(), "dependency_cycle");
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(ConductorError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(ConductorError::GateFailed("x".into()).kind(), "gate_failed");
        assert_eq!(ConductorError::Timeout("gate".into()).kind(), "timeout");
        assert_eq!(ConductorError::Cancelled("gate".into()).kind(), "cancelled");
        assert_eq!(
            ConductorError::BudgetExceeded {
                used: 90_000,
                estimated: 20_000,
                budget: 100_000
            }
            .kind(),
            "budget_exceeded"
        );
    }

    #[test]
    fn test_not_found_predicate() {
        assert!(ConductorError::NotFound("prompt".into()).is_not_found());
        assert!(!ConductorError::Hub("disk full".into()).is_not_found());
    }
}
