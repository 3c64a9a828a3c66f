//! Cumulative token accounting for a phase.
//!
//! The engine does not consume tokens itself; it tracks what completed
//! agents report and answers "may this group be authorised" before each
//! dispatch.

use chrono::Utc;
use conductor_core::{ConductorError, ConductorResult, SessionId, TokenState};

/// Tracks cumulative token usage against a fixed budget.
#[derive(Debug, Clone)]
pub struct TokenBudget {
    budget: u64,
    used: u64,
}

impl TokenBudget {
    /// Creates an empty counter with the given cap.
    pub fn new(budget: u64) -> Self {
        Self { budget, used: 0 }
    }

    /// Resumes a counter from persisted token state.
    pub fn resume(budget: u64, used: u64) -> Self {
        Self { budget, used }
    }

    /// The configured cap.
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Tokens consumed so far.
    pub fn used(&self) -> u64 {
        self.used
    }

    /// `used + estimated <= budget`
    pub fn within(&self, estimated: u64) -> bool {
        self.used.saturating_add(estimated) <= self.budget
    }

    /// Errors with `budget_exceeded` when a dispatch estimate does not fit.
    pub fn authorize(&self, estimated: u64) -> ConductorResult<()> {
        if self.within(estimated) {
            Ok(())
        } else {
            Err(ConductorError::BudgetExceeded {
                used: self.used,
                estimated,
                budget: self.budget,
            })
        }
    }

    /// Records tokens reported by completed agents.
    pub fn record(&mut self, tokens: u64) {
        self.used = self.used.saturating_add(tokens);
    }

    /// Snapshot for persistence via the hub.
    pub fn to_token_state(&self, session_id: SessionId) -> TokenState {
        TokenState {
            session_id,
            used_tokens: self.used,
            token_budget: Some(self.budget),
            updated_at: Utc::now(),
        }
    }
}

/// Standalone form of the budget predicate.
pub fn within_token_budget(used: u64, estimated: u64, budget: u64) -> bool {
    used.saturating_add(estimated) <= budget
}
