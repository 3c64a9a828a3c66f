//! Async evaluator for gate expression trees.
//!
//! `AND` short-circuits on the first false, `OR` on the first true; only
//! checks that are actually evaluated leave a [`CheckResult`] behind. The
//! whole gate shares one aggregate deadline (default five minutes): when it
//! expires, evaluation stops with a `timeout` blocker and the partial
//! results are preserved. A cancellation token aborts the same way with a
//! `cancelled` blocker.

use crate::ast::{GateCheck, GateExpr};
use crate::legacy;
use crate::parser::parse;
use conductor_core::{
    CheckResult, ConductorError, ConductorResult, ExecCapabilities, DEFAULT_COMMAND_TIMEOUT_MS,
};
use regex::Regex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default aggregate deadline across all checks of one gate.
pub const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_secs(300);

/// Blocker text for a gate that hit the aggregate deadline.
pub const TIMEOUT_BLOCKER: &str = "timeout";
/// Blocker text for a gate aborted by cancellation.
pub const CANCELLED_BLOCKER: &str = "cancelled";
/// Blocker explaining why the sync entry cannot evaluate conditions.
pub const SYNC_FALLBACK_BLOCKER: &str = "DSL conditions require async evaluation";

/// The platform commands behind the `typecheck` and `tests` predicates.
#[derive(Debug, Clone)]
pub struct CheckCommands {
    /// Command whose exit code decides the `typecheck` predicate.
    pub typecheck: String,
    /// Command whose exit code (and output) decides the `tests` predicates.
    pub tests: String,
}

impl Default for CheckCommands {
    fn default() -> Self {
        Self {
            typecheck: "cargo check".to_string(),
            tests: "cargo test".to_string(),
        }
    }
}

/// Structured outcome of evaluating one gate.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    /// Whether the whole expression evaluated true.
    pub passed: bool,
    /// One entry per check leaf that was evaluated, in evaluation order.
    pub results: Vec<CheckResult>,
    /// Failing results' `message` (falling back to the check text), plus a
    /// terminal `timeout`/`cancelled` marker when evaluation was cut short.
    pub blockers: Vec<String>,
}

impl GateOutcome {
    /// The outcome of a gate with no condition: trivially passed.
    pub fn trivial_pass() -> Self {
        Self {
            passed: true,
            results: Vec::new(),
            blockers: Vec::new(),
        }
    }

    fn from_results(passed: bool, results: Vec<CheckResult>, terminal: Option<&str>) -> Self {
        let mut blockers: Vec<String> = results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.message.clone().unwrap_or_else(|| r.check.clone()))
            .collect();
        if let Some(marker) = terminal {
            blockers.push(marker.to_string());
        }
        Self {
            passed,
            results,
            blockers,
        }
    }
}

enum Interrupt {
    Timeout,
    Cancelled,
}

/// Evaluates gate conditions against an injected capability object.
pub struct GateEvaluator {
    caps: Arc<dyn ExecCapabilities>,
    commands: CheckCommands,
    gate_timeout: Duration,
    command_timeout_ms: u64,
    cancel: CancellationToken,
}

impl GateEvaluator {
    /// Creates an evaluator with default commands and timeouts.
    pub fn new(caps: Arc<dyn ExecCapabilities>) -> Self {
        Self {
            caps,
            commands: CheckCommands::default(),
            gate_timeout: DEFAULT_GATE_TIMEOUT,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            cancel: CancellationToken::new(),
        }
    }

    /// Overrides the typecheck/tests commands.
    pub fn with_commands(mut self, commands: CheckCommands) -> Self {
        self.commands = commands;
        self
    }

    /// Overrides the aggregate gate deadline.
    pub fn with_gate_timeout(mut self, timeout: Duration) -> Self {
        self.gate_timeout = timeout;
        self
    }

    /// Overrides the per-command ceiling.
    pub fn with_command_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.command_timeout_ms = timeout_ms;
        self
    }

    /// Attaches a cancellation token; cancelling it aborts pending checks.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Compiles and evaluates a condition string.
    ///
    /// Empty conditions pass trivially. Legacy comma-separated conditions
    /// are adapted onto the same expression tree. Parse errors reject the
    /// condition wholesale.
    pub async fn evaluate(&self, condition: &str) -> ConductorResult<GateOutcome> {
        let trimmed = condition.trim();
        if trimmed.is_empty() {
            return Ok(GateOutcome::trivial_pass());
        }

        let expr = if legacy::is_legacy_condition(trimmed) {
            debug!(condition = trimmed, "adapting legacy gate condition");
            match legacy::parse_legacy(trimmed).into_expr() {
                Some(expr) => expr,
                None => return Ok(GateOutcome::trivial_pass()),
            }
        } else {
            parse(trimmed)?
        };

        Ok(self.evaluate_expr(&expr).await)
    }

    /// Evaluates an already-parsed expression tree.
    pub async fn evaluate_expr(&self, expr: &GateExpr) -> GateOutcome {
        let deadline = Instant::now() + self.gate_timeout;
        let mut results = Vec::new();

        let outcome = match self.eval_node(expr, deadline, &mut results).await {
            Ok(passed) => GateOutcome::from_results(passed, results, None),
            Err(Interrupt::Timeout) => {
                GateOutcome::from_results(false, results, Some(TIMEOUT_BLOCKER))
            }
            Err(Interrupt::Cancelled) => {
                GateOutcome::from_results(false, results, Some(CANCELLED_BLOCKER))
            }
        };

        info!(
            expression = %expr,
            passed = outcome.passed,
            checks = outcome.results.len(),
            blockers = outcome.blockers.len(),
            "gate evaluated"
        );
        outcome
    }

    /// Synchronous fallback entry, kept for callers that cannot await.
    ///
    /// Its contract is documented failure: predicate adapters may shell
    /// out, so any non-empty condition returns a deterministic
    /// `passed=false` with a blocker explaining that async evaluation is
    /// required. Only the no-condition case passes.
    pub fn evaluate_sync(condition: &str) -> GateOutcome {
        if condition.trim().is_empty() {
            return GateOutcome::trivial_pass();
        }
        GateOutcome {
            passed: false,
            results: Vec::new(),
            blockers: vec![SYNC_FALLBACK_BLOCKER.to_string()],
        }
    }

    fn eval_node<'a>(
        &'a self,
        expr: &'a GateExpr,
        deadline: Instant,
        results: &'a mut Vec<CheckResult>,
    ) -> Pin<Box<dyn Future<Output = Result<bool, Interrupt>> + Send + 'a>> {
        Box::pin(async move {
            match expr {
                GateExpr::And(left, right) => {
                    if !self.eval_node(left, deadline, results).await? {
                        return Ok(false);
                    }
                    self.eval_node(right, deadline, results).await
                }
                GateExpr::Or(left, right) => {
                    if self.eval_node(left, deadline, results).await? {
                        return Ok(true);
                    }
                    self.eval_node(right, deadline, results).await
                }
                GateExpr::Not(inner) => Ok(!self.eval_node(inner, deadline, results).await?),
                GateExpr::Check(check) => self.eval_check(check, deadline, results).await,
            }
        })
    }

    async fn eval_check(
        &self,
        check: &GateCheck,
        deadline: Instant,
        results: &mut Vec<CheckResult>,
    ) -> Result<bool, Interrupt> {
        if self.cancel.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .ok_or(Interrupt::Timeout)?;
        let budget_ms = (remaining.as_millis() as u64).min(self.command_timeout_ms).max(1);

        let (passed, message) = match check {
            GateCheck::Typecheck => self.command_check(&self.commands.typecheck, budget_ms).await,
            GateCheck::Tests => self.command_check(&self.commands.tests, budget_ms).await,
            GateCheck::MemoryPattern(pattern) => match self.caps.match_memory(pattern).await {
                Ok(matches) if !matches.is_empty() => (true, None),
                Ok(_) => (false, Some(format!("no memory matching '{pattern}'"))),
                Err(e) => (false, Some(e.to_string())),
            },
            GateCheck::Traceability(field) => match self.caps.traceability_field(field).await {
                Ok(Some(value)) if !value.trim().is_empty() => (true, None),
                Ok(_) => (
                    false,
                    Some(format!("traceability field '{field}' is empty or absent")),
                ),
                Err(e) => (false, Some(e.to_string())),
            },
            GateCheck::EvidenceExists(id) => match self.caps.list_chains().await {
                Ok(chains) => {
                    let found = chains
                        .iter()
                        .any(|c| c.requirement.task_id == *id || c.id.to_string() == *id);
                    if found {
                        (true, None)
                    } else {
                        (false, Some(format!("no evidence chain for '{id}'")))
                    }
                }
                Err(e) => (false, Some(e.to_string())),
            },
            GateCheck::EvidenceCoverage(threshold) => match self.caps.list_chains().await {
                Ok(chains) if chains.is_empty() => {
                    (false, Some("no evidence chains in session".to_string()))
                }
                Ok(chains) => {
                    let min = chains
                        .iter()
                        .map(|c| c.chain_status.coverage_percent)
                        .min()
                        .unwrap_or(0);
                    if threshold.op.compare(f64::from(min), threshold.value) {
                        (true, None)
                    } else {
                        (
                            false,
                            Some(format!(
                                "minimum coverage {min}% does not satisfy {threshold}"
                            )),
                        )
                    }
                }
                Err(e) => (false, Some(e.to_string())),
            },
            GateCheck::Metric {
                subject,
                metric,
                threshold,
            } => {
                if subject == "tests" && metric == "passed" {
                    self.tests_passed_check(threshold, budget_ms).await
                } else {
                    (
                        false,
                        Some(format!("unknown metric '{subject}[{metric}]'")),
                    )
                }
            }
        };

        results.push(CheckResult {
            check: check.to_string(),
            passed,
            message,
        });
        Ok(passed)
    }

    /// Exit-code predicate: passes iff the command exits 0.
    async fn command_check(&self, command: &str, budget_ms: u64) -> (bool, Option<String>) {
        match self.caps.run_command(command, Some(budget_ms)).await {
            Ok(output) => (output.success(), None),
            Err(ConductorError::Timeout(_)) => (false, Some(TIMEOUT_BLOCKER.to_string())),
            Err(e) => (false, Some(e.to_string())),
        }
    }

    /// `tests[passed] OP N`: runs the test command and compares the pass
    /// count parsed from its output.
    async fn tests_passed_check(
        &self,
        threshold: &crate::ast::Threshold,
        budget_ms: u64,
    ) -> (bool, Option<String>) {
        let output = match self.caps.run_command(&self.commands.tests, Some(budget_ms)).await {
            Ok(output) => output,
            Err(ConductorError::Timeout(_)) => return (false, Some(TIMEOUT_BLOCKER.to_string())),
            Err(e) => return (false, Some(e.to_string())),
        };

        let combined = format!("{}\n{}", output.stdout, output.stderr);
        match parse_passed_count(&combined) {
            Some(count) => {
                if threshold.op.compare(count as f64, threshold.value) {
                    (true, None)
                } else {
                    (
                        false,
                        Some(format!("{count} tests passed, needed {threshold}")),
                    )
                }
            }
            None => (
                false,
                Some("test output does not report a pass count".to_string()),
            ),
        }
    }
}

/// Extracts the total pass count from test-runner output (`N passed`),
/// summing across suites.
pub fn parse_passed_count(output: &str) -> Option<u64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    let re = RE.get_or_init(|| Regex::new(r"(\d+)\s+passed").expect("pass-count pattern is valid"));

    let mut total = 0u64;
    let mut found = false;
    for cap in re.captures_iter(output) {
        if let Ok(n) = cap[1].parse::<u64>() {
            total += n;
            found = true;
        }
    }
    found.then_some(total)
}
