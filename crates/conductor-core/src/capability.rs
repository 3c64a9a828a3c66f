//! The capability interface the orchestration core consumes instead of
//! touching the outside world directly.
//!
//! Predicate adapters, the gate evaluator, and the engine never exec, glob,
//! or list chains themselves; they call through [`ExecCapabilities`]. One
//! concrete implementation exists per deployment; tests substitute doubles.

use crate::artifact::EvidenceChain;
use crate::error::{ConductorError, ConductorResult};
use async_trait::async_trait;
use regex::Regex;
use std::process::Stdio;
use std::time::Duration;
use tracing::warn;

/// Captured output of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Standard output, lossily decoded as UTF-8.
    pub stdout: String,
    /// Standard error, lossily decoded as UTF-8.
    pub stderr: String,
    /// Process exit code; `-1` when the process was killed by a signal.
    pub exit_code: i32,
}

impl CommandOutput {
    /// True iff the command exited 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Everything the gate evaluator and engine may ask of the outside world.
#[async_trait]
pub trait ExecCapabilities: Send + Sync {
    /// Runs a platform command and captures its output.
    async fn run_command(
        &self,
        command: &str,
        timeout_ms: Option<u64>,
    ) -> ConductorResult<CommandOutput>;

    /// Names of memory-store artifacts matching a wildcard pattern.
    async fn match_memory(&self, pattern: &str) -> ConductorResult<Vec<String>>;

    /// Every evidence chain currently persisted in the session.
    async fn list_chains(&self) -> ConductorResult<Vec<EvidenceChain>>;

    /// Value of a named traceability field on the session's plan artifacts,
    /// or `None` when the field is absent or empty.
    async fn traceability_field(&self, field: &str) -> ConductorResult<Option<String>>;
}

/// Compiles a `*`-wildcard pattern into an anchored regex.
///
/// Everything except `*` is matched literally.
pub fn wildcard_regex(pattern: &str) -> ConductorResult<Regex> {
    let mut escaped = String::with_capacity(pattern.len() + 8);
    escaped.push('^');
    for ch in pattern.chars() {
        if ch == '*' {
            escaped.push_str(".*");
        } else {
            escaped.push_str(&regex::escape(&ch.to_string()));
        }
    }
    escaped.push('$');
    Regex::new(&escaped)
        .map_err(|e| ConductorError::Hub(format!("bad wildcard pattern '{pattern}': {e}")))
}

/// True iff `name` matches the `*`-wildcard `pattern`.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    wildcard_regex(pattern).map(|re| re.is_match(name)).unwrap_or(false)
}

/// Default per-command ceiling for subprocess predicates.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;

/// Shell-backed command runner used by the deployment capability object.
///
/// Commands run under `sh -c`; a timeout kills the child and surfaces as
/// [`ConductorError::Timeout`].
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    default_timeout_ms: u64,
}

impl ProcessRunner {
    /// Creates a runner with the default 30 s command ceiling.
    pub fn new() -> Self {
        Self {
            default_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
        }
    }

    /// Overrides the default command ceiling.
    pub fn with_default_timeout(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    /// Runs `command` under `sh -c` and captures its output.
    pub async fn run(
        &self,
        command: &str,
        timeout_ms: Option<u64>,
    ) -> ConductorResult<CommandOutput> {
        let timeout = Duration::from_millis(timeout_ms.unwrap_or(self.default_timeout_ms));

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code().unwrap_or(-1),
            }),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!(command, timeout_ms = timeout.as_millis() as u64, "command timed out");
                Err(ConductorError::Timeout(format!(
                    "command '{command}' exceeded {} ms",
                    timeout.as_millis()
                )))
            }
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}
