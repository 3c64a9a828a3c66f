//! The deployment capability object: one concrete [`ExecCapabilities`]
//! implementation backed by the process runner, the session's memory
//! store, and the Context Hub.

use async_trait::async_trait;
use conductor_core::{
    wildcard_match, CommandOutput, ConductorResult, EvidenceChain, ExecCapabilities,
    ProcessRunner, SessionId,
};
use conductor_hub::ContextHub;
use std::path::PathBuf;

/// Capability object wired to one session.
pub struct SessionCapabilities {
    hub: ContextHub,
    session_id: SessionId,
    memory_dir: PathBuf,
    runner: ProcessRunner,
}

impl SessionCapabilities {
    /// Creates the capability object for a session. `memory_dir` is where
    /// the memory-store artifacts live (pattern checks glob its entries).
    pub fn new(hub: ContextHub, session_id: SessionId, memory_dir: impl Into<PathBuf>) -> Self {
        Self {
            hub,
            session_id,
            memory_dir: memory_dir.into(),
            runner: ProcessRunner::new(),
        }
    }

    /// Overrides the command runner.
    pub fn with_runner(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }
}

#[async_trait]
impl ExecCapabilities for SessionCapabilities {
    async fn run_command(
        &self,
        command: &str,
        timeout_ms: Option<u64>,
    ) -> ConductorResult<CommandOutput> {
        self.runner.run(command, timeout_ms).await
    }

    async fn match_memory(&self, pattern: &str) -> ConductorResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.memory_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut matches = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let stem = name
                .strip_suffix(".json")
                .or_else(|| name.strip_suffix(".md"))
                .unwrap_or(&name);
            if wildcard_match(pattern, &name) || wildcard_match(pattern, stem) {
                matches.push(name);
            }
        }
        matches.sort();
        Ok(matches)
    }

    async fn list_chains(&self) -> ConductorResult<Vec<EvidenceChain>> {
        self.hub.list_evidence_chains(&self.session_id).await
    }

    async fn traceability_field(&self, field: &str) -> ConductorResult<Option<String>> {
        let plan = match self.hub.read_plan(&self.session_id, None).await {
            Ok(plan) => plan,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let value = match field {
            "summary" => Some(plan.summary.clone()),
            "risks" => plan.risks.as_ref().map(|r| r.join("; ")),
            "acceptanceCriteria" => {
                let criteria: Vec<String> = plan
                    .phases
                    .iter()
                    .flat_map(|p| &p.subtasks)
                    .filter_map(|t| t.acceptance_criteria.as_ref())
                    .flatten()
                    .cloned()
                    .collect();
                (!criteria.is_empty()).then(|| criteria.join("; "))
            }
            "successCriteria" => match self.hub.read_prompt(&self.session_id, None).await {
                Ok(prompt) => prompt.request.success_criteria.map(|c| c.join("; ")),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            },
            _ => None,
        };

        Ok(value.filter(|v| !v.trim().is_empty()))
    }
}
