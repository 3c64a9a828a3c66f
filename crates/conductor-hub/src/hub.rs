//! The Context Hub: session-scoped persistent CRUD for every
//! schema-validated artifact, plus the append-only history ledger.
//!
//! All writes validate at ingress, serialize with stable indentation, and
//! land via tmp-then-rename. `not_found` is a normal signal for reads of
//! absent pointers; it never indicates a fault.

use crate::atomic::{read_json, write_json};
use crate::history::{self, HistoryEntry};
use crate::paths::{SessionPaths, CURRENT_PLAN_FILE, CURRENT_PROMPT_FILE};
use conductor_core::{
    detect_artifact, validate_value, ArtifactKind, ConductorError, ConductorResult,
    EvidenceChain, GateResult, Handoff, OrchestratorState, Plan, Prompt, SessionId, TokenState,
    Validate, ValidationIssue,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default bound on the history ledger.
pub const DEFAULT_MAX_HISTORY_ITEMS: usize = 1000;

/// Default base directory name, resolved under the current directory.
pub const DEFAULT_BASE_DIR: &str = "ORCHESTRATION";

/// Outcome of validating an arbitrary file against the schema registry.
#[derive(Debug, Clone)]
pub struct FileValidation {
    /// The schema the file was judged against (declared by its filename,
    /// or detected by trying every schema in turn).
    pub detected: Option<ArtifactKind>,
    /// Issues found; empty means the file is valid.
    pub issues: Vec<ValidationIssue>,
}

impl FileValidation {
    /// True iff a schema matched with no issues.
    pub fn valid(&self) -> bool {
        self.detected.is_some() && self.issues.is_empty()
    }
}

/// Session-scoped persistent store for orchestration artifacts.
#[derive(Debug, Clone)]
pub struct ContextHub {
    base: PathBuf,
    max_history_items: usize,
}

impl ContextHub {
    /// Creates a hub rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            max_history_items: DEFAULT_MAX_HISTORY_ITEMS,
        }
    }

    /// Creates a hub rooted at `<cwd>/ORCHESTRATION`.
    pub fn at_cwd() -> ConductorResult<Self> {
        Ok(Self::new(std::env::current_dir()?.join(DEFAULT_BASE_DIR)))
    }

    /// Overrides the history ledger bound.
    pub fn with_max_history_items(mut self, max: usize) -> Self {
        self.max_history_items = max;
        self
    }

    /// The hub's base directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolves the directory layout for a session.
    pub fn paths(&self, session_id: &SessionId) -> SessionPaths {
        SessionPaths::new(&self.base, session_id)
    }

    /// Creates the session directory tree. Idempotent.
    pub async fn create_session(&self, session_id: &SessionId) -> ConductorResult<SessionPaths> {
        let paths = self.paths(session_id);
        for dir in paths.directories() {
            tokio::fs::create_dir_all(&dir).await?;
        }
        info!(session = %session_id, root = %paths.root().display(), "session created");
        Ok(paths)
    }

    /// Lists every session directory whose name is a valid session id.
    pub async fn list_sessions(&self) -> ConductorResult<Vec<SessionId>> {
        let sessions_dir = self.base.join("sessions");
        let mut entries = match tokio::fs::read_dir(&sessions_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if SessionId::is_valid(name) {
                    if let Ok(id) = SessionId::parse(name) {
                        ids.push(id);
                    }
                }
            }
        }
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }

    fn check_valid<T: Validate>(artifact: &T, kind: ArtifactKind) -> ConductorResult<()> {
        let issues = artifact.validate();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConductorError::ValidationFailed {
                artifact: kind.as_str().to_string(),
                issues,
            })
        }
    }

    async fn append_entry(
        &self,
        session_id: &SessionId,
        kind: &str,
        id: impl Into<String>,
    ) -> ConductorResult<()> {
        history::append(
            &self.paths(session_id).history_file(),
            &HistoryEntry::now(kind, id),
            self.max_history_items,
        )
        .await
    }

    // -- Prompts ------------------------------------------------------------

    /// Validates and persists a prompt, updating the current pointer.
    pub async fn write_prompt(&self, prompt: &Prompt) -> ConductorResult<PathBuf> {
        Self::check_valid(prompt, ArtifactKind::Prompt)?;
        let paths = self.paths(&prompt.session_id);
        let path = paths.prompt_file(prompt.id);
        write_json(&path, prompt).await?;
        write_json(&paths.current_prompt(), prompt).await?;
        self.append_entry(&prompt.session_id, "prompt", prompt.id.to_string())
            .await?;
        debug!(session = %prompt.session_id, id = %prompt.id, "prompt written");
        Ok(path)
    }

    /// Reads a prompt by id, or the current pointer when `id` is `None`.
    pub async fn read_prompt(
        &self,
        session_id: &SessionId,
        id: Option<Uuid>,
    ) -> ConductorResult<Prompt> {
        let paths = self.paths(session_id);
        match id {
            Some(id) => read_json(&paths.prompt_file(id)).await,
            None => read_json(&paths.current_prompt()).await,
        }
    }

    /// Ids of all persisted prompts.
    pub async fn list_prompts(&self, session_id: &SessionId) -> ConductorResult<Vec<Uuid>> {
        self.list_ids(
            &self.paths(session_id).root().join(crate::paths::PROMPTS_DIR),
            "prompt-",
        )
        .await
    }

    // -- Plans --------------------------------------------------------------

    /// Validates and persists a plan, updating the current pointer.
    pub async fn write_plan(&self, plan: &Plan) -> ConductorResult<PathBuf> {
        Self::check_valid(plan, ArtifactKind::Plan)?;
        let paths = self.paths(&plan.session_id);
        let path = paths.plan_file(plan.id);
        write_json(&path, plan).await?;
        write_json(&paths.current_plan(), plan).await?;
        self.append_entry(&plan.session_id, "plan", plan.id.to_string())
            .await?;
        debug!(session = %plan.session_id, id = %plan.id, phases = plan.phases.len(), "plan written");
        Ok(path)
    }

    /// Reads a plan by id, or the current pointer when `id` is `None`.
    pub async fn read_plan(
        &self,
        session_id: &SessionId,
        id: Option<Uuid>,
    ) -> ConductorResult<Plan> {
        let paths = self.paths(session_id);
        match id {
            Some(id) => read_json(&paths.plan_file(id)).await,
            None => read_json(&paths.current_plan()).await,
        }
    }

    /// Ids of all persisted plans.
    pub async fn list_plans(&self, session_id: &SessionId) -> ConductorResult<Vec<Uuid>> {
        self.list_ids(
            &self.paths(session_id).root().join(crate::paths::PLANS_DIR),
            "plan-",
        )
        .await
    }

    // -- Handoffs -----------------------------------------------------------

    /// Validates and persists a handoff. Handoffs are append-only; there is
    /// no current pointer.
    pub async fn write_handoff(&self, handoff: &Handoff) -> ConductorResult<PathBuf> {
        Self::check_valid(handoff, ArtifactKind::Handoff)?;
        let paths = self.paths(&handoff.session_id);
        let path = paths.handoff_file(handoff.id);
        write_json(&path, handoff).await?;
        self.append_entry(&handoff.session_id, "handoff", handoff.id.to_string())
            .await?;
        debug!(session = %handoff.session_id, id = %handoff.id, reason = ?handoff.reason, "handoff written");
        Ok(path)
    }

    /// Reads a handoff by id.
    pub async fn read_handoff(
        &self,
        session_id: &SessionId,
        id: Uuid,
    ) -> ConductorResult<Handoff> {
        read_json(&self.paths(session_id).handoff_file(id)).await
    }

    /// Ids of all persisted handoffs.
    pub async fn list_handoffs(&self, session_id: &SessionId) -> ConductorResult<Vec<Uuid>> {
        self.list_ids(
            &self
                .paths(session_id)
                .root()
                .join(crate::paths::HANDOFFS_DIR),
            "handoff-",
        )
        .await
    }

    // -- Orchestrator state -------------------------------------------------

    /// Persists the single mutable state record. Overwrite semantics.
    pub async fn write_orchestrator_state(
        &self,
        state: &OrchestratorState,
    ) -> ConductorResult<PathBuf> {
        Self::check_valid(state, ArtifactKind::OrchestratorState)?;
        let path = self.paths(&state.session_id).state_file();
        write_json(&path, state).await?;
        debug!(session = %state.session_id, phase = %state.current_phase.id, status = ?state.status, "state written");
        Ok(path)
    }

    /// Reads the state record.
    pub async fn read_orchestrator_state(
        &self,
        session_id: &SessionId,
    ) -> ConductorResult<OrchestratorState> {
        read_json(&self.paths(session_id).state_file()).await
    }

    // -- Token state --------------------------------------------------------

    /// Persists cumulative token accounting.
    pub async fn write_token_state(&self, state: &TokenState) -> ConductorResult<PathBuf> {
        Self::check_valid(state, ArtifactKind::TokenState)?;
        let path = self.paths(&state.session_id).token_state_file();
        write_json(&path, state).await?;
        Ok(path)
    }

    /// Reads cumulative token accounting.
    pub async fn read_token_state(&self, session_id: &SessionId) -> ConductorResult<TokenState> {
        read_json(&self.paths(session_id).token_state_file()).await
    }

    // -- Gate results -------------------------------------------------------

    /// Persists a gate result as both a timestamped record and the
    /// `-latest` pointer for its phase.
    pub async fn write_gate_result(
        &self,
        session_id: &SessionId,
        result: &GateResult,
    ) -> ConductorResult<PathBuf> {
        Self::check_valid(result, ArtifactKind::GateResult)?;
        let paths = self.paths(session_id);
        let path = paths.gate_file(&result.phase_id, result.checked_at)?;
        write_json(&path, result).await?;
        write_json(&paths.gate_latest_file(&result.phase_id)?, result).await?;
        self.append_entry(session_id, "gate_check", result.phase_id.clone())
            .await?;
        info!(
            session = %session_id,
            phase = %result.phase_id,
            passed = result.passed,
            blockers = result.blockers.len(),
            "gate result written"
        );
        Ok(path)
    }

    /// Reads the most recent gate result for a phase via its `-latest`
    /// pointer.
    pub async fn read_gate_result(
        &self,
        session_id: &SessionId,
        phase_id: &str,
    ) -> ConductorResult<GateResult> {
        read_json(&self.paths(session_id).gate_latest_file(phase_id)?).await
    }

    /// Lists gate results, newest first, optionally filtered by phase.
    /// `-latest` pointers are skipped (they mirror a timestamped record);
    /// unparseable files are skipped with a warning, never fatal.
    pub async fn list_gate_results(
        &self,
        session_id: &SessionId,
        phase_id: Option<&str>,
    ) -> ConductorResult<Vec<GateResult>> {
        let dir = self.paths(session_id).root().join(crate::paths::GATES_DIR);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut results = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with("gate-") || !name.ends_with(".json") || name.contains("-latest")
            {
                continue;
            }
            match read_json::<GateResult>(&entry.path()).await {
                Ok(result) => {
                    if phase_id.map_or(true, |p| result.phase_id == p) {
                        results.push(result);
                    }
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "skipping unreadable gate result");
                }
            }
        }

        results.sort_by(|a, b| b.checked_at.cmp(&a.checked_at));
        Ok(results)
    }

    // -- Evidence chains ----------------------------------------------------

    /// Persists a task-keyed evidence chain (`evidence/evidence-<taskId>.json`).
    pub async fn write_evidence_chain(&self, chain: &EvidenceChain) -> ConductorResult<PathBuf> {
        Self::check_valid(chain, ArtifactKind::EvidenceChain)?;
        let paths = self.paths(&chain.session_id);
        let path = paths.evidence_file(&chain.requirement.task_id)?;
        write_json(&path, chain).await?;
        self.append_entry(&chain.session_id, "evidence", chain.requirement.task_id.clone())
            .await?;
        Ok(path)
    }

    /// Reads the evidence chain for a task.
    pub async fn read_evidence_chain(
        &self,
        session_id: &SessionId,
        task_id: &str,
    ) -> ConductorResult<EvidenceChain> {
        read_json(&self.paths(session_id).evidence_file(task_id)?).await
    }

    /// Persists a uuid-keyed chain record (`evidence-chains/<uuid>.json`).
    pub async fn write_chain_record(&self, chain: &EvidenceChain) -> ConductorResult<PathBuf> {
        Self::check_valid(chain, ArtifactKind::EvidenceChain)?;
        let path = self.paths(&chain.session_id).chain_file(chain.id);
        write_json(&path, chain).await?;
        Ok(path)
    }

    /// Every chain in the session: the union of `evidence/` and
    /// `evidence-chains/`, deduplicated by chain id. Unreadable files are
    /// skipped with a warning.
    pub async fn list_evidence_chains(
        &self,
        session_id: &SessionId,
    ) -> ConductorResult<Vec<EvidenceChain>> {
        let paths = self.paths(session_id);
        let mut chains: Vec<EvidenceChain> = Vec::new();
        let mut seen: HashSet<Uuid> = HashSet::new();

        for dir in [
            paths.root().join(crate::paths::EVIDENCE_DIR),
            paths.root().join(crate::paths::EVIDENCE_CHAINS_DIR),
        ] {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !name.ends_with(".json") {
                    continue;
                }
                match read_json::<EvidenceChain>(&entry.path()).await {
                    Ok(chain) => {
                        if seen.insert(chain.id) {
                            chains.push(chain);
                        }
                    }
                    Err(e) => {
                        warn!(file = %name, error = %e, "skipping unreadable evidence chain");
                    }
                }
            }
        }

        chains.sort_by(|a, b| a.requirement.task_id.cmp(&b.requirement.task_id));
        Ok(chains)
    }

    // -- History ------------------------------------------------------------

    /// Appends an entry to the session's history ledger.
    pub async fn append_history(
        &self,
        session_id: &SessionId,
        kind: &str,
        id: impl Into<String>,
    ) -> ConductorResult<()> {
        self.append_entry(session_id, kind, id).await
    }

    /// Reads the session's history ledger, oldest first.
    pub async fn read_history(
        &self,
        session_id: &SessionId,
    ) -> ConductorResult<Vec<HistoryEntry>> {
        history::read(&self.paths(session_id).history_file()).await
    }

    // -- Validation ---------------------------------------------------------

    /// Validates an arbitrary file against the schema registry.
    ///
    /// The filename declares the expected schema where it can
    /// (`prompt-*.json`, `plan-*.json`, …); a declared-type mismatch
    /// surfaces that schema's specific issues. Undeclared files try every
    /// schema in turn.
    pub async fn validate_file(&self, path: &Path) -> ConductorResult<FileValidation> {
        let data = match tokio::fs::read_to_string(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConductorError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let value: serde_json::Value = match serde_json::from_str(&data) {
            Ok(value) => value,
            Err(e) => {
                return Ok(FileValidation {
                    detected: None,
                    issues: vec![ValidationIssue::new(
                        "$",
                        format!("not valid JSON: {e}"),
                        "json",
                    )],
                });
            }
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Some(kind) = kind_from_filename(&name) {
            return Ok(match validate_value(kind, &value) {
                Ok(()) => FileValidation {
                    detected: Some(kind),
                    issues: Vec::new(),
                },
                Err(issues) => FileValidation {
                    detected: Some(kind),
                    issues,
                },
            });
        }

        match detect_artifact(&value) {
            Some(kind) => Ok(FileValidation {
                detected: Some(kind),
                issues: Vec::new(),
            }),
            None => Ok(FileValidation {
                detected: None,
                issues: vec![ValidationIssue::new(
                    "$",
                    "matches no known artifact schema",
                    "unknown_schema",
                )],
            }),
        }
    }

    // -- Internals ----------------------------------------------------------

    async fn list_ids(&self, dir: &Path, prefix: &str) -> ConductorResult<Vec<Uuid>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.strip_suffix(".json"))
                {
                    if let Ok(id) = Uuid::parse_str(stem) {
                        ids.push(id);
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Maps a filename to the schema it declares, when it declares one.
fn kind_from_filename(name: &str) -> Option<ArtifactKind> {
    if name == CURRENT_PROMPT_FILE || name.starts_with("prompt-") {
        Some(ArtifactKind::Prompt)
    } else if name == CURRENT_PLAN_FILE || name.starts_with("plan-") {
        Some(ArtifactKind::Plan)
    } else if name.starts_with("handoff-") {
        Some(ArtifactKind::Handoff)
    } else if name.starts_with("gate-") {
        Some(ArtifactKind::GateResult)
    } else if name.starts_with("evidence-") {
        Some(ArtifactKind::EvidenceChain)
    } else if name == crate::paths::STATE_FILE {
        Some(ArtifactKind::OrchestratorState)
    } else if name == crate::paths::TOKEN_STATE_FILE {
        Some(ArtifactKind::TokenState)
    } else {
        None
    }
}
