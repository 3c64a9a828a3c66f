//! Session directory layout and filename derivation.
//!
//! Filenames are derived only from server-generated ids; anything else is
//! rejected before it can reach the filesystem.

use chrono::{DateTime, Utc};
use conductor_core::{filename_timestamp, ConductorError, ConductorResult, SessionId};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Subdirectory for prompts.
pub const PROMPTS_DIR: &str = "prompts";
/// Subdirectory for plans.
pub const PLANS_DIR: &str = "plans";
/// Subdirectory for handoffs.
pub const HANDOFFS_DIR: &str = "handoffs";
/// Subdirectory for gate results.
pub const GATES_DIR: &str = "gates";
/// Subdirectory for task-keyed evidence chains.
pub const EVIDENCE_DIR: &str = "evidence";
/// Subdirectory for uuid-keyed evidence chain records.
pub const EVIDENCE_CHAINS_DIR: &str = "evidence-chains";

/// Pointer file mirroring the most recently written prompt.
pub const CURRENT_PROMPT_FILE: &str = "current-prompt.json";
/// Pointer file mirroring the most recently written plan.
pub const CURRENT_PLAN_FILE: &str = "current-plan.json";
/// The single mutable orchestrator state record.
pub const STATE_FILE: &str = "orchestrator-state.json";
/// Cumulative token accounting.
pub const TOKEN_STATE_FILE: &str = "token-state.json";
/// Append-only history ledger.
pub const HISTORY_FILE: &str = "history.jsonl";

/// Rejects identifiers that could escape the session directory or collide
/// with pointer-file naming. Accepted characters: alphanumerics, `-`, `_`,
/// `.` (but not a leading dot or any `..`).
pub fn check_component(id: &str) -> ConductorResult<&str> {
    let ok = !id.is_empty()
        && !id.starts_with('.')
        && !id.contains("..")
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(id)
    } else {
        Err(ConductorError::Hub(format!(
            "'{id}' is not usable as a filename component"
        )))
    }
}

/// Resolved paths for one session directory.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    root: PathBuf,
}

impl SessionPaths {
    /// Resolves the layout for `session_id` under `base`.
    pub fn new(base: &Path, session_id: &SessionId) -> Self {
        Self {
            root: base.join("sessions").join(session_id.as_str()),
        }
    }

    /// The session root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every subdirectory the layout requires.
    pub fn directories(&self) -> [PathBuf; 6] {
        [
            self.root.join(PROMPTS_DIR),
            self.root.join(PLANS_DIR),
            self.root.join(HANDOFFS_DIR),
            self.root.join(GATES_DIR),
            self.root.join(EVIDENCE_DIR),
            self.root.join(EVIDENCE_CHAINS_DIR),
        ]
    }

    /// `prompts/prompt-<id>.json`
    pub fn prompt_file(&self, id: Uuid) -> PathBuf {
        self.root.join(PROMPTS_DIR).join(format!("prompt-{id}.json"))
    }

    /// `plans/plan-<id>.json`
    pub fn plan_file(&self, id: Uuid) -> PathBuf {
        self.root.join(PLANS_DIR).join(format!("plan-{id}.json"))
    }

    /// `handoffs/handoff-<id>.json`
    pub fn handoff_file(&self, id: Uuid) -> PathBuf {
        self.root
            .join(HANDOFFS_DIR)
            .join(format!("handoff-{id}.json"))
    }

    /// `gates/gate-<phaseId>-<sanitised-timestamp>.json`
    pub fn gate_file(&self, phase_id: &str, at: DateTime<Utc>) -> ConductorResult<PathBuf> {
        let phase_id = check_component(phase_id)?;
        Ok(self.root.join(GATES_DIR).join(format!(
            "gate-{phase_id}-{}.json",
            filename_timestamp(at)
        )))
    }

    /// `gates/gate-<phaseId>-latest.json`
    pub fn gate_latest_file(&self, phase_id: &str) -> ConductorResult<PathBuf> {
        let phase_id = check_component(phase_id)?;
        Ok(self
            .root
            .join(GATES_DIR)
            .join(format!("gate-{phase_id}-latest.json")))
    }

    /// `evidence/evidence-<taskId>.json`
    pub fn evidence_file(&self, task_id: &str) -> ConductorResult<PathBuf> {
        let task_id = check_component(task_id)?;
        Ok(self
            .root
            .join(EVIDENCE_DIR)
            .join(format!("evidence-{task_id}.json")))
    }

    /// `evidence-chains/<chainUuid>.json`
    pub fn chain_file(&self, id: Uuid) -> PathBuf {
        self.root.join(EVIDENCE_CHAINS_DIR).join(format!("{id}.json"))
    }

    /// `current-prompt.json`
    pub fn current_prompt(&self) -> PathBuf {
        self.root.join(CURRENT_PROMPT_FILE)
    }

    /// `current-plan.json`
    pub fn current_plan(&self) -> PathBuf {
        self.root.join(CURRENT_PLAN_FILE)
    }

    /// `orchestrator-state.json`
    pub fn state_file(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    /// `token-state.json`
    pub fn token_state_file(&self) -> PathBuf {
        self.root.join(TOKEN_STATE_FILE)
    }

    /// `history.jsonl`
    pub fn history_file(&self) -> PathBuf {
        self.root.join(HISTORY_FILE)
    }
}
