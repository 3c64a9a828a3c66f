//! Schema registry: every artifact kind, its validator, and detection of
//! which schema an untyped JSON value satisfies.
//!
//! Validation runs once at the ingress of every hub write; the structured
//! issue list is what crosses the public boundary on failure.

use crate::artifact::{
    EvidenceChain, GateResult, Handoff, OrchestratorState, Phase, Plan, Prompt, TokenState,
};
use crate::error::ValidationIssue;
use crate::session::SessionId;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};

/// Every artifact kind the registry knows how to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// A [`Prompt`].
    Prompt,
    /// A [`Plan`].
    Plan,
    /// A [`Handoff`].
    Handoff,
    /// An [`OrchestratorState`].
    OrchestratorState,
    /// A [`GateResult`].
    GateResult,
    /// An [`EvidenceChain`].
    EvidenceChain,
    /// A [`TokenState`].
    TokenState,
}

impl ArtifactKind {
    /// All kinds, in the order detection tries them.
    pub const ALL: [ArtifactKind; 7] = [
        ArtifactKind::Prompt,
        ArtifactKind::Plan,
        ArtifactKind::Handoff,
        ArtifactKind::OrchestratorState,
        ArtifactKind::GateResult,
        ArtifactKind::EvidenceChain,
        ArtifactKind::TokenState,
    ];

    /// Stable name used in error reports and history entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Prompt => "prompt",
            ArtifactKind::Plan => "plan",
            ArtifactKind::Handoff => "handoff",
            ArtifactKind::OrchestratorState => "orchestrator_state",
            ArtifactKind::GateResult => "gate_result",
            ArtifactKind::EvidenceChain => "evidence_chain",
            ArtifactKind::TokenState => "token_state",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An artifact that can be validated against its schema.
pub trait Validate {
    /// Returns every issue found; an empty list means the artifact is valid.
    fn validate(&self) -> Vec<ValidationIssue>;
}

fn check_session_id(issues: &mut Vec<ValidationIssue>, path: &str, id: &SessionId) {
    if !SessionId::is_valid(id.as_str()) {
        issues.push(ValidationIssue::new(
            path,
            format!("'{id}' does not match YYYYMMDD_HH-MM_<uuid>"),
            "bad_format",
        ));
    }
}

fn check_non_empty(issues: &mut Vec<ValidationIssue>, path: &str, value: &str) {
    if value.trim().is_empty() {
        issues.push(ValidationIssue::new(path, "must not be empty", "required"));
    }
}

impl Validate for Prompt {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        check_session_id(&mut issues, "sessionId", &self.session_id);
        check_non_empty(&mut issues, "request.description", &self.request.description);
        issues
    }
}

impl Validate for Plan {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        check_session_id(&mut issues, "sessionId", &self.session_id);
        check_non_empty(&mut issues, "summary", &self.summary);

        let mut phase_ids = HashSet::new();
        for (pi, phase) in self.phases.iter().enumerate() {
            let base = format!("phases[{pi}]");
            check_non_empty(&mut issues, &format!("{base}.id"), &phase.id);
            if !phase_ids.insert(phase.id.clone()) {
                issues.push(ValidationIssue::new(
                    format!("{base}.id"),
                    format!("duplicate phase id '{}'", phase.id),
                    "duplicate",
                ));
            }
            validate_phase_subtasks(&mut issues, &base, phase);
        }
        issues
    }
}

/// Checks that a phase's subtask ids are unique, that every dependency
/// refers to a sibling subtask, and that the dependencies form a DAG.
fn validate_phase_subtasks(issues: &mut Vec<ValidationIssue>, base: &str, phase: &Phase) {
    let mut ids = HashSet::new();
    for (ti, task) in phase.subtasks.iter().enumerate() {
        let path = format!("{base}.subtasks[{ti}]");
        check_non_empty(issues, &format!("{path}.id"), &task.id);
        if !ids.insert(task.id.as_str()) {
            issues.push(ValidationIssue::new(
                format!("{path}.id"),
                format!("duplicate subtask id '{}'", task.id),
                "duplicate",
            ));
        }
    }
    for (ti, task) in phase.subtasks.iter().enumerate() {
        for dep in &task.dependencies {
            if dep == &task.id {
                issues.push(ValidationIssue::new(
                    format!("{base}.subtasks[{ti}].dependencies"),
                    format!("'{}' depends on itself", task.id),
                    "cycle",
                ));
            } else if !ids.contains(dep.as_str()) {
                issues.push(ValidationIssue::new(
                    format!("{base}.subtasks[{ti}].dependencies"),
                    format!("'{dep}' is not a subtask of this phase"),
                    "unknown_dependency",
                ));
            }
        }
    }
    if let Some(cycle) = phase_dependency_cycle(phase) {
        issues.push(ValidationIssue::new(
            format!("{base}.subtasks"),
            format!("dependency cycle among: {}", cycle.join(", ")),
            "cycle",
        ));
    }
}

/// Detects a dependency cycle inside a phase; returns the participating
/// subtask ids when one exists. DFS with a three-state visit map.
pub fn phase_dependency_cycle(phase: &Phase) -> Option<Vec<String>> {
    let deps: HashMap<&str, &Vec<String>> = phase
        .subtasks
        .iter()
        .map(|t| (t.id.as_str(), &t.dependencies))
        .collect();

    // 1 = in progress, 2 = done
    let mut visited: HashMap<&str, u8> = HashMap::new();
    let mut in_cycle: Vec<String> = Vec::new();

    fn dfs<'a>(
        id: &'a str,
        deps: &HashMap<&'a str, &'a Vec<String>>,
        visited: &mut HashMap<&'a str, u8>,
        stack: &mut Vec<&'a str>,
        in_cycle: &mut Vec<String>,
    ) -> bool {
        match visited.get(id) {
            Some(1) => {
                // Back edge: everything from the first occurrence on the
                // stack participates in the cycle.
                if let Some(pos) = stack.iter().position(|s| *s == id) {
                    for s in &stack[pos..] {
                        if !in_cycle.iter().any(|c| c == s) {
                            in_cycle.push((*s).to_string());
                        }
                    }
                }
                return true;
            }
            Some(2) => return false,
            _ => {}
        }
        visited.insert(id, 1);
        stack.push(id);
        let mut found = false;
        if let Some(ds) = deps.get(id) {
            for dep in ds.iter() {
                if deps.contains_key(dep.as_str())
                    && dfs(dep.as_str(), deps, visited, stack, in_cycle)
                {
                    found = true;
                }
            }
        }
        stack.pop();
        visited.insert(id, 2);
        found
    }

    let mut found = false;
    for task in &phase.subtasks {
        let mut stack = Vec::new();
        if dfs(
            task.id.as_str(),
            &deps,
            &mut visited,
            &mut stack,
            &mut in_cycle,
        ) {
            found = true;
        }
    }

    if found {
        in_cycle.sort();
        Some(in_cycle)
    } else {
        None
    }
}

impl Validate for Handoff {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        check_session_id(&mut issues, "sessionId", &self.session_id);
        if self.from_agent.id.as_deref().unwrap_or("").trim().is_empty() {
            issues.push(ValidationIssue::new(
                "fromAgent.id",
                "the completing agent must carry an instance id",
                "required",
            ));
        }
        check_non_empty(&mut issues, "state.currentPhase", &self.state.current_phase);
        for (ri, result) in self.results.iter().enumerate() {
            check_non_empty(
                &mut issues,
                &format!("results[{ri}].taskId"),
                &result.task_id,
            );
        }
        issues
    }
}

impl Validate for OrchestratorState {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        check_session_id(&mut issues, "sessionId", &self.session_id);
        check_non_empty(&mut issues, "currentPhase.id", &self.current_phase.id);
        if self.current_phase.progress > 100 {
            issues.push(ValidationIssue::new(
                "currentPhase.progress",
                format!("{} is out of range 0-100", self.current_phase.progress),
                "out_of_range",
            ));
        }
        issues
    }
}

impl Validate for GateResult {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        check_non_empty(&mut issues, "phaseId", &self.phase_id);
        issues
    }
}

impl Validate for EvidenceChain {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        check_session_id(&mut issues, "sessionId", &self.session_id);
        check_non_empty(&mut issues, "requirement.taskId", &self.requirement.task_id);

        let expected = EvidenceChain::coverage_for(self.linked_count());
        if self.chain_status.coverage_percent != expected {
            issues.push(ValidationIssue::new(
                "chainStatus.coveragePercent",
                format!(
                    "{} does not match the {} linked section(s) (expected {})",
                    self.chain_status.coverage_percent,
                    self.linked_count(),
                    expected
                ),
                "inconsistent",
            ));
        }
        issues
    }
}

impl Validate for TokenState {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        check_session_id(&mut issues, "sessionId", &self.session_id);
        issues
    }
}

fn validate_as<T: DeserializeOwned + Validate>(
    value: &serde_json::Value,
) -> Result<(), Vec<ValidationIssue>> {
    match serde_json::from_value::<T>(value.clone()) {
        Ok(artifact) => {
            let issues = artifact.validate();
            if issues.is_empty() {
                Ok(())
            } else {
                Err(issues)
            }
        }
        Err(e) => Err(vec![ValidationIssue::new(
            "$",
            format!("does not deserialize: {e}"),
            "schema",
        )]),
    }
}

/// Validates an untyped JSON value against one declared schema.
pub fn validate_value(
    kind: ArtifactKind,
    value: &serde_json::Value,
) -> Result<(), Vec<ValidationIssue>> {
    match kind {
        ArtifactKind::Prompt => validate_as::<Prompt>(value),
        ArtifactKind::Plan => validate_as::<Plan>(value),
        ArtifactKind::Handoff => validate_as::<Handoff>(value),
        ArtifactKind::OrchestratorState => validate_as::<OrchestratorState>(value),
        ArtifactKind::GateResult => validate_as::<GateResult>(value),
        ArtifactKind::EvidenceChain => validate_as::<EvidenceChain>(value),
        ArtifactKind::TokenState => validate_as::<TokenState>(value),
    }
}

/// Tries every schema in turn and returns the first kind the value
/// satisfies completely (deserializes and passes semantic validation).
pub fn detect_artifact(value: &serde_json::Value) -> Option<ArtifactKind> {
    ArtifactKind::ALL
        .into_iter()
        .find(|kind| validate_value(*kind, value).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{AgentType, Priority, Subtask};
    use uuid::Uuid;

    fn plan_with_phase(phase: Phase) -> Plan {
        Plan::new(Uuid::new_v4(), SessionId::generate(), "test plan").with_phase(phase)
    }

    #[test]
    fn test_valid_plan_has_no_issues() {
        let phase = Phase::new("p1", "Build")
            .with_subtask(Subtask::new("a", "first", AgentType::Analyst))
            .with_subtask(
                Subtask::new("b", "second", AgentType::Developer)
                    .with_dependencies(vec!["a".into()]),
            );
        assert!(plan_with_phase(phase).validate().is_empty());
    }

    #[test]
    fn test_cross_phase_dependency_rejected() {
        // "b" depends on a task that lives in no sibling position
        let phase = Phase::new("p2", "Build").with_subtask(
            Subtask::new("b", "second", AgentType::Developer)
                .with_dependencies(vec!["from-another-phase".into()]),
        );
        let issues = plan_with_phase(phase).validate();
        assert!(issues.iter().any(|i| i.code == "unknown_dependency"));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let phase = Phase::new("p1", "Build").with_subtask(
            Subtask::new("a", "self loop", AgentType::Developer)
                .with_dependencies(vec!["a".into()]),
        );
        let issues = plan_with_phase(phase).validate();
        assert!(issues.iter().any(|i| i.code == "cycle"));
    }

    #[test]
    fn test_dependency_cycle_detected_with_participants() {
        let phase = Phase::new("p1", "Build")
            .with_subtask(
                Subtask::new("a", "first", AgentType::Analyst)
                    .with_dependencies(vec!["c".into()]),
            )
            .with_subtask(
                Subtask::new("b", "second", AgentType::Developer)
                    .with_dependencies(vec!["a".into()]),
            )
            .with_subtask(
                Subtask::new("c", "third", AgentType::Browser)
                    .with_dependencies(vec!["b".into()]),
            );

        let cycle = phase_dependency_cycle(&phase).unwrap();
        assert_eq!(cycle, vec!["a".to_string(), "b".to_string(), "c".to_string()]);

        let issues = plan_with_phase(phase).validate();
        assert!(issues.iter().any(|i| i.code == "cycle"));
    }

    #[test]
    fn test_acyclic_diamond_is_fine() {
        let phase = Phase::new("p1", "Build")
            .with_subtask(Subtask::new("a", "root", AgentType::Analyst))
            .with_subtask(
                Subtask::new("b", "left", AgentType::Developer)
                    .with_dependencies(vec!["a".into()]),
            )
            .with_subtask(
                Subtask::new("c", "right", AgentType::Developer)
                    .with_dependencies(vec!["a".into()]),
            )
            .with_subtask(
                Subtask::new("d", "join", AgentType::Browser)
                    .with_dependencies(vec!["b".into(), "c".into()]),
            );
        assert!(phase_dependency_cycle(&phase).is_none());
    }

    #[test]
    fn test_duplicate_subtask_id_rejected() {
        let phase = Phase::new("p1", "Build")
            .with_subtask(Subtask::new("a", "first", AgentType::Analyst))
            .with_subtask(Subtask::new("a", "also a", AgentType::Developer));
        let issues = plan_with_phase(phase).validate();
        assert!(issues.iter().any(|i| i.code == "duplicate"));
    }

    #[test]
    fn test_empty_prompt_description_rejected() {
        let mut prompt = Prompt::new(SessionId::generate(), "something");
        prompt.request.description = "   ".into();
        let issues = prompt.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "request.description");
        assert_eq!(issues[0].code, "required");
    }

    #[test]
    fn test_detect_artifact_prefers_matching_schema() {
        let prompt = Prompt::new(SessionId::generate(), "detect me");
        let value = serde_json::to_value(&prompt).unwrap();
        assert_eq!(detect_artifact(&value), Some(ArtifactKind::Prompt));

        let plan = Plan::new(Uuid::new_v4(), SessionId::generate(), "a plan");
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(detect_artifact(&value), Some(ArtifactKind::Plan));
    }

    #[test]
    fn test_detect_artifact_returns_none_for_garbage() {
        let value = serde_json::json!({"hello": "world"});
        assert_eq!(detect_artifact(&value), None);
    }

    #[test]
    fn test_validate_value_surfaces_issues() {
        let mut prompt = Prompt::new(SessionId::generate(), "x");
        prompt.request.description = String::new();
        let value = serde_json::to_value(&prompt).unwrap();
        let issues = validate_value(ArtifactKind::Prompt, &value).unwrap_err();
        assert!(issues.iter().any(|i| i.path == "request.description"));
    }

    #[test]
    fn test_priority_unaffected_by_validation() {
        // Regression guard: validation must not reorder or mutate subtasks.
        let phase = Phase::new("p1", "Build")
            .with_subtask(Subtask::new("z", "z", AgentType::Analyst).with_priority(Priority::Low))
            .with_subtask(
                Subtask::new("a", "a", AgentType::Analyst).with_priority(Priority::Critical),
            );
        let plan = plan_with_phase(phase);
        assert!(plan.validate().is_empty());
        assert_eq!(plan.phases[0].subtasks[0].id, "z");
    }
}
