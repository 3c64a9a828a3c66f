//! Automatic evidence derivation from completed handoffs.
//!
//! When an agent hands off with `task_complete`, the populator links the
//! section matching the agent's kind (analyst → analysis, developer →
//! implementation, browser → validation) into the task's chain, creating
//! the chain if this is the first evidence for the task. Failures are
//! demoted to `{created: false, error}` — they never block the handoff
//! write that triggered them.

use crate::chain::{create_evidence_chain, EvidenceChainBuilder};
use conductor_core::{
    AgentType, AnalysisEvidence, ConductorResult, CriterionCheck, EvidenceChain, Handoff,
    HandoffReason, ImplementationEvidence, TaskResult, ValidationEvidence, VerificationLinks,
    VerificationRecord,
};
use conductor_hub::ContextHub;
use tracing::{debug, warn};

/// What the populator did with a handoff.
#[derive(Debug, Clone, Default)]
pub struct AutoPopulateOutcome {
    /// True iff a new chain was created.
    pub created: bool,
    /// True iff an existing chain was updated.
    pub updated: bool,
    /// The task whose chain was touched.
    pub task_id: Option<String>,
    /// Failure text, when the populator gave up.
    pub error: Option<String>,
}

impl AutoPopulateOutcome {
    fn skipped() -> Self {
        Self::default()
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Derives or updates the evidence chain for the first completed task of a
/// handoff.
pub async fn auto_populate_evidence(hub: &ContextHub, handoff: &Handoff) -> AutoPopulateOutcome {
    if handoff.reason != HandoffReason::TaskComplete || handoff.state.completed_tasks.is_empty() {
        return AutoPopulateOutcome::skipped();
    }

    match populate(hub, handoff).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, handoff = %handoff.id, "evidence auto-population failed");
            AutoPopulateOutcome::failed(e.to_string())
        }
    }
}

async fn populate(hub: &ContextHub, handoff: &Handoff) -> ConductorResult<AutoPopulateOutcome> {
    let task_id = handoff.state.completed_tasks[0].clone();
    let result = handoff.results.iter().find(|r| r.task_id == task_id);
    let output = result.and_then(|r| r.output.as_ref());

    // Unknown agent kinds contribute no section; not an error.
    let agent_type = handoff.from_agent.agent_type;
    if !matches!(
        agent_type,
        AgentType::Analyst | AgentType::Developer | AgentType::Browser
    ) {
        debug!(agent = %agent_type, "no evidence section for this agent kind");
        return Ok(AutoPopulateOutcome::skipped());
    }

    let paths = hub.paths(&handoff.session_id);
    tokio::fs::create_dir_all(paths.root().join(conductor_hub::paths::EVIDENCE_DIR)).await?;

    let existing = hub
        .list_evidence_chains(&handoff.session_id)
        .await?
        .into_iter()
        .find(|c| c.requirement.task_id == task_id);

    let (builder, updated) = match existing {
        Some(chain) => (EvidenceChainBuilder::from_chain(chain), true),
        None => (
            create_evidence_chain(
                handoff.session_id.clone(),
                task_id.clone(),
                result
                    .map(|r| r.summary.clone())
                    .unwrap_or_else(|| format!("task {task_id}")),
                Vec::new(),
            ),
            false,
        ),
    };

    let builder = match agent_type {
        AgentType::Analyst => builder.with_analysis(analysis_from(output)),
        AgentType::Developer => builder.with_implementation(implementation_from(output)),
        AgentType::Browser => builder.with_validation(validation_from(output, result)),
        _ => builder,
    };

    let chain: EvidenceChain = builder.build();
    hub.write_evidence_chain(&chain).await?;
    debug!(
        task = %task_id,
        coverage = chain.chain_status.coverage_percent,
        updated,
        "evidence chain populated"
    );

    Ok(AutoPopulateOutcome {
        created: !updated,
        updated,
        task_id: Some(task_id),
        error: None,
    })
}

fn strings(value: Option<&serde_json::Value>, key: &str) -> Vec<String> {
    value
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn analysis_from(output: Option<&serde_json::Value>) -> AnalysisEvidence {
    AnalysisEvidence {
        memory_name: output
            .and_then(|v| v.get("memoryName"))
            .and_then(|v| v.as_str())
            .map(ToString::to_string),
        analyzed_symbols: strings(output, "analyzedSymbols"),
        entry_points: strings(output, "entryPoints"),
        data_flow_map: output.and_then(|v| v.get("dataFlowMap")).cloned(),
        linked_at: None,
    }
}

fn implementation_from(output: Option<&serde_json::Value>) -> ImplementationEvidence {
    ImplementationEvidence {
        files_modified: strings(output, "filesModified"),
        symbols_changed: strings(output, "symbolsChanged"),
        typecheck_passed: output
            .and_then(|v| v.get("typecheckPassed"))
            .and_then(|v| v.as_bool()),
        linked_at: None,
    }
}

fn validation_from(
    output: Option<&serde_json::Value>,
    result: Option<&TaskResult>,
) -> ValidationEvidence {
    let verified: Vec<CriterionCheck> = output
        .and_then(|v| v.get("acceptanceCriteriaVerified"))
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(CriterionCheck {
                        criterion: item.get("criterion")?.as_str()?.to_string(),
                        verified: item.get("verified")?.as_bool()?,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let mut screenshots = strings(output, "screenshots");
    if screenshots.is_empty() {
        // Fall back to evidence references the agent attached to the result.
        if let Some(evidence) = result.and_then(|r| r.evidence.as_ref()) {
            screenshots = evidence
                .iter()
                .filter(|e| e.ends_with(".png"))
                .cloned()
                .collect();
        }
    }

    ValidationEvidence {
        tests_passed: output
            .and_then(|v| v.get("testsPassed"))
            .and_then(|v| v.as_u64()),
        tests_failed: output
            .and_then(|v| v.get("testsFailed"))
            .and_then(|v| v.as_u64()),
        screenshots,
        links_to: (!verified.is_empty()).then(|| VerificationLinks {
            verification: VerificationRecord {
                acceptance_criteria_verified: verified,
            },
        }),
        linked_at: None,
    }
}
