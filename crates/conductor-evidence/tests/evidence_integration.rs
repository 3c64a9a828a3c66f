//! Integration tests for evidence auto-population against a real
//! temp-directory hub.

use chrono::Utc;
use conductor_core::{
    AgentRef, AgentType, Handoff, HandoffContext, HandoffReason, HandoffState, SessionId,
    TaskResult, TaskResultStatus,
};
use conductor_evidence::auto_populate_evidence;
use conductor_hub::ContextHub;
use uuid::Uuid;

fn handoff(
    session_id: &SessionId,
    agent_type: AgentType,
    reason: HandoffReason,
    task_id: &str,
    output: Option<serde_json::Value>,
) -> Handoff {
    Handoff {
        id: Uuid::new_v4(),
        session_id: session_id.clone(),
        plan_id: Uuid::new_v4(),
        from_agent: AgentRef {
            agent_type,
            id: Some(format!("{agent_type}-1")),
        },
        to_agent: AgentRef {
            agent_type: AgentType::Orchestrator,
            id: None,
        },
        timestamp: Utc::now(),
        reason,
        token_usage: None,
        state: HandoffState {
            current_phase: "p1".into(),
            current_task: None,
            completed_tasks: vec![task_id.into()],
            pending_tasks: vec![],
            blocked_tasks: None,
        },
        results: vec![TaskResult {
            task_id: task_id.into(),
            status: TaskResultStatus::Completed,
            summary: format!("finished {task_id}"),
            output,
            evidence: None,
            blockers: None,
        }],
        discoveries: None,
        file_modifications: None,
        context: HandoffContext {
            critical_context: "none".into(),
            resume_instructions: "continue".into(),
            warnings: None,
        },
        next_actions: vec![],
    }
}

async fn setup() -> (tempfile::TempDir, ContextHub, SessionId) {
    let tmp = tempfile::tempdir().unwrap();
    let hub = ContextHub::new(tmp.path());
    let sid = SessionId::generate();
    hub.create_session(&sid).await.unwrap();
    (tmp, hub, sid)
}

#[tokio::test]
async fn developer_handoff_creates_implementation_chain() {
    let (_tmp, hub, sid) = setup().await;

    let h = handoff(
        &sid,
        AgentType::Developer,
        HandoffReason::TaskComplete,
        "t1",
        Some(serde_json::json!({
            "filesModified": ["src/auth.rs", "src/session.rs"],
            "symbolsChanged": ["foo"],
            "typecheckPassed": true
        })),
    );

    let outcome = auto_populate_evidence(&hub, &h).await;
    assert!(outcome.created);
    assert!(!outcome.updated);
    assert!(outcome.error.is_none());
    assert_eq!(outcome.task_id.as_deref(), Some("t1"));

    // The file exists where the layout says it must.
    let path = hub.paths(&sid).evidence_file("t1").unwrap();
    assert!(path.exists());

    let chain = hub.read_evidence_chain(&sid, "t1").await.unwrap();
    assert!(chain.chain_status.implementation_linked);
    assert_eq!(chain.chain_status.coverage_percent, 33);
    let implementation = chain.implementation.unwrap();
    assert_eq!(implementation.files_modified.len(), 2);
    assert_eq!(implementation.symbols_changed, vec!["foo".to_string()]);
    assert_eq!(implementation.typecheck_passed, Some(true));
}

#[tokio::test]
async fn sections_accumulate_across_agent_kinds() {
    let (_tmp, hub, sid) = setup().await;

    let analyst = handoff(
        &sid,
        AgentType::Analyst,
        HandoffReason::TaskComplete,
        "t1",
        Some(serde_json::json!({
            "memoryName": "auth-flow",
            "analyzedSymbols": ["login", "logout"],
            "entryPoints": ["src/main.rs"]
        })),
    );
    let outcome = auto_populate_evidence(&hub, &analyst).await;
    assert!(outcome.created);

    let developer = handoff(
        &sid,
        AgentType::Developer,
        HandoffReason::TaskComplete,
        "t1",
        Some(serde_json::json!({ "filesModified": ["src/auth.rs"] })),
    );
    let outcome = auto_populate_evidence(&hub, &developer).await;
    assert!(outcome.updated);
    assert!(!outcome.created);

    let browser = handoff(
        &sid,
        AgentType::Browser,
        HandoffReason::TaskComplete,
        "t1",
        Some(serde_json::json!({
            "testsPassed": 8,
            "testsFailed": 0,
            "screenshots": ["login.png"]
        })),
    );
    let outcome = auto_populate_evidence(&hub, &browser).await;
    assert!(outcome.updated);

    let chain = hub.read_evidence_chain(&sid, "t1").await.unwrap();
    assert_eq!(chain.chain_status.coverage_percent, 100);
    assert!(chain.chain_status.analysis_linked);
    assert!(chain.chain_status.implementation_linked);
    assert!(chain.chain_status.validation_linked);
    assert_eq!(chain.analysis.unwrap().memory_name.as_deref(), Some("auth-flow"));
    assert_eq!(chain.validation.unwrap().tests_passed, Some(8));
}

#[tokio::test]
async fn non_complete_reasons_are_skipped() {
    let (_tmp, hub, sid) = setup().await;

    for reason in [
        HandoffReason::TokenLimit,
        HandoffReason::Blocked,
        HandoffReason::Error,
    ] {
        let h = handoff(&sid, AgentType::Developer, reason, "t1", None);
        let outcome = auto_populate_evidence(&hub, &h).await;
        assert!(!outcome.created);
        assert!(outcome.error.is_none());
    }
    assert!(hub.read_evidence_chain(&sid, "t1").await.is_err());
}

#[tokio::test]
async fn handoff_with_no_completed_tasks_is_skipped() {
    let (_tmp, hub, sid) = setup().await;
    let mut h = handoff(
        &sid,
        AgentType::Developer,
        HandoffReason::TaskComplete,
        "t1",
        None,
    );
    h.state.completed_tasks.clear();

    let outcome = auto_populate_evidence(&hub, &h).await;
    assert!(!outcome.created);
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn unknown_agent_kind_is_skipped_without_error() {
    let (_tmp, hub, sid) = setup().await;
    let h = handoff(
        &sid,
        AgentType::Composer,
        HandoffReason::TaskComplete,
        "t1",
        None,
    );

    let outcome = auto_populate_evidence(&hub, &h).await;
    assert!(!outcome.created);
    assert!(!outcome.updated);
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn browser_verification_links_count_verified_criteria() {
    let (_tmp, hub, sid) = setup().await;
    let h = handoff(
        &sid,
        AgentType::Browser,
        HandoffReason::TaskComplete,
        "t1",
        Some(serde_json::json!({
            "testsPassed": 3,
            "acceptanceCriteriaVerified": [
                {"criterion": "renders", "verified": true},
                {"criterion": "submits", "verified": false}
            ]
        })),
    );

    auto_populate_evidence(&hub, &h).await;
    let chain = hub.read_evidence_chain(&sid, "t1").await.unwrap();
    assert_eq!(chain.chain_status.acceptance_criteria_verified, 1);
}
