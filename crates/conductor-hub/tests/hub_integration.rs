//! Integration tests for the Context Hub.
//!
//! Exercises the full persistence protocol against a real temp directory:
//! pointer files, history ledger, gate latest-pointers, list robustness
//! against corrupt files, and schema validation at write ingress.

use chrono::Utc;
use conductor_core::{
    AgentRef, AgentType, ChainStatus, CheckResult, EvidenceChain, GateResult, Handoff,
    HandoffContext, HandoffReason, HandoffState, Phase, Plan, Prompt, Requirement, SessionId,
    Subtask, TokenState,
};
use conductor_hub::ContextHub;
use uuid::Uuid;

fn hub() -> (tempfile::TempDir, ContextHub) {
    let tmp = tempfile::tempdir().unwrap();
    let hub = ContextHub::new(tmp.path());
    (tmp, hub)
}

fn make_plan(session_id: &SessionId) -> Plan {
    Plan::new(Uuid::new_v4(), session_id.clone(), "integration plan").with_phase(
        Phase::new("p1", "Build")
            .with_subtask(Subtask::new("t1", "do the thing", AgentType::Developer))
            .with_gate("typecheck"),
    )
}

fn make_handoff(session_id: &SessionId, plan_id: Uuid) -> Handoff {
    Handoff {
        id: Uuid::new_v4(),
        session_id: session_id.clone(),
        plan_id,
        from_agent: AgentRef {
            agent_type: AgentType::Developer,
            id: Some("developer-1".into()),
        },
        to_agent: AgentRef {
            agent_type: AgentType::Orchestrator,
            id: None,
        },
        timestamp: Utc::now(),
        reason: HandoffReason::TaskComplete,
        token_usage: None,
        state: HandoffState {
            current_phase: "p1".into(),
            current_task: None,
            completed_tasks: vec!["t1".into()],
            pending_tasks: vec![],
            blocked_tasks: None,
        },
        results: vec![],
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

fn make_gate_result(phase_id: &str, passed: bool) -> GateResult {
    GateResult {
        phase_id: phase_id.into(),
        passed,
        checked_at: Utc::now(),
        results: vec![CheckResult {
            check: "typecheck".into(),
            passed,
            message: None,
        }],
        blockers: if passed { vec![] } else { vec!["typecheck".into()] },
    }
}

fn make_chain(session_id: &SessionId, task_id: &str) -> EvidenceChain {
    let now = Utc::now();
    let mut chain = EvidenceChain {
        id: Uuid::new_v4(),
        session_id: session_id.clone(),
        created_at: now,
        updated_at: now,
        requirement: Requirement {
            task_id: task_id.into(),
            description: "requirement".into(),
            acceptance_criteria: vec![],
        },
        analysis: None,
        implementation: None,
        validation: None,
        chain_status: ChainStatus {
            analysis_linked: false,
            implementation_linked: false,
            validation_linked: false,
            coverage_percent: 0,
            acceptance_criteria_verified: 0,
            acceptance_criteria_total: 0,
        },
    };
    chain.recompute_status();
    chain
}

// ---------------------------------------------------------------------------
// Prompts and plans
// ---------------------------------------------------------------------------

#[tokio::test]
async fn prompt_write_read_list_with_current_pointer() {
    let (_tmp, hub) = hub();
    let sid = SessionId::generate();
    hub.create_session(&sid).await.unwrap();

    let first = Prompt::new(sid.clone(), "first request");
    let second = Prompt::new(sid.clone(), "second request");
    hub.write_prompt(&first).await.unwrap();
    hub.write_prompt(&second).await.unwrap();

    // By id.
    let got = hub.read_prompt(&sid, Some(first.id)).await.unwrap();
    assert_eq!(got.request.description, "first request");

    // Current pointer follows the latest write.
    let current = hub.read_prompt(&sid, None).await.unwrap();
    assert_eq!(current.id, second.id);

    let mut ids = hub.list_prompts(&sid).await.unwrap();
    ids.sort();
    let mut expected = vec![first.id, second.id];
    expected.sort();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn plan_rejects_cross_phase_dependency_at_ingress() {
    let (_tmp, hub) = hub();
    let sid = SessionId::generate();
    hub.create_session(&sid).await.unwrap();

    let mut plan = make_plan(&sid);
    plan.phases[0].subtasks[0].dependencies = vec!["elsewhere".into()];

    let err = hub.write_plan(&plan).await.unwrap_err();
    assert_eq!(err.kind(), "validation_failed");

    // Nothing was persisted.
    assert!(hub.list_plans(&sid).await.unwrap().is_empty());
    assert!(hub.read_plan(&sid, None).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn missing_pointer_reads_as_not_found() {
    let (_tmp, hub) = hub();
    let sid = SessionId::generate();
    hub.create_session(&sid).await.unwrap();

    assert!(hub.read_prompt(&sid, None).await.unwrap_err().is_not_found());
    assert!(hub
        .read_orchestrator_state(&sid)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(hub
        .read_gate_result(&sid, "p1")
        .await
        .unwrap_err()
        .is_not_found());
}

// ---------------------------------------------------------------------------
// Handoffs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn handoffs_are_append_only_and_listable() {
    let (_tmp, hub) = hub();
    let sid = SessionId::generate();
    hub.create_session(&sid).await.unwrap();
    let plan = make_plan(&sid);
    hub.write_plan(&plan).await.unwrap();

    let h1 = make_handoff(&sid, plan.id);
    let h2 = make_handoff(&sid, plan.id);
    hub.write_handoff(&h1).await.unwrap();
    hub.write_handoff(&h2).await.unwrap();

    let ids = hub.list_handoffs(&sid).await.unwrap();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&h1.id));
    assert!(ids.contains(&h2.id));

    let got = hub.read_handoff(&sid, h1.id).await.unwrap();
    assert_eq!(got.state.completed_tasks, vec!["t1".to_string()]);
}

#[tokio::test]
async fn handoff_without_from_agent_id_is_rejected() {
    let (_tmp, hub) = hub();
    let sid = SessionId::generate();
    hub.create_session(&sid).await.unwrap();

    let mut handoff = make_handoff(&sid, Uuid::new_v4());
    handoff.from_agent.id = None;
    let err = hub.write_handoff(&handoff).await.unwrap_err();
    assert_eq!(err.kind(), "validation_failed");
}

// ---------------------------------------------------------------------------
// Gate results
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gate_write_produces_timestamped_and_latest_with_identical_content() {
    let (_tmp, hub) = hub();
    let sid = SessionId::generate();
    hub.create_session(&sid).await.unwrap();

    let result = make_gate_result("p1", true);
    let timestamped = hub.write_gate_result(&sid, &result).await.unwrap();

    let latest_path = hub.paths(&sid).gate_latest_file("p1").unwrap();
    let a = tokio::fs::read_to_string(&timestamped).await.unwrap();
    let b = tokio::fs::read_to_string(&latest_path).await.unwrap();
    assert_eq!(a, b);

    let latest = hub.read_gate_result(&sid, "p1").await.unwrap();
    assert!(latest.passed);
}

#[tokio::test]
async fn gate_listing_skips_latest_and_sorts_newest_first() {
    let (_tmp, hub) = hub();
    let sid = SessionId::generate();
    hub.create_session(&sid).await.unwrap();

    let mut older = make_gate_result("p1", false);
    older.checked_at = Utc::now() - chrono::Duration::minutes(10);
    let newer = make_gate_result("p1", true);
    let other_phase = make_gate_result("p2", true);

    hub.write_gate_result(&sid, &older).await.unwrap();
    hub.write_gate_result(&sid, &newer).await.unwrap();
    hub.write_gate_result(&sid, &other_phase).await.unwrap();

    let all = hub.list_gate_results(&sid, None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all[0].checked_at >= all[1].checked_at);

    let p1_only = hub.list_gate_results(&sid, Some("p1")).await.unwrap();
    assert_eq!(p1_only.len(), 2);
    assert!(p1_only[0].passed);
    assert!(!p1_only[1].passed);
}

#[tokio::test]
async fn gate_listing_survives_corrupt_files() {
    let (_tmp, hub) = hub();
    let sid = SessionId::generate();
    hub.create_session(&sid).await.unwrap();
    hub.write_gate_result(&sid, &make_gate_result("p1", true))
        .await
        .unwrap();

    // Drop a corrupt record next to the good one.
    let gates_dir = hub.paths(&sid).root().join("gates");
    tokio::fs::write(gates_dir.join("gate-p9-2026.json"), "{broken")
        .await
        .unwrap();

    let all = hub.list_gate_results(&sid, None).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].phase_id, "p1");
}

#[tokio::test]
async fn gate_phase_id_cannot_escape_session_directory() {
    let (_tmp, hub) = hub();
    let sid = SessionId::generate();
    hub.create_session(&sid).await.unwrap();

    let result = make_gate_result("../escape", true);
    assert!(hub.write_gate_result(&sid, &result).await.is_err());
}

// ---------------------------------------------------------------------------
// State, token state, history
// ---------------------------------------------------------------------------

#[tokio::test]
async fn token_state_round_trips() {
    let (_tmp, hub) = hub();
    let sid = SessionId::generate();
    hub.create_session(&sid).await.unwrap();

    let state = TokenState {
        session_id: sid.clone(),
        used_tokens: 42_000,
        token_budget: Some(100_000),
        updated_at: Utc::now(),
    };
    hub.write_token_state(&state).await.unwrap();
    let back = hub.read_token_state(&sid).await.unwrap();
    assert_eq!(back.used_tokens, 42_000);
    assert_eq!(back.token_budget, Some(100_000));
}

#[tokio::test]
async fn history_records_every_artifact_write() {
    let (_tmp, hub) = hub();
    let sid = SessionId::generate();
    hub.create_session(&sid).await.unwrap();

    let prompt = Prompt::new(sid.clone(), "request");
    hub.write_prompt(&prompt).await.unwrap();
    let plan = make_plan(&sid);
    hub.write_plan(&plan).await.unwrap();
    hub.write_handoff(&make_handoff(&sid, plan.id)).await.unwrap();
    hub.write_gate_result(&sid, &make_gate_result("p1", true))
        .await
        .unwrap();

    let kinds: Vec<String> = hub
        .read_history(&sid)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(kinds, vec!["prompt", "plan", "handoff", "gate_check"]);
}

// ---------------------------------------------------------------------------
// Evidence chains and sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn evidence_chain_union_deduplicates_by_chain_id() {
    let (_tmp, hub) = hub();
    let sid = SessionId::generate();
    hub.create_session(&sid).await.unwrap();

    let chain_a = make_chain(&sid, "t1");
    let chain_b = make_chain(&sid, "t2");

    // chain_a lands in both directories; the union must count it once.
    hub.write_evidence_chain(&chain_a).await.unwrap();
    hub.write_chain_record(&chain_a).await.unwrap();
    hub.write_chain_record(&chain_b).await.unwrap();

    let chains = hub.list_evidence_chains(&sid).await.unwrap();
    assert_eq!(chains.len(), 2);
    assert_eq!(chains[0].requirement.task_id, "t1");
    assert_eq!(chains[1].requirement.task_id, "t2");
}

#[tokio::test]
async fn sessions_are_listed_by_valid_id_only() {
    let (tmp, hub) = hub();
    let sid = SessionId::generate();
    hub.create_session(&sid).await.unwrap();

    // Noise that must not be listed.
    tokio::fs::create_dir_all(tmp.path().join("sessions/not-a-session"))
        .await
        .unwrap();

    let sessions = hub.list_sessions().await.unwrap();
    assert_eq!(sessions, vec![sid]);
}

// ---------------------------------------------------------------------------
// validate_file
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validate_file_accepts_written_artifacts() {
    let (_tmp, hub) = hub();
    let sid = SessionId::generate();
    hub.create_session(&sid).await.unwrap();

    let prompt = Prompt::new(sid.clone(), "validate me");
    let path = hub.write_prompt(&prompt).await.unwrap();

    let report = hub.validate_file(&path).await.unwrap();
    assert!(report.valid(), "issues: {:?}", report.issues);
}

#[tokio::test]
async fn validate_file_surfaces_declared_type_mismatch() {
    let (_tmp, hub) = hub();
    let sid = SessionId::generate();
    let paths = hub.create_session(&sid).await.unwrap();

    // A file named like a plan but containing a prompt body.
    let prompt = Prompt::new(sid.clone(), "not a plan");
    let bogus = paths.root().join("plans/plan-bogus.json");
    tokio::fs::create_dir_all(bogus.parent().unwrap())
        .await
        .unwrap();
    tokio::fs::write(&bogus, serde_json::to_string(&prompt).unwrap())
        .await
        .unwrap();

    let report = hub.validate_file(&bogus).await.unwrap();
    assert!(!report.valid());
    assert!(!report.issues.is_empty());
}
