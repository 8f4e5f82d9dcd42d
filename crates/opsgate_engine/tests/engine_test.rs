//! Comprehensive tests for opsgate_engine.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use opsgate_core::{
    AlertStatus, ApprovalStatus, Connector, Identity, LeadBuilder, LeadStatus, OpsPolicyPatch,
    Repeat, Role, RoleTable, ScheduleBuilder, Source, SourceInput, SourceStatus, WorkspaceName,
};
use opsgate_engine::{ConnectorRefresh, MorningRunInput, OpsEngine};
use opsgate_error::{OpsgateError, OpsgateResult, UpstreamError};
use serde_json::json;
use std::path::PathBuf;

fn temp_root() -> PathBuf {
    let root = std::env::temp_dir()
        .join("opsgate-engine-test")
        .join(uuid::Uuid::new_v4().to_string());
    std::fs::create_dir_all(&root).expect("temp root");
    root
}

fn acme() -> WorkspaceName {
    WorkspaceName::parse("acme").unwrap()
}

fn owner() -> Identity {
    Identity::new("owner-1", "Olive")
}

fn viewer() -> Identity {
    Identity::new("viewer-1", "Vic")
}

/// Engine over a fresh root with an owner and a viewer provisioned.
fn engine() -> OpsEngine {
    let root = temp_root();
    let store = opsgate_store::WorkspaceStore::open(&root);
    let config = opsgate_store::ConfigStore::open(&root);

    let mut roles = RoleTable::default();
    roles.assign_global(owner().id().clone(), Role::Owner);
    roles.assign_global(viewer().id().clone(), Role::Viewer);
    store.save_roles(&roles).unwrap();

    OpsEngine::new(store, config)
}

fn configure_all_tokens(engine: &OpsEngine) {
    for api in ["meta_ads", "google_ads", "whatsapp"] {
        engine.config().set_token(api, "tok").unwrap();
    }
}

fn code(err: &OpsgateError) -> &'static str {
    err.code()
}

// ============================================================================
// Morning Run
// ============================================================================

#[test]
fn test_morning_run_is_idempotent_per_day() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();
    configure_all_tokens(&engine);

    let first = engine
        .morning_run(&ws, &owner(), MorningRunInput::default(), now)
        .unwrap();
    assert!(first.executed());

    // Same day, not forced: skipped, and nothing new is recorded.
    let outcomes_before = engine.outcomes(&ws, &owner()).unwrap().len();
    let second = engine
        .morning_run(
            &ws,
            &owner(),
            MorningRunInput::default(),
            now + Duration::hours(2),
        )
        .unwrap();
    assert!(!second.executed());
    assert_eq!(engine.outcomes(&ws, &owner()).unwrap().len(), outcomes_before);

    // Forced run on the same day executes.
    let forced = engine
        .morning_run(
            &ws,
            &owner(),
            MorningRunInput {
                force: true,
                ..Default::default()
            },
            now + Duration::hours(3),
        )
        .unwrap();
    assert!(forced.executed());

    // Next day runs without force.
    let tomorrow = engine
        .morning_run(
            &ws,
            &owner(),
            MorningRunInput::default(),
            now + Duration::days(1),
        )
        .unwrap();
    assert!(tomorrow.executed());
}

#[test]
fn test_overspend_raises_alert_and_opens_approval() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();
    configure_all_tokens(&engine);

    engine
        .update_policy(
            &ws,
            &owner(),
            OpsPolicyPatch {
                spend_threshold: Some(200.0),
                ..Default::default()
            },
            now,
        )
        .unwrap();

    let report = engine
        .morning_run(
            &ws,
            &owner(),
            MorningRunInput {
                spend: Some(250.0),
                ..Default::default()
            },
            now,
        )
        .unwrap();
    assert!(report.executed());

    let alerts = engine.alerts(&ws, &owner()).unwrap();
    let overspend: Vec<_> = alerts
        .iter()
        .filter(|a| a.alert_type() == "spend_threshold_exceeded")
        .collect();
    assert_eq!(overspend.len(), 1);
    assert_eq!(*overspend[0].status(), AlertStatus::Open);

    let approvals = engine.approvals(&ws, &owner()).unwrap();
    let pending: Vec<_> = approvals
        .iter()
        .filter(|a| a.action() == "marketing.pause_overspend")
        .collect();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].is_pending());
    assert_eq!(pending[0].payload()["spend"], json!(250.0));
}

#[test]
fn test_spend_under_threshold_is_quiet() {
    let engine = engine();
    let ws = acme();
    configure_all_tokens(&engine);

    let report = engine
        .morning_run(
            &ws,
            &owner(),
            MorningRunInput {
                spend: Some(50.0),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();

    assert!(report.alerts_raised().is_empty());
    assert!(report.approvals_opened().is_empty());
}

#[test]
fn test_missing_token_alerts_dedupe_across_forced_runs() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();

    engine
        .morning_run(&ws, &owner(), MorningRunInput::default(), now)
        .unwrap();
    engine
        .morning_run(
            &ws,
            &owner(),
            MorningRunInput {
                force: true,
                ..Default::default()
            },
            now + Duration::hours(1),
        )
        .unwrap();

    // One alert per missing token category, not per run.
    let alerts = engine.alerts(&ws, &owner()).unwrap();
    let missing: Vec<_> = alerts
        .iter()
        .filter(|a| a.alert_type() == "missing_token")
        .collect();
    assert_eq!(missing.len(), 3);
}

#[test]
fn test_follow_up_leads_flagged_with_approval() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();
    configure_all_tokens(&engine);

    let lead = LeadBuilder::default()
        .name("Ada")
        .status(LeadStatus::NeedsFollowUp)
        .build()
        .unwrap();
    engine
        .replace_leads(&ws, &owner(), vec![lead.clone()], now)
        .unwrap();

    let report = engine
        .morning_run(&ws, &owner(), MorningRunInput::default(), now)
        .unwrap();
    assert_eq!(report.leads_flagged(), &vec![lead.id().clone()]);

    let approvals = engine.approvals(&ws, &owner()).unwrap();
    let bulk: Vec<_> = approvals
        .iter()
        .filter(|a| a.action() == "send_bulk_whatsapp")
        .collect();
    assert_eq!(bulk.len(), 1);
    assert_eq!(bulk[0].payload()["lead_ids"], json!([lead.id()]));
}

#[test]
fn test_negative_spend_rejected() {
    let engine = engine();
    let err = engine
        .morning_run(
            &acme(),
            &owner(),
            MorningRunInput {
                spend: Some(-1.0),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap_err();
    assert_eq!(code(&err), "validation_error");
}

// ============================================================================
// RBAC Gating
// ============================================================================

#[test]
fn test_viewer_cannot_execute_or_approve() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();

    let err = engine
        .morning_run(&ws, &viewer(), MorningRunInput::default(), now)
        .unwrap_err();
    assert_eq!(code(&err), "permission_denied");

    let err = engine
        .resolve_approval(&ws, &viewer(), "any", true, None, now)
        .unwrap_err();
    assert_eq!(code(&err), "permission_denied");

    // Reads are open to viewers.
    assert!(engine.alerts(&ws, &viewer()).is_ok());
}

#[test]
fn test_set_role_requires_admin_and_takes_effect() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();
    let promoted = Identity::new("new-op", "Pat");

    let err = engine
        .set_role(&ws, &viewer(), promoted.id(), Role::Operator, now)
        .unwrap_err();
    assert_eq!(code(&err), "permission_denied");

    engine
        .set_role(&ws, &owner(), promoted.id(), Role::Operator, now)
        .unwrap();
    configure_all_tokens(&engine);
    assert!(
        engine
            .morning_run(&ws, &promoted, MorningRunInput::default(), now)
            .is_ok()
    );
}

// ============================================================================
// Approval Resolution
// ============================================================================

#[test]
fn test_approved_bulk_whatsapp_marks_leads_contacted() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();
    configure_all_tokens(&engine);

    let lead = LeadBuilder::default()
        .name("Ada")
        .status(LeadStatus::NeedsFollowUp)
        .build()
        .unwrap();
    engine
        .replace_leads(&ws, &owner(), vec![lead.clone()], now)
        .unwrap();
    let report = engine
        .morning_run(&ws, &owner(), MorningRunInput::default(), now)
        .unwrap();
    let approval_id = report.approvals_opened()[0].clone();

    let resolved = engine
        .resolve_approval(&ws, &owner(), &approval_id, true, None, now)
        .unwrap();
    assert_eq!(*resolved.status(), ApprovalStatus::Approved);

    let leads = engine.leads(&ws, &owner()).unwrap();
    assert_eq!(*leads[0].status(), LeadStatus::Contacted);

    let outcomes = engine.outcomes(&ws, &owner()).unwrap();
    assert!(outcomes.iter().any(|o| o.kind() == "bulk_whatsapp"));
}

#[test]
fn test_rejected_approval_has_no_side_effects() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();
    configure_all_tokens(&engine);

    let lead = LeadBuilder::default()
        .name("Ada")
        .status(LeadStatus::NeedsFollowUp)
        .build()
        .unwrap();
    engine
        .replace_leads(&ws, &owner(), vec![lead], now)
        .unwrap();
    let report = engine
        .morning_run(&ws, &owner(), MorningRunInput::default(), now)
        .unwrap();
    let approval_id = report.approvals_opened()[0].clone();

    engine
        .resolve_approval(&ws, &owner(), &approval_id, false, Some("not now".into()), now)
        .unwrap();

    let leads = engine.leads(&ws, &owner()).unwrap();
    assert_eq!(*leads[0].status(), LeadStatus::NeedsFollowUp);
}

#[test]
fn test_bulk_whatsapp_skips_deleted_leads() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();
    configure_all_tokens(&engine);

    let keep = LeadBuilder::default()
        .name("Keep")
        .status(LeadStatus::NeedsFollowUp)
        .build()
        .unwrap();
    let gone = LeadBuilder::default()
        .name("Gone")
        .status(LeadStatus::NeedsFollowUp)
        .build()
        .unwrap();
    engine
        .replace_leads(&ws, &owner(), vec![keep.clone(), gone], now)
        .unwrap();
    let report = engine
        .morning_run(&ws, &owner(), MorningRunInput::default(), now)
        .unwrap();
    let approval_id = report.approvals_opened()[0].clone();

    // One lead disappears between request and decision.
    engine
        .replace_leads(&ws, &owner(), vec![keep], now)
        .unwrap();
    engine
        .resolve_approval(&ws, &owner(), &approval_id, true, None, now)
        .unwrap();

    let outcomes = engine.outcomes(&ws, &owner()).unwrap();
    let outcome = outcomes.iter().find(|o| o.kind() == "bulk_whatsapp").unwrap();
    assert_eq!(outcome.data()["contacted"], json!(1));
}

// ============================================================================
// Schedules
// ============================================================================

#[test]
fn test_due_runner_steps_from_previous_run_at() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();
    configure_all_tokens(&engine);

    let slot = now - Duration::hours(3);
    let schedule = ScheduleBuilder::default()
        .name("morning")
        .workflow("morning_ops")
        .run_at(slot)
        .repeat(Repeat::Daily)
        .build()
        .unwrap();
    engine
        .upsert_schedule(&ws, &owner(), schedule.clone(), now)
        .unwrap();

    let results = engine.run_due_schedules(&ws, &owner(), now).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status(), "ok");

    // Ran three hours late; the next slot offsets from the old slot.
    let stored = engine.schedules(&ws, &owner()).unwrap();
    assert_eq!(*stored[0].run_at(), slot + Duration::hours(24));
    assert!(stored[0].enabled());
    assert!(!stored[0].is_due(now));
}

#[test]
fn test_one_shot_schedule_disables_after_run() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();
    configure_all_tokens(&engine);

    let schedule = ScheduleBuilder::default()
        .name("once")
        .workflow("morning_ops")
        .run_at(now - Duration::minutes(1))
        .repeat(Repeat::None)
        .build()
        .unwrap();
    engine.upsert_schedule(&ws, &owner(), schedule, now).unwrap();

    engine.run_due_schedules(&ws, &owner(), now).unwrap();
    let stored = engine.schedules(&ws, &owner()).unwrap();
    assert!(!stored[0].enabled());
}

#[test]
fn test_unknown_workflow_errors_without_blocking_batch() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();
    configure_all_tokens(&engine);

    let bad = ScheduleBuilder::default()
        .name("bad")
        .workflow("does_not_exist")
        .run_at(now - Duration::minutes(2))
        .repeat(Repeat::Daily)
        .build()
        .unwrap();
    let good = ScheduleBuilder::default()
        .name("good")
        .workflow("morning_ops")
        .run_at(now - Duration::minutes(1))
        .repeat(Repeat::Daily)
        .build()
        .unwrap();
    engine.upsert_schedule(&ws, &owner(), bad, now).unwrap();
    engine.upsert_schedule(&ws, &owner(), good, now).unwrap();

    let results = engine.run_due_schedules(&ws, &owner(), now).unwrap();
    assert_eq!(results.len(), 2);
    let statuses: Vec<_> = results.iter().map(|r| r.status().as_str()).collect();
    assert!(statuses.contains(&"error"));
    assert!(statuses.contains(&"ok"));
}

#[test]
fn test_future_schedule_not_run() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();

    let schedule = ScheduleBuilder::default()
        .name("later")
        .workflow("morning_ops")
        .run_at(now + Duration::hours(1))
        .repeat(Repeat::Daily)
        .build()
        .unwrap();
    engine.upsert_schedule(&ws, &owner(), schedule, now).unwrap();

    let results = engine.run_due_schedules(&ws, &owner(), now).unwrap();
    assert!(results.is_empty());
}

// ============================================================================
// Sources
// ============================================================================

struct StubRefresher {
    count: u64,
    fail: bool,
}

#[async_trait]
impl ConnectorRefresh for StubRefresher {
    async fn refresh(&self, _source: &Source) -> OpsgateResult<u64> {
        if self.fail {
            return Err(UpstreamError::new(502, "bad_gateway", "upstream down").into());
        }
        Ok(self.count)
    }
}

#[tokio::test]
async fn test_sync_requires_connector_token() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();

    let source = engine
        .upsert_source(
            &ws,
            &owner(),
            SourceInput {
                name: Some("Meta spend".into()),
                connector: Some(Connector::MetaAds),
                ..Default::default()
            },
            now,
        )
        .unwrap();

    let refresher = StubRefresher { count: 10, fail: false };
    let results = engine
        .sync_sources(&ws, &owner(), &[], &refresher, now)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status(), "error");

    let stored = engine.sources(&ws, &owner()).unwrap();
    assert_eq!(*stored[0].status(), SourceStatus::Error);
    assert_eq!(*stored[0].item_count(), 0);

    // Configure the token and the same source syncs.
    engine.config().set_token("meta_ads", "tok").unwrap();
    let results = engine
        .sync_sources(&ws, &owner(), &[source.id().clone()], &refresher, now)
        .await
        .unwrap();
    assert_eq!(results[0].status(), "ok");
    let stored = engine.sources(&ws, &owner()).unwrap();
    assert_eq!(*stored[0].item_count(), 10);
}

#[tokio::test]
async fn test_failed_sync_preserves_last_good_item_count() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();

    engine
        .upsert_source(
            &ws,
            &owner(),
            SourceInput {
                name: Some("Sheet".into()),
                connector: Some(Connector::Sheet),
                ..Default::default()
            },
            now,
        )
        .unwrap();

    let ok = StubRefresher { count: 42, fail: false };
    engine
        .sync_sources(&ws, &owner(), &[], &ok, now)
        .await
        .unwrap();

    let broken = StubRefresher { count: 0, fail: true };
    let results = engine
        .sync_sources(&ws, &owner(), &[], &broken, now)
        .await
        .unwrap();
    assert_eq!(results[0].status(), "error");

    let stored = engine.sources(&ws, &owner()).unwrap();
    assert_eq!(*stored[0].status(), SourceStatus::Error);
    assert_eq!(*stored[0].item_count(), 42);
}

#[test]
fn test_new_source_requires_connector() {
    let engine = engine();
    let err = engine
        .upsert_source(
            &acme(),
            &owner(),
            SourceInput {
                name: Some("Nameless".into()),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap_err();
    assert_eq!(code(&err), "validation_error");
}

// ============================================================================
// Invites
// ============================================================================

#[test]
fn test_invite_accept_grants_role_once() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();
    let joiner = Identity::new("joiner-1", "Jess");

    let invite = engine
        .create_invite(&ws, &owner(), Role::Operator, "https://ops.example", now)
        .unwrap();

    let (granted_ws, role) = engine
        .accept_invite(invite.token(), &joiner, now)
        .unwrap();
    assert_eq!(granted_ws, ws);
    assert_eq!(role, Role::Operator);
    assert_eq!(
        engine.store().roles().unwrap().role_for(&ws, joiner.id()),
        Role::Operator
    );

    // Single use.
    let err = engine
        .accept_invite(invite.token(), &Identity::new("other", "O"), now)
        .unwrap_err();
    assert_eq!(code(&err), "validation_error");
}

#[test]
fn test_expired_invite_rejected_then_resendable() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();
    let joiner = Identity::new("joiner-2", "Jo");

    let invite = engine
        .create_invite(&ws, &owner(), Role::Viewer, "https://ops.example", now)
        .unwrap();
    let later = now + Duration::days(8);

    let err = engine.accept_invite(invite.token(), &joiner, later).unwrap_err();
    assert_eq!(code(&err), "validation_error");

    let rotated = engine
        .resend_invite(&ws, &owner(), invite.id(), "https://ops.example", later)
        .unwrap();
    assert_ne!(rotated.token(), invite.token());
    assert!(engine.accept_invite(rotated.token(), &joiner, later).is_ok());
}

#[test]
fn test_revoked_invite_cannot_be_accepted_or_resent() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();

    let invite = engine
        .create_invite(&ws, &owner(), Role::Operator, "https://ops.example", now)
        .unwrap();
    engine.revoke_invite(&ws, &owner(), invite.id(), now).unwrap();

    let err = engine
        .accept_invite(invite.token(), &Identity::new("late", "L"), now)
        .unwrap_err();
    assert_eq!(code(&err), "validation_error");

    let err = engine
        .resend_invite(&ws, &owner(), invite.id(), "https://ops.example", now)
        .unwrap_err();
    assert_eq!(code(&err), "validation_error");
}

#[test]
fn test_invite_listing_masks_tokens() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();

    let invite = engine
        .create_invite(&ws, &owner(), Role::Operator, "https://ops.example", now)
        .unwrap();
    assert_eq!(invite.token().len(), 64);

    let listed = engine.invites(&ws, &owner(), now).unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].token().contains("..."));

    // Admin of another workspace does not see acme invites.
    let other = WorkspaceName::parse("other").unwrap();
    assert!(engine.invites(&other, &owner(), now).unwrap().is_empty());
}

#[test]
fn test_invite_admin_gated() {
    let engine = engine();
    let err = engine
        .create_invite(&acme(), &viewer(), Role::Viewer, "https://ops.example", Utc::now())
        .unwrap_err();
    assert_eq!(code(&err), "permission_denied");
}

// ============================================================================
// Audit Trail
// ============================================================================

#[test]
fn test_mutations_are_audited() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();
    configure_all_tokens(&engine);

    engine
        .morning_run(&ws, &owner(), MorningRunInput::default(), now)
        .unwrap();
    engine
        .set_guard_mode(&ws, &owner(), opsgate_core::GuardMode::Approval, now)
        .unwrap();

    let log = engine.audit_log(&ws, &owner()).unwrap();
    let actions: Vec<_> = log.iter().map(|e| e.action().as_str()).collect();
    assert!(actions.contains(&"ops.morning_run"));
    assert!(actions.contains(&"guard.mode"));
    assert!(log.iter().all(|e| e.actor() == owner().id()));
}

#[test]
fn test_guard_policy_update_snapshots_prior_value() {
    let engine = engine();
    let ws = acme();
    let now = Utc::now();

    engine
        .update_guard_policy(
            &ws,
            &owner(),
            opsgate_core::GuardPolicyPatch {
                enabled: Some(true),
                ..Default::default()
            },
            now,
        )
        .unwrap();

    let snapshots = engine.store().snapshots(&ws).unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].doc(), "guard_policy");
    // The snapshot holds the pre-patch document.
    assert_eq!(snapshots[0].data()["enabled"], json!(false));
}
