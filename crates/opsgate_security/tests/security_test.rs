//! Comprehensive tests for opsgate_security.

use chrono::{Duration, Utc};
use opsgate_core::{Identity, RiskTier};
use opsgate_error::{ApprovalCode, OpsgateErrorKind};
use opsgate_security::{ApprovalTokenService, FixedWindowLimiter, RateKey, invite_redemption_limiter};
use serde_json::json;

fn actor() -> Identity {
    Identity::new("op-1", "Dana")
}

fn approval_code(err: &opsgate_error::OpsgateError) -> (ApprovalCode, Option<String>) {
    match err.kind() {
        OpsgateErrorKind::Approval(e) => (e.code, e.reissued_token.clone()),
        other => panic!("expected approval error, got {other}"),
    }
}

// ============================================================================
// Approval Token Tests
// ============================================================================

#[test]
fn test_low_risk_never_requires_token() {
    let mut service = ApprovalTokenService::new();
    let now = Utc::now();

    let plan = service.plan("list_ads", &json!({}), &actor(), now).unwrap();
    assert_eq!(*plan.risk(), RiskTier::Low);
    assert!(!plan.approval_required());
    assert!(plan.token().is_none());

    let outcome = service
        .execute("list_ads", &json!({}), None, None, &actor(), now)
        .unwrap();
    assert!(!outcome.approval_required());
}

#[test]
fn test_unknown_action_rejected_not_defaulted() {
    let mut service = ApprovalTokenService::new();
    let err = service
        .plan("format_disk", &json!({}), &actor(), Utc::now())
        .unwrap_err();
    assert!(matches!(err.kind(), OpsgateErrorKind::Validation(_)));
}

#[test]
fn test_token_single_use() {
    let mut service = ApprovalTokenService::new();
    let now = Utc::now();
    let params = json!({"message": "hello"});

    let plan = service.plan("create_post", &params, &actor(), now).unwrap();
    let token = plan.token().clone().unwrap();

    let outcome = service
        .execute("create_post", &params, Some(&token), None, &actor(), now)
        .unwrap();
    assert!(outcome.approval_required());
    assert_eq!(*outcome.risk(), RiskTier::Medium);

    // The consumed token never works twice.
    let err = service
        .execute("create_post", &params, Some(&token), None, &actor(), now)
        .unwrap_err();
    let (code, reissued) = approval_code(&err);
    assert_eq!(code, ApprovalCode::Invalid);
    assert!(reissued.is_some());
}

#[test]
fn test_token_parameter_binding() {
    let mut service = ApprovalTokenService::new();
    let now = Utc::now();

    let plan = service
        .plan("create_post", &json!({"message": "A"}), &actor(), now)
        .unwrap();
    let token = plan.token().clone().unwrap();

    let err = service
        .execute(
            "create_post",
            &json!({"message": "B"}),
            Some(&token),
            None,
            &actor(),
            now,
        )
        .unwrap_err();
    let (code, reissued) = approval_code(&err);
    assert_eq!(code, ApprovalCode::Mismatch);

    // The reissued token is bound to the execute-time params and works.
    let fresh = reissued.unwrap();
    assert!(
        service
            .execute(
                "create_post",
                &json!({"message": "B"}),
                Some(&fresh),
                None,
                &actor(),
                now,
            )
            .is_ok()
    );
}

#[test]
fn test_key_order_does_not_break_binding() {
    let mut service = ApprovalTokenService::new();
    let now = Utc::now();

    let planned: serde_json::Value =
        serde_json::from_str(r#"{"message": "A", "channel": "news"}"#).unwrap();
    let reordered: serde_json::Value =
        serde_json::from_str(r#"{"channel": "news", "message": "A"}"#).unwrap();

    let plan = service.plan("create_post", &planned, &actor(), now).unwrap();
    let token = plan.token().clone().unwrap();
    assert!(
        service
            .execute("create_post", &reordered, Some(&token), None, &actor(), now)
            .is_ok()
    );
}

#[test]
fn test_expired_token_rejected_with_reissue() {
    let mut service = ApprovalTokenService::new();
    let now = Utc::now();

    let plan = service
        .plan("create_post", &json!({"m": 1}), &actor(), now)
        .unwrap();
    let token = plan.token().clone().unwrap();

    let late = now + Duration::minutes(11);
    let err = service
        .execute("create_post", &json!({"m": 1}), Some(&token), None, &actor(), late)
        .unwrap_err();
    let (code, reissued) = approval_code(&err);
    assert_eq!(code, ApprovalCode::Expired);

    // The replacement minted at `late` is usable.
    let fresh = reissued.unwrap();
    assert!(
        service
            .execute("create_post", &json!({"m": 1}), Some(&fresh), None, &actor(), late)
            .is_ok()
    );
}

#[test]
fn test_missing_token_reports_required() {
    let mut service = ApprovalTokenService::new();
    let err = service
        .execute("create_post", &json!({}), None, None, &actor(), Utc::now())
        .unwrap_err();
    let (code, reissued) = approval_code(&err);
    assert_eq!(code, ApprovalCode::Required);
    assert!(reissued.is_some());
}

#[test]
fn test_action_mismatch() {
    let mut service = ApprovalTokenService::new();
    let now = Utc::now();

    let plan = service
        .plan("create_post", &json!({"m": 1}), &actor(), now)
        .unwrap();
    let token = plan.token().clone().unwrap();

    let err = service
        .execute("send_whatsapp", &json!({"m": 1}), Some(&token), None, &actor(), now)
        .unwrap_err();
    let (code, _) = approval_code(&err);
    assert_eq!(code, ApprovalCode::Mismatch);
}

#[test]
fn test_high_risk_requires_reason() {
    let mut service = ApprovalTokenService::new();
    let now = Utc::now();
    let params = json!({"campaign_id": "c-9"});

    let plan = service.plan("pause_campaign", &params, &actor(), now).unwrap();
    assert_eq!(*plan.risk(), RiskTier::High);
    let token = plan.token().clone().unwrap();

    // Whitespace does not count as a justification.
    let err = service
        .execute("pause_campaign", &params, Some(&token), Some("  "), &actor(), now)
        .unwrap_err();
    let (code, reissued) = approval_code(&err);
    assert_eq!(code, ApprovalCode::ReasonRequired);

    let fresh = reissued.unwrap();
    let outcome = service
        .execute(
            "pause_campaign",
            &params,
            Some(&fresh),
            Some("overspend confirmed by finance"),
            &actor(),
            now,
        )
        .unwrap();
    assert_eq!(*outcome.risk(), RiskTier::High);
}

#[test]
fn test_cleanup_expired_tokens() {
    let mut service = ApprovalTokenService::new();
    let now = Utc::now();

    service.plan("create_post", &json!({"a": 1}), &actor(), now).unwrap();
    service.plan("create_post", &json!({"b": 2}), &actor(), now).unwrap();
    assert_eq!(service.len(), 2);

    assert_eq!(service.cleanup_expired(now + Duration::minutes(11)), 2);
    assert!(service.is_empty());
}

// ============================================================================
// Rate Limiter Tests
// ============================================================================

fn key() -> RateKey {
    RateKey::new("10.0.0.1", "sess-1", "/api/ops/summary")
}

#[test]
fn test_window_boundary() {
    let mut limiter = FixedWindowLimiter::new(3, 60_000);
    let start = Utc::now();

    // Exactly one of four requests inside the window is limited.
    assert!(limiter.check_at(key(), start).is_ok());
    assert!(limiter.check_at(key(), start).is_ok());
    assert!(limiter.check_at(key(), start).is_ok());
    let err = limiter.check_at(key(), start).unwrap_err();
    match err.kind() {
        OpsgateErrorKind::RateLimit(e) => assert!(e.retry_after_secs <= 60),
        other => panic!("expected rate limit error, got {other}"),
    }

    // After the window elapses the counter resets to 1.
    let later = start + Duration::milliseconds(60_001);
    assert!(limiter.check_at(key(), later).is_ok());
    assert_eq!(limiter.count(&key()), Some(1));
}

#[test]
fn test_distinct_keys_do_not_interfere() {
    let mut limiter = FixedWindowLimiter::new(1, 60_000);
    let now = Utc::now();

    assert!(limiter.check_at(key(), now).is_ok());
    assert!(limiter.check_at(key(), now).is_err());

    let other_route = RateKey::new("10.0.0.1", "sess-1", "/api/ops/alerts");
    let other_ip = RateKey::new("10.0.0.2", "sess-1", "/api/ops/summary");
    assert!(limiter.check_at(other_route, now).is_ok());
    assert!(limiter.check_at(other_ip, now).is_ok());
}

#[test]
fn test_invite_redemption_limiter_is_stricter() {
    let mut limiter = invite_redemption_limiter();
    let now = Utc::now();
    let key = RateKey::new("203.0.113.9", "guess", "invite.accept");

    for _ in 0..10 {
        assert!(limiter.check_at(key.clone(), now).is_ok());
    }
    assert!(limiter.check_at(key, now).is_err());
}
