//! Router assembly and request admission.

use crate::error::ApiFailure;
use crate::state::AppState;
use crate::{ops, sdk, team};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use opsgate_security::RateKey;
use serde_json::json;
use std::net::SocketAddr;
use tracing::instrument;

/// Per-request trace id, set by the admission middleware.
#[derive(Debug, Clone)]
pub struct TraceId(pub String);

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/ops/summary", get(ops::summary))
        .route("/api/ops/alerts", get(ops::alerts))
        .route("/api/ops/alerts/ack", post(ops::ack_alert))
        .route("/api/ops/approvals", get(ops::approvals))
        .route("/api/ops/approvals/resolve", post(ops::resolve_approval))
        .route("/api/ops/outcomes", get(ops::outcomes))
        .route("/api/ops/leads", get(ops::leads).post(ops::replace_leads))
        .route("/api/ops/audit", get(ops::audit_log))
        .route("/api/ops/morning-run", post(ops::morning_run))
        .route("/api/ops/schedule", get(ops::schedules))
        .route("/api/ops/schedule/upsert", post(ops::upsert_schedule))
        .route("/api/ops/schedule/enable", post(ops::set_schedule_enabled))
        .route("/api/ops/schedule/run-due", post(ops::run_due))
        .route("/api/ops/sources", get(ops::sources))
        .route("/api/ops/sources/upsert", post(ops::upsert_source))
        .route("/api/ops/sources/sync", post(ops::sync_sources))
        .route("/api/ops/policy", get(ops::policy).post(ops::update_policy))
        .route(
            "/api/ops/guard/policy",
            get(ops::guard_policy).post(ops::update_guard_policy),
        )
        .route("/api/ops/guard/mode", post(ops::set_guard_mode))
        .route("/api/team/role", post(team::set_role))
        .route("/api/team/invites", get(team::invites).post(team::create_invite))
        .route("/api/team/invites/accept", post(team::accept_invite))
        .route("/api/team/invites/revoke", post(team::revoke_invite))
        .route("/api/team/invites/resend", post(team::resend_invite))
        .route("/api/sdk/actions", get(sdk::actions))
        .route("/api/sdk/actions/plan", post(sdk::plan))
        .route("/api/sdk/actions/execute", post(sdk::execute))
        .route("/api/sdk/actions/cancel", post(sdk::cancel))
        .layer(middleware::from_fn_with_state(state.clone(), admission))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Health check endpoint, outside the gate.
#[instrument(skip_all)]
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

fn header<'a>(req: &'a Request, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Admission middleware: gateway key, then rate limits, then a trace
/// id for the handler. Invite redemption passes a second, stricter
/// limiter keyed by client and session only.
pub async fn admission(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut req: Request,
    next: Next,
) -> Response {
    let trace_id = uuid::Uuid::new_v4().to_string();

    let presented = header(&req, "x-gateway-key");
    if let Err(err) = state.gate.admit(presented, addr.ip().is_loopback()) {
        return ApiFailure::new(trace_id, err).into_response();
    }

    let session = header(&req, "x-session-id").unwrap_or("").to_string();
    let route = req.uri().path().to_string();
    let key = RateKey::new(addr.ip().to_string(), session.clone(), route.clone());
    if let Err(err) = state.limiter.lock().await.check(key) {
        return ApiFailure::new(trace_id, err).into_response();
    }
    if route.ends_with("/invites/accept") {
        let strict = RateKey::new(addr.ip().to_string(), session, "invite_accept");
        if let Err(err) = state.invite_limiter.lock().await.check(strict) {
            return ApiFailure::new(trace_id, err).into_response();
        }
    }

    req.extensions_mut().insert(TraceId(trace_id));
    next.run(req).await
}
