//! SDK-style action routes: the risk table, two-phase plan/execute,
//! and the cancel acknowledgement.

use crate::api::TraceId;
use crate::error::ApiFailure;
use crate::identity::resolve_identity;
use crate::respond::{Traced, ok, ok_with_meta, workspace};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Extension, State};
use axum::http::HeaderMap;
use axum::response::Response;
use chrono::Utc;
use opsgate_core::{ExecuteMeta, OpsAction, risk_table};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

/// The fixed action -> risk table.
pub(crate) async fn actions(
    Extension(trace): Extension<TraceId>,
) -> Result<Response, ApiFailure> {
    let table: Vec<Value> = risk_table()
        .iter()
        .map(|(action, risk)| json!({"action": action, "risk": risk}))
        .collect();
    ok(&trace, table)
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlanRequest {
    workspace: Option<String>,
    action: String,
    #[serde(default)]
    params: Value,
}

/// Plan an action: classify risk and mint an approval token for
/// medium/high risk.
pub(crate) async fn plan(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<PlanRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    state
        .engine
        .rbac()
        .and_then(|rbac| rbac.assert_can(&ws, OpsAction::Execute, &identity))
        .traced(&trace)?;

    let plan = state
        .tokens
        .lock()
        .await
        .plan(&req.action, &req.params, &identity, Utc::now())
        .traced(&trace)?;
    ok(
        &trace,
        json!({
            "action": plan.action(),
            "risk": plan.risk(),
            "approval_required": plan.approval_required(),
            "approval_token": plan.token(),
            "expires_at": plan.expires_at(),
        }),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExecuteRequest {
    workspace: Option<String>,
    action: String,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    approval_token: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Execute an action, consuming the approval token for risk-gated
/// actions, then dispatching to the upstream API.
pub(crate) async fn execute(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<ExecuteRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    state
        .engine
        .rbac()
        .and_then(|rbac| rbac.assert_can(&ws, OpsAction::Execute, &identity))
        .traced(&trace)?;

    let outcome = state
        .tokens
        .lock()
        .await
        .execute(
            &req.action,
            &req.params,
            req.approval_token.as_deref(),
            req.reason.as_deref(),
            &identity,
            Utc::now(),
        )
        .traced(&trace)?;

    let path = format!("/{}", req.action);
    let data = if outcome.risk().requires_approval() {
        state.upstream.post(&path, &req.params).await
    } else {
        state.upstream.get(&path, &req.params).await
    }
    .traced(&trace)?;

    info!(action = %req.action, risk = %outcome.risk(), "Action executed");
    ok_with_meta(
        &trace,
        data,
        ExecuteMeta::new(*outcome.risk(), *outcome.approval_required()),
    )
}

/// Cancel acknowledgement. Actions are single-shot; there is no
/// in-flight execution to stop, so this reports `cancelled: false`.
pub(crate) async fn cancel(
    Extension(trace): Extension<TraceId>,
) -> Result<Response, ApiFailure> {
    ok(
        &trace,
        json!({
            "cancelled": false,
            "detail": "actions are single-shot; nothing is in flight to cancel",
        }),
    )
}
