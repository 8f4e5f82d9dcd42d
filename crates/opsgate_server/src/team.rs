//! Team route handlers: role assignment and the invite lifecycle.

use crate::api::TraceId;
use crate::error::ApiFailure;
use crate::identity::resolve_identity;
use crate::respond::{Traced, ok, workspace};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Extension, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use chrono::Utc;
use opsgate_core::{Identity, Role};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub(crate) struct RoleRequest {
    workspace: Option<String>,
    user: String,
    role: Role,
}

pub(crate) async fn set_role(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<RoleRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    state
        .engine
        .set_role(&ws, &identity, &req.user, req.role, Utc::now())
        .traced(&trace)?;
    ok(&trace, json!({"user": req.user, "role": req.role}))
}

#[derive(Debug, Deserialize)]
pub(crate) struct InviteQuery {
    workspace: Option<String>,
}

pub(crate) async fn invites(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Query(q): Query<InviteQuery>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(q.workspace.as_deref()).traced(&trace)?;
    let invites = state.engine.invites(&ws, &identity, Utc::now()).traced(&trace)?;
    ok(&trace, invites)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateInviteRequest {
    workspace: Option<String>,
    role: Role,
}

pub(crate) async fn create_invite(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<CreateInviteRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    // The one response that carries the full token and accept URL.
    let invite = state
        .engine
        .create_invite(
            &ws,
            &identity,
            req.role,
            state.config.public_base_url(),
            Utc::now(),
        )
        .traced(&trace)?;
    ok(&trace, invite)
}

#[derive(Debug, Deserialize)]
pub(crate) struct AcceptInviteRequest {
    token: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    user_name: Option<String>,
}

/// Accept an invite. Public: the token is the credential, and the
/// admission middleware applies the strict redemption limiter.
pub(crate) async fn accept_invite(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<AcceptInviteRequest>,
) -> Result<Response, ApiFailure> {
    let accepted_by = match req.user_id {
        Some(id) => {
            let name = req.user_name.unwrap_or_else(|| id.clone());
            Identity::new(id, name)
        }
        None => resolve_identity(&headers, &state.engine),
    };
    let (ws, role) = state
        .engine
        .accept_invite(&req.token, &accepted_by, Utc::now())
        .traced(&trace)?;
    ok(
        &trace,
        json!({"workspace": ws, "role": role, "user": accepted_by.id()}),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct InviteIdRequest {
    workspace: Option<String>,
    id: String,
}

pub(crate) async fn revoke_invite(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<InviteIdRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    let invite = state
        .engine
        .revoke_invite(&ws, &identity, &req.id, Utc::now())
        .traced(&trace)?;
    ok(&trace, invite)
}

pub(crate) async fn resend_invite(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<InviteIdRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    // Carries the rotated full token, like creation.
    let invite = state
        .engine
        .resend_invite(
            &ws,
            &identity,
            &req.id,
            state.config.public_base_url(),
            Utc::now(),
        )
        .traced(&trace)?;
    ok(&trace, invite)
}
