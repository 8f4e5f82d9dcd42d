//! Ops route handlers: summary, alerts, approvals, workflows,
//! schedules, sources, and policy.

use crate::api::TraceId;
use crate::error::ApiFailure;
use crate::identity::resolve_identity;
use crate::respond::{Traced, ok, workspace};
use crate::state::AppState;
use crate::upstream::UpstreamRefresher;
use axum::extract::{Extension, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use opsgate_core::{
    GuardMode, GuardPolicyPatch, OpsPolicyPatch, ScheduleBuilder, SourceInput,
};
use opsgate_engine::MorningRunInput;
use opsgate_error::{OpsgateError, ValidationError};
use serde::Deserialize;
use serde_json::Value;

/// Workspace selector for read routes.
#[derive(Debug, Deserialize)]
pub struct WorkspaceQuery {
    /// Target workspace; defaults to `default`
    pub workspace: Option<String>,
}

pub(crate) async fn summary(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Query(q): Query<WorkspaceQuery>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(q.workspace.as_deref()).traced(&trace)?;
    let data = state.engine.summary(&ws, &identity).traced(&trace)?;
    ok(&trace, data)
}

pub(crate) async fn alerts(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Query(q): Query<WorkspaceQuery>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(q.workspace.as_deref()).traced(&trace)?;
    let data = state.engine.alerts(&ws, &identity).traced(&trace)?;
    ok(&trace, data)
}

#[derive(Debug, Deserialize)]
pub(crate) struct AckRequest {
    workspace: Option<String>,
    id: String,
}

pub(crate) async fn ack_alert(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<AckRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    let alert = state
        .engine
        .ack_alert(&ws, &identity, &req.id, Utc::now())
        .traced(&trace)?;
    ok(&trace, alert)
}

pub(crate) async fn approvals(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Query(q): Query<WorkspaceQuery>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(q.workspace.as_deref()).traced(&trace)?;
    let data = state.engine.approvals(&ws, &identity).traced(&trace)?;
    ok(&trace, data)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResolveRequest {
    workspace: Option<String>,
    id: String,
    approved: bool,
    note: Option<String>,
}

pub(crate) async fn resolve_approval(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<ResolveRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    let approval = state
        .engine
        .resolve_approval(&ws, &identity, &req.id, req.approved, req.note, Utc::now())
        .traced(&trace)?;
    ok(&trace, approval)
}

pub(crate) async fn leads(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Query(q): Query<WorkspaceQuery>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(q.workspace.as_deref()).traced(&trace)?;
    let data = state.engine.leads(&ws, &identity).traced(&trace)?;
    ok(&trace, data)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReplaceLeadsRequest {
    workspace: Option<String>,
    leads: Vec<opsgate_core::Lead>,
}

pub(crate) async fn replace_leads(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<ReplaceLeadsRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    let count = state
        .engine
        .replace_leads(&ws, &identity, req.leads, Utc::now())
        .traced(&trace)?;
    ok(&trace, serde_json::json!({"count": count}))
}

pub(crate) async fn audit_log(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Query(q): Query<WorkspaceQuery>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(q.workspace.as_deref()).traced(&trace)?;
    let data = state.engine.audit_log(&ws, &identity).traced(&trace)?;
    ok(&trace, data)
}

pub(crate) async fn outcomes(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Query(q): Query<WorkspaceQuery>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(q.workspace.as_deref()).traced(&trace)?;
    let data = state.engine.outcomes(&ws, &identity).traced(&trace)?;
    ok(&trace, data)
}

#[derive(Debug, Deserialize)]
pub(crate) struct MorningRunRequest {
    workspace: Option<String>,
    #[serde(default)]
    spend: Option<f64>,
    #[serde(default)]
    force: bool,
}

pub(crate) async fn morning_run(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<MorningRunRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    let report = state
        .engine
        .morning_run(
            &ws,
            &identity,
            MorningRunInput {
                spend: req.spend,
                force: req.force,
            },
            Utc::now(),
        )
        .traced(&trace)?;
    ok(&trace, report)
}

pub(crate) async fn schedules(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Query(q): Query<WorkspaceQuery>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(q.workspace.as_deref()).traced(&trace)?;
    let data = state.engine.schedules(&ws, &identity).traced(&trace)?;
    ok(&trace, data)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScheduleUpsertRequest {
    workspace: Option<String>,
    id: Option<String>,
    name: String,
    workflow: String,
    run_at: chrono::DateTime<Utc>,
    repeat: opsgate_core::Repeat,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    payload: Option<Value>,
}

pub(crate) async fn upsert_schedule(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<ScheduleUpsertRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;

    let mut builder = ScheduleBuilder::default();
    if let Some(id) = req.id {
        builder.id(id);
    }
    builder
        .name(req.name)
        .workflow(req.workflow)
        .run_at(req.run_at)
        .repeat(req.repeat);
    if let Some(enabled) = req.enabled {
        builder.enabled(enabled);
    }
    if let Some(payload) = req.payload {
        builder.payload(payload);
    }
    let schedule = builder
        .build()
        .map_err(|e| OpsgateError::from(ValidationError::new(e.to_string())))
        .traced(&trace)?;

    let schedule = state
        .engine
        .upsert_schedule(&ws, &identity, schedule, Utc::now())
        .traced(&trace)?;
    ok(&trace, schedule)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScheduleEnableRequest {
    workspace: Option<String>,
    id: String,
    enabled: bool,
}

pub(crate) async fn set_schedule_enabled(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<ScheduleEnableRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    let schedule = state
        .engine
        .set_schedule_enabled(&ws, &identity, &req.id, req.enabled, Utc::now())
        .traced(&trace)?;
    ok(&trace, schedule)
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkspaceRequest {
    workspace: Option<String>,
}

pub(crate) async fn run_due(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<WorkspaceRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    let results = state
        .engine
        .run_due_schedules(&ws, &identity, Utc::now())
        .traced(&trace)?;
    ok(&trace, results)
}

pub(crate) async fn sources(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Query(q): Query<WorkspaceQuery>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(q.workspace.as_deref()).traced(&trace)?;
    let data = state.engine.sources(&ws, &identity).traced(&trace)?;
    ok(&trace, data)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SourceUpsertRequest {
    workspace: Option<String>,
    #[serde(flatten)]
    input: SourceInput,
}

pub(crate) async fn upsert_source(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<SourceUpsertRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    let source = state
        .engine
        .upsert_source(&ws, &identity, req.input, Utc::now())
        .traced(&trace)?;
    ok(&trace, source)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SyncRequest {
    workspace: Option<String>,
    #[serde(default)]
    ids: Vec<String>,
}

pub(crate) async fn sync_sources(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<SyncRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    let refresher = UpstreamRefresher::new(state.upstream.clone());
    let results = state
        .engine
        .sync_sources(&ws, &identity, &req.ids, &refresher, Utc::now())
        .await
        .traced(&trace)?;
    ok(&trace, results)
}

pub(crate) async fn policy(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Query(q): Query<WorkspaceQuery>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(q.workspace.as_deref()).traced(&trace)?;
    let data = state.engine.policy(&ws, &identity).traced(&trace)?;
    ok(&trace, data)
}

#[derive(Debug, Deserialize)]
pub(crate) struct PolicyRequest {
    workspace: Option<String>,
    #[serde(flatten)]
    patch: OpsPolicyPatch,
}

pub(crate) async fn update_policy(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<PolicyRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    let policy = state
        .engine
        .update_policy(&ws, &identity, req.patch, Utc::now())
        .traced(&trace)?;
    ok(&trace, policy)
}

pub(crate) async fn guard_policy(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Query(q): Query<WorkspaceQuery>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(q.workspace.as_deref()).traced(&trace)?;
    let data = state.engine.guard_policy(&ws, &identity).traced(&trace)?;
    ok(&trace, data)
}

#[derive(Debug, Deserialize)]
pub(crate) struct GuardPolicyRequest {
    workspace: Option<String>,
    #[serde(flatten)]
    patch: GuardPolicyPatch,
}

pub(crate) async fn update_guard_policy(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<GuardPolicyRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    let policy = state
        .engine
        .update_guard_policy(&ws, &identity, req.patch, Utc::now())
        .traced(&trace)?;
    ok(&trace, policy)
}

#[derive(Debug, Deserialize)]
pub(crate) struct GuardModeRequest {
    workspace: Option<String>,
    mode: GuardMode,
}

pub(crate) async fn set_guard_mode(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    headers: HeaderMap,
    Json(req): Json<GuardModeRequest>,
) -> Result<Response, ApiFailure> {
    let identity = resolve_identity(&headers, &state.engine);
    let ws = workspace(req.workspace.as_deref()).traced(&trace)?;
    let policy = state
        .engine
        .set_guard_mode(&ws, &identity, req.mode, Utc::now())
        .traced(&trace)?;
    ok(&trace, policy)
}
