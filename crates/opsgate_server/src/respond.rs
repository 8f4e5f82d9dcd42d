//! Envelope response helpers shared by the handler modules.

use crate::api::TraceId;
use crate::error::ApiFailure;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use opsgate_core::{Envelope, ExecuteMeta, WorkspaceName};
use opsgate_error::{OpsgateResult, StorageError};
use serde::Serialize;

/// Wrap data in a success envelope.
pub fn ok<T: Serialize>(trace: &TraceId, data: T) -> Result<Response, ApiFailure> {
    let value = serde_json::to_value(data)
        .map_err(|e| ApiFailure::new(trace.0.clone(), StorageError::new(e.to_string()).into()))?;
    Ok((StatusCode::OK, Json(Envelope::ok(trace.0.clone(), value))).into_response())
}

/// Wrap data in a success envelope carrying execute metadata.
pub fn ok_with_meta<T: Serialize>(
    trace: &TraceId,
    data: T,
    meta: ExecuteMeta,
) -> Result<Response, ApiFailure> {
    let value = serde_json::to_value(data)
        .map_err(|e| ApiFailure::new(trace.0.clone(), StorageError::new(e.to_string()).into()))?;
    let envelope = Envelope::ok(trace.0.clone(), value).with_meta(meta);
    Ok((StatusCode::OK, Json(envelope)).into_response())
}

/// Attach the request trace id to a failed result.
pub trait Traced<T> {
    /// Convert an engine/security error into an [`ApiFailure`].
    fn traced(self, trace: &TraceId) -> Result<T, ApiFailure>;
}

impl<T> Traced<T> for OpsgateResult<T> {
    fn traced(self, trace: &TraceId) -> Result<T, ApiFailure> {
        self.map_err(|e| ApiFailure::new(trace.0.clone(), e))
    }
}

/// Resolve the target workspace, defaulting when unspecified.
pub fn workspace(name: Option<&str>) -> OpsgateResult<WorkspaceName> {
    match name {
        Some(name) => WorkspaceName::parse(name),
        None => Ok(WorkspaceName::default()),
    }
}
