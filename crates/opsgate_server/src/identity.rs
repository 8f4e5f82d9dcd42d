//! Caller identity resolution.
//!
//! Identity is threaded explicitly into every engine call. The server
//! constructs it from request headers; when absent it falls back to
//! the config-store operator, then to an anonymous identity that RBAC
//! resolves to the default viewer role.

use axum::http::HeaderMap;
use opsgate_core::Identity;
use opsgate_engine::OpsEngine;

/// Header naming the caller's user id.
pub const OPERATOR_ID_HEADER: &str = "x-operator-id";
/// Header naming the caller's display name.
pub const OPERATOR_NAME_HEADER: &str = "x-operator-name";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the caller identity for a request.
pub fn resolve_identity(headers: &HeaderMap, engine: &OpsEngine) -> Identity {
    if let Some(id) = header(headers, OPERATOR_ID_HEADER) {
        let name = header(headers, OPERATOR_NAME_HEADER).unwrap_or_else(|| id.clone());
        return Identity::new(id, name);
    }
    if let Ok(Some(operator)) = engine.config().get_operator() {
        return Identity::new(operator.id().clone(), operator.name().clone());
    }
    Identity::new("anonymous", "Anonymous")
}
