//! Error-to-response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use opsgate_core::{Envelope, ErrorBody};
use opsgate_error::{OpsgateError, OpsgateErrorKind};
use tracing::warn;

/// Map a wire error code to an HTTP status.
pub fn status_for(code: &str) -> StatusCode {
    match code {
        "permission_denied" | "access_denied" => StatusCode::FORBIDDEN,
        "validation_error" => StatusCode::BAD_REQUEST,
        "not_found" => StatusCode::NOT_FOUND,
        "approval_required" | "approval_expired" | "approval_mismatch" | "approval_invalid"
        | "approval_reason_required" => StatusCode::CONFLICT,
        "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
        "upstream_error" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build the wire error body, carrying the replacement approval token
/// or retry-after hint when the kind supplies one.
pub fn error_body(err: &OpsgateError) -> ErrorBody {
    let code = err.code();
    match err.kind() {
        OpsgateErrorKind::Permission(e) => ErrorBody::new(code, e.message.clone(), None, None),
        OpsgateErrorKind::Validation(e) => ErrorBody::new(code, e.message.clone(), None, None),
        OpsgateErrorKind::NotFound(e) => ErrorBody::new(code, e.message.clone(), None, None),
        OpsgateErrorKind::Approval(e) => {
            ErrorBody::new(code, e.message.clone(), e.reissued_token.clone(), None)
        }
        OpsgateErrorKind::RateLimit(e) => {
            ErrorBody::new(code, e.message.clone(), None, Some(e.retry_after_secs))
        }
        OpsgateErrorKind::Access(e) => ErrorBody::new(code, e.message.clone(), None, None),
        OpsgateErrorKind::Storage(e) => ErrorBody::new(code, e.message.clone(), None, None),
        OpsgateErrorKind::Upstream(e) => ErrorBody::new(code, e.message.clone(), None, None),
    }
}

/// A failed request, paired with its trace id.
#[derive(Debug)]
pub struct ApiFailure {
    /// Request trace id
    pub trace_id: String,
    /// The underlying error
    pub err: OpsgateError,
}

impl ApiFailure {
    /// Pair an error with the request's trace id.
    pub fn new(trace_id: impl Into<String>, err: OpsgateError) -> Self {
        Self {
            trace_id: trace_id.into(),
            err,
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let code = self.err.code();
        warn!(trace_id = %self.trace_id, code, error = %self.err, "Request failed");
        let status = status_for(code);
        let envelope = Envelope::err(self.trace_id, error_body(&self.err));
        (status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsgate_error::{ApprovalCode, ApprovalError, PermissionError, RateLimitError};

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for("permission_denied"), StatusCode::FORBIDDEN);
        assert_eq!(status_for("access_denied"), StatusCode::FORBIDDEN);
        assert_eq!(status_for("validation_error"), StatusCode::BAD_REQUEST);
        assert_eq!(status_for("not_found"), StatusCode::NOT_FOUND);
        assert_eq!(status_for("approval_mismatch"), StatusCode::CONFLICT);
        assert_eq!(status_for("rate_limited"), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_for("upstream_error"), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for("storage_error"), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_approval_failure_carries_replacement_token() {
        let err: OpsgateError = ApprovalError::new(
            ApprovalCode::Invalid,
            "token unknown",
            Some("fresh-token".to_string()),
        )
        .into();
        let body = error_body(&err);
        assert_eq!(body.code(), "approval_invalid");
        assert_eq!(body.approval_token().as_deref(), Some("fresh-token"));
    }

    #[test]
    fn test_rate_limit_failure_carries_retry_after() {
        let err: OpsgateError = RateLimitError::new("slow down", 42).into();
        let body = error_body(&err);
        assert_eq!(*body.retry_after_secs(), Some(42));
    }

    #[test]
    fn test_message_excludes_source_location() {
        let err: OpsgateError = PermissionError::new("viewer cannot execute").into();
        let body = error_body(&err);
        assert_eq!(body.message(), "viewer cannot execute");
    }
}
