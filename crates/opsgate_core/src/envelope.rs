//! Wire envelope for API responses.

use crate::RiskTier;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body inside an envelope.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters, derive_new::new)]
pub struct ErrorBody {
    /// Stable error code
    #[new(into)]
    code: String,
    /// Human-readable message
    #[new(into)]
    message: String,
    /// Replacement approval token, present on approval-protocol
    /// failures so the caller can retry without re-planning
    #[serde(skip_serializing_if = "Option::is_none")]
    approval_token: Option<String>,
    /// Retry-after hint in seconds, present on throttling failures
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<u64>,
}

/// Metadata reported on SDK execute responses.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters, derive_new::new)]
pub struct ExecuteMeta {
    /// Resolved risk tier of the action
    risk: RiskTier,
    /// Whether an approval token was required
    approval_required: bool,
}

/// The `{ ok, trace_id, data, error, meta }` response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters)]
pub struct Envelope {
    /// Whether the request succeeded
    #[getter(skip)]
    ok: bool,
    /// Request trace id
    trace_id: String,
    /// Response payload
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    /// Error detail
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
    /// Execution metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<ExecuteMeta>,
}

impl Envelope {
    /// Successful response.
    pub fn ok(trace_id: impl Into<String>, data: Value) -> Self {
        Self {
            ok: true,
            trace_id: trace_id.into(),
            data: Some(data),
            error: None,
            meta: None,
        }
    }

    /// Failed response.
    pub fn err(trace_id: impl Into<String>, error: ErrorBody) -> Self {
        Self {
            ok: false,
            trace_id: trace_id.into(),
            data: None,
            error: Some(error),
            meta: None,
        }
    }

    /// Attach execute metadata.
    pub fn with_meta(mut self, meta: ExecuteMeta) -> Self {
        self.meta = Some(meta);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shapes() {
        let ok = Envelope::ok("t-1", json!({"n": 1}))
            .with_meta(ExecuteMeta::new(RiskTier::Medium, true));
        let wire = serde_json::to_value(&ok).unwrap();
        assert_eq!(wire["ok"], json!(true));
        assert_eq!(wire["meta"]["risk"], json!("MEDIUM"));
        assert!(wire.get("error").is_none());

        let err = Envelope::err(
            "t-2",
            ErrorBody::new("rate_limited", "slow down", None, Some(30)),
        );
        let wire = serde_json::to_value(&err).unwrap();
        assert_eq!(wire["ok"], json!(false));
        assert_eq!(wire["error"]["retry_after_secs"], json!(30));
    }
}
