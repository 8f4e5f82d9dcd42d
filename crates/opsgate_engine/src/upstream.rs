//! External collaborator interfaces.
//!
//! The upstream advertising/messaging API is an opaque collaborator:
//! request/response primitives assumed retryable and independently
//! rate-limited. The engine never interprets business semantics of
//! its payloads beyond pass-through.

use async_trait::async_trait;
use opsgate_core::Source;
use opsgate_error::OpsgateResult;
use serde_json::Value;

/// Opaque HTTP client for the upstream advertising/messaging API.
///
/// Implementations are expected to fail with an
/// [`opsgate_error::UpstreamError`] carrying the upstream
/// `{status, code, message}` shape.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// GET a path with query parameters.
    async fn get(&self, path: &str, params: &Value) -> OpsgateResult<Value>;

    /// POST a JSON body to a path.
    async fn post(&self, path: &str, body: &Value) -> OpsgateResult<Value>;
}

/// Refreshes one source against its connector, returning the fetched
/// item count.
#[async_trait]
pub trait ConnectorRefresh: Send + Sync {
    /// Refresh the source and return the number of items fetched.
    async fn refresh(&self, source: &Source) -> OpsgateResult<u64>;
}
