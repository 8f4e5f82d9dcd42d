//! HTTP server for the Opsgate control plane.
//!
//! Assembles the axum router over the workflow engine: gateway-key
//! admission, per-route rate limiting, the ops and team routes, and
//! the SDK-style plan/execute action surface proxied to the upstream
//! API. Every response, success or failure, carries the request trace
//! id in the standard envelope.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod api;
mod config;
mod error;
mod identity;
mod ops;
mod respond;
mod sdk;
mod state;
mod team;
mod upstream;

pub use api::{TraceId, create_router};
pub use config::{ServerConfig, ServerConfigBuilder};
pub use state::AppState;
pub use upstream::{HttpUpstream, UpstreamRefresher};
