//! Shared server state.

use crate::config::ServerConfig;
use opsgate_engine::{OpsEngine, UpstreamClient};
use opsgate_security::{
    AccessGate, ApprovalTokenService, FixedWindowLimiter, invite_redemption_limiter,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// State handed to every handler.
///
/// The engine and stores are cheap clones over shared paths; the
/// ephemeral maps (approval tokens, rate buckets) are owned here
/// behind mutexes, never global.
#[derive(Clone)]
pub struct AppState {
    /// The workflow engine
    pub engine: OpsEngine,
    /// Gateway-key admission check
    pub gate: Arc<AccessGate>,
    /// Approval-token issuance and consumption
    pub tokens: Arc<Mutex<ApprovalTokenService>>,
    /// General per-route rate limiter
    pub limiter: Arc<Mutex<FixedWindowLimiter>>,
    /// Stricter limiter for invite redemption
    pub invite_limiter: Arc<Mutex<FixedWindowLimiter>>,
    /// Upstream API client
    pub upstream: Arc<dyn UpstreamClient>,
    /// Server configuration
    pub config: ServerConfig,
}

impl AppState {
    /// Assemble server state from configuration and an engine.
    pub fn new(config: ServerConfig, engine: OpsEngine, upstream: Arc<dyn UpstreamClient>) -> Self {
        let gate = AccessGate::new(
            config.gateway_key().clone(),
            *config.require_key(),
            config.binds_loopback(),
        );
        let limiter = FixedWindowLimiter::new(*config.rate_max(), *config.rate_window_ms());
        Self {
            engine,
            gate: Arc::new(gate),
            tokens: Arc::new(Mutex::new(ApprovalTokenService::new())),
            limiter: Arc::new(Mutex::new(limiter)),
            invite_limiter: Arc::new(Mutex::new(invite_redemption_limiter())),
            upstream,
            config,
        }
    }
}
