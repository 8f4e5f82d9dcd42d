//! Server configuration from environment variables.

use derive_getters::Getters;
use opsgate_error::{OpsgateResult, ValidationError};

/// Configuration for the Opsgate HTTP server.
#[derive(Debug, Clone, PartialEq, Eq, Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct ServerConfig {
    /// Socket address to bind, e.g. `127.0.0.1:8787`
    bind_addr: String,
    /// Gateway key protected routes must present
    #[builder(default)]
    gateway_key: Option<String>,
    /// When set, even loopback traffic must present the key
    #[builder(default)]
    require_key: bool,
    /// Public base URL used in invite accept links
    public_base_url: String,
    /// Base URL of the upstream advertising/messaging API
    upstream_base_url: String,
    /// Requests admitted per rate window
    rate_max: u32,
    /// Rate window length in milliseconds
    rate_window_ms: i64,
}

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

impl ServerConfig {
    /// Create config from environment variables.
    ///
    /// Reads:
    /// - `OPSGATE_BIND_ADDR` (default: "127.0.0.1:8787")
    /// - `OPSGATE_GATEWAY_KEY` (optional)
    /// - `OPSGATE_REQUIRE_KEY` (optional flag)
    /// - `OPSGATE_PUBLIC_BASE_URL` (default: derived from bind address)
    /// - `OPSGATE_UPSTREAM_BASE_URL` (default: "http://localhost:9000")
    /// - `OPSGATE_RATE_MAX` (default: 60)
    /// - `OPSGATE_RATE_WINDOW_MS` (default: 60000)
    pub fn from_env() -> OpsgateResult<Self> {
        let bind_addr =
            std::env::var("OPSGATE_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8787".to_string());
        let public_base_url = std::env::var("OPSGATE_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}", bind_addr));
        let upstream_base_url = std::env::var("OPSGATE_UPSTREAM_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:9000".to_string());
        let rate_max = match std::env::var("OPSGATE_RATE_MAX") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ValidationError::new("OPSGATE_RATE_MAX must be an integer"))?,
            Err(_) => 60,
        };
        let rate_window_ms = match std::env::var("OPSGATE_RATE_WINDOW_MS") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ValidationError::new("OPSGATE_RATE_WINDOW_MS must be an integer"))?,
            Err(_) => 60_000,
        };

        Ok(Self {
            bind_addr,
            gateway_key: std::env::var("OPSGATE_GATEWAY_KEY").ok(),
            require_key: env_flag("OPSGATE_REQUIRE_KEY"),
            public_base_url,
            upstream_base_url,
            rate_max,
            rate_window_ms,
        })
    }

    /// Whether the bind address is a loopback address.
    pub fn binds_loopback(&self) -> bool {
        self.bind_addr.starts_with("127.") || self.bind_addr.starts_with("localhost")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ServerConfigBuilder::default()
            .bind_addr("127.0.0.1:8787")
            .public_base_url("http://localhost:8787")
            .upstream_base_url("http://localhost:9000")
            .rate_max(3u32)
            .rate_window_ms(60_000i64)
            .build()
            .expect("valid ServerConfig");
        assert!(config.gateway_key().is_none());
        assert!(!config.require_key());
        assert!(config.binds_loopback());
    }
}
