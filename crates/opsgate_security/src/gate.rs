//! Gateway-key access control.

use opsgate_error::{AccessError, OpsgateResult};
use tracing::{debug, instrument};

/// Admission check applied before any handler logic.
///
/// A protected route must present the operator-configured gateway
/// key, with one exception: the server is bound to a loopback
/// address, the peer is also loopback, and the `require_key` flag is
/// off. With no gateway key configured the service refuses to degrade
/// open: loopback-to-loopback traffic is allowed and everything else
/// is rejected as key-required.
#[derive(Debug, Clone, derive_new::new)]
pub struct AccessGate {
    /// Operator-configured gateway key
    gateway_key: Option<String>,
    /// When set, even loopback traffic must present the key
    require_key: bool,
    /// Whether the server socket is bound to a loopback address
    server_loopback: bool,
}

impl AccessGate {
    /// Admit or reject a request.
    #[instrument(skip(self, presented_key))]
    pub fn admit(&self, presented_key: Option<&str>, peer_loopback: bool) -> OpsgateResult<()> {
        let local_exception = self.server_loopback && peer_loopback && !self.require_key;

        match &self.gateway_key {
            Some(expected) => match presented_key {
                Some(presented) if presented == expected => {
                    debug!("Gateway key accepted");
                    Ok(())
                }
                Some(_) => Err(AccessError::new("invalid gateway key").into()),
                None if local_exception => {
                    debug!("Loopback trust exception admitted keyless request");
                    Ok(())
                }
                None => Err(AccessError::new("gateway key required").into()),
            },
            None => {
                if self.server_loopback && peer_loopback {
                    debug!("No gateway key configured, loopback traffic admitted");
                    Ok(())
                } else {
                    Err(AccessError::new(
                        "no gateway key configured; non-local traffic refused",
                    )
                    .into())
                }
            }
        }
    }
}
