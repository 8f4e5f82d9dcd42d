//! Admission control and authorization for the Opsgate control plane.
//!
//! This crate provides the four mechanisms that together enforce who
//! may do what, how fast, and with what proof of authorization:
//!
//! 1. **RBAC resolver** - Workspace-scoped role resolution with a
//!    global fallback; every check fails closed
//! 2. **Approval-token service** - Single-use, TTL-bound tokens
//!    gating medium/high-risk actions, bound to canonicalized
//!    parameters
//! 3. **Rate limiter** - Fixed-window admission counters per
//!    (client, session, route), plus a stricter limiter for invite
//!    redemption
//! 4. **Access gate** - Gateway-key check with a loopback-only trust
//!    exception
//!
//! All ephemeral state (tokens, buckets) is owned by the component
//! instances, never global, and does not survive a restart.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod approval;
mod gate;
mod rate_limit;
mod rbac;

pub use approval::{ApprovalToken, ApprovalTokenService, ExecuteOutcome, Plan, canonical_json, params_digest};
pub use gate::AccessGate;
pub use rate_limit::{FixedWindowLimiter, RateKey, invite_redemption_limiter};
pub use rbac::RbacResolver;
