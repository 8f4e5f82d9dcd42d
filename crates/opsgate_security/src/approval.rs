//! Approval tokens for risk-gated actions.
//!
//! A two-phase protocol adapted from the CSRF-token pattern: planning
//! a medium/high-risk action mints a single-use token bound to the
//! action, a digest of its canonicalized parameters, and the actor;
//! executing presents the token back. Every protocol failure carries
//! a freshly issued replacement token so a legitimate caller never
//! restarts the planning step from scratch.

use chrono::{DateTime, Duration, Utc};
use opsgate_core::{Identity, RiskTier, risk_for_action};
use opsgate_error::{ApprovalCode, ApprovalError, OpsgateResult};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// Serialize a value with object keys recursively sorted and array
/// order preserved, so deeply equal parameter objects hash
/// identically regardless of key order.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(k).expect("string key serializes"),
                        canonical_json(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

/// SHA-256 digest of the canonicalized parameters, hex encoded.
pub fn params_digest(params: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(params).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A minted, unconsumed approval token.
#[derive(Debug, Clone, derive_getters::Getters)]
pub struct ApprovalToken {
    /// Token string presented back at execute time
    token: String,
    /// Action the token authorizes
    action: String,
    /// Risk tier of the action
    risk: RiskTier,
    /// Digest of the canonicalized parameters
    params_hash: String,
    /// Actor the token was issued to
    actor_id: String,
    /// When the token was minted
    issued_at: DateTime<Utc>,
    /// When the token stops being valid
    expires_at: DateTime<Utc>,
}

/// Result of planning an action.
#[derive(Debug, Clone, derive_getters::Getters)]
pub struct Plan {
    /// Action name
    action: String,
    /// Resolved risk tier
    risk: RiskTier,
    /// Whether execution will require a token
    approval_required: bool,
    /// Minted token, present for medium/high risk
    token: Option<String>,
    /// Token expiry, present when a token was minted
    expires_at: Option<DateTime<Utc>>,
}

/// Result of a successful execute-phase verification.
#[derive(Debug, Clone, Copy, derive_getters::Getters)]
pub struct ExecuteOutcome {
    /// Resolved risk tier
    risk: RiskTier,
    /// Whether an approval token was consumed
    approval_required: bool,
}

/// In-memory, single-use approval token issuance and consumption.
///
/// Owns its token map; nothing here is global or durable. Tokens do
/// not survive a restart; callers re-plan.
#[derive(Debug)]
pub struct ApprovalTokenService {
    ttl: Duration,
    tokens: HashMap<String, ApprovalToken>,
}

impl ApprovalTokenService {
    /// Fixed token lifetime.
    pub const TTL_MINUTES: i64 = 10;

    /// Create a new service with the fixed 10-minute TTL.
    pub fn new() -> Self {
        Self {
            ttl: Duration::minutes(Self::TTL_MINUTES),
            tokens: HashMap::new(),
        }
    }

    fn mint(
        &mut self,
        action: &str,
        params_hash: &str,
        risk: RiskTier,
        actor: &Identity,
        now: DateTime<Utc>,
    ) -> String {
        let token = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        debug!(action, "Minting approval token");
        self.tokens.insert(
            token.clone(),
            ApprovalToken {
                token: token.clone(),
                action: action.to_string(),
                risk,
                params_hash: params_hash.to_string(),
                actor_id: actor.id().clone(),
                issued_at: now,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    /// Plan an action: classify its risk and, for medium/high risk,
    /// mint a token bound to the canonicalized parameters.
    ///
    /// Unknown actions are rejected, never defaulted to low risk.
    #[instrument(skip(self, params), fields(action, actor = %actor.id()))]
    pub fn plan(
        &mut self,
        action: &str,
        params: &Value,
        actor: &Identity,
        now: DateTime<Utc>,
    ) -> OpsgateResult<Plan> {
        let risk = risk_for_action(action)?;
        if !risk.requires_approval() {
            debug!(%risk, "Low-risk action, no token required");
            return Ok(Plan {
                action: action.to_string(),
                risk,
                approval_required: false,
                token: None,
                expires_at: None,
            });
        }

        let hash = params_digest(params);
        let token = self.mint(action, &hash, risk, actor, now);
        let expires_at = self.tokens[&token].expires_at;
        Ok(Plan {
            action: action.to_string(),
            risk,
            approval_required: true,
            token: Some(token),
            expires_at: Some(expires_at),
        })
    }

    /// Verify and consume a token for execution.
    ///
    /// Verification order: token present, token exists, not expired,
    /// action matches, parameter digest matches; high risk
    /// additionally requires a non-empty justification, independent
    /// of the token. Any failure removes the presented token and
    /// reissues a fresh one for the requested action/params inside
    /// the error. On success the token is deleted before the caller
    /// runs the underlying action.
    #[instrument(skip(self, params, token, reason), fields(action, actor = %actor.id()))]
    pub fn execute(
        &mut self,
        action: &str,
        params: &Value,
        token: Option<&str>,
        reason: Option<&str>,
        actor: &Identity,
        now: DateTime<Utc>,
    ) -> OpsgateResult<ExecuteOutcome> {
        let risk = risk_for_action(action)?;
        if !risk.requires_approval() {
            return Ok(ExecuteOutcome {
                risk,
                approval_required: false,
            });
        }

        let hash = params_digest(params);

        let Some(presented) = token else {
            let fresh = self.mint(action, &hash, risk, actor, now);
            warn!("Execute without token for risk-gated action");
            return Err(ApprovalError::new(
                ApprovalCode::Required,
                format!("action '{}' requires an approval token", action),
                Some(fresh),
            )
            .into());
        };

        let Some(stored) = self.tokens.remove(presented) else {
            let fresh = self.mint(action, &hash, risk, actor, now);
            return Err(ApprovalError::new(
                ApprovalCode::Invalid,
                "approval token unknown or already used",
                Some(fresh),
            )
            .into());
        };

        if stored.expires_at <= now {
            let fresh = self.mint(action, &hash, risk, actor, now);
            return Err(ApprovalError::new(
                ApprovalCode::Expired,
                "approval token expired",
                Some(fresh),
            )
            .into());
        }

        if stored.action != action {
            let fresh = self.mint(action, &hash, risk, actor, now);
            return Err(ApprovalError::new(
                ApprovalCode::Mismatch,
                format!(
                    "approval token issued for '{}', not '{}'",
                    stored.action, action
                ),
                Some(fresh),
            )
            .into());
        }

        if stored.params_hash != hash {
            let fresh = self.mint(action, &hash, risk, actor, now);
            return Err(ApprovalError::new(
                ApprovalCode::Mismatch,
                "approval token bound to different parameters",
                Some(fresh),
            )
            .into());
        }

        if risk == RiskTier::High && reason.map(str::trim).filter(|r| !r.is_empty()).is_none() {
            let fresh = self.mint(action, &hash, risk, actor, now);
            return Err(ApprovalError::new(
                ApprovalCode::ReasonRequired,
                "high-risk execution requires a justification",
                Some(fresh),
            )
            .into());
        }

        debug!(%risk, "Approval token consumed");
        Ok(ExecuteOutcome {
            risk,
            approval_required: true,
        })
    }

    /// Drop expired tokens.
    pub fn cleanup_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, t| t.expires_at > now);
        let removed = before - self.tokens.len();
        if removed > 0 {
            debug!(removed, "Cleaned up expired approval tokens");
        }
        removed
    }

    /// Number of live tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no tokens are live.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Default for ApprovalTokenService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonicalization_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"y": [2, 1], "x": null}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"x": null, "y": [2, 1]}, "b": 1}"#).unwrap();
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(params_digest(&a), params_digest(&b));
    }

    #[test]
    fn test_canonicalization_preserves_array_order() {
        let a = json!({"ids": [1, 2]});
        let b = json!({"ids": [2, 1]});
        assert_ne!(params_digest(&a), params_digest(&b));
    }
}
