//! Workspace invites.

use crate::{Role, WorkspaceName};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Invite lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InviteStatus {
    /// Redeemable
    Active,
    /// Redeemed exactly once
    Accepted,
    /// Expiry passed before redemption
    Expired,
    /// Explicitly withdrawn
    Revoked,
}

/// Mask a token for display: `first4...last4`.
///
/// Full tokens are shown only at creation/rotation time.
pub fn mask_token(token: &str) -> String {
    if token.len() <= 8 {
        return "...".to_string();
    }
    format!("{}...{}", &token[..4], &token[token.len() - 4..])
}

/// A single-use, expiring credential granting a role to whoever
/// redeems it.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters)]
pub struct Invite {
    /// Unique invite id
    id: String,
    /// High-entropy redemption secret
    token: String,
    /// Workspace the granted role applies to
    workspace: WorkspaceName,
    /// Role granted on acceptance
    role: Role,
    /// Who created the invite
    created_by: String,
    /// When the invite was created
    created_at: DateTime<Utc>,
    /// When the invite stops being redeemable
    expires_at: DateTime<Utc>,
    /// Lifecycle status
    status: InviteStatus,
    /// Who accepted the invite
    #[serde(default)]
    accepted_by: Option<String>,
    /// When the invite was accepted
    #[serde(default)]
    accepted_at: Option<DateTime<Utc>>,
    /// Who revoked the invite
    #[serde(default)]
    revoked_by: Option<String>,
    /// When the invite was revoked
    #[serde(default)]
    revoked_at: Option<DateTime<Utc>>,
    /// Redemption URL handed to the invitee
    accept_url: String,
}

fn fresh_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

impl Invite {
    /// Default invite lifetime.
    pub const DEFAULT_TTL_DAYS: i64 = 7;

    /// Create an active invite. The returned record carries the full
    /// token; listings must mask it.
    pub fn create(
        workspace: WorkspaceName,
        role: Role,
        created_by: impl Into<String>,
        base_url: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let token = fresh_token();
        let accept_url = format!("{}/invites/accept?token={}", base_url.trim_end_matches('/'), token);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            token,
            workspace,
            role,
            created_by: created_by.into(),
            created_at: now,
            expires_at: now + Duration::days(Self::DEFAULT_TTL_DAYS),
            status: InviteStatus::Active,
            accepted_by: None,
            accepted_at: None,
            revoked_by: None,
            revoked_at: None,
            accept_url,
        }
    }

    /// Lazily sweep expiry: an active invite past `expires_at` flips
    /// to expired. Returns whether the status changed.
    pub fn sweep_expiry(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == InviteStatus::Active && self.expires_at <= now {
            self.status = InviteStatus::Expired;
            return true;
        }
        false
    }

    /// Whether the invite is currently redeemable.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == InviteStatus::Active && self.expires_at > now
    }

    /// Accept the invite. Succeeds at most once.
    pub fn accept(&mut self, accepted_by: impl Into<String>, now: DateTime<Utc>) -> bool {
        if !self.is_active(now) {
            return false;
        }
        self.status = InviteStatus::Accepted;
        self.accepted_by = Some(accepted_by.into());
        self.accepted_at = Some(now);
        true
    }

    /// Revoke the invite. Only active invites can be revoked.
    pub fn revoke(&mut self, revoked_by: impl Into<String>, now: DateTime<Utc>) -> bool {
        if self.status != InviteStatus::Active {
            return false;
        }
        self.status = InviteStatus::Revoked;
        self.revoked_by = Some(revoked_by.into());
        self.revoked_at = Some(now);
        true
    }

    /// Rotate the token and extend expiry, reactivating an expired
    /// invite. Returns the new full token; the old token stops
    /// working immediately.
    pub fn rotate(&mut self, base_url: &str, now: DateTime<Utc>) -> String {
        let token = fresh_token();
        self.status = InviteStatus::Active;
        self.accept_url = format!(
            "{}/invites/accept?token={}",
            base_url.trim_end_matches('/'),
            token
        );
        self.token = token.clone();
        self.expires_at = now + Duration::days(Self::DEFAULT_TTL_DAYS);
        token
    }

    /// A listing-safe copy with the token masked.
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        copy.token = mask_token(&self.token);
        copy.accept_url = String::new();
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(now: DateTime<Utc>) -> Invite {
        Invite::create(
            WorkspaceName::parse("acme").unwrap(),
            Role::Operator,
            "admin",
            "https://ops.example",
            now,
        )
    }

    #[test]
    fn test_token_is_high_entropy_and_masked() {
        let invite = sample(Utc::now());
        assert_eq!(invite.token().len(), 64);

        let masked = invite.masked();
        assert!(masked.token().contains("..."));
        assert!(!masked.token().contains(&invite.token()[4..60]));
    }

    #[test]
    fn test_accept_exactly_once() {
        let now = Utc::now();
        let mut invite = sample(now);
        assert!(invite.accept("newuser", now));
        assert!(!invite.accept("otheruser", now));
        assert_eq!(invite.accepted_by().as_deref(), Some("newuser"));
    }

    #[test]
    fn test_expiry_sweep() {
        let now = Utc::now();
        let mut invite = sample(now);
        assert!(!invite.sweep_expiry(now + Duration::days(6)));
        assert!(invite.sweep_expiry(now + Duration::days(8)));
        assert_eq!(*invite.status(), InviteStatus::Expired);
        assert!(!invite.accept("late", now + Duration::days(8)));
    }

    #[test]
    fn test_rotate_extends_and_replaces() {
        let now = Utc::now();
        let mut invite = sample(now);
        let old = invite.token().clone();
        let rotated = invite.rotate("https://ops.example", now + Duration::days(6));
        assert_ne!(old, rotated);
        assert!(*invite.expires_at() > now + Duration::days(12));
    }

    #[test]
    fn test_revoked_cannot_accept() {
        let now = Utc::now();
        let mut invite = sample(now);
        assert!(invite.revoke("admin", now));
        assert!(!invite.accept("newuser", now));
        assert!(!invite.revoke("admin", now));
    }

    #[test]
    fn test_mask_short_token() {
        assert_eq!(mask_token("short"), "...");
    }
}
