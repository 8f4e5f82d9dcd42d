//! The invite lifecycle: create, list, revoke, resend, accept.
//!
//! Invites are process-wide records scoped to a workspace. Expiry is
//! swept lazily whenever the list is touched. Acceptance is the only
//! unauthenticated operation; the server applies a strict rate limit
//! to it.

use crate::engine::OpsEngine;
use chrono::{DateTime, Utc};
use opsgate_core::{Identity, Invite, InviteStatus, OpsAction, Role, WorkspaceName};
use opsgate_error::{NotFoundError, OpsgateResult, ValidationError};
use serde_json::json;
use tracing::{info, instrument};

impl OpsEngine {
    fn load_swept_invites(&self, now: DateTime<Utc>) -> OpsgateResult<Vec<Invite>> {
        let mut invites = self.store().invites()?;
        let mut swept = false;
        for invite in invites.iter_mut() {
            swept |= invite.sweep_expiry(now);
        }
        if swept {
            self.store().save_invites(&invites)?;
        }
        Ok(invites)
    }

    /// Invites for a workspace, tokens masked.
    pub fn invites(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> OpsgateResult<Vec<Invite>> {
        self.authorize(workspace, OpsAction::Admin, identity)?;
        Ok(self
            .load_swept_invites(now)?
            .iter()
            .filter(|i| i.workspace() == workspace)
            .map(Invite::masked)
            .collect())
    }

    /// Create an invite granting `role` in `workspace`.
    ///
    /// The returned record carries the full token and accept URL;
    /// this is the only time the token is shown unmasked.
    #[instrument(skip(self, identity, base_url), fields(workspace = %workspace, role = %role))]
    pub fn create_invite(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        role: Role,
        base_url: &str,
        now: DateTime<Utc>,
    ) -> OpsgateResult<Invite> {
        self.authorize(workspace, OpsAction::Admin, identity)?;
        let invite = Invite::create(workspace.clone(), role, identity.id().clone(), base_url, now);
        let mut invites = self.load_swept_invites(now)?;
        invites.push(invite.clone());
        self.store().save_invites(&invites)?;
        self.audit(
            workspace,
            identity,
            "invites.create",
            json!({"invite_id": invite.id(), "role": role}),
            now,
        )?;
        Ok(invite)
    }

    /// Revoke an active invite.
    pub fn revoke_invite(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        id: &str,
        now: DateTime<Utc>,
    ) -> OpsgateResult<Invite> {
        self.authorize(workspace, OpsAction::Admin, identity)?;
        let mut invites = self.load_swept_invites(now)?;
        let invite = invites
            .iter_mut()
            .find(|i| i.id() == id && i.workspace() == workspace)
            .ok_or_else(|| NotFoundError::new(format!("invite '{}' not found", id)))?;
        if !invite.revoke(identity.id().clone(), now) {
            return Err(ValidationError::new(format!(
                "invite is {}, only active invites can be revoked",
                invite.status()
            ))
            .into());
        }
        let revoked = invite.masked();
        self.store().save_invites(&invites)?;
        self.audit(
            workspace,
            identity,
            "invites.revoke",
            json!({"invite_id": id}),
            now,
        )?;
        Ok(revoked)
    }

    /// Rotate an invite's token and extend its expiry.
    ///
    /// Allowed for active and expired invites; accepted and revoked
    /// invites stay terminal. The returned record carries the new
    /// full token.
    pub fn resend_invite(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        id: &str,
        base_url: &str,
        now: DateTime<Utc>,
    ) -> OpsgateResult<Invite> {
        self.authorize(workspace, OpsAction::Admin, identity)?;
        let mut invites = self.load_swept_invites(now)?;
        let invite = invites
            .iter_mut()
            .find(|i| i.id() == id && i.workspace() == workspace)
            .ok_or_else(|| NotFoundError::new(format!("invite '{}' not found", id)))?;
        match invite.status() {
            InviteStatus::Active | InviteStatus::Expired => {}
            status => {
                return Err(ValidationError::new(format!(
                    "invite is {}, only active or expired invites can be resent",
                    status
                ))
                .into());
            }
        }
        invite.rotate(base_url, now);
        let rotated = invite.clone();
        self.store().save_invites(&invites)?;
        self.audit(
            workspace,
            identity,
            "invites.resend",
            json!({"invite_id": id}),
            now,
        )?;
        Ok(rotated)
    }

    /// Redeem an invite token, granting its role to `accepted_by`.
    ///
    /// Unauthenticated: the token itself is the credential. Returns
    /// the workspace and role granted.
    #[instrument(skip(self, token, accepted_by))]
    pub fn accept_invite(
        &self,
        token: &str,
        accepted_by: &Identity,
        now: DateTime<Utc>,
    ) -> OpsgateResult<(WorkspaceName, Role)> {
        let mut invites = self.load_swept_invites(now)?;
        let invite = invites
            .iter_mut()
            .find(|i| i.token() == token)
            .ok_or_else(|| NotFoundError::new("invite not found"))?;
        if !invite.accept(accepted_by.id().clone(), now) {
            return Err(ValidationError::new(format!(
                "invite is {}, it can no longer be accepted",
                invite.status()
            ))
            .into());
        }
        let workspace = invite.workspace().clone();
        let role = *invite.role();
        let invite_id = invite.id().clone();
        self.store().save_invites(&invites)?;

        let mut roles = self.store().roles()?;
        roles.assign(accepted_by.id(), workspace.clone(), role);
        self.store().save_roles(&roles)?;

        self.audit(
            &workspace,
            accepted_by,
            "invites.accept",
            json!({"invite_id": invite_id, "role": role}),
            now,
        )?;
        info!(workspace = %workspace, role = %role, "Invite accepted");
        Ok((workspace, role))
    }
}
