//! The engine facade: RBAC gating, reads, alert/approval operations,
//! and policy updates.

use chrono::{DateTime, Utc};
use opsgate_core::{
    Alert, Approval, AuditEntry, GuardMode, GuardPolicy, GuardPolicyPatch, Identity, Lead,
    OpsAction, OpsPolicy, OpsPolicyPatch, Outcome, Role, Schedule, WorkspaceName,
};
use opsgate_security::RbacResolver;
use opsgate_store::{ConfigStore, WorkspaceStore};
use opsgate_error::OpsgateResult;
use serde_json::{Value, json};
use tracing::{info, instrument};

/// The workflow engine.
///
/// Every mutating operation authorizes the caller's resolved role
/// before touching the store and appends to the audit log after.
#[derive(Debug, Clone)]
pub struct OpsEngine {
    store: WorkspaceStore,
    config: ConfigStore,
}

impl OpsEngine {
    /// Create an engine over a workspace store and config store.
    pub fn new(store: WorkspaceStore, config: ConfigStore) -> Self {
        Self { store, config }
    }

    /// The backing workspace store.
    pub fn store(&self) -> &WorkspaceStore {
        &self.store
    }

    /// The backing config store.
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Build an RBAC resolver over the persisted role table.
    pub fn rbac(&self) -> OpsgateResult<RbacResolver> {
        Ok(RbacResolver::new(self.store.roles()?))
    }

    /// Authorize an action for the caller, failing closed.
    pub(crate) fn authorize(
        &self,
        workspace: &WorkspaceName,
        action: OpsAction,
        identity: &Identity,
    ) -> OpsgateResult<Role> {
        self.rbac()?.assert_can(workspace, action, identity)
    }

    pub(crate) fn audit(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        action: &str,
        detail: Value,
        now: DateTime<Utc>,
    ) -> OpsgateResult<()> {
        self.store.append_audit(
            workspace,
            AuditEntry::record(identity.id().clone(), action, workspace.as_str(), detail, now),
        )?;
        Ok(())
    }

    // ----- reads -----

    /// Workspace summary: open counts across the ops documents.
    pub fn summary(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
    ) -> OpsgateResult<Value> {
        self.authorize(workspace, OpsAction::Read, identity)?;
        let alerts = self.store.alerts(workspace)?;
        let approvals = self.store.approvals(workspace)?;
        let leads = self.store.leads(workspace)?;
        let schedules = self.store.schedules(workspace)?;
        let sources = self.store.sources(workspace)?;
        let guard = self.store.guard_policy(workspace)?;
        let state = self.store.state(workspace)?;
        let integrations = self.store.integrations(workspace)?;
        Ok(json!({
            "workspace": workspace.as_str(),
            "alerts_open": alerts.iter().filter(|a| a.ack_at().is_none()).count(),
            "approvals_pending": approvals.iter().filter(|a| a.is_pending()).count(),
            "leads_needing_follow_up": leads.iter().filter(|l| l.needs_follow_up()).count(),
            "schedules_enabled": schedules.iter().filter(|s| *s.enabled()).count(),
            "sources": sources.len(),
            "guard_mode": guard.mode(),
            "last_morning_run_date": state.last_morning_run_date,
            "integrations": integrations,
        }))
    }

    /// All alerts.
    pub fn alerts(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
    ) -> OpsgateResult<Vec<Alert>> {
        self.authorize(workspace, OpsAction::Read, identity)?;
        self.store.alerts(workspace)
    }

    /// All approvals.
    pub fn approvals(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
    ) -> OpsgateResult<Vec<Approval>> {
        self.authorize(workspace, OpsAction::Read, identity)?;
        self.store.approvals(workspace)
    }

    /// All outcome records.
    pub fn outcomes(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
    ) -> OpsgateResult<Vec<Outcome>> {
        self.authorize(workspace, OpsAction::Read, identity)?;
        self.store.outcomes(workspace)
    }

    /// All schedules.
    pub fn schedules(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
    ) -> OpsgateResult<Vec<Schedule>> {
        self.authorize(workspace, OpsAction::Read, identity)?;
        self.store.schedules(workspace)
    }

    /// All leads.
    pub fn leads(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
    ) -> OpsgateResult<Vec<Lead>> {
        self.authorize(workspace, OpsAction::Read, identity)?;
        self.store.leads(workspace)
    }

    /// The audit log.
    pub fn audit_log(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
    ) -> OpsgateResult<Vec<AuditEntry>> {
        self.authorize(workspace, OpsAction::Read, identity)?;
        self.store.audit_log(workspace)
    }

    /// The guard policy.
    pub fn guard_policy(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
    ) -> OpsgateResult<GuardPolicy> {
        self.authorize(workspace, OpsAction::Read, identity)?;
        self.store.guard_policy(workspace)
    }

    /// The ops policy.
    pub fn policy(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
    ) -> OpsgateResult<OpsPolicy> {
        self.authorize(workspace, OpsAction::Read, identity)?;
        self.store.policy(workspace)
    }

    /// Replace the lead list wholesale, e.g. after a sheet import.
    pub fn replace_leads(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        leads: Vec<Lead>,
        now: DateTime<Utc>,
    ) -> OpsgateResult<usize> {
        self.authorize(workspace, OpsAction::Write, identity)?;
        self.store.save_leads(workspace, &leads)?;
        self.audit(
            workspace,
            identity,
            "leads.replace",
            json!({"count": leads.len()}),
            now,
        )?;
        Ok(leads.len())
    }

    // ----- alerts -----

    /// Acknowledge an alert.
    #[instrument(skip(self, identity), fields(workspace = %workspace, id))]
    pub fn ack_alert(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        id: &str,
        now: DateTime<Utc>,
    ) -> OpsgateResult<Alert> {
        self.authorize(workspace, OpsAction::Write, identity)?;
        let alert = self.store.ack_alert(workspace, id, now)?;
        self.audit(workspace, identity, "alerts.ack", json!({"alert_id": id}), now)?;
        Ok(alert)
    }

    // ----- approvals -----

    /// Resolve a pending approval; the first decision wins. On
    /// approval, dispatches the action-specific side effect. Every
    /// actual decision is audit-logged with the decision and the
    /// original requester, regardless of side-effect success.
    #[instrument(skip(self, identity, note), fields(workspace = %workspace, id, approved))]
    pub fn resolve_approval(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        id: &str,
        approved: bool,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> OpsgateResult<Approval> {
        self.authorize(workspace, OpsAction::Approve, identity)?;
        let (approval, changed) =
            self.store
                .resolve_approval(workspace, id, approved, identity.id(), note, now)?;
        if !changed {
            // Re-resolving a terminal approval is a no-op.
            return Ok(approval);
        }

        if approved {
            self.dispatch_side_effect(workspace, &approval, now)?;
        }

        self.audit(
            workspace,
            identity,
            "approvals.resolve",
            json!({
                "approval_id": id,
                "action": approval.action(),
                "approved": approved,
                "requested_by": approval.requested_by(),
            }),
            now,
        )?;
        info!(action = %approval.action(), approved, "Approval resolved");
        Ok(approval)
    }

    fn dispatch_side_effect(
        &self,
        workspace: &WorkspaceName,
        approval: &Approval,
        now: DateTime<Utc>,
    ) -> OpsgateResult<()> {
        match approval.action().as_str() {
            "send_bulk_whatsapp" => {
                let ids: Vec<String> = approval
                    .payload()
                    .get("lead_ids")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or_default();
                let mut contacted = 0usize;
                for lead_id in &ids {
                    // Leads deleted since the request are skipped.
                    if self.store.mark_lead_contacted(workspace, lead_id, now)? {
                        contacted += 1;
                    }
                }
                self.store.append_outcome(
                    workspace,
                    Outcome::record(
                        "bulk_whatsapp",
                        format!("marked {} of {} leads contacted", contacted, ids.len()),
                        json!({"lead_ids": ids, "contacted": contacted}),
                        now,
                    ),
                )?;
            }
            "marketing.pause_overspend" => {
                // Pausing campaigns needs a human-selected object set
                // on the ad platform; record the follow-up only.
                self.store.append_outcome(
                    workspace,
                    Outcome::record(
                        "pause_overspend",
                        "approved; pause campaigns manually in the ad platform",
                        json!({
                            "hint": "manual_followup",
                            "spend": approval.payload().get("spend"),
                        }),
                        now,
                    ),
                )?;
            }
            _ => {}
        }
        Ok(())
    }

    // ----- policy -----

    /// Patch the guard policy. A rollback snapshot of the prior
    /// policy is taken before the merge.
    #[instrument(skip(self, identity, patch), fields(workspace = %workspace))]
    pub fn update_guard_policy(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        patch: GuardPolicyPatch,
        now: DateTime<Utc>,
    ) -> OpsgateResult<GuardPolicy> {
        self.authorize(workspace, OpsAction::GuardConfig, identity)?;
        let mut policy = self.store.guard_policy(workspace)?;
        self.store.snapshot(
            workspace,
            "guard_policy",
            serde_json::to_value(&policy).unwrap_or(Value::Null),
            now,
        )?;
        policy.apply(patch);
        self.store.save_guard_policy(workspace, &policy)?;
        self.audit(
            workspace,
            identity,
            "guard.policy",
            serde_json::to_value(&policy).unwrap_or(Value::Null),
            now,
        )?;
        Ok(policy)
    }

    /// Set the guard operating mode.
    ///
    /// `auto_safe` is accepted and persisted, but no autonomous
    /// executor exists; the mode is a configuration surface only.
    pub fn set_guard_mode(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        mode: GuardMode,
        now: DateTime<Utc>,
    ) -> OpsgateResult<GuardPolicy> {
        self.authorize(workspace, OpsAction::GuardConfig, identity)?;
        let mut policy = self.store.guard_policy(workspace)?;
        policy.set_mode(mode);
        self.store.save_guard_policy(workspace, &policy)?;
        self.audit(
            workspace,
            identity,
            "guard.mode",
            json!({"mode": mode}),
            now,
        )?;
        Ok(policy)
    }

    /// Patch the ops policy.
    pub fn update_policy(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        patch: OpsPolicyPatch,
        now: DateTime<Utc>,
    ) -> OpsgateResult<OpsPolicy> {
        self.authorize(workspace, OpsAction::Write, identity)?;
        let mut policy = self.store.policy(workspace)?;
        policy.apply(patch);
        self.store.save_policy(workspace, &policy)?;
        self.audit(
            workspace,
            identity,
            "ops.policy",
            serde_json::to_value(&policy).unwrap_or(Value::Null),
            now,
        )?;
        Ok(policy)
    }

    // ----- roles -----

    /// Assign a workspace-scoped role to a user.
    #[instrument(skip(self, identity), fields(workspace = %workspace, user, role = %role))]
    pub fn set_role(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        user: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> OpsgateResult<()> {
        self.authorize(workspace, OpsAction::Admin, identity)?;
        let mut roles = self.store.roles()?;
        roles.assign(user, workspace.clone(), role);
        self.store.save_roles(&roles)?;
        self.audit(
            workspace,
            identity,
            "team.role",
            json!({"user": user, "role": role}),
            now,
        )?;
        Ok(())
    }
}
