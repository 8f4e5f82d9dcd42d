//! The per-workspace document store.

use crate::doc::{DocKind, read_or_default, write_atomic};
use chrono::{DateTime, Utc};
use opsgate_core::{
    Alert, Approval, AuditEntry, GuardPolicy, Invite, Lead, NewAlert, NewApproval, OpsPolicy,
    Outcome, RoleTable, Schedule, Source, WorkspaceName, WorkspaceState,
};
use opsgate_error::{NotFoundError, OpsgateResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// A rollback snapshot taken before a policy mutation.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters)]
pub struct Snapshot {
    /// Unique snapshot id
    id: String,
    /// Document the snapshot captures
    doc: String,
    /// When the snapshot was taken
    taken_at: DateTime<Utc>,
    /// Captured document value
    data: Value,
}

/// Atomic JSON-document persistence, one directory per workspace plus
/// process-wide `roles.json` and `invites.json` at the root.
///
/// Workspaces are created implicitly on first access and never
/// explicitly destroyed.
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    root: PathBuf,
}

impl WorkspaceStore {
    /// Open a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn doc_path(&self, workspace: &WorkspaceName, kind: DocKind) -> PathBuf {
        self.root
            .join("workspaces")
            .join(workspace.as_str())
            .join(kind.file_name())
    }

    fn load<T>(&self, workspace: &WorkspaceName, kind: DocKind) -> OpsgateResult<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        read_or_default(&self.doc_path(workspace, kind))
    }

    fn save<T>(&self, workspace: &WorkspaceName, kind: DocKind, value: &T) -> OpsgateResult<()>
    where
        T: Serialize,
    {
        write_atomic(&self.doc_path(workspace, kind), value)
    }

    // ----- alerts -----

    /// All alerts for a workspace.
    pub fn alerts(&self, workspace: &WorkspaceName) -> OpsgateResult<Vec<Alert>> {
        self.load(workspace, DocKind::Alerts)
    }

    /// Raise an alert with idempotent dedupe: while an alert with the
    /// same dedupe key is open, the existing alert is returned and
    /// nothing is inserted.
    #[instrument(skip(self, input), fields(workspace = %workspace))]
    pub fn raise_alert(
        &self,
        workspace: &WorkspaceName,
        input: NewAlert,
        now: DateTime<Utc>,
    ) -> OpsgateResult<Alert> {
        let mut alerts: Vec<Alert> = self.alerts(workspace)?;
        if let Some(key) = input.dedupe_key() {
            if let Some(existing) = alerts.iter().find(|a| a.blocks_duplicate(key)) {
                debug!(alert_id = %existing.id(), "Open alert dedupes insert");
                return Ok(existing.clone());
            }
        }
        let alert = Alert::raise(input, now);
        alerts.push(alert.clone());
        self.save(workspace, DocKind::Alerts, &alerts)?;
        Ok(alert)
    }

    /// Acknowledge an alert by id.
    pub fn ack_alert(
        &self,
        workspace: &WorkspaceName,
        id: &str,
        now: DateTime<Utc>,
    ) -> OpsgateResult<Alert> {
        let mut alerts: Vec<Alert> = self.alerts(workspace)?;
        let alert = alerts
            .iter_mut()
            .find(|a| a.id() == id)
            .ok_or_else(|| NotFoundError::new(format!("alert '{}' not found", id)))?;
        alert.ack(now);
        let acked = alert.clone();
        self.save(workspace, DocKind::Alerts, &alerts)?;
        Ok(acked)
    }

    // ----- approvals -----

    /// All approvals for a workspace.
    pub fn approvals(&self, workspace: &WorkspaceName) -> OpsgateResult<Vec<Approval>> {
        self.load(workspace, DocKind::Approvals)
    }

    /// Open a new pending approval.
    pub fn request_approval(
        &self,
        workspace: &WorkspaceName,
        input: NewApproval,
        now: DateTime<Utc>,
    ) -> OpsgateResult<Approval> {
        let mut approvals: Vec<Approval> = self.approvals(workspace)?;
        let approval = Approval::request(input, now);
        approvals.push(approval.clone());
        self.save(workspace, DocKind::Approvals, &approvals)?;
        Ok(approval)
    }

    /// Transition an approval to a terminal state. The first decision
    /// wins; re-resolving returns the stored terminal record with
    /// `changed == false`.
    #[instrument(skip(self, note), fields(workspace = %workspace, id))]
    pub fn resolve_approval(
        &self,
        workspace: &WorkspaceName,
        id: &str,
        approved: bool,
        decided_by: &str,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> OpsgateResult<(Approval, bool)> {
        let mut approvals: Vec<Approval> = self.approvals(workspace)?;
        let approval = approvals
            .iter_mut()
            .find(|a| a.id() == id)
            .ok_or_else(|| NotFoundError::new(format!("approval '{}' not found", id)))?;
        let changed = approval.resolve(approved, decided_by, note, now);
        let resolved = approval.clone();
        if changed {
            self.save(workspace, DocKind::Approvals, &approvals)?;
        } else {
            debug!("Approval already terminal, decision ignored");
        }
        Ok((resolved, changed))
    }

    // ----- schedules -----

    /// All schedules for a workspace.
    pub fn schedules(&self, workspace: &WorkspaceName) -> OpsgateResult<Vec<Schedule>> {
        self.load(workspace, DocKind::Schedules)
    }

    /// Insert or replace a schedule by id.
    pub fn upsert_schedule(
        &self,
        workspace: &WorkspaceName,
        schedule: Schedule,
    ) -> OpsgateResult<Schedule> {
        let mut schedules: Vec<Schedule> = self.schedules(workspace)?;
        match schedules.iter_mut().find(|s| s.id() == schedule.id()) {
            Some(slot) => *slot = schedule.clone(),
            None => schedules.push(schedule.clone()),
        }
        self.save(workspace, DocKind::Schedules, &schedules)?;
        Ok(schedule)
    }

    /// Replace the whole schedule list.
    pub fn save_schedules(
        &self,
        workspace: &WorkspaceName,
        schedules: &[Schedule],
    ) -> OpsgateResult<()> {
        self.save(workspace, DocKind::Schedules, &schedules)
    }

    // ----- sources -----

    /// All sources for a workspace.
    pub fn sources(&self, workspace: &WorkspaceName) -> OpsgateResult<Vec<Source>> {
        self.load(workspace, DocKind::Sources)
    }

    /// Whole-record replace of a source by id, inserting when new.
    pub fn replace_source(
        &self,
        workspace: &WorkspaceName,
        source: Source,
    ) -> OpsgateResult<Source> {
        let mut sources: Vec<Source> = self.sources(workspace)?;
        match sources.iter_mut().find(|s| s.id() == source.id()) {
            Some(slot) => *slot = source.clone(),
            None => sources.push(source.clone()),
        }
        self.save(workspace, DocKind::Sources, &sources)?;
        Ok(source)
    }

    // ----- leads -----

    /// All leads for a workspace.
    pub fn leads(&self, workspace: &WorkspaceName) -> OpsgateResult<Vec<Lead>> {
        self.load(workspace, DocKind::Leads)
    }

    /// Replace the whole lead list.
    pub fn save_leads(&self, workspace: &WorkspaceName, leads: &[Lead]) -> OpsgateResult<()> {
        self.save(workspace, DocKind::Leads, &leads)
    }

    /// Mark one lead contacted. Returns `false` when the lead no
    /// longer exists (deleted leads are skipped, not errors).
    pub fn mark_lead_contacted(
        &self,
        workspace: &WorkspaceName,
        id: &str,
        now: DateTime<Utc>,
    ) -> OpsgateResult<bool> {
        let mut leads: Vec<Lead> = self.leads(workspace)?;
        let Some(lead) = leads.iter_mut().find(|l| l.id() == id) else {
            return Ok(false);
        };
        lead.mark_contacted(now);
        self.save(workspace, DocKind::Leads, &leads)?;
        Ok(true)
    }

    // ----- policy, guard policy, state -----

    /// The workspace ops policy, defaulting when absent.
    pub fn policy(&self, workspace: &WorkspaceName) -> OpsgateResult<OpsPolicy> {
        self.load(workspace, DocKind::Policy)
    }

    /// Persist the ops policy.
    pub fn save_policy(&self, workspace: &WorkspaceName, policy: &OpsPolicy) -> OpsgateResult<()> {
        self.save(workspace, DocKind::Policy, policy)
    }

    /// The workspace guard policy, defaulting when absent.
    pub fn guard_policy(&self, workspace: &WorkspaceName) -> OpsgateResult<GuardPolicy> {
        self.load(workspace, DocKind::GuardPolicy)
    }

    /// Persist the guard policy.
    pub fn save_guard_policy(
        &self,
        workspace: &WorkspaceName,
        policy: &GuardPolicy,
    ) -> OpsgateResult<()> {
        self.save(workspace, DocKind::GuardPolicy, policy)
    }

    /// The engine state document.
    pub fn state(&self, workspace: &WorkspaceName) -> OpsgateResult<WorkspaceState> {
        self.load(workspace, DocKind::State)
    }

    /// Persist the engine state document.
    pub fn save_state(
        &self,
        workspace: &WorkspaceName,
        state: &WorkspaceState,
    ) -> OpsgateResult<()> {
        self.save(workspace, DocKind::State, state)
    }

    // ----- integrations -----

    /// The operator-connected integrations document.
    pub fn integrations(&self, workspace: &WorkspaceName) -> OpsgateResult<Value> {
        self.load(workspace, DocKind::Integrations)
    }

    /// Persist the integrations document.
    pub fn save_integrations(
        &self,
        workspace: &WorkspaceName,
        value: &Value,
    ) -> OpsgateResult<()> {
        self.save(workspace, DocKind::Integrations, value)
    }

    // ----- outcomes, audit log, snapshots -----

    /// All outcome records for a workspace.
    pub fn outcomes(&self, workspace: &WorkspaceName) -> OpsgateResult<Vec<Outcome>> {
        self.load(workspace, DocKind::Outcomes)
    }

    /// Append one outcome record.
    pub fn append_outcome(
        &self,
        workspace: &WorkspaceName,
        outcome: Outcome,
    ) -> OpsgateResult<Outcome> {
        let mut outcomes: Vec<Outcome> = self.outcomes(workspace)?;
        outcomes.push(outcome.clone());
        self.save(workspace, DocKind::Outcomes, &outcomes)?;
        Ok(outcome)
    }

    /// The append-only audit log.
    pub fn audit_log(&self, workspace: &WorkspaceName) -> OpsgateResult<Vec<AuditEntry>> {
        self.load(workspace, DocKind::ActionLog)
    }

    /// Append one audit entry.
    pub fn append_audit(
        &self,
        workspace: &WorkspaceName,
        entry: AuditEntry,
    ) -> OpsgateResult<AuditEntry> {
        let mut log: Vec<AuditEntry> = self.audit_log(workspace)?;
        log.push(entry.clone());
        self.save(workspace, DocKind::ActionLog, &log)?;
        Ok(entry)
    }

    /// All rollback snapshots.
    pub fn snapshots(&self, workspace: &WorkspaceName) -> OpsgateResult<Vec<Snapshot>> {
        self.load(workspace, DocKind::Snapshots)
    }

    /// Append a rollback snapshot of a document about to mutate.
    pub fn snapshot(
        &self,
        workspace: &WorkspaceName,
        doc: impl Into<String>,
        data: Value,
        now: DateTime<Utc>,
    ) -> OpsgateResult<Snapshot> {
        let mut snapshots: Vec<Snapshot> = self.snapshots(workspace)?;
        let snapshot = Snapshot {
            id: uuid::Uuid::new_v4().to_string(),
            doc: doc.into(),
            taken_at: now,
            data,
        };
        snapshots.push(snapshot.clone());
        self.save(workspace, DocKind::Snapshots, &snapshots)?;
        Ok(snapshot)
    }

    // ----- process-wide documents -----

    /// The process-wide role table (`roles.json`).
    pub fn roles(&self) -> OpsgateResult<RoleTable> {
        read_or_default(&self.root.join("roles.json"))
    }

    /// Persist the role table.
    pub fn save_roles(&self, roles: &RoleTable) -> OpsgateResult<()> {
        write_atomic(&self.root.join("roles.json"), roles)
    }

    /// The process-wide invite list (`invites.json`).
    pub fn invites(&self) -> OpsgateResult<Vec<Invite>> {
        read_or_default(&self.root.join("invites.json"))
    }

    /// Persist the invite list.
    pub fn save_invites(&self, invites: &[Invite]) -> OpsgateResult<()> {
        write_atomic(&self.root.join("invites.json"), &invites)
    }
}
