//! Core data types for the Opsgate control plane.
//!
//! This crate provides the foundation data types shared across the
//! Opsgate workspace: tenant names, roles and actions, the ops
//! documents (alerts, approvals, schedules, sources, invites, leads),
//! policy configuration with typed patches, risk tiers, and the wire
//! envelope.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod alert;
mod approval;
mod envelope;
mod identity;
mod invite;
mod lead;
mod policy;
mod rbac;
mod record;
mod risk;
mod schedule;
mod source;
mod state;
mod workspace;

pub use alert::{Alert, AlertSeverity, AlertStatus, NewAlert, NewAlertBuilder};
pub use approval::{Approval, ApprovalStatus, NewApproval, NewApprovalBuilder};
pub use envelope::{Envelope, ErrorBody, ExecuteMeta};
pub use identity::Identity;
pub use invite::{Invite, InviteStatus, mask_token};
pub use lead::{Lead, LeadBuilder, LeadStatus};
pub use policy::{
    GuardLimits, GuardLimitsPatch, GuardMode, GuardPolicy, GuardPolicyPatch, GuardThresholds,
    GuardThresholdsPatch, OpsPolicy, OpsPolicyPatch,
};
pub use rbac::{OpsAction, Role, RoleAssignment, RoleTable};
pub use record::{AuditEntry, Outcome};
pub use risk::{RiskTier, risk_for_action, risk_table};
pub use schedule::{Repeat, Schedule, ScheduleBuilder};
pub use source::{Connector, Source, SourceInput, SourceStatus, SyncMode};
pub use state::WorkspaceState;
pub use workspace::WorkspaceName;
