//! Roles, actions, and role assignments.

use crate::WorkspaceName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

/// The closed 4-tier role model, ordered by capability.
///
/// `Viewer < Operator < Admin < Owner`. The default for unknown users
/// is [`Role::Viewer`]; resolution fails closed, never open.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    /// Read-only access
    Viewer,
    /// Day-to-day operation: writes and workflow execution
    Operator,
    /// Approvals, guard configuration, team administration
    Admin,
    /// Everything, including guard auto-execution
    Owner,
}

impl Default for Role {
    fn default() -> Self {
        Role::Viewer
    }
}

/// The closed set of RBAC-gated actions.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OpsAction {
    /// Read ops documents
    Read,
    /// Mutate ops documents
    Write,
    /// Resolve approvals
    Approve,
    /// Run workflows
    Execute,
    /// Team and invite administration
    Admin,
    /// Change guard policy
    GuardConfig,
    /// Authorize autonomous guard execution
    GuardAutoExecute,
}

impl Role {
    /// The minimum role that grants an action.
    fn floor(action: OpsAction) -> Role {
        match action {
            OpsAction::Read => Role::Viewer,
            OpsAction::Write | OpsAction::Execute => Role::Operator,
            OpsAction::Approve | OpsAction::Admin | OpsAction::GuardConfig => Role::Admin,
            OpsAction::GuardAutoExecute => Role::Owner,
        }
    }

    /// Whether this role grants the given action.
    pub fn allows(&self, action: OpsAction) -> bool {
        *self >= Role::floor(action)
    }
}

/// Role assignment for one user: a global role plus per-workspace
/// overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, derive_getters::Getters)]
pub struct RoleAssignment {
    /// Role applied when no workspace override exists
    #[serde(default)]
    global_role: Option<Role>,
    /// Workspace-specific role overrides
    #[serde(default)]
    workspaces: HashMap<WorkspaceName, Role>,
}

impl RoleAssignment {
    /// Create an assignment with only a global role.
    pub fn global(role: Role) -> Self {
        Self {
            global_role: Some(role),
            workspaces: HashMap::new(),
        }
    }

    /// Set the role for one workspace.
    pub fn set_workspace_role(&mut self, workspace: WorkspaceName, role: Role) {
        self.workspaces.insert(workspace, role);
    }

    /// Set the global role.
    pub fn set_global_role(&mut self, role: Role) {
        self.global_role = Some(role);
    }

    /// Resolve the effective role for a workspace:
    /// workspace override, then global role, then the default.
    pub fn resolve(&self, workspace: &WorkspaceName) -> Role {
        self.workspaces
            .get(workspace)
            .copied()
            .or(self.global_role)
            .unwrap_or_default()
    }
}

/// The process-wide role table, keyed by user id.
///
/// Persisted as `roles.json` at the storage root, not per workspace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleTable {
    /// Assignments by user id
    #[serde(default)]
    pub users: HashMap<String, RoleAssignment>,
}

impl RoleTable {
    /// Resolve the effective role for a user in a workspace.
    ///
    /// Unknown users resolve to the default role.
    pub fn role_for(&self, workspace: &WorkspaceName, user: &str) -> Role {
        self.users
            .get(user)
            .map(|a| a.resolve(workspace))
            .unwrap_or_default()
    }

    /// Assign a workspace-scoped role, creating the user entry if absent.
    pub fn assign(&mut self, user: impl Into<String>, workspace: WorkspaceName, role: Role) {
        self.users
            .entry(user.into())
            .or_default()
            .set_workspace_role(workspace, role);
    }

    /// Assign a global role, creating the user entry if absent.
    pub fn assign_global(&mut self, user: impl Into<String>, role: Role) {
        self.users.entry(user.into()).or_default().set_global_role(role);
    }
}
