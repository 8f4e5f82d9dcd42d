//! Role-based access control resolution.

use opsgate_core::{Identity, OpsAction, Role, RoleTable, WorkspaceName};
use opsgate_error::{OpsgateResult, PermissionError};
use tracing::{debug, instrument};

/// Resolves effective roles and authorizes actions against a role
/// table.
///
/// Resolution is pure: workspace-specific role, then global role,
/// then the default ([`Role::Viewer`]). Authorization fails closed:
/// a missing mapping denies, never silently allows.
#[derive(Debug, Clone, derive_new::new)]
pub struct RbacResolver {
    table: RoleTable,
}

impl RbacResolver {
    /// The effective role for a user in a workspace.
    pub fn role_for(&self, workspace: &WorkspaceName, user: &str) -> Role {
        self.table.role_for(workspace, user)
    }

    /// Authorize an action, returning the resolved role on success.
    #[instrument(skip(self), fields(workspace = %workspace, action = %action, user = %identity.id()))]
    pub fn assert_can(
        &self,
        workspace: &WorkspaceName,
        action: OpsAction,
        identity: &Identity,
    ) -> OpsgateResult<Role> {
        let role = self.role_for(workspace, identity.id());
        if role.allows(action) {
            debug!(%role, "Action permitted");
            Ok(role)
        } else {
            debug!(%role, "Action denied");
            Err(PermissionError::new(format!(
                "role '{}' may not '{}' in workspace '{}'",
                role, action, workspace
            ))
            .into())
        }
    }

    /// The backing role table.
    pub fn table(&self) -> &RoleTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> RbacResolver {
        let mut table = RoleTable::default();
        table.assign("op", WorkspaceName::parse("acme").unwrap(), Role::Operator);
        table.assign_global("boss", Role::Owner);
        RbacResolver::new(table)
    }

    #[test]
    fn test_workspace_role_wins_over_global() {
        let resolver = resolver();
        let acme = WorkspaceName::parse("acme").unwrap();
        let other = WorkspaceName::parse("other").unwrap();
        assert_eq!(resolver.role_for(&acme, "op"), Role::Operator);
        // No workspace entry and no global role: default.
        assert_eq!(resolver.role_for(&other, "op"), Role::Viewer);
        assert_eq!(resolver.role_for(&other, "boss"), Role::Owner);
    }

    #[test]
    fn test_assert_can_fails_closed() {
        let resolver = resolver();
        let acme = WorkspaceName::parse("acme").unwrap();
        let op = Identity::new("op", "Op");
        let stranger = Identity::new("stranger", "Who");

        assert!(resolver.assert_can(&acme, OpsAction::Execute, &op).is_ok());
        assert!(resolver.assert_can(&acme, OpsAction::Approve, &op).is_err());
        assert!(resolver.assert_can(&acme, OpsAction::Read, &stranger).is_ok());
        assert!(resolver.assert_can(&acme, OpsAction::Write, &stranger).is_err());
    }
}
