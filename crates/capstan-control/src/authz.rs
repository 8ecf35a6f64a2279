//! The authorization boundary.
//!
//! Capstan does not implement permission policy. Before a state-changing
//! operation runs, the control plane asks the [`Authorizer`] whether the
//! current caller holds the permission the operation requires, scoped to the
//! task being touched. What "the current caller" means and how grants are
//! resolved is the deployment's business.

use std::collections::HashSet;

use async_trait::async_trait;

use capstan_core::TaskId;

use crate::error::Result;
use crate::operation::Permission;

/// Resolves whether the current caller holds a permission.
///
/// The scope is `Some` for per-task operations and `None` for
/// collection-level reads such as the summary.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Returns true if the caller holds `permission` for the given scope.
    ///
    /// An `Err` means the authorizer itself failed (policy backend down);
    /// a denial is `Ok(false)`.
    async fn allows(&self, permission: Permission, scope: Option<&TaskId>) -> Result<bool>;
}

/// An authorizer that grants everything.
///
/// The default for embedded and test use, where the caller is trusted.
#[derive(Debug, Default)]
pub struct PermitAllAuthorizer;

#[async_trait]
impl Authorizer for PermitAllAuthorizer {
    async fn allows(&self, _permission: Permission, _scope: Option<&TaskId>) -> Result<bool> {
        Ok(true)
    }
}

/// An authorizer backed by a fixed grant set.
///
/// Grants are permission-wide; a granted permission applies to every task.
/// Useful for exercising denial paths in tests and for simple deployments
/// with role-shaped access.
#[derive(Debug, Default)]
pub struct StaticAuthorizer {
    grants: HashSet<Permission>,
}

impl StaticAuthorizer {
    /// Creates an authorizer that denies everything.
    #[must_use]
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Creates an authorizer granting exactly the given permissions.
    #[must_use]
    pub fn granting(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            grants: permissions.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn allows(&self, permission: Permission, _scope: Option<&TaskId>) -> Result<bool> {
        Ok(self.grants.contains(&permission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permit_all_grants_everything() -> Result<()> {
        let authz = PermitAllAuthorizer;
        assert!(authz.allows(Permission::View, None).await?);
        assert!(
            authz
                .allows(Permission::Edit, Some(&TaskId::generate()))
                .await?
        );
        Ok(())
    }

    #[tokio::test]
    async fn deny_all_denies_everything() -> Result<()> {
        let authz = StaticAuthorizer::deny_all();
        assert!(!authz.allows(Permission::View, None).await?);
        assert!(!authz.allows(Permission::Edit, None).await?);
        Ok(())
    }

    #[tokio::test]
    async fn static_grants_are_exact() -> Result<()> {
        let authz = StaticAuthorizer::granting([Permission::View]);
        assert!(authz.allows(Permission::View, None).await?);
        assert!(
            !authz
                .allows(Permission::Edit, Some(&TaskId::generate()))
                .await?
        );
        Ok(())
    }
}
