//! Answers "may this admin perform this action on this resource".

use std::sync::Arc;

use castellan_core::{AppError, AppResult};
use castellan_domain::{Action, Admin, AdminId, Resource, Role};

use crate::{AdminRepository, RoleRepository};

/// Resolves permissions from fresh directory reads.
#[derive(Clone)]
pub struct PermissionResolver {
    admins: Arc<dyn AdminRepository>,
    roles: Arc<dyn RoleRepository>,
}

impl PermissionResolver {
    /// Creates a new resolver from required dependencies.
    #[must_use]
    pub fn new(admins: Arc<dyn AdminRepository>, roles: Arc<dyn RoleRepository>) -> Self {
        Self { admins, roles }
    }

    /// Pure permission decision.
    ///
    /// Non-active admins are denied. Super admins are allowed without
    /// consulting the permission matrix, unless the supplied role contradicts
    /// the cached access level. Otherwise the admin's own active role must
    /// grant the action on the resource.
    #[must_use]
    pub fn can(admin: &Admin, role: Option<&Role>, resource: Resource, action: Action) -> bool {
        if !admin.is_active() {
            return false;
        }

        if admin.access_level().is_super_admin()
            && role.is_none_or(|role| admin.access_level_matches(role))
        {
            return true;
        }

        role.is_some_and(|role| {
            role.role_id() == admin.role_id()
                && role.is_active()
                && role.permissions().allows(resource, action)
        })
    }

    /// Reads the admin and its role, then applies [`Self::can`].
    ///
    /// Lookup failures deny and are logged.
    pub async fn can_admin(&self, admin_id: AdminId, resource: Resource, action: Action) -> bool {
        match self.load(admin_id).await {
            Ok((admin, role)) => Self::can(&admin, role.as_ref(), resource, action),
            Err(error) => {
                tracing::warn!(
                    admin_id = %admin_id,
                    resource = resource.as_str(),
                    action = action.as_str(),
                    error = %error,
                    "permission lookup failed; denying"
                );
                false
            }
        }
    }

    /// Loads the caller and requires the permission.
    ///
    /// Unknown callers are `Unauthorized`; denied callers are `Forbidden`.
    pub async fn require(
        &self,
        admin_id: AdminId,
        resource: Resource,
        action: Action,
    ) -> AppResult<(Admin, Role)> {
        let (admin, role) = self.load(admin_id).await?;

        if !Self::can(&admin, role.as_ref(), resource, action) {
            return Err(AppError::Forbidden(format!(
                "admin '{admin_id}' lacks '{}.{}'",
                resource.as_str(),
                action.as_str()
            )));
        }

        let role = role.ok_or_else(|| {
            AppError::Internal(format!(
                "admin '{admin_id}' references missing role '{}'",
                admin.role_id()
            ))
        })?;

        Ok((admin, role))
    }

    /// Loads an active caller and its role without a permission check.
    pub async fn require_active(&self, admin_id: AdminId) -> AppResult<(Admin, Role)> {
        let (admin, role) = self.load(admin_id).await?;
        if !admin.is_active() {
            return Err(AppError::Forbidden(format!(
                "admin '{admin_id}' is not active"
            )));
        }

        let role = role.ok_or_else(|| {
            AppError::Internal(format!(
                "admin '{admin_id}' references missing role '{}'",
                admin.role_id()
            ))
        })?;

        Ok((admin, role))
    }

    async fn load(&self, admin_id: AdminId) -> AppResult<(Admin, Option<Role>)> {
        let admin = self
            .admins
            .find_admin(admin_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized(format!("unknown admin '{admin_id}'")))?;
        let role = self.roles.find_role(admin.role_id()).await?;

        Ok((admin, role))
    }
}

#[cfg(test)]
mod tests;
