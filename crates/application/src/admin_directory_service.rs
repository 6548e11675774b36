//! Admin records, the manager/sub-user relation and its quotas.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;

use castellan_core::{AppError, AppResult};
use castellan_domain::{
    Admin, AdminDefinitionInput, AdminId, AdminStatus, AuditStamp, EmailAddress, Role, RoleId,
};

use crate::directory_ports::clamp_limit;
use crate::listing::collect_pages;
use crate::{AdminQuery, AdminRepository, RoleRepository};

/// Status change applied to an admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminStatusChange {
    /// Admin before the change.
    pub before: Admin,
    /// Admin after the change.
    pub after: Admin,
}

/// Application service owning admin records and provisioning rules.
#[derive(Clone)]
pub struct AdminDirectoryService {
    admins: Arc<dyn AdminRepository>,
    roles: Arc<dyn RoleRepository>,
}

impl AdminDirectoryService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(admins: Arc<dyn AdminRepository>, roles: Arc<dyn RoleRepository>) -> Self {
        Self { admins, roles }
    }

    /// Returns one admin.
    pub async fn get_admin(&self, admin_id: AdminId) -> AppResult<Admin> {
        self.admins
            .find_admin(admin_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("admin '{admin_id}' does not exist")))
    }

    /// Returns one admin together with its role.
    pub async fn get_admin_with_role(&self, admin_id: AdminId) -> AppResult<(Admin, Role)> {
        let admin = self.get_admin(admin_id).await?;
        let role = self.roles.find_role(admin.role_id()).await?.ok_or_else(|| {
            AppError::Internal(format!(
                "admin '{admin_id}' references missing role '{}'",
                admin.role_id()
            ))
        })?;

        Ok((admin, role))
    }

    /// Returns one page of admins, stopping once `deadline` passes.
    pub async fn list_admins(
        &self,
        query: AdminQuery,
        deadline: Option<Instant>,
    ) -> AppResult<Vec<Admin>> {
        let limit = clamp_limit(query.limit);
        collect_pages(limit, query.offset, deadline, |offset, page_limit| {
            let page_query = AdminQuery {
                limit: page_limit,
                offset,
                ..query.clone()
            };
            let admins = Arc::clone(&self.admins);
            async move { admins.list_admins(&page_query).await }
        })
        .await
    }

    /// Returns the admins created by `manager_id`.
    pub async fn list_sub_users(
        &self,
        manager_id: AdminId,
        limit: usize,
        offset: usize,
        deadline: Option<Instant>,
    ) -> AppResult<Vec<Admin>> {
        self.list_admins(
            AdminQuery {
                limit,
                offset,
                manager_id: Some(manager_id),
                ..AdminQuery::default()
            },
            deadline,
        )
        .await
    }

    /// Validates a sub-user creation and builds the new admin.
    ///
    /// The quota check here is advisory; the provisioning store re-checks it
    /// atomically with the insert.
    pub async fn prepare_sub_user(
        &self,
        creator: &Admin,
        creator_role: &Role,
        input: AdminDefinitionInput,
    ) -> AppResult<Admin> {
        if !creator.is_active() || !creator.can_create_sub_users() {
            return Err(AppError::Forbidden(format!(
                "admin '{}' is not allowed to create sub-users",
                creator.admin_id()
            )));
        }

        if !creator.has_sub_user_capacity() {
            return Err(AppError::QuotaExceeded(format!(
                "admin '{}' reached its sub-user quota of {}",
                creator.admin_id(),
                creator.max_sub_users().unwrap_or_default()
            )));
        }

        let role = self.require_active_role(input.role_id).await?;
        if !is_super_admin(creator, creator_role) && !creator_role.level().outranks(role.level()) {
            return Err(AppError::PrivilegeEscalation(format!(
                "role '{}' at level {} cannot provision role '{}' at level {}",
                creator_role.name(),
                creator_role.level(),
                role.name(),
                role.level()
            )));
        }

        let email = EmailAddress::new(input.email.as_str())?;
        if self.admins.find_admin_by_email(&email).await?.is_some() {
            return Err(AppError::Validation(format!(
                "email '{}' is already registered",
                email.as_str()
            )));
        }

        Admin::new_sub_user(input, &role, creator, Utc::now())
    }

    /// Checks that `assigner` may move `target` to `new_role`.
    ///
    /// Super admins may assign any active role. Everyone else must outrank
    /// both the new role and the target's current role.
    pub fn check_role_assignment(
        &self,
        assigner: &Admin,
        assigner_role: &Role,
        target: &Admin,
        target_role: &Role,
        new_role: &Role,
    ) -> AppResult<()> {
        if !assigner.is_active() {
            return Err(AppError::Forbidden(format!(
                "admin '{}' is not active",
                assigner.admin_id()
            )));
        }

        if !new_role.is_active() {
            return Err(AppError::NotFound(format!(
                "role '{}' is not active",
                new_role.name()
            )));
        }

        if target.status() == AdminStatus::Inactive {
            return Err(AppError::Validation(format!(
                "admin '{}' is inactive",
                target.admin_id()
            )));
        }

        if is_super_admin(assigner, assigner_role) {
            return Ok(());
        }

        if !assigner_role.level().outranks(new_role.level()) {
            return Err(AppError::PrivilegeEscalation(format!(
                "role '{}' at level {} cannot assign role '{}' at level {}",
                assigner_role.name(),
                assigner_role.level(),
                new_role.name(),
                new_role.level()
            )));
        }

        if !assigner_role.level().outranks(target_role.level()) {
            return Err(AppError::PrivilegeEscalation(format!(
                "role '{}' at level {} cannot reassign an admin holding role '{}' at level {}",
                assigner_role.name(),
                assigner_role.level(),
                target_role.name(),
                target_role.level()
            )));
        }

        Ok(())
    }

    /// Moves an admin through its lifecycle without touching quotas.
    pub async fn change_status(
        &self,
        actor: Option<AdminId>,
        admin_id: AdminId,
        status: AdminStatus,
    ) -> AppResult<AdminStatusChange> {
        let before = self.get_admin(admin_id).await?;
        let next = before.transitioned(status, AuditStamp::new(Utc::now(), actor))?;
        let after = self.admins.save_admin_status(next, before.version()).await?;

        Ok(AdminStatusChange { before, after })
    }

    /// Returns an active role or `NotFound`.
    pub async fn require_active_role(&self, role_id: RoleId) -> AppResult<Role> {
        match self.roles.find_role(role_id).await? {
            Some(role) if role.is_active() => Ok(role),
            Some(role) => Err(AppError::NotFound(format!(
                "role '{}' is not active",
                role.name()
            ))),
            None => Err(AppError::NotFound(format!("role '{role_id}' does not exist"))),
        }
    }
}

/// Returns whether the admin is a super admin according to fresh reads of
/// both the admin and its role.
#[must_use]
pub fn is_super_admin(admin: &Admin, role: &Role) -> bool {
    admin.access_level().is_super_admin() && admin.access_level_matches(role)
}
