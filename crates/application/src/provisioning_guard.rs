//! Authorized, audited entry point for every directory mutation.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};

use castellan_core::{AppError, AppResult};
use castellan_domain::{
    Action, Admin, AdminDefinitionInput, AdminId, AdminStatus, AuditAction, AuditStamp, Resource,
    Role, RoleId, RoleLevel,
};

use crate::admin_directory_service::is_super_admin;
use crate::{
    AdminDirectoryService, AuditEvent, AuditRepository, MAX_LIST_LIMIT, PermissionResolver,
    ProvisioningRepository, RoleAssignmentCommit, RoleCatalogService, RoleDraft, RoleQuery,
    RoleUpdate,
};

/// Default number of retries after a store `Conflict`.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

const ROLE_RESOURCE_TYPE: &str = "directory_role";
const ADMIN_RESOURCE_TYPE: &str = "directory_admin";

/// Orchestrates role and sub-user provisioning.
#[derive(Clone)]
pub struct ProvisioningGuard {
    catalog: RoleCatalogService,
    directory: AdminDirectoryService,
    resolver: PermissionResolver,
    provisioning: Arc<dyn ProvisioningRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    max_conflict_retries: u32,
}

impl ProvisioningGuard {
    /// Creates a new guard from required dependencies.
    #[must_use]
    pub fn new(
        catalog: RoleCatalogService,
        directory: AdminDirectoryService,
        resolver: PermissionResolver,
        provisioning: Arc<dyn ProvisioningRepository>,
        audit_repository: Arc<dyn AuditRepository>,
        max_conflict_retries: u32,
    ) -> Self {
        Self {
            catalog,
            directory,
            resolver,
            provisioning,
            audit_repository,
            max_conflict_retries,
        }
    }

    /// Creates a sub-user managed by the actor.
    pub async fn create_admin(&self, actor: AdminId, input: AdminDefinitionInput) -> AppResult<Admin> {
        let provisioned = self
            .retry_on_conflict("create_admin", || {
                let input = input.clone();
                async move {
                    let (creator, creator_role) = self.resolver.require_active(actor).await?;
                    let sub_user = self
                        .directory
                        .prepare_sub_user(&creator, &creator_role, input)
                        .await?;
                    self.provisioning.commit_sub_user_creation(sub_user).await
                }
            })
            .await?;

        tracing::info!(
            actor = %actor,
            admin_id = %provisioned.sub_user.admin_id(),
            created_sub_users_count = provisioned.manager.created_sub_users_count(),
            "sub-user provisioned"
        );
        self.emit(
            actor,
            AuditAction::AdminCreated,
            ADMIN_RESOURCE_TYPE,
            provisioned.sub_user.admin_id().to_string(),
            None,
            Some(admin_snapshot(&provisioned.sub_user)),
        )
        .await;

        Ok(provisioned.sub_user)
    }

    /// Moves an admin to another role.
    pub async fn assign_role(
        &self,
        actor: AdminId,
        admin_id: AdminId,
        role_id: RoleId,
    ) -> AppResult<Admin> {
        let (before, after) = self
            .retry_on_conflict("assign_role", || async move {
                let (assigner, assigner_role) = self
                    .resolver
                    .require(actor, Resource::RoleManagement, Action::Assign)
                    .await?;
                let (target, target_role) = self.directory.get_admin_with_role(admin_id).await?;
                let new_role = self.catalog.get_role(role_id).await?;

                self.directory.check_role_assignment(
                    &assigner,
                    &assigner_role,
                    &target,
                    &target_role,
                    &new_role,
                )?;
                self.catalog.hierarchy().validate_chain(&new_role).await?;

                let after = self
                    .provisioning
                    .commit_role_assignment(RoleAssignmentCommit {
                        admin_id,
                        expected_admin_version: target.version(),
                        role_id,
                        expected_role_version: new_role.version(),
                        assigner_id: actor,
                        expected_assigner_role_id: assigner_role.role_id(),
                        stamp: AuditStamp::new(Utc::now(), Some(actor)),
                    })
                    .await?;

                Ok::<_, AppError>((target, after))
            })
            .await?;

        self.emit(
            actor,
            AuditAction::AdminRoleAssigned,
            ADMIN_RESOURCE_TYPE,
            admin_id.to_string(),
            Some(admin_snapshot(&before)),
            Some(admin_snapshot(&after)),
        )
        .await;

        Ok(after)
    }

    /// Suspends, reactivates or retires an admin the actor outranks.
    pub async fn change_admin_status(
        &self,
        actor: AdminId,
        admin_id: AdminId,
        status: AdminStatus,
    ) -> AppResult<Admin> {
        let change = self
            .retry_on_conflict("change_admin_status", || async move {
                let (caller, caller_role) = self
                    .resolver
                    .require(actor, Resource::UserManagement, Action::Update)
                    .await?;
                if caller.admin_id() == admin_id {
                    return Err(AppError::Forbidden(
                        "admins cannot change their own status".to_owned(),
                    ));
                }

                let (_, target_role) = self.directory.get_admin_with_role(admin_id).await?;
                if !is_super_admin(&caller, &caller_role)
                    && !caller_role.level().outranks(target_role.level())
                {
                    return Err(AppError::PrivilegeEscalation(format!(
                        "role '{}' cannot change the status of an admin holding role '{}'",
                        caller_role.name(),
                        target_role.name()
                    )));
                }

                self.directory
                    .change_status(Some(actor), admin_id, status)
                    .await
            })
            .await?;

        self.emit(
            actor,
            AuditAction::AdminStatusChanged,
            ADMIN_RESOURCE_TYPE,
            admin_id.to_string(),
            Some(admin_snapshot(&change.before)),
            Some(admin_snapshot(&change.after)),
        )
        .await;

        Ok(change.after)
    }

    /// Creates a sub-role beneath the actor's role.
    pub async fn create_sub_role(&self, actor: AdminId, draft: RoleDraft) -> AppResult<Role> {
        let role = self
            .retry_on_conflict("create_sub_role", || {
                let draft = draft.clone();
                async move {
                    let (_, creator_role) = self
                        .resolver
                        .require(actor, Resource::RoleManagement, Action::Create)
                        .await?;
                    self.catalog
                        .create_sub_role(actor, &creator_role, draft)
                        .await
                }
            })
            .await?;

        self.emit(
            actor,
            AuditAction::RoleCreated,
            ROLE_RESOURCE_TYPE,
            role.role_id().to_string(),
            None,
            Some(role_snapshot(&role)),
        )
        .await;

        Ok(role)
    }

    /// Updates a role the actor outranks.
    pub async fn update_role(
        &self,
        actor: AdminId,
        role_id: RoleId,
        update: RoleUpdate,
    ) -> AppResult<Role> {
        let (before, after) = self
            .retry_on_conflict("update_role", || {
                let mut update = update.clone();
                async move {
                    let before = self
                        .authorize_role_update(actor, role_id, &update)
                        .await?;
                    update.expected_version = update.expected_version.or(Some(before.version()));
                    let after = self.catalog.update_role(Some(actor), role_id, update).await?;
                    Ok::<_, AppError>((before, after))
                }
            })
            .await?;

        self.emit(
            actor,
            AuditAction::RoleUpdated,
            ROLE_RESOURCE_TYPE,
            role_id.to_string(),
            Some(role_snapshot(&before)),
            Some(role_snapshot(&after)),
        )
        .await;

        Ok(after)
    }

    /// Deactivates a role the actor outranks.
    pub async fn deactivate_role(&self, actor: AdminId, role_id: RoleId) -> AppResult<Role> {
        let (before, after) = self
            .retry_on_conflict("deactivate_role", || async move {
                let before = self
                    .authorize_role_change(actor, role_id, Action::Update)
                    .await?;
                let after = self
                    .catalog
                    .deactivate_role(Some(actor), role_id, Some(before.version()))
                    .await?;
                Ok::<_, AppError>((before, after))
            })
            .await?;

        self.emit(
            actor,
            AuditAction::RoleDeactivated,
            ROLE_RESOURCE_TYPE,
            role_id.to_string(),
            Some(role_snapshot(&before)),
            Some(role_snapshot(&after)),
        )
        .await;

        Ok(after)
    }

    /// Reactivates a role the actor outranks.
    pub async fn reactivate_role(&self, actor: AdminId, role_id: RoleId) -> AppResult<Role> {
        let (before, after) = self
            .retry_on_conflict("reactivate_role", || async move {
                let before = self
                    .authorize_role_change(actor, role_id, Action::Update)
                    .await?;
                let after = self
                    .catalog
                    .reactivate_role(Some(actor), role_id, Some(before.version()))
                    .await?;
                Ok::<_, AppError>((before, after))
            })
            .await?;

        self.emit(
            actor,
            AuditAction::RoleReactivated,
            ROLE_RESOURCE_TYPE,
            role_id.to_string(),
            Some(role_snapshot(&before)),
            Some(role_snapshot(&after)),
        )
        .await;

        Ok(after)
    }

    /// Irreversibly deletes a custom role the actor outranks.
    pub async fn delete_role(&self, actor: AdminId, role_id: RoleId) -> AppResult<()> {
        let deleted = self
            .retry_on_conflict("delete_role", || async move {
                let before = self
                    .authorize_role_change(actor, role_id, Action::Delete)
                    .await?;
                self.catalog
                    .delete_role(role_id, Some(before.version()))
                    .await
            })
            .await?;

        tracing::info!(actor = %actor, role_id = %role_id, "role deleted");
        self.emit(
            actor,
            AuditAction::RoleDeleted,
            ROLE_RESOURCE_TYPE,
            role_id.to_string(),
            Some(role_snapshot(&deleted)),
            None,
        )
        .await;

        Ok(())
    }

    /// Returns the active roles the requester may hand out.
    ///
    /// Super admins get every active role; everyone else gets the active roles
    /// strictly below their own level.
    pub async fn list_assignable_roles(&self, requester: AdminId) -> AppResult<Vec<Role>> {
        let (admin, role) = self.resolver.require_active(requester).await?;
        let outranked_by = (!is_super_admin(&admin, &role)).then(|| role.level());

        let mut roles = Vec::new();
        loop {
            let page = self
                .catalog
                .list_roles(
                    RoleQuery {
                        limit: MAX_LIST_LIMIT,
                        offset: roles.len(),
                        active_only: true,
                        outranked_by,
                        ..RoleQuery::default()
                    },
                    None,
                )
                .await?;
            let exhausted = page.len() < MAX_LIST_LIMIT;
            roles.extend(page);
            if exhausted {
                break;
            }
        }

        Ok(roles)
    }

    async fn authorize_role_change(
        &self,
        actor: AdminId,
        role_id: RoleId,
        action: Action,
    ) -> AppResult<Role> {
        let (role, _) = self.authorize_role_access(actor, role_id, action).await?;
        Ok(role)
    }

    /// Also bounds the patched level and parent by the actor's own level.
    async fn authorize_role_update(
        &self,
        actor: AdminId,
        role_id: RoleId,
        update: &RoleUpdate,
    ) -> AppResult<Role> {
        let (role, ceiling) = self
            .authorize_role_access(actor, role_id, Action::Update)
            .await?;
        let Some(actor_role) = ceiling else {
            return Ok(role);
        };

        if let Some(level) = update.level {
            let level = RoleLevel::new(level)?;
            if !actor_role.level().outranks(level) {
                return Err(AppError::PrivilegeEscalation(format!(
                    "role '{}' at level {} cannot move role '{}' to level {level}",
                    actor_role.name(),
                    actor_role.level(),
                    role.name()
                )));
            }
        }

        if let Some(Some(parent_role_id)) = update.parent_role_id
            && parent_role_id != actor_role.role_id()
        {
            let parent = self.catalog.get_role(parent_role_id).await?;
            if !actor_role.level().outranks(parent.level()) {
                return Err(AppError::PrivilegeEscalation(format!(
                    "role '{}' at level {} cannot parent role '{}' to role '{}' at level {}",
                    actor_role.name(),
                    actor_role.level(),
                    role.name(),
                    parent.name(),
                    parent.level()
                )));
            }
        }

        Ok(role)
    }

    /// Returns the role and, unless the actor is a super admin, the actor's
    /// role bounding what the actor may change.
    async fn authorize_role_access(
        &self,
        actor: AdminId,
        role_id: RoleId,
        action: Action,
    ) -> AppResult<(Role, Option<Role>)> {
        let (admin, actor_role) = self
            .resolver
            .require(actor, Resource::RoleManagement, action)
            .await?;
        let role = self.catalog.get_role(role_id).await?;

        if is_super_admin(&admin, &actor_role) {
            return Ok((role, None));
        }

        if !actor_role.level().outranks(role.level()) {
            return Err(AppError::PrivilegeEscalation(format!(
                "role '{}' at level {} cannot change role '{}' at level {}",
                actor_role.name(),
                actor_role.level(),
                role.name(),
                role.level()
            )));
        }

        Ok((role, Some(actor_role)))
    }

    async fn retry_on_conflict<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(error) if error.is_conflict() && retries < self.max_conflict_retries => {
                    retries += 1;
                    tracing::debug!(operation, retries, error = %error, "retrying after conflict");
                }
                result => return result,
            }
        }
    }

    async fn emit(
        &self,
        actor: AdminId,
        action: AuditAction,
        resource_type: &str,
        resource_id: String,
        before: Option<Value>,
        after: Option<Value>,
    ) {
        let event = AuditEvent {
            actor: Some(actor),
            action,
            resource_type: resource_type.to_owned(),
            resource_id,
            before,
            after,
            occurred_at: Utc::now(),
        };

        if let Err(error) = self.audit_repository.append_event(event).await {
            tracing::warn!(
                action = action.as_str(),
                error = %error,
                "audit event could not be recorded"
            );
        }
    }
}

pub(crate) fn role_snapshot(role: &Role) -> Value {
    json!({
        "role_id": role.role_id().to_string(),
        "name": role.name().as_str(),
        "level": role.level().value(),
        "is_system_role": role.is_system_role(),
        "is_active": role.is_active(),
        "parent_role_id": role.parent_role_id().map(|id| id.to_string()),
        "can_create_sub_roles": role.can_create_sub_roles(),
        "max_sub_roles": role.max_sub_roles(),
        "can_manage_users": role.can_manage_users(),
        "max_sub_users": role.max_sub_users(),
        "permissions": role.permissions().to_transport(),
        "version": role.version(),
    })
}

pub(crate) fn admin_snapshot(admin: &Admin) -> Value {
    json!({
        "admin_id": admin.admin_id().to_string(),
        "email": admin.email().as_str(),
        "role_id": admin.role_id().to_string(),
        "access_level": admin.access_level().as_str(),
        "status": admin.status().as_str(),
        "can_create_sub_users": admin.can_create_sub_users(),
        "max_sub_users": admin.max_sub_users(),
        "created_sub_users_count": admin.created_sub_users_count(),
        "manager_id": admin.manager_id().map(|id| id.to_string()),
        "version": admin.version(),
    })
}

#[cfg(test)]
mod tests;
