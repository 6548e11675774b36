//! Role records, their validation and storage-facing CRUD.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;

use castellan_core::{AppError, AppResult};
use castellan_domain::{AdminId, AuditStamp, Role, RoleDefinitionInput, RoleId, RoleName};

use crate::directory_ports::clamp_limit;
use crate::listing::collect_pages;
use crate::{RoleDraft, RoleHierarchyValidator, RoleQuery, RoleRepository, RoleUpdate, SubRoleQuota};

/// Application service owning role records.
#[derive(Clone)]
pub struct RoleCatalogService {
    repository: Arc<dyn RoleRepository>,
    hierarchy: RoleHierarchyValidator,
}

impl RoleCatalogService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(repository: Arc<dyn RoleRepository>, hierarchy: RoleHierarchyValidator) -> Self {
        Self {
            repository,
            hierarchy,
        }
    }

    /// Returns the hierarchy validator used by this catalog.
    #[must_use]
    pub fn hierarchy(&self) -> &RoleHierarchyValidator {
        &self.hierarchy
    }

    /// Creates a custom role, validating its parent when one is set.
    pub async fn create_role(&self, actor: Option<AdminId>, draft: RoleDraft) -> AppResult<Role> {
        let role = Role::new_custom(draft.into_definition()?, actor, Utc::now())?;
        self.ensure_name_available(role.name(), role.role_id()).await?;

        if let Some(parent_role_id) = role.parent_role_id() {
            self.hierarchy
                .validate_parent(role.role_id(), role.level(), parent_role_id)
                .await?;
        }

        self.repository.insert_role(role, SubRoleQuota::Skip).await
    }

    /// Creates a custom role beneath `creator_role`, counted against its quota.
    ///
    /// The new role is always parented to the creator's role.
    pub async fn create_sub_role(
        &self,
        actor: AdminId,
        creator_role: &Role,
        draft: RoleDraft,
    ) -> AppResult<Role> {
        if draft
            .parent_role_id
            .is_some_and(|parent_role_id| parent_role_id != creator_role.role_id())
        {
            return Err(AppError::InvalidHierarchy(format!(
                "sub-roles of role '{}' must be parented to it",
                creator_role.name()
            )));
        }

        let mut definition = draft.into_definition()?;
        definition.parent_role_id = Some(creator_role.role_id());
        let role = Role::new_custom(definition, Some(actor), Utc::now())?;

        self.hierarchy
            .validate_sub_role_creation(creator_role, role.level())
            .await?;
        self.ensure_name_available(role.name(), role.role_id()).await?;
        self.hierarchy
            .validate_parent(role.role_id(), role.level(), creator_role.role_id())
            .await?;

        self.repository
            .insert_role(role, SubRoleQuota::Enforce)
            .await
    }

    /// Creates a protected system role; used by bootstrap only.
    pub async fn create_system_role(&self, definition: RoleDefinitionInput) -> AppResult<Role> {
        let role = Role::new_system(definition, Utc::now())?;
        if let Some(parent_role_id) = role.parent_role_id() {
            self.hierarchy
                .validate_parent(role.role_id(), role.level(), parent_role_id)
                .await?;
        }

        self.repository.insert_role(role, SubRoleQuota::Skip).await
    }

    /// Applies a partial update.
    pub async fn update_role(
        &self,
        actor: Option<AdminId>,
        role_id: RoleId,
        update: RoleUpdate,
    ) -> AppResult<Role> {
        let current = self.get_role(role_id).await?;
        ensure_version(&current, update.expected_version)?;

        let patch = update.to_patch()?;
        let next = current.patched(&patch, AuditStamp::new(Utc::now(), actor))?;

        if next.name() != current.name() && next.is_active() {
            self.ensure_name_available(next.name(), role_id).await?;
        }

        if patch.touches_hierarchy() {
            if let Some(parent_role_id) = next.parent_role_id() {
                self.hierarchy
                    .validate_parent(role_id, next.level(), parent_role_id)
                    .await?;
            }
            self.hierarchy
                .validate_children(role_id, next.level())
                .await?;
        }

        self.repository.save_role(next, current.version()).await
    }

    /// Deactivates a role with no holders. System roles may be deactivated.
    pub async fn deactivate_role(
        &self,
        actor: Option<AdminId>,
        role_id: RoleId,
        expected_version: Option<u64>,
    ) -> AppResult<Role> {
        let current = self.get_role(role_id).await?;
        ensure_version(&current, expected_version)?;

        if !current.is_active() {
            return Ok(current);
        }

        ensure_unassigned(&current)?;
        let next = current.deactivated(AuditStamp::new(Utc::now(), actor));
        self.repository.save_role(next, current.version()).await
    }

    /// Reactivates a role whose name is still free among active roles.
    pub async fn reactivate_role(
        &self,
        actor: Option<AdminId>,
        role_id: RoleId,
        expected_version: Option<u64>,
    ) -> AppResult<Role> {
        let current = self.get_role(role_id).await?;
        ensure_version(&current, expected_version)?;

        if current.is_active() {
            return Ok(current);
        }

        self.ensure_name_available(current.name(), role_id).await?;
        let next = current.reactivated(AuditStamp::new(Utc::now(), actor));
        self.repository.save_role(next, current.version()).await
    }

    /// Irreversibly deletes a custom role with no holders and no sub-roles.
    pub async fn delete_role(&self, role_id: RoleId, expected_version: Option<u64>) -> AppResult<Role> {
        let current = self.get_role(role_id).await?;
        ensure_version(&current, expected_version)?;

        if current.is_system_role() {
            return Err(AppError::SystemRoleImmutable(format!(
                "system role '{}' cannot be deleted",
                current.name()
            )));
        }

        ensure_unassigned(&current)?;
        if let Some(child) = self.repository.list_child_roles(role_id).await?.first() {
            return Err(AppError::RoleInUse(format!(
                "role '{}' is still the parent of role '{}'",
                current.name(),
                child.name()
            )));
        }

        self.repository
            .delete_role(role_id, current.version())
            .await?;
        Ok(current)
    }

    /// Returns one role.
    pub async fn get_role(&self, role_id: RoleId) -> AppResult<Role> {
        self.repository
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))
    }

    /// Returns one page of roles, stopping once `deadline` passes.
    pub async fn list_roles(
        &self,
        query: RoleQuery,
        deadline: Option<Instant>,
    ) -> AppResult<Vec<Role>> {
        let limit = clamp_limit(query.limit);
        collect_pages(limit, query.offset, deadline, |offset, page_limit| {
            let page_query = RoleQuery {
                limit: page_limit,
                offset,
                ..query.clone()
            };
            let repository = Arc::clone(&self.repository);
            async move { repository.list_roles(&page_query).await }
        })
        .await
    }

    async fn ensure_name_available(&self, name: &RoleName, role_id: RoleId) -> AppResult<()> {
        match self.repository.find_active_role_by_name(name).await? {
            Some(existing) if existing.role_id() != role_id => Err(AppError::DuplicateName(
                format!("an active role named '{name}' already exists"),
            )),
            _ => Ok(()),
        }
    }
}

fn ensure_version(role: &Role, expected_version: Option<u64>) -> AppResult<()> {
    match expected_version {
        Some(expected) if expected != role.version() => Err(AppError::Conflict(format!(
            "role '{}' is at version {} but version {expected} was expected",
            role.name(),
            role.version()
        ))),
        _ => Ok(()),
    }
}

fn ensure_unassigned(role: &Role) -> AppResult<()> {
    let assigned = role.usage_stats().assigned_users_count;
    if assigned > 0 {
        return Err(AppError::RoleInUse(format!(
            "role '{}' is assigned to {assigned} admin(s)",
            role.name()
        )));
    }

    Ok(())
}
