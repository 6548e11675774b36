//! Parent/level relationships of the role tree and sub-role quotas.

use std::collections::HashSet;
use std::sync::Arc;

use castellan_core::{AppError, AppResult};
use castellan_domain::{Role, RoleId, RoleLevel};

use crate::RoleRepository;

/// Default maximum number of parent hops walked before giving up.
pub const DEFAULT_HIERARCHY_HOP_LIMIT: usize = 64;

/// Validates the role tree using role reads only.
#[derive(Clone)]
pub struct RoleHierarchyValidator {
    roles: Arc<dyn RoleRepository>,
    hop_limit: usize,
}

impl RoleHierarchyValidator {
    /// Creates a validator with the given hop limit.
    #[must_use]
    pub fn new(roles: Arc<dyn RoleRepository>, hop_limit: usize) -> Self {
        Self {
            roles,
            hop_limit: hop_limit.max(1),
        }
    }

    /// Checks that `candidate_parent_id` may parent a role at `level`.
    ///
    /// Returns the parent on success.
    pub async fn validate_parent(
        &self,
        role_id: RoleId,
        level: RoleLevel,
        candidate_parent_id: RoleId,
    ) -> AppResult<Role> {
        if candidate_parent_id == role_id {
            return Err(AppError::CycleDetected(format!(
                "role '{role_id}' cannot be its own parent"
            )));
        }

        let parent = self.require_role(candidate_parent_id).await?;
        if !parent.level().outranks(level) {
            return Err(AppError::InvalidHierarchy(format!(
                "parent role '{}' at level {} must be more privileged than level {level}",
                parent.name(),
                parent.level()
            )));
        }

        let mut visited = HashSet::from([role_id, parent.role_id()]);
        let mut cursor = parent.parent_role_id();
        let mut hops = 1;

        while let Some(ancestor_id) = cursor {
            hops += 1;
            if hops > self.hop_limit {
                return Err(AppError::CycleDetected(format!(
                    "ancestor chain of role '{}' exceeds {} hops",
                    parent.name(),
                    self.hop_limit
                )));
            }

            if !visited.insert(ancestor_id) {
                return Err(AppError::CycleDetected(format!(
                    "role '{role_id}' would appear in its own ancestor chain through '{ancestor_id}'"
                )));
            }

            cursor = self
                .roles
                .find_role(ancestor_id)
                .await?
                .and_then(|ancestor| ancestor.parent_role_id());
        }

        Ok(parent)
    }

    /// Checks that every existing child stays less privileged than `level`.
    pub async fn validate_children(&self, role_id: RoleId, level: RoleLevel) -> AppResult<()> {
        let children = self.roles.list_child_roles(role_id).await?;
        if let Some(child) = children.iter().find(|child| !level.outranks(child.level())) {
            return Err(AppError::InvalidHierarchy(format!(
                "child role '{}' at level {} must stay less privileged than level {level}",
                child.name(),
                child.level()
            )));
        }

        Ok(())
    }

    /// Checks that `creator_role` may create a sub-role at `proposed_level`.
    pub async fn validate_sub_role_creation(
        &self,
        creator_role: &Role,
        proposed_level: RoleLevel,
    ) -> AppResult<()> {
        if !creator_role.level().outranks(proposed_level) {
            return Err(AppError::PrivilegeEscalation(format!(
                "role '{}' at level {} cannot create a sub-role at level {proposed_level}",
                creator_role.name(),
                creator_role.level()
            )));
        }

        if !creator_role.can_create_sub_roles() {
            return Err(AppError::QuotaExceeded(format!(
                "role '{}' is not allowed to create sub-roles",
                creator_role.name()
            )));
        }

        if let Some(max_sub_roles) = creator_role.max_sub_roles() {
            let existing = self
                .roles
                .list_child_roles(creator_role.role_id())
                .await?
                .len();
            if existing >= usize::try_from(max_sub_roles).unwrap_or(usize::MAX) {
                return Err(AppError::QuotaExceeded(format!(
                    "role '{}' reached its sub-role quota of {max_sub_roles}",
                    creator_role.name()
                )));
            }
        }

        Ok(())
    }

    /// Walks the ancestor chain of `role`, returning it from parent to root.
    ///
    /// Fails when a link is missing, a parent does not outrank its child, a
    /// role repeats or the chain exceeds the hop limit.
    pub async fn validate_chain(&self, role: &Role) -> AppResult<Vec<Role>> {
        let mut chain: Vec<Role> = Vec::new();
        let mut visited = HashSet::from([role.role_id()]);
        let mut child_level = role.level();
        let mut cursor = role.parent_role_id();

        while let Some(parent_id) = cursor {
            if chain.len() >= self.hop_limit {
                return Err(AppError::CycleDetected(format!(
                    "ancestor chain of role '{}' exceeds {} hops",
                    role.name(),
                    self.hop_limit
                )));
            }

            if !visited.insert(parent_id) {
                return Err(AppError::CycleDetected(format!(
                    "ancestor chain of role '{}' revisits role '{parent_id}'",
                    role.name()
                )));
            }

            let parent = self.roles.find_role(parent_id).await?.ok_or_else(|| {
                AppError::InvalidHierarchy(format!(
                    "ancestor role '{parent_id}' of role '{}' does not exist",
                    role.name()
                ))
            })?;

            if !parent.level().outranks(child_level) {
                return Err(AppError::InvalidHierarchy(format!(
                    "ancestor role '{}' at level {} does not outrank level {child_level}",
                    parent.name(),
                    parent.level()
                )));
            }

            child_level = parent.level();
            cursor = parent.parent_role_id();
            chain.push(parent);
        }

        Ok(chain)
    }

    async fn require_role(&self, role_id: RoleId) -> AppResult<Role> {
        self.roles
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))
    }
}
