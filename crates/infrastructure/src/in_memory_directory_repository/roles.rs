use async_trait::async_trait;

use castellan_application::{RoleQuery, RoleRepository, SubRoleQuota};
use castellan_core::{AppError, AppResult};
use castellan_domain::{Role, RoleId, RoleName};

use super::{InMemoryDirectoryRepository, conflict};

#[async_trait]
impl RoleRepository for InMemoryDirectoryRepository {
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.state.read().await.roles.get(&role_id).cloned())
    }

    async fn find_active_role_by_name(&self, name: &RoleName) -> AppResult<Option<Role>> {
        Ok(self
            .state
            .read()
            .await
            .roles
            .values()
            .find(|role| role.is_active() && role.name() == name)
            .cloned())
    }

    async fn list_roles(&self, query: &RoleQuery) -> AppResult<Vec<Role>> {
        let state = self.state.read().await;

        let mut roles: Vec<Role> = state
            .roles
            .values()
            .filter(|role| query.matches(role))
            .cloned()
            .collect();
        roles.sort_by(|left, right| {
            left.level()
                .cmp(&right.level())
                .then_with(|| left.name().cmp(right.name()))
                .then_with(|| left.role_id().cmp(&right.role_id()))
        });

        Ok(roles
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn list_child_roles(&self, parent_role_id: RoleId) -> AppResult<Vec<Role>> {
        let state = self.state.read().await;

        let mut children: Vec<Role> = state
            .roles
            .values()
            .filter(|role| role.parent_role_id() == Some(parent_role_id))
            .cloned()
            .collect();
        children.sort_by_key(|role| role.level());

        Ok(children)
    }

    async fn insert_role(&self, role: Role, quota: SubRoleQuota) -> AppResult<Role> {
        let mut state = self.state.write().await;

        if state.roles.contains_key(&role.role_id()) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.role_id()
            )));
        }
        state.ensure_active_name_free(&role)?;

        if let Some(parent_role_id) = role.parent_role_id() {
            let parent = state.role(parent_role_id)?;
            parent.ensure_outranks_child(&role)?;
            if quota == SubRoleQuota::Enforce {
                if !parent.can_create_sub_roles() {
                    return Err(AppError::QuotaExceeded(format!(
                        "role '{}' is not allowed to create sub-roles",
                        parent.name()
                    )));
                }

                if let Some(max_sub_roles) = parent.max_sub_roles()
                    && state.child_count(parent_role_id)
                        >= usize::try_from(max_sub_roles).unwrap_or(usize::MAX)
                {
                    return Err(AppError::QuotaExceeded(format!(
                        "role '{}' reached its sub-role quota of {max_sub_roles}",
                        parent.name()
                    )));
                }
            }
        }

        let role = role.with_version(1);
        state.roles.insert(role.role_id(), role.clone());

        Ok(role)
    }

    async fn save_role(&self, role: Role, expected_version: u64) -> AppResult<Role> {
        let mut state = self.state.write().await;

        let current = state.role(role.role_id())?.clone();
        if current.version() != expected_version {
            return Err(conflict(
                "role",
                role.role_id(),
                expected_version,
                current.version(),
            ));
        }
        state.ensure_active_name_free(&role)?;
        if role.hierarchy_differs(&current) {
            state.ensure_hierarchy(&role)?;
        }

        let role = role
            .with_usage_stats(current.usage_stats())
            .with_version(current.version() + 1);

        if role.level() != current.level() {
            for admin in state.admins.values_mut() {
                if admin.role_id() == role.role_id() {
                    let next_version = admin.version() + 1;
                    *admin = admin.with_access_level_of(&role).with_version(next_version);
                }
            }
        }

        state.roles.insert(role.role_id(), role.clone());

        Ok(role)
    }

    async fn delete_role(&self, role_id: RoleId, expected_version: u64) -> AppResult<()> {
        let mut state = self.state.write().await;

        let current = state.role(role_id)?;
        if current.version() != expected_version {
            return Err(conflict("role", role_id, expected_version, current.version()));
        }

        let assigned = current.usage_stats().assigned_users_count;
        if assigned > 0 {
            return Err(AppError::RoleInUse(format!(
                "role '{}' is assigned to {assigned} admin(s)",
                current.name()
            )));
        }

        if state.child_count(role_id) > 0 {
            return Err(AppError::RoleInUse(format!(
                "role '{}' still has sub-roles",
                current.name()
            )));
        }

        state.roles.remove(&role_id);

        Ok(())
    }
}
