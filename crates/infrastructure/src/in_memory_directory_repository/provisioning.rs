use async_trait::async_trait;

use castellan_application::{ProvisionedSubUser, ProvisioningRepository, RoleAssignmentCommit};
use castellan_core::{AppError, AppResult};
use castellan_domain::Admin;

use super::{InMemoryDirectoryRepository, conflict};

#[async_trait]
impl ProvisioningRepository for InMemoryDirectoryRepository {
    async fn commit_sub_user_creation(&self, sub_user: Admin) -> AppResult<ProvisionedSubUser> {
        let mut state = self.state.write().await;

        let manager_id = sub_user.manager_id().ok_or_else(|| {
            AppError::Validation("sub-users must reference their manager".to_owned())
        })?;
        if state.admins.contains_key(&sub_user.admin_id()) {
            return Err(AppError::Conflict(format!(
                "admin '{}' already exists",
                sub_user.admin_id()
            )));
        }
        if state.email_taken(&sub_user) {
            return Err(AppError::Validation(format!(
                "email '{}' is already registered",
                sub_user.email().as_str()
            )));
        }

        let role = state.role(sub_user.role_id())?;
        if !role.is_active() {
            return Err(AppError::NotFound(format!(
                "role '{}' is not active",
                role.name()
            )));
        }
        let sub_user = sub_user.with_access_level_of(role).with_version(1);

        let mut manager = state.admin(manager_id)?.clone();
        manager.record_sub_user_created(sub_user.created())?;
        let next_version = manager.version() + 1;
        let manager = manager.with_version(next_version);

        state.adjust_assigned(sub_user.role_id(), 1)?;
        state.admins.insert(manager.admin_id(), manager.clone());
        state.admins.insert(sub_user.admin_id(), sub_user.clone());

        Ok(ProvisionedSubUser { sub_user, manager })
    }

    async fn commit_role_assignment(&self, commit: RoleAssignmentCommit) -> AppResult<Admin> {
        let mut state = self.state.write().await;

        let admin = state.admin(commit.admin_id)?.clone();
        if admin.version() != commit.expected_admin_version {
            return Err(conflict(
                "admin",
                commit.admin_id,
                commit.expected_admin_version,
                admin.version(),
            ));
        }

        let role = state.role(commit.role_id)?.clone();
        if role.version() != commit.expected_role_version {
            return Err(conflict(
                "role",
                commit.role_id,
                commit.expected_role_version,
                role.version(),
            ));
        }
        if !role.is_active() {
            return Err(AppError::NotFound(format!(
                "role '{}' is not active",
                role.name()
            )));
        }

        let assigner = state.admin(commit.assigner_id)?;
        if !assigner.is_active() || assigner.role_id() != commit.expected_assigner_role_id {
            return Err(AppError::Conflict(format!(
                "assigner '{}' changed role or status during the assignment",
                commit.assigner_id
            )));
        }

        let previous_role_id = admin.role_id();
        let next = admin
            .with_role(&role, commit.stamp)
            .with_version(admin.version() + 1);

        if previous_role_id != role.role_id() {
            state.adjust_assigned(previous_role_id, -1)?;
            state.adjust_assigned(role.role_id(), 1)?;
        }
        state.admins.insert(next.admin_id(), next.clone());

        Ok(next)
    }
}
