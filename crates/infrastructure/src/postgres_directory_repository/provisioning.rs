use async_trait::async_trait;

use castellan_application::{ProvisionedSubUser, ProvisioningRepository, RoleAssignmentCommit};
use castellan_core::{AppError, AppResult};
use castellan_domain::Admin;

use super::admins::{insert_admin_row, lock_admin};
use super::roles::{adjust_assigned, lock_role};
use super::rows::{count_param, version_param};
use super::{PostgresDirectoryRepository, conflict, database_error};

#[async_trait]
impl ProvisioningRepository for PostgresDirectoryRepository {
    async fn commit_sub_user_creation(&self, sub_user: Admin) -> AppResult<ProvisionedSubUser> {
        let manager_id = sub_user.manager_id().ok_or_else(|| {
            AppError::Validation("sub-users must reference their manager".to_owned())
        })?;

        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| database_error("begin transaction", error))?;

        // The manager row lock serializes concurrent creations against one quota.
        let mut manager = lock_admin(&mut transaction, manager_id).await?;
        let role = lock_role(&mut transaction, sub_user.role_id()).await?;
        if !role.is_active() {
            return Err(AppError::NotFound(format!(
                "role '{}' is not active",
                role.name()
            )));
        }

        manager.record_sub_user_created(sub_user.created())?;
        let next_version = manager.version() + 1;
        let manager = manager.with_version(next_version);
        let counted = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE directory_admins
            SET
                created_sub_users_count = created_sub_users_count + 1,
                updated_at = $2,
                updated_by = $3,
                version = $4
            WHERE id = $1
              AND (max_sub_users IS NULL OR created_sub_users_count < max_sub_users)
            RETURNING created_sub_users_count
            "#,
        )
        .bind(manager.admin_id().as_uuid())
        .bind(manager.updated().at)
        .bind(manager.updated().by.map(|id| id.as_uuid()))
        .bind(version_param(manager.version())?)
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| database_error("update manager quota", error))?;
        if counted != Some(count_param(manager.created_sub_users_count())?) {
            return Err(AppError::QuotaExceeded(format!(
                "admin '{manager_id}' reached its sub-user quota"
            )));
        }

        let sub_user = sub_user.with_access_level_of(&role).with_version(1);
        insert_admin_row(&mut transaction, &sub_user).await?;
        adjust_assigned(&mut transaction, role.role_id(), 1).await?;

        transaction
            .commit()
            .await
            .map_err(|error| database_error("commit transaction", error))?;

        Ok(ProvisionedSubUser { sub_user, manager })
    }

    async fn commit_role_assignment(&self, commit: RoleAssignmentCommit) -> AppResult<Admin> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| database_error("begin transaction", error))?;

        let admin = lock_admin(&mut transaction, commit.admin_id).await?;
        if admin.version() != commit.expected_admin_version {
            return Err(conflict(
                "admin",
                commit.admin_id,
                commit.expected_admin_version,
                admin.version(),
            ));
        }

        let role = lock_role(&mut transaction, commit.role_id).await?;
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

        let assigner = sqlx::query_as::<_, (String, uuid::Uuid)>(
            "SELECT status, role_id FROM directory_admins WHERE id = $1 FOR SHARE",
        )
        .bind(commit.assigner_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| database_error("read assigner", error))?;
        let assigner_unchanged = assigner.is_some_and(|(status, role_id)| {
            status == "active" && role_id == commit.expected_assigner_role_id.as_uuid()
        });
        if !assigner_unchanged {
            return Err(AppError::Conflict(format!(
                "assigner '{}' changed role or status during the assignment",
                commit.assigner_id
            )));
        }

        let previous_role_id = admin.role_id();
        let next = admin
            .with_role(&role, commit.stamp)
            .with_version(admin.version() + 1);
        sqlx::query(
            r#"
            UPDATE directory_admins
            SET role_id = $2, access_level = $3, updated_at = $4, updated_by = $5, version = $6
            WHERE id = $1
            "#,
        )
        .bind(next.admin_id().as_uuid())
        .bind(next.role_id().as_uuid())
        .bind(next.access_level().as_str())
        .bind(next.updated().at)
        .bind(next.updated().by.map(|id| id.as_uuid()))
        .bind(version_param(next.version())?)
        .execute(&mut *transaction)
        .await
        .map_err(|error| database_error("assign role", error))?;

        if previous_role_id != role.role_id() {
            adjust_assigned(&mut transaction, previous_role_id, -1).await?;
            adjust_assigned(&mut transaction, role.role_id(), 1).await?;
        }

        transaction
            .commit()
            .await
            .map_err(|error| database_error("commit transaction", error))?;

        Ok(next)
    }
}
