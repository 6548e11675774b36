use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use castellan_application::{AdminQuery, AdminRepository};
use castellan_core::{AppError, AppResult};
use castellan_domain::{Admin, AdminId, EmailAddress};

use super::roles::{adjust_assigned, lock_role};
use super::rows::{
    ADMIN_COLUMNS, AdminRow, admins_from_rows, count_param, optional_count_param, version_param,
    window_param,
};
use super::{PostgresDirectoryRepository, conflict, database_error, map_unique_violation};

#[async_trait]
impl AdminRepository for PostgresDirectoryRepository {
    async fn find_admin(&self, admin_id: AdminId) -> AppResult<Option<Admin>> {
        let sql = format!("SELECT {ADMIN_COLUMNS} FROM directory_admins WHERE id = $1");
        sqlx::query_as::<_, AdminRow>(sql.as_str())
            .bind(admin_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| database_error("find admin", error))?
            .map(Admin::try_from)
            .transpose()
    }

    async fn find_admin_by_email(&self, email: &EmailAddress) -> AppResult<Option<Admin>> {
        let sql = format!("SELECT {ADMIN_COLUMNS} FROM directory_admins WHERE email = $1");
        sqlx::query_as::<_, AdminRow>(sql.as_str())
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| database_error("find admin by email", error))?
            .map(Admin::try_from)
            .transpose()
    }

    async fn list_admins(&self, query: &AdminQuery) -> AppResult<Vec<Admin>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ADMIN_COLUMNS} FROM directory_admins WHERE TRUE"
        ));
        if let Some(manager_id) = query.manager_id {
            builder.push(" AND manager_id = ");
            builder.push_bind(manager_id.as_uuid());
        }
        if let Some(role_id) = query.role_id {
            builder.push(" AND role_id = ");
            builder.push_bind(role_id.as_uuid());
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ");
            builder.push_bind(status.as_str());
        }
        if let Some(team_id) = &query.team_id {
            builder.push(" AND team_id = ");
            builder.push_bind(team_id.clone());
        }
        builder.push(" ORDER BY email ASC LIMIT ");
        builder.push_bind(window_param(query.limit)?);
        builder.push(" OFFSET ");
        builder.push_bind(window_param(query.offset)?);

        let rows = builder
            .build_query_as::<AdminRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| database_error("list admins", error))?;

        admins_from_rows(rows)
    }

    async fn insert_root_admin(&self, admin: Admin) -> AppResult<Admin> {
        if admin.manager_id().is_some() {
            return Err(AppError::Validation(
                "root admins cannot have a manager".to_owned(),
            ));
        }

        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| database_error("begin transaction", error))?;

        let role = lock_role(&mut transaction, admin.role_id()).await?;
        if !admin.access_level_matches(&role) {
            return Err(AppError::Validation(format!(
                "admin access level '{}' does not match role '{}'",
                admin.access_level().as_str(),
                role.name()
            )));
        }

        let admin = admin.with_version(1);
        insert_admin_row(&mut transaction, &admin).await?;
        adjust_assigned(&mut transaction, admin.role_id(), 1).await?;

        transaction
            .commit()
            .await
            .map_err(|error| database_error("commit transaction", error))?;

        Ok(admin)
    }

    async fn save_admin_status(&self, admin: Admin, expected_version: u64) -> AppResult<Admin> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| database_error("begin transaction", error))?;

        let current = lock_admin(&mut transaction, admin.admin_id()).await?;
        if current.version() != expected_version {
            return Err(conflict(
                "admin",
                admin.admin_id(),
                expected_version,
                current.version(),
            ));
        }

        let next = current
            .transitioned(admin.status(), admin.updated())?
            .with_version(expected_version + 1);
        sqlx::query(
            r#"
            UPDATE directory_admins
            SET status = $2, updated_at = $3, updated_by = $4, version = $5
            WHERE id = $1
            "#,
        )
        .bind(next.admin_id().as_uuid())
        .bind(next.status().as_str())
        .bind(next.updated().at)
        .bind(next.updated().by.map(|id| id.as_uuid()))
        .bind(version_param(next.version())?)
        .execute(&mut *transaction)
        .await
        .map_err(|error| database_error("save admin status", error))?;

        transaction
            .commit()
            .await
            .map_err(|error| database_error("commit transaction", error))?;

        Ok(next)
    }
}

/// Reads an admin and holds its row lock until the transaction ends.
pub(super) async fn lock_admin(
    connection: &mut PgConnection,
    admin_id: AdminId,
) -> AppResult<Admin> {
    let sql = format!("SELECT {ADMIN_COLUMNS} FROM directory_admins WHERE id = $1 FOR UPDATE");
    sqlx::query_as::<_, AdminRow>(sql.as_str())
        .bind(admin_id.as_uuid())
        .fetch_optional(&mut *connection)
        .await
        .map_err(|error| database_error("lock admin", error))?
        .ok_or_else(|| AppError::NotFound(format!("admin '{admin_id}' does not exist")))
        .and_then(Admin::try_from)
}

pub(super) async fn insert_admin_row(connection: &mut PgConnection, admin: &Admin) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO directory_admins (
            id, email, role_id, access_level, status, can_create_sub_users,
            max_sub_users, created_sub_users_count, manager_id, team_id,
            last_login_at, login_count, created_at, created_by, updated_at,
            updated_by, version
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        "#,
    )
    .bind(admin.admin_id().as_uuid())
    .bind(admin.email().as_str())
    .bind(admin.role_id().as_uuid())
    .bind(admin.access_level().as_str())
    .bind(admin.status().as_str())
    .bind(admin.can_create_sub_users())
    .bind(optional_count_param(admin.max_sub_users())?)
    .bind(count_param(admin.created_sub_users_count())?)
    .bind(admin.manager_id().map(|id| id.as_uuid()))
    .bind(admin.team_id())
    .bind(admin.auth().last_login_at)
    .bind(count_param(admin.auth().login_count)?)
    .bind(admin.created().at)
    .bind(admin.created().by.map(|id| id.as_uuid()))
    .bind(admin.updated().at)
    .bind(admin.updated().by.map(|id| id.as_uuid()))
    .bind(version_param(admin.version())?)
    .execute(&mut *connection)
    .await
    .map_err(|error| map_unique_violation("insert admin", error, admin.email().as_str()))?;

    Ok(())
}
