use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use castellan_application::{RoleKind, RoleQuery, RoleRepository, SubRoleQuota};
use castellan_core::{AppError, AppResult};
use castellan_domain::{AccessLevel, Role, RoleId, RoleName};

use super::rows::{
    ROLE_COLUMNS, RoleRow, optional_count_param, permissions_param, roles_from_rows,
    version_param, window_param,
};
use super::{PostgresDirectoryRepository, conflict, database_error, map_unique_violation};

#[async_trait]
impl RoleRepository for PostgresDirectoryRepository {
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM directory_roles WHERE id = $1");
        sqlx::query_as::<_, RoleRow>(sql.as_str())
            .bind(role_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| database_error("find role", error))?
            .map(Role::try_from)
            .transpose()
    }

    async fn find_active_role_by_name(&self, name: &RoleName) -> AppResult<Option<Role>> {
        let sql = format!(
            "SELECT {ROLE_COLUMNS} FROM directory_roles WHERE name = $1 AND is_active LIMIT 1"
        );
        sqlx::query_as::<_, RoleRow>(sql.as_str())
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| database_error("find role by name", error))?
            .map(Role::try_from)
            .transpose()
    }

    async fn list_roles(&self, query: &RoleQuery) -> AppResult<Vec<Role>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ROLE_COLUMNS} FROM directory_roles WHERE TRUE"
        ));
        if query.active_only {
            builder.push(" AND is_active");
        }
        match query.kind {
            Some(RoleKind::System) => {
                builder.push(" AND is_system_role");
            }
            Some(RoleKind::Custom) => {
                builder.push(" AND NOT is_system_role");
            }
            None => {}
        }
        if let Some(parent_role_id) = query.parent_role_id {
            builder.push(" AND parent_role_id = ");
            builder.push_bind(parent_role_id.as_uuid());
        }
        if let Some(level) = query.outranked_by {
            builder.push(" AND level > ");
            builder.push_bind(i16::from(level.value()));
        }
        builder.push(" ORDER BY level ASC, name ASC, id ASC LIMIT ");
        builder.push_bind(window_param(query.limit)?);
        builder.push(" OFFSET ");
        builder.push_bind(window_param(query.offset)?);

        let rows = builder
            .build_query_as::<RoleRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| database_error("list roles", error))?;

        roles_from_rows(rows)
    }

    async fn list_child_roles(&self, parent_role_id: RoleId) -> AppResult<Vec<Role>> {
        let sql = format!(
            "SELECT {ROLE_COLUMNS} FROM directory_roles WHERE parent_role_id = $1 ORDER BY level, name"
        );
        let rows = sqlx::query_as::<_, RoleRow>(sql.as_str())
            .bind(parent_role_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| database_error("list child roles", error))?;

        roles_from_rows(rows)
    }

    async fn insert_role(&self, role: Role, quota: SubRoleQuota) -> AppResult<Role> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| database_error("begin transaction", error))?;

        if let Some(parent_role_id) = role.parent_role_id() {
            let parent = lock_role(&mut transaction, parent_role_id).await?;
            parent.ensure_outranks_child(&role)?;
            if quota == SubRoleQuota::Enforce {
                if !parent.can_create_sub_roles() {
                    return Err(AppError::QuotaExceeded(format!(
                        "role '{}' is not allowed to create sub-roles",
                        parent.name()
                    )));
                }
                if let Some(max_sub_roles) = parent.max_sub_roles() {
                    let children = child_count(&mut transaction, parent_role_id).await?;
                    if children >= i64::from(max_sub_roles) {
                        return Err(AppError::QuotaExceeded(format!(
                            "role '{}' reached its sub-role quota of {max_sub_roles}",
                            parent.name()
                        )));
                    }
                }
            }
        }

        let role = role.with_version(1);
        sqlx::query(
            r#"
            INSERT INTO directory_roles (
                id, name, display_name, description, level, is_system_role,
                can_create_sub_roles, max_sub_roles, can_manage_users, max_sub_users,
                parent_role_id, permissions, is_active, assigned_users_count,
                created_at, created_by, updated_at, updated_by, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 0, $14, $15, $16, $17, 1)
            "#,
        )
        .bind(role.role_id().as_uuid())
        .bind(role.name().as_str())
        .bind(role.display_name().as_str())
        .bind(role.description())
        .bind(i16::from(role.level().value()))
        .bind(role.is_system_role())
        .bind(role.can_create_sub_roles())
        .bind(optional_count_param(role.max_sub_roles())?)
        .bind(role.can_manage_users())
        .bind(optional_count_param(role.max_sub_users())?)
        .bind(role.parent_role_id().map(|id| id.as_uuid()))
        .bind(permissions_param(&role)?)
        .bind(role.is_active())
        .bind(role.created().at)
        .bind(role.created().by.map(|id| id.as_uuid()))
        .bind(role.updated().at)
        .bind(role.updated().by.map(|id| id.as_uuid()))
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_unique_violation("insert role", error, role.name().as_str()))?;

        transaction
            .commit()
            .await
            .map_err(|error| database_error("commit transaction", error))?;

        Ok(role)
    }

    async fn save_role(&self, role: Role, expected_version: u64) -> AppResult<Role> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| database_error("begin transaction", error))?;

        let neighbourhood = lock_hierarchy(&mut transaction, &role).await?;
        let current = neighbourhood
            .iter()
            .find(|locked| locked.role_id() == role.role_id())
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("role '{}' does not exist", role.role_id())))?;
        if current.version() != expected_version {
            return Err(conflict(
                "role",
                role.role_id(),
                expected_version,
                current.version(),
            ));
        }

        if role.hierarchy_differs(&current) {
            if let Some(parent_role_id) = role.parent_role_id() {
                neighbourhood
                    .iter()
                    .find(|locked| locked.role_id() == parent_role_id)
                    .ok_or_else(|| {
                        AppError::NotFound(format!("role '{parent_role_id}' does not exist"))
                    })?
                    .ensure_outranks_child(&role)?;
            }
            for child in neighbourhood.iter().filter(|locked| {
                locked.parent_role_id() == Some(role.role_id()) && locked.role_id() != role.role_id()
            }) {
                role.ensure_outranks_child(child)?;
            }
        }

        let role = role
            .with_usage_stats(current.usage_stats())
            .with_version(expected_version + 1);
        sqlx::query(
            r#"
            UPDATE directory_roles
            SET
                name = $2,
                display_name = $3,
                description = $4,
                level = $5,
                can_create_sub_roles = $6,
                max_sub_roles = $7,
                can_manage_users = $8,
                max_sub_users = $9,
                parent_role_id = $10,
                permissions = $11,
                is_active = $12,
                updated_at = $13,
                updated_by = $14,
                version = $15
            WHERE id = $1
            "#,
        )
        .bind(role.role_id().as_uuid())
        .bind(role.name().as_str())
        .bind(role.display_name().as_str())
        .bind(role.description())
        .bind(i16::from(role.level().value()))
        .bind(role.can_create_sub_roles())
        .bind(optional_count_param(role.max_sub_roles())?)
        .bind(role.can_manage_users())
        .bind(optional_count_param(role.max_sub_users())?)
        .bind(role.parent_role_id().map(|id| id.as_uuid()))
        .bind(permissions_param(&role)?)
        .bind(role.is_active())
        .bind(role.updated().at)
        .bind(role.updated().by.map(|id| id.as_uuid()))
        .bind(version_param(role.version())?)
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_unique_violation("save role", error, role.name().as_str()))?;

        if role.level() != current.level() {
            sqlx::query(
                r#"
                UPDATE directory_admins
                SET access_level = $2, version = version + 1
                WHERE role_id = $1
                "#,
            )
            .bind(role.role_id().as_uuid())
            .bind(AccessLevel::for_level(role.level()).as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| database_error("re-derive access levels", error))?;
        }

        transaction
            .commit()
            .await
            .map_err(|error| database_error("commit transaction", error))?;

        Ok(role)
    }

    async fn delete_role(&self, role_id: RoleId, expected_version: u64) -> AppResult<()> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| database_error("begin transaction", error))?;

        let current = lock_role(&mut transaction, role_id).await?;
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
        if child_count(&mut transaction, role_id).await? > 0 {
            return Err(AppError::RoleInUse(format!(
                "role '{}' still has sub-roles",
                current.name()
            )));
        }

        sqlx::query("DELETE FROM directory_roles WHERE id = $1")
            .bind(role_id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| database_error("delete role", error))?;

        transaction
            .commit()
            .await
            .map_err(|error| database_error("commit transaction", error))?;

        Ok(())
    }
}

/// Reads a role and holds its row lock until the transaction ends.
pub(super) async fn lock_role(connection: &mut PgConnection, role_id: RoleId) -> AppResult<Role> {
    let sql = format!("SELECT {ROLE_COLUMNS} FROM directory_roles WHERE id = $1 FOR UPDATE");
    sqlx::query_as::<_, RoleRow>(sql.as_str())
        .bind(role_id.as_uuid())
        .fetch_optional(&mut *connection)
        .await
        .map_err(|error| database_error("lock role", error))?
        .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))
        .and_then(Role::try_from)
}

/// Locks a role together with its proposed parent and its children.
///
/// Rows are locked in id order so concurrent saves of neighbouring roles
/// queue behind each other instead of deadlocking.
async fn lock_hierarchy(connection: &mut PgConnection, role: &Role) -> AppResult<Vec<Role>> {
    let sql = format!(
        r#"
        SELECT {ROLE_COLUMNS}
        FROM directory_roles
        WHERE id = $1 OR id = $2 OR parent_role_id = $1
        ORDER BY id
        FOR UPDATE
        "#
    );
    let rows = sqlx::query_as::<_, RoleRow>(sql.as_str())
        .bind(role.role_id().as_uuid())
        .bind(role.parent_role_id().map(|id| id.as_uuid()))
        .fetch_all(&mut *connection)
        .await
        .map_err(|error| database_error("lock role hierarchy", error))?;

    roles_from_rows(rows)
}

/// Moves the assignment counter of a role by `delta`.
pub(super) async fn adjust_assigned(
    connection: &mut PgConnection,
    role_id: RoleId,
    delta: i32,
) -> AppResult<()> {
    let updated = sqlx::query(
        r#"
        UPDATE directory_roles
        SET assigned_users_count = assigned_users_count + $2
        WHERE id = $1 AND assigned_users_count + $2 >= 0
        "#,
    )
    .bind(role_id.as_uuid())
    .bind(delta)
    .execute(&mut *connection)
    .await
    .map_err(|error| database_error("update role usage", error))?;

    if updated.rows_affected() != 1 {
        return Err(AppError::Internal(format!(
            "assignment counter of role '{role_id}' cannot move by {delta}"
        )));
    }

    Ok(())
}

async fn child_count(connection: &mut PgConnection, parent_role_id: RoleId) -> AppResult<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM directory_roles WHERE parent_role_id = $1")
        .bind(parent_role_id.as_uuid())
        .fetch_one(&mut *connection)
        .await
        .map_err(|error| database_error("count child roles", error))
}
