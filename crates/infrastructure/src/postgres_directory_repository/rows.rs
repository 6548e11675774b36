use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use castellan_core::{AppError, AppResult};
use castellan_domain::{
    AccessLevel, Admin, AdminId, AdminRecord, AdminStatus, AuditStamp, AuthMetadata,
    PermissionMatrix, Role, RoleId, RoleRecord, RoleUsageStats,
};

pub(super) const ROLE_COLUMNS: &str = "id, name, display_name, description, level, \
    is_system_role, can_create_sub_roles, max_sub_roles, can_manage_users, max_sub_users, \
    parent_role_id, permissions, is_active, assigned_users_count, created_at, created_by, \
    updated_at, updated_by, version";

pub(super) const ADMIN_COLUMNS: &str = "id, email, role_id, access_level, status, \
    can_create_sub_users, max_sub_users, created_sub_users_count, manager_id, team_id, \
    last_login_at, login_count, created_at, created_by, updated_at, updated_by, version";

#[derive(Debug, FromRow)]
pub(super) struct RoleRow {
    id: Uuid,
    name: String,
    display_name: String,
    description: Option<String>,
    level: i16,
    is_system_role: bool,
    can_create_sub_roles: bool,
    max_sub_roles: Option<i32>,
    can_manage_users: bool,
    max_sub_users: Option<i32>,
    parent_role_id: Option<Uuid>,
    permissions: serde_json::Value,
    is_active: bool,
    assigned_users_count: i32,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    updated_at: DateTime<Utc>,
    updated_by: Option<Uuid>,
    version: i64,
}

impl TryFrom<RoleRow> for Role {
    type Error = AppError;

    fn try_from(row: RoleRow) -> AppResult<Self> {
        Role::from_record(RoleRecord {
            role_id: RoleId::from_uuid(row.id),
            name: row.name,
            display_name: row.display_name,
            description: row.description,
            level: i64::from(row.level),
            is_system_role: row.is_system_role,
            can_create_sub_roles: row.can_create_sub_roles,
            max_sub_roles: row.max_sub_roles.map(to_count).transpose()?,
            can_manage_users: row.can_manage_users,
            max_sub_users: row.max_sub_users.map(to_count).transpose()?,
            parent_role_id: row.parent_role_id.map(RoleId::from_uuid),
            permissions: PermissionMatrix::from_legacy_json(&row.permissions)?,
            is_active: row.is_active,
            usage_stats: RoleUsageStats {
                assigned_users_count: to_count(row.assigned_users_count)?,
            },
            created: stamp(row.created_at, row.created_by),
            updated: stamp(row.updated_at, row.updated_by),
            version: to_version(row.version)?,
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct AdminRow {
    id: Uuid,
    email: String,
    role_id: Uuid,
    access_level: String,
    status: String,
    can_create_sub_users: bool,
    max_sub_users: Option<i32>,
    created_sub_users_count: i32,
    manager_id: Option<Uuid>,
    team_id: Option<String>,
    last_login_at: Option<DateTime<Utc>>,
    login_count: i32,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    updated_at: DateTime<Utc>,
    updated_by: Option<Uuid>,
    version: i64,
}

impl TryFrom<AdminRow> for Admin {
    type Error = AppError;

    fn try_from(row: AdminRow) -> AppResult<Self> {
        Admin::from_record(AdminRecord {
            admin_id: AdminId::from_uuid(row.id),
            email: row.email,
            role_id: RoleId::from_uuid(row.role_id),
            access_level: AccessLevel::from_str(row.access_level.as_str())?,
            status: AdminStatus::from_str(row.status.as_str())?,
            can_create_sub_users: row.can_create_sub_users,
            max_sub_users: row.max_sub_users.map(to_count).transpose()?,
            created_sub_users_count: to_count(row.created_sub_users_count)?,
            manager_id: row.manager_id.map(AdminId::from_uuid),
            team_id: row.team_id,
            auth: AuthMetadata {
                last_login_at: row.last_login_at,
                login_count: to_count(row.login_count)?,
            },
            created: stamp(row.created_at, row.created_by),
            updated: stamp(row.updated_at, row.updated_by),
            version: to_version(row.version)?,
        })
    }
}

pub(super) fn roles_from_rows(rows: Vec<RoleRow>) -> AppResult<Vec<Role>> {
    rows.into_iter().map(Role::try_from).collect()
}

pub(super) fn admins_from_rows(rows: Vec<AdminRow>) -> AppResult<Vec<Admin>> {
    rows.into_iter().map(Admin::try_from).collect()
}

pub(super) fn count_param(value: u32) -> AppResult<i32> {
    i32::try_from(value)
        .map_err(|error| AppError::Validation(format!("count {value} is out of range: {error}")))
}

pub(super) fn optional_count_param(value: Option<u32>) -> AppResult<Option<i32>> {
    value.map(count_param).transpose()
}

pub(super) fn version_param(value: u64) -> AppResult<i64> {
    i64::try_from(value)
        .map_err(|error| AppError::Internal(format!("version {value} is out of range: {error}")))
}

pub(super) fn window_param(value: usize) -> AppResult<i64> {
    i64::try_from(value)
        .map_err(|error| AppError::Validation(format!("invalid pagination value: {error}")))
}

pub(super) fn permissions_param(role: &Role) -> AppResult<serde_json::Value> {
    serde_json::to_value(role.permissions().to_transport()).map_err(|error| {
        AppError::Internal(format!("failed to encode permissions of role '{}': {error}", role.name()))
    })
}

fn to_count(value: i32) -> AppResult<u32> {
    u32::try_from(value)
        .map_err(|error| AppError::Internal(format!("stored count {value} is invalid: {error}")))
}

fn to_version(value: i64) -> AppResult<u64> {
    u64::try_from(value)
        .map_err(|error| AppError::Internal(format!("stored version {value} is invalid: {error}")))
}

fn stamp(at: DateTime<Utc>, by: Option<Uuid>) -> AuditStamp {
    AuditStamp::new(at, by.map(AdminId::from_uuid))
}
