use std::str::FromStr;

use castellan_application::{RoleDraft, RoleKind, RoleQuery, RoleUpdate};
use castellan_core::{AppError, AppResult};
use castellan_domain::{AccessLevel, Role, RoleId, RoleLevel};

use super::types::{CreateRoleRequest, RoleListQuery, RoleResponse, UpdateRoleRequest};

impl From<Role> for RoleResponse {
    fn from(value: Role) -> Self {
        Self {
            role_id: value.role_id().to_string(),
            name: value.name().as_str().to_owned(),
            display_name: value.display_name().as_str().to_owned(),
            description: value.description().map(str::to_owned),
            level: value.level().value(),
            access_level: AccessLevel::for_level(value.level()).as_str().to_owned(),
            is_system_role: value.is_system_role(),
            can_create_sub_roles: value.can_create_sub_roles(),
            max_sub_roles: value.max_sub_roles(),
            can_manage_users: value.can_manage_users(),
            max_sub_users: value.max_sub_users(),
            parent_role_id: value.parent_role_id().map(|id| id.to_string()),
            permissions: value.permissions().to_transport(),
            is_active: value.is_active(),
            assigned_users_count: value.usage_stats().assigned_users_count,
            created_at: value.created().at.to_rfc3339(),
            updated_at: value.updated().at.to_rfc3339(),
            version: value.version(),
        }
    }
}

impl From<CreateRoleRequest> for RoleDraft {
    fn from(value: CreateRoleRequest) -> Self {
        Self {
            name: value.name,
            display_name: value.display_name,
            description: value.description,
            level: value.level,
            can_create_sub_roles: value.can_create_sub_roles,
            max_sub_roles: value.max_sub_roles,
            can_manage_users: value.can_manage_users,
            max_sub_users: value.max_sub_users,
            parent_role_id: None,
            permissions: value.permissions,
        }
    }
}

impl TryFrom<UpdateRoleRequest> for RoleUpdate {
    type Error = AppError;

    fn try_from(value: UpdateRoleRequest) -> AppResult<Self> {
        let parent_role_id = value
            .parent_role_id
            .map(|parent| parent.as_deref().map(RoleId::from_str).transpose())
            .transpose()?;

        Ok(Self {
            name: value.name,
            display_name: value.display_name,
            description: value.description,
            level: value.level,
            can_create_sub_roles: value.can_create_sub_roles,
            max_sub_roles: value.max_sub_roles,
            can_manage_users: value.can_manage_users,
            max_sub_users: value.max_sub_users,
            parent_role_id,
            permissions: value.permissions,
            expected_version: value.expected_version,
        })
    }
}

impl TryFrom<RoleListQuery> for RoleQuery {
    type Error = AppError;

    fn try_from(value: RoleListQuery) -> AppResult<Self> {
        let kind = match value.kind.as_deref() {
            None => None,
            Some("system") => Some(RoleKind::System),
            Some("custom") => Some(RoleKind::Custom),
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "role kind must be 'system' or 'custom', got '{other}'"
                )));
            }
        };
        let defaults = RoleQuery::default();

        Ok(Self {
            limit: value.limit.unwrap_or(defaults.limit),
            offset: value.offset.unwrap_or(defaults.offset),
            active_only: value.active_only.unwrap_or(defaults.active_only),
            kind,
            parent_role_id: value
                .parent_role_id
                .as_deref()
                .map(RoleId::from_str)
                .transpose()?,
            outranked_by: value.outranked_by.map(RoleLevel::new).transpose()?,
        })
    }
}
