use std::str::FromStr;

use castellan_application::AdminQuery;
use castellan_core::{AppError, AppResult};
use castellan_domain::{Admin, AdminDefinitionInput, AdminId, AdminStatus, RoleId};

use super::types::{AdminListQuery, AdminResponse, CreateAdminRequest};

impl From<Admin> for AdminResponse {
    fn from(value: Admin) -> Self {
        let auth = value.auth();
        Self {
            admin_id: value.admin_id().to_string(),
            email: value.email().as_str().to_owned(),
            role_id: value.role_id().to_string(),
            access_level: value.access_level().as_str().to_owned(),
            status: value.status().as_str().to_owned(),
            can_create_sub_users: value.can_create_sub_users(),
            max_sub_users: value.max_sub_users(),
            created_sub_users_count: value.created_sub_users_count(),
            manager_id: value.manager_id().map(|id| id.to_string()),
            team_id: value.team_id().map(str::to_owned),
            last_login_at: auth.last_login_at.map(|at| at.to_rfc3339()),
            login_count: auth.login_count,
            created_at: value.created().at.to_rfc3339(),
            updated_at: value.updated().at.to_rfc3339(),
            version: value.version(),
        }
    }
}

impl TryFrom<CreateAdminRequest> for AdminDefinitionInput {
    type Error = AppError;

    fn try_from(value: CreateAdminRequest) -> AppResult<Self> {
        Ok(Self {
            email: value.email,
            role_id: RoleId::from_str(value.role_id.as_str())?,
            can_create_sub_users: value.can_create_sub_users,
            max_sub_users: value.max_sub_users,
            team_id: value.team_id,
        })
    }
}

impl TryFrom<AdminListQuery> for AdminQuery {
    type Error = AppError;

    fn try_from(value: AdminListQuery) -> AppResult<Self> {
        let defaults = AdminQuery::default();

        Ok(Self {
            limit: value.limit.unwrap_or(defaults.limit),
            offset: value.offset.unwrap_or(defaults.offset),
            manager_id: value
                .manager_id
                .as_deref()
                .map(AdminId::from_str)
                .transpose()?,
            role_id: value.role_id.as_deref().map(RoleId::from_str).transpose()?,
            status: value
                .status
                .as_deref()
                .map(AdminStatus::from_str)
                .transpose()?,
            team_id: value.team_id,
        })
    }
}
