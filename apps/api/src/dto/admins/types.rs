use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Incoming payload for sub-user creation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../../packages/api-types/src/generated/create-admin-request.ts"
)]
pub struct CreateAdminRequest {
    pub email: String,
    pub role_id: String,
    #[serde(default)]
    pub can_create_sub_users: bool,
    #[serde(default)]
    pub max_sub_users: Option<u32>,
    #[serde(default)]
    pub team_id: Option<String>,
}

/// Incoming payload for role assignment.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../../packages/api-types/src/generated/assign-admin-role-request.ts"
)]
pub struct AssignAdminRoleRequest {
    pub role_id: String,
}

/// Query string of admin listings.
#[derive(Debug, Default, Deserialize)]
pub struct AdminListQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub manager_id: Option<String>,
    #[serde(default)]
    pub role_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
}

/// API representation of an admin.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../../packages/api-types/src/generated/admin-response.ts"
)]
pub struct AdminResponse {
    pub admin_id: String,
    pub email: String,
    pub role_id: String,
    pub access_level: String,
    pub status: String,
    pub can_create_sub_users: bool,
    pub max_sub_users: Option<u32>,
    pub created_sub_users_count: u32,
    pub manager_id: Option<String>,
    pub team_id: Option<String>,
    pub last_login_at: Option<String>,
    pub login_count: u32,
    pub created_at: String,
    pub updated_at: String,
    pub version: u64,
}
