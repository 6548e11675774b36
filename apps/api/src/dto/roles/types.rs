use castellan_domain::PermissionMatrixTransport;
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

/// Incoming payload for sub-role creation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../../packages/api-types/src/generated/create-role-request.ts"
)]
pub struct CreateRoleRequest {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub level: i64,
    #[serde(default)]
    pub can_create_sub_roles: bool,
    #[serde(default)]
    pub max_sub_roles: Option<u32>,
    #[serde(default)]
    pub can_manage_users: bool,
    #[serde(default)]
    pub max_sub_users: Option<u32>,
    #[serde(default)]
    pub permissions: PermissionMatrixTransport,
}

/// Incoming partial role update. `null` clears nullable fields; absent
/// fields are left untouched.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../../packages/api-types/src/generated/update-role-request.ts"
)]
pub struct UpdateRoleRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub level: Option<i64>,
    #[serde(default)]
    pub can_create_sub_roles: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub max_sub_roles: Option<Option<u32>>,
    #[serde(default)]
    pub can_manage_users: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub max_sub_users: Option<Option<u32>>,
    #[serde(default, deserialize_with = "present")]
    pub parent_role_id: Option<Option<String>>,
    #[serde(default)]
    pub permissions: Option<PermissionMatrixTransport>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// Query string of role listings.
#[derive(Debug, Default, Deserialize)]
pub struct RoleListQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub active_only: Option<bool>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub parent_role_id: Option<String>,
    #[serde(default)]
    pub outranked_by: Option<i64>,
}

/// API representation of a role.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../../packages/api-types/src/generated/role-response.ts"
)]
pub struct RoleResponse {
    pub role_id: String,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub level: u8,
    pub access_level: String,
    pub is_system_role: bool,
    pub can_create_sub_roles: bool,
    pub max_sub_roles: Option<u32>,
    pub can_manage_users: bool,
    pub max_sub_users: Option<u32>,
    pub parent_role_id: Option<String>,
    pub permissions: PermissionMatrixTransport,
    pub is_active: bool,
    pub assigned_users_count: u32,
    pub created_at: String,
    pub updated_at: String,
    pub version: u64,
}

/// Keeps an explicit `null` distinguishable from an absent field.
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
