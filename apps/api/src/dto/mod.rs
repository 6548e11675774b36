mod admins;
mod common;
mod roles;

pub use admins::{
    AdminListQuery, AdminResponse, AssignAdminRoleRequest, CreateAdminRequest,
};
pub use common::{HealthResponse, PageQuery, PermissionCheckQuery, PermissionCheckResponse};
pub use roles::{CreateRoleRequest, RoleListQuery, RoleResponse, UpdateRoleRequest};
