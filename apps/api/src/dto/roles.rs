mod conversions;
mod types;

pub use types::{CreateRoleRequest, RoleListQuery, RoleResponse, UpdateRoleRequest};
