mod conversions;
mod types;

pub use types::{AdminListQuery, AdminResponse, AssignAdminRoleRequest, CreateAdminRequest};
