//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod access_level;
mod admin;
mod audit;
mod permission;
mod role;
mod system_roles;

pub use access_level::AccessLevel;
pub use admin::{
    Admin, AdminDefinitionInput, AdminId, AdminRecord, AdminStatus, AuthMetadata, EmailAddress,
};
pub use audit::AuditAction;
pub use permission::{Action, PermissionMatrix, PermissionMatrixTransport, Resource};
pub use role::{
    AuditStamp, ROLE_NAME_MAX_LENGTH, Role, RoleDefinitionInput, RoleId, RoleLevel, RoleName,
    RolePatch, RoleRecord, RoleUsageStats,
};
pub use system_roles::{SUPER_ADMIN_ROLE_NAME, SystemRoleSeed, system_role_seeds};
