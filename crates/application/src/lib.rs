//! Application services and ports.

#![forbid(unsafe_code)]

mod admin_directory_service;
mod directory_bootstrap_service;
mod directory_ports;
mod listing;
mod permission_resolver;
mod provisioning_guard;
mod role_catalog_service;
mod role_hierarchy;

#[cfg(test)]
mod test_support;

pub use admin_directory_service::{AdminDirectoryService, AdminStatusChange, is_super_admin};
pub use directory_bootstrap_service::{BootstrapReport, DirectoryBootstrapService};
pub use directory_ports::{
    AdminQuery, AdminRepository, AuditEvent, AuditRepository, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT,
    ProvisionedSubUser, ProvisioningRepository, RoleAssignmentCommit, RoleDraft, RoleKind,
    RoleQuery, RoleRepository, RoleUpdate, SubRoleQuota,
};
pub use permission_resolver::PermissionResolver;
pub use provisioning_guard::{DEFAULT_MAX_CONFLICT_RETRIES, ProvisioningGuard};
pub use role_catalog_service::RoleCatalogService;
pub use role_hierarchy::{DEFAULT_HIERARCHY_HOP_LIMIT, RoleHierarchyValidator};
