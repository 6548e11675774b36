mod admins;
mod audit;
mod provisioning;
mod roles;

pub use admins::{AdminQuery, AdminRepository};
pub use audit::{AuditEvent, AuditRepository};
pub use provisioning::{ProvisionedSubUser, ProvisioningRepository, RoleAssignmentCommit};
pub use roles::{RoleDraft, RoleKind, RoleQuery, RoleRepository, RoleUpdate, SubRoleQuota};

/// Default page size for directory listings.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Upper bound for one listing request.
pub const MAX_LIST_LIMIT: usize = 500;

pub(crate) fn clamp_limit(limit: usize) -> usize {
    if limit == 0 {
        DEFAULT_LIST_LIMIT
    } else {
        limit.min(MAX_LIST_LIMIT)
    }
}
