use async_trait::async_trait;

use castellan_core::AppResult;
use castellan_domain::{Admin, AdminId, AuditStamp, RoleId};

/// Result of a committed sub-user creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedSubUser {
    /// Newly inserted admin.
    pub sub_user: Admin,
    /// Manager after its counter was incremented.
    pub manager: Admin,
}

/// Role reassignment to commit atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignmentCommit {
    /// Admin receiving the role.
    pub admin_id: AdminId,
    /// Admin version read during validation.
    pub expected_admin_version: u64,
    /// Role being assigned.
    pub role_id: RoleId,
    /// Role version read during validation.
    pub expected_role_version: u64,
    /// Acting admin.
    pub assigner_id: AdminId,
    /// Role the assigner held during validation.
    pub expected_assigner_role_id: RoleId,
    /// Change stamp.
    pub stamp: AuditStamp,
}

/// Port for the multi-record writes of provisioning.
#[async_trait]
pub trait ProvisioningRepository: Send + Sync {
    /// Inserts a sub-user and counts it against its manager's quota.
    ///
    /// The manager's capability and quota are re-checked, the counter is
    /// incremented and the sub-user inserted in one serializing transaction.
    /// Concurrent calls never overshoot the quota.
    async fn commit_sub_user_creation(&self, sub_user: Admin) -> AppResult<ProvisionedSubUser>;

    /// Moves an admin to another role, swapping role usage counters.
    ///
    /// Fails with `Conflict` when the admin or role changed since they were
    /// read, or when the assigner no longer holds the expected role.
    async fn commit_role_assignment(&self, commit: RoleAssignmentCommit) -> AppResult<Admin>;
}
