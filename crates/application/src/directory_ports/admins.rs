use async_trait::async_trait;

use castellan_core::AppResult;
use castellan_domain::{Admin, AdminId, AdminStatus, EmailAddress, RoleId};

use super::DEFAULT_LIST_LIMIT;

/// Query parameters for admin listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminQuery {
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
    /// Optional manager filter.
    pub manager_id: Option<AdminId>,
    /// Optional role filter.
    pub role_id: Option<RoleId>,
    /// Optional status filter.
    pub status: Option<AdminStatus>,
    /// Optional team filter.
    pub team_id: Option<String>,
}

impl Default for AdminQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
            manager_id: None,
            role_id: None,
            status: None,
            team_id: None,
        }
    }
}

impl AdminQuery {
    /// Returns whether an admin passes the filters, ignoring pagination.
    #[must_use]
    pub fn matches(&self, admin: &Admin) -> bool {
        self.manager_id
            .is_none_or(|manager_id| admin.manager_id() == Some(manager_id))
            && self.role_id.is_none_or(|role_id| admin.role_id() == role_id)
            && self.status.is_none_or(|status| admin.status() == status)
            && self
                .team_id
                .as_deref()
                .is_none_or(|team_id| admin.team_id() == Some(team_id))
    }
}

/// Repository port for admin records.
///
/// Writes that touch more than one record go through
/// [`crate::ProvisioningRepository`].
#[async_trait]
pub trait AdminRepository: Send + Sync {
    /// Finds an admin by identifier.
    async fn find_admin(&self, admin_id: AdminId) -> AppResult<Option<Admin>>;

    /// Finds an admin by login email.
    async fn find_admin_by_email(&self, email: &EmailAddress) -> AppResult<Option<Admin>>;

    /// Lists admins ordered by email.
    async fn list_admins(&self, query: &AdminQuery) -> AppResult<Vec<Admin>>;

    /// Inserts a manager-less admin and counts it on its role.
    async fn insert_root_admin(&self, admin: Admin) -> AppResult<Admin>;

    /// Saves a status change guarded by `expected_version`.
    async fn save_admin_status(&self, admin: Admin, expected_version: u64) -> AppResult<Admin>;
}
