use async_trait::async_trait;

use castellan_core::AppResult;
use castellan_domain::{
    PermissionMatrix, PermissionMatrixTransport, Role, RoleDefinitionInput, RoleId, RoleLevel,
    RoleName, RolePatch,
};

use super::DEFAULT_LIST_LIMIT;

/// Role origin filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    /// Seeded, protected roles.
    System,
    /// Admin-authored roles.
    Custom,
}

/// Query parameters for role listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleQuery {
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
    /// Excludes deactivated roles.
    pub active_only: bool,
    /// Optional origin filter.
    pub kind: Option<RoleKind>,
    /// Optional parent filter.
    pub parent_role_id: Option<RoleId>,
    /// Keeps only roles strictly less privileged than this level.
    pub outranked_by: Option<RoleLevel>,
}

impl Default for RoleQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
            active_only: false,
            kind: None,
            parent_role_id: None,
            outranked_by: None,
        }
    }
}

impl RoleQuery {
    /// Returns whether a role passes the filters, ignoring pagination.
    #[must_use]
    pub fn matches(&self, role: &Role) -> bool {
        if self.active_only && !role.is_active() {
            return false;
        }

        let kind_matches = match self.kind {
            Some(RoleKind::System) => role.is_system_role(),
            Some(RoleKind::Custom) => role.is_custom_role(),
            None => true,
        };

        kind_matches
            && self
                .parent_role_id
                .is_none_or(|parent_role_id| role.parent_role_id() == Some(parent_role_id))
            && self
                .outranked_by
                .is_none_or(|level| level.outranks(role.level()))
    }
}

/// Whether an insert re-checks the parent's sub-role quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubRoleQuota {
    /// Checks `can_create_sub_roles` and `max_sub_roles` of the parent atomically.
    Enforce,
    /// Inserts without quota accounting (bootstrap and catalog tooling).
    Skip,
}

/// Role creation payload carrying the transport permission shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDraft {
    /// Machine name.
    pub name: String,
    /// Human-friendly name.
    pub display_name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Requested level.
    pub level: i64,
    /// Sub-role capability.
    pub can_create_sub_roles: bool,
    /// Sub-role quota.
    pub max_sub_roles: Option<u32>,
    /// Sub-user capability.
    pub can_manage_users: bool,
    /// Sub-user quota.
    pub max_sub_users: Option<u32>,
    /// Requested parent.
    pub parent_role_id: Option<RoleId>,
    /// Permission grants keyed by resource and action.
    pub permissions: PermissionMatrixTransport,
}

impl RoleDraft {
    /// Parses the permission keys into a domain definition.
    pub fn into_definition(self) -> AppResult<RoleDefinitionInput> {
        Ok(RoleDefinitionInput {
            permissions: PermissionMatrix::from_transport(&self.permissions)?,
            name: self.name,
            display_name: self.display_name,
            description: self.description,
            level: self.level,
            can_create_sub_roles: self.can_create_sub_roles,
            max_sub_roles: self.max_sub_roles,
            can_manage_users: self.can_manage_users,
            max_sub_users: self.max_sub_users,
            parent_role_id: self.parent_role_id,
        })
    }
}

/// Partial role update carrying the transport permission shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleUpdate {
    /// New machine name.
    pub name: Option<String>,
    /// New display name.
    pub display_name: Option<String>,
    /// New description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New level.
    pub level: Option<i64>,
    /// New sub-role capability.
    pub can_create_sub_roles: Option<bool>,
    /// New sub-role quota.
    pub max_sub_roles: Option<Option<u32>>,
    /// New sub-user capability.
    pub can_manage_users: Option<bool>,
    /// New sub-user quota.
    pub max_sub_users: Option<Option<u32>>,
    /// New parent.
    pub parent_role_id: Option<Option<RoleId>>,
    /// Replacement permissions.
    pub permissions: Option<PermissionMatrixTransport>,
    /// Version the caller last read; stale values fail with `Conflict`.
    pub expected_version: Option<u64>,
}

impl RoleUpdate {
    /// Parses the permission keys into a domain patch.
    pub fn to_patch(&self) -> AppResult<RolePatch> {
        Ok(RolePatch {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            level: self.level,
            can_create_sub_roles: self.can_create_sub_roles,
            max_sub_roles: self.max_sub_roles,
            can_manage_users: self.can_manage_users,
            max_sub_users: self.max_sub_users,
            parent_role_id: self.parent_role_id,
            permissions: self
                .permissions
                .as_ref()
                .map(PermissionMatrix::from_transport)
                .transpose()?,
        })
    }
}

/// Repository port for role records.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Finds a role by identifier.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Finds the active role holding a name.
    async fn find_active_role_by_name(&self, name: &RoleName) -> AppResult<Option<Role>>;

    /// Lists roles ordered by level, then name.
    async fn list_roles(&self, query: &RoleQuery) -> AppResult<Vec<Role>>;

    /// Lists roles whose parent is `parent_role_id`, active or not.
    async fn list_child_roles(&self, parent_role_id: RoleId) -> AppResult<Vec<Role>>;

    /// Inserts a role.
    ///
    /// Fails with `DuplicateName` when an active role holds the name, with
    /// `InvalidHierarchy` when the locked parent does not outrank the role and, when
    /// `quota` is `Enforce`, with `QuotaExceeded` when the parent cannot take
    /// another child. All checks happen in the same transaction as the insert.
    async fn insert_role(&self, role: Role, quota: SubRoleQuota) -> AppResult<Role>;

    /// Saves a changed role guarded by `expected_version`.
    ///
    /// A level change re-derives the access level of every holder in the same
    /// transaction. A level or parent change fails with `InvalidHierarchy`
    /// when the stored parent or children, read under the same lock, no longer
    /// order around the new level. Usage counters are store-maintained and
    /// never overwritten.
    async fn save_role(&self, role: Role, expected_version: u64) -> AppResult<Role>;

    /// Hard-deletes a role with no holders and no child roles.
    async fn delete_role(&self, role_id: RoleId, expected_version: u64) -> AppResult<()>;
}
