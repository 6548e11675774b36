//! Role entity, its identifiers and the rules that keep system roles intact.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use castellan_core::{AppError, AppResult, NonEmptyString};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AdminId, PermissionMatrix};

/// Maximum accepted role name length.
pub const ROLE_NAME_MAX_LENGTH: usize = 64;

/// Unique identifier for a role record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a new random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for RoleId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid role id '{value}': {error}")))
    }
}

/// Machine name of a role, matching `[a-z0-9_]+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleName(String);

impl RoleName {
    /// Creates a validated role name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "role name must not be empty".to_owned(),
            ));
        }

        if trimmed.len() > ROLE_NAME_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "role name must not exceed {ROLE_NAME_MAX_LENGTH} characters"
            )));
        }

        if !trimmed
            .chars()
            .all(|character| matches!(character, 'a'..='z' | '0'..='9' | '_'))
        {
            return Err(AppError::Validation(format!(
                "role name '{trimmed}' must only contain lowercase letters, digits and underscores"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the validated name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for RoleName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Privilege rank of a role. Lower values are more privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleLevel(u8);

impl RoleLevel {
    /// Most privileged level.
    pub const HIGHEST: Self = Self(0);
    /// Least privileged level.
    pub const LOWEST: Self = Self(100);

    /// Creates a level, rejecting values outside `0..=100`.
    pub fn new(value: i64) -> AppResult<Self> {
        if !(0..=i64::from(Self::LOWEST.0)).contains(&value) {
            return Err(AppError::InvalidLevel(format!(
                "role level {value} must be between {} and {}",
                Self::HIGHEST.0,
                Self::LOWEST.0
            )));
        }

        u8::try_from(value)
            .map(Self)
            .map_err(|error| AppError::InvalidLevel(format!("role level {value}: {error}")))
    }

    /// Returns the numeric level.
    #[must_use]
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Returns whether this level strictly outranks the other one.
    #[must_use]
    pub fn outranks(&self, other: RoleLevel) -> bool {
        self.0 < other.0
    }
}

impl Display for RoleLevel {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Derived usage counters maintained by the directory store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleUsageStats {
    /// Number of admins currently holding the role.
    pub assigned_users_count: u32,
}

/// Who changed a record and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    /// Change timestamp.
    pub at: DateTime<Utc>,
    /// Acting admin, absent for bootstrap writes.
    pub by: Option<AdminId>,
}

impl AuditStamp {
    /// Creates a stamp for the given actor and time.
    #[must_use]
    pub fn new(at: DateTime<Utc>, by: Option<AdminId>) -> Self {
        Self { at, by }
    }
}

/// Input used to create roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinitionInput {
    /// Machine name.
    pub name: String,
    /// Human-friendly name.
    pub display_name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Requested level; validated into `0..=100`.
    pub level: i64,
    /// Whether holders may create sub-roles.
    pub can_create_sub_roles: bool,
    /// Sub-role quota; `None` is unlimited.
    pub max_sub_roles: Option<u32>,
    /// Whether holders may create sub-users.
    pub can_manage_users: bool,
    /// Default sub-user quota for holders; `None` is unlimited.
    pub max_sub_users: Option<u32>,
    /// Parent in the role tree.
    pub parent_role_id: Option<RoleId>,
    /// Granted actions.
    pub permissions: PermissionMatrix,
}

/// Partial update for a role. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePatch {
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
    /// New sub-role quota; `Some(None)` removes the limit.
    pub max_sub_roles: Option<Option<u32>>,
    /// New sub-user capability.
    pub can_manage_users: Option<bool>,
    /// New sub-user quota; `Some(None)` removes the limit.
    pub max_sub_users: Option<Option<u32>>,
    /// New parent; `Some(None)` detaches the role.
    pub parent_role_id: Option<Option<RoleId>>,
    /// Replacement permission matrix.
    pub permissions: Option<PermissionMatrix>,
}

impl RolePatch {
    /// Returns whether the patch touches the role tree (level or parent).
    #[must_use]
    pub fn touches_hierarchy(&self) -> bool {
        self.level.is_some() || self.parent_role_id.is_some()
    }
}

/// Storage projection used to rehydrate a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRecord {
    /// Role identifier.
    pub role_id: RoleId,
    /// Machine name.
    pub name: String,
    /// Human-friendly name.
    pub display_name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Stored level.
    pub level: i64,
    /// System role marker.
    pub is_system_role: bool,
    /// Sub-role capability.
    pub can_create_sub_roles: bool,
    /// Sub-role quota.
    pub max_sub_roles: Option<u32>,
    /// Sub-user capability.
    pub can_manage_users: bool,
    /// Sub-user quota.
    pub max_sub_users: Option<u32>,
    /// Parent in the role tree.
    pub parent_role_id: Option<RoleId>,
    /// Granted actions.
    pub permissions: PermissionMatrix,
    /// Active flag.
    pub is_active: bool,
    /// Usage counters.
    pub usage_stats: RoleUsageStats,
    /// Creation stamp.
    pub created: AuditStamp,
    /// Last update stamp.
    pub updated: AuditStamp,
    /// Optimistic concurrency version.
    pub version: u64,
}

/// A named, leveled bundle of permissions assignable to admins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    role_id: RoleId,
    name: RoleName,
    display_name: NonEmptyString,
    description: Option<String>,
    level: RoleLevel,
    is_system_role: bool,
    can_create_sub_roles: bool,
    max_sub_roles: Option<u32>,
    can_manage_users: bool,
    max_sub_users: Option<u32>,
    parent_role_id: Option<RoleId>,
    permissions: PermissionMatrix,
    is_active: bool,
    usage_stats: RoleUsageStats,
    created: AuditStamp,
    updated: AuditStamp,
    version: u64,
}

impl Role {
    /// Creates a custom role authored by an admin.
    pub fn new_custom(
        input: RoleDefinitionInput,
        created_by: Option<AdminId>,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        Self::build(input, false, AuditStamp::new(now, created_by))
    }

    /// Creates a protected system role during bootstrap.
    pub fn new_system(input: RoleDefinitionInput, now: DateTime<Utc>) -> AppResult<Self> {
        Self::build(input, true, AuditStamp::new(now, None))
    }

    /// Rehydrates a stored role, revalidating its fields.
    pub fn from_record(record: RoleRecord) -> AppResult<Self> {
        Ok(Self {
            role_id: record.role_id,
            name: RoleName::new(record.name)?,
            display_name: NonEmptyString::new(record.display_name)?,
            description: record.description,
            level: RoleLevel::new(record.level)?,
            is_system_role: record.is_system_role,
            can_create_sub_roles: record.can_create_sub_roles,
            max_sub_roles: record.max_sub_roles,
            can_manage_users: record.can_manage_users,
            max_sub_users: record.max_sub_users,
            parent_role_id: record.parent_role_id,
            permissions: record.permissions,
            is_active: record.is_active,
            usage_stats: record.usage_stats,
            created: record.created,
            updated: record.updated,
            version: record.version,
        })
    }

    fn build(input: RoleDefinitionInput, is_system_role: bool, stamp: AuditStamp) -> AppResult<Self> {
        Ok(Self {
            role_id: RoleId::new(),
            name: RoleName::new(input.name)?,
            display_name: NonEmptyString::new(input.display_name)?,
            description: normalize_description(input.description),
            level: RoleLevel::new(input.level)?,
            is_system_role,
            can_create_sub_roles: input.can_create_sub_roles,
            max_sub_roles: input.max_sub_roles,
            can_manage_users: input.can_manage_users,
            max_sub_users: input.max_sub_users,
            parent_role_id: input.parent_role_id,
            permissions: input.permissions,
            is_active: true,
            usage_stats: RoleUsageStats::default(),
            created: stamp,
            updated: stamp,
            version: 0,
        })
    }

    /// Returns the role identifier.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        self.role_id
    }

    /// Returns the machine name.
    #[must_use]
    pub fn name(&self) -> &RoleName {
        &self.name
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &NonEmptyString {
        &self.display_name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the privilege level.
    #[must_use]
    pub fn level(&self) -> RoleLevel {
        self.level
    }

    /// Returns whether this is a protected system role.
    #[must_use]
    pub fn is_system_role(&self) -> bool {
        self.is_system_role
    }

    /// Returns whether this role was authored by an admin.
    #[must_use]
    pub fn is_custom_role(&self) -> bool {
        !self.is_system_role
    }

    /// Returns whether holders may create sub-roles.
    #[must_use]
    pub fn can_create_sub_roles(&self) -> bool {
        self.can_create_sub_roles
    }

    /// Returns the sub-role quota.
    #[must_use]
    pub fn max_sub_roles(&self) -> Option<u32> {
        self.max_sub_roles
    }

    /// Returns whether holders may create sub-users.
    #[must_use]
    pub fn can_manage_users(&self) -> bool {
        self.can_manage_users
    }

    /// Returns the default sub-user quota for holders.
    #[must_use]
    pub fn max_sub_users(&self) -> Option<u32> {
        self.max_sub_users
    }

    /// Returns the parent role.
    #[must_use]
    pub fn parent_role_id(&self) -> Option<RoleId> {
        self.parent_role_id
    }

    /// Returns the permission matrix.
    #[must_use]
    pub fn permissions(&self) -> &PermissionMatrix {
        &self.permissions
    }

    /// Returns whether the role is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns usage counters.
    #[must_use]
    pub fn usage_stats(&self) -> RoleUsageStats {
        self.usage_stats
    }

    /// Returns the creation stamp.
    #[must_use]
    pub fn created(&self) -> AuditStamp {
        self.created
    }

    /// Returns the last update stamp.
    #[must_use]
    pub fn updated(&self) -> AuditStamp {
        self.updated
    }

    /// Returns the optimistic concurrency version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns a copy with the patch applied.
    ///
    /// System roles only accept description changes; any other field that
    /// would change fails with `SystemRoleImmutable`.
    pub fn patched(&self, patch: &RolePatch, stamp: AuditStamp) -> AppResult<Self> {
        let mut next = self.clone();

        if let Some(name) = &patch.name {
            let name = RoleName::new(name.as_str())?;
            self.guard_protected("name", &self.name, &name)?;
            next.name = name;
        }
        if let Some(display_name) = &patch.display_name {
            let display_name = NonEmptyString::new(display_name.as_str())?;
            self.guard_protected("display_name", &self.display_name, &display_name)?;
            next.display_name = display_name;
        }
        if let Some(description) = &patch.description {
            next.description = normalize_description(description.clone());
        }
        if let Some(level) = patch.level {
            let level = RoleLevel::new(level)?;
            self.guard_protected("level", &self.level, &level)?;
            next.level = level;
        }
        if let Some(value) = patch.can_create_sub_roles {
            self.guard_protected("can_create_sub_roles", &self.can_create_sub_roles, &value)?;
            next.can_create_sub_roles = value;
        }
        if let Some(value) = patch.max_sub_roles {
            self.guard_protected("max_sub_roles", &self.max_sub_roles, &value)?;
            next.max_sub_roles = value;
        }
        if let Some(value) = patch.can_manage_users {
            self.guard_protected("can_manage_users", &self.can_manage_users, &value)?;
            next.can_manage_users = value;
        }
        if let Some(value) = patch.max_sub_users {
            self.guard_protected("max_sub_users", &self.max_sub_users, &value)?;
            next.max_sub_users = value;
        }
        if let Some(parent_role_id) = patch.parent_role_id {
            self.guard_protected("parent_role_id", &self.parent_role_id, &parent_role_id)?;
            if parent_role_id == Some(self.role_id) {
                return Err(AppError::CycleDetected(format!(
                    "role '{}' cannot be its own parent",
                    self.name
                )));
            }
            next.parent_role_id = parent_role_id;
        }
        if let Some(permissions) = &patch.permissions {
            self.guard_protected("permissions", &self.permissions, permissions)?;
            next.permissions = permissions.clone();
        }

        next.updated = stamp;
        Ok(next)
    }

    /// Returns a deactivated copy.
    #[must_use]
    pub fn deactivated(&self, stamp: AuditStamp) -> Self {
        let mut next = self.clone();
        next.is_active = false;
        next.updated = stamp;
        next
    }

    /// Returns a reactivated copy.
    #[must_use]
    pub fn reactivated(&self, stamp: AuditStamp) -> Self {
        let mut next = self.clone();
        next.is_active = true;
        next.updated = stamp;
        next
    }

    /// Fails with `InvalidHierarchy` unless this role is strictly more
    /// privileged than `child`.
    pub fn ensure_outranks_child(&self, child: &Role) -> AppResult<()> {
        if !self.level.outranks(child.level) {
            return Err(AppError::InvalidHierarchy(format!(
                "role '{}' at level {} must stay less privileged than its parent '{}' at level {}",
                child.name, child.level, self.name, self.level
            )));
        }

        Ok(())
    }

    /// Returns whether the parent or the level differs from `other`.
    #[must_use]
    pub fn hierarchy_differs(&self, other: &Role) -> bool {
        self.level != other.level || self.parent_role_id != other.parent_role_id
    }

    /// Returns a copy carrying a store-assigned version.
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Returns a copy carrying store-maintained usage counters.
    #[must_use]
    pub fn with_usage_stats(mut self, usage_stats: RoleUsageStats) -> Self {
        self.usage_stats = usage_stats;
        self
    }

    fn guard_protected<T: PartialEq>(&self, field: &str, current: &T, proposed: &T) -> AppResult<()> {
        if self.is_system_role && current != proposed {
            return Err(AppError::SystemRoleImmutable(format!(
                "field '{field}' of system role '{}' cannot change",
                self.name
            )));
        }

        Ok(())
    }
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
