//! Admin accounts and their organizational (manager) relation.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use castellan_core::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AccessLevel, AuditStamp, Role, RoleId};

/// Unique identifier for an admin record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdminId(Uuid);

impl AdminId {
    /// Creates a new random admin identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an admin identifier from an existing UUID value.
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

impl Default for AdminId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for AdminId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for AdminId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid admin id '{value}': {error}")))
    }
}

/// Validated email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Creates a validated, lowercased email address.
    ///
    /// Performs basic structural validation: non-empty, contains exactly one `@`,
    /// local part and domain are non-empty, domain contains at least one `.`.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim().to_lowercase();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "email address must not be empty".to_owned(),
            ));
        }

        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(AppError::Validation(
                "email address must contain exactly one '@'".to_owned(),
            ));
        };

        if domain.contains('@') {
            return Err(AppError::Validation(
                "email address must contain exactly one '@'".to_owned(),
            ));
        }

        if local.is_empty() {
            return Err(AppError::Validation(
                "email local part must not be empty".to_owned(),
            ));
        }

        if domain.is_empty() || !domain.contains('.') {
            return Err(AppError::Validation(
                "email domain must contain at least one '.'".to_owned(),
            ));
        }

        if trimmed.len() > 254 {
            return Err(AppError::Validation(
                "email address must not exceed 254 characters".to_owned(),
            ));
        }

        Ok(Self(trimmed))
    }

    /// Returns the validated email string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminStatus {
    /// Account may act.
    Active,
    /// Temporarily blocked; may be reactivated.
    Suspended,
    /// Retired; terminal.
    Inactive,
}

impl AdminStatus {
    /// Returns the storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Inactive => "inactive",
        }
    }

    /// Returns whether moving to `next` is a legal lifecycle step.
    #[must_use]
    pub fn can_transition_to(&self, next: AdminStatus) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Suspended)
                | (Self::Suspended, Self::Active)
                | (Self::Active | Self::Suspended, Self::Inactive)
        )
    }
}

impl FromStr for AdminStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "inactive" => Ok(Self::Inactive),
            _ => Err(AppError::Validation(format!(
                "unknown admin status '{value}'"
            ))),
        }
    }
}

/// Login metadata owned by the identity provider; read-only here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthMetadata {
    /// Last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
    /// Number of successful logins.
    pub login_count: u32,
}

/// Input used to create sub-users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminDefinitionInput {
    /// Login email; immutable afterwards.
    pub email: String,
    /// Role to hold.
    pub role_id: RoleId,
    /// Requested sub-user capability, capped by the role.
    pub can_create_sub_users: bool,
    /// Requested sub-user quota, capped by the role.
    pub max_sub_users: Option<u32>,
    /// Optional team grouping.
    pub team_id: Option<String>,
}

/// Storage projection used to rehydrate an admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRecord {
    /// Admin identifier.
    pub admin_id: AdminId,
    /// Login email.
    pub email: String,
    /// Held role.
    pub role_id: RoleId,
    /// Stored access level label.
    pub access_level: AccessLevel,
    /// Lifecycle status.
    pub status: AdminStatus,
    /// Sub-user capability.
    pub can_create_sub_users: bool,
    /// Sub-user quota.
    pub max_sub_users: Option<u32>,
    /// Sub-users created so far.
    pub created_sub_users_count: u32,
    /// Creating admin.
    pub manager_id: Option<AdminId>,
    /// Team grouping.
    pub team_id: Option<String>,
    /// Identity provider metadata.
    pub auth: AuthMetadata,
    /// Creation stamp.
    pub created: AuditStamp,
    /// Last update stamp.
    pub updated: AuditStamp,
    /// Optimistic concurrency version.
    pub version: u64,
}

/// An account of the administrative console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admin {
    admin_id: AdminId,
    email: EmailAddress,
    role_id: RoleId,
    access_level: AccessLevel,
    status: AdminStatus,
    can_create_sub_users: bool,
    max_sub_users: Option<u32>,
    created_sub_users_count: u32,
    manager_id: Option<AdminId>,
    team_id: Option<String>,
    auth: AuthMetadata,
    created: AuditStamp,
    updated: AuditStamp,
    version: u64,
}

impl Admin {
    /// Creates a root admin without a manager, used only at bootstrap.
    pub fn new_root(email: impl Into<String>, role: &Role, now: DateTime<Utc>) -> AppResult<Self> {
        let stamp = AuditStamp::new(now, None);
        Ok(Self {
            admin_id: AdminId::new(),
            email: EmailAddress::new(email)?,
            role_id: role.role_id(),
            access_level: AccessLevel::for_level(role.level()),
            status: AdminStatus::Active,
            can_create_sub_users: role.can_manage_users(),
            max_sub_users: role.max_sub_users(),
            created_sub_users_count: 0,
            manager_id: None,
            team_id: None,
            auth: AuthMetadata::default(),
            created: stamp,
            updated: stamp,
            version: 0,
        })
    }

    /// Creates a sub-user managed by `manager` and holding `role`.
    ///
    /// The requested sub-user capability and quota are capped by the role's.
    pub fn new_sub_user(
        input: AdminDefinitionInput,
        role: &Role,
        manager: &Admin,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        if input.role_id != role.role_id() {
            return Err(AppError::Validation(format!(
                "admin input references role '{}' but role '{}' was supplied",
                input.role_id,
                role.role_id()
            )));
        }

        let stamp = AuditStamp::new(now, Some(manager.admin_id));
        let can_create_sub_users = input.can_create_sub_users && role.can_manage_users();
        let max_sub_users = match (input.max_sub_users, role.max_sub_users()) {
            (Some(requested), Some(cap)) => Some(requested.min(cap)),
            (requested, cap) => requested.or(cap),
        };

        Ok(Self {
            admin_id: AdminId::new(),
            email: EmailAddress::new(input.email)?,
            role_id: role.role_id(),
            access_level: AccessLevel::for_level(role.level()),
            status: AdminStatus::Active,
            can_create_sub_users,
            max_sub_users,
            created_sub_users_count: 0,
            manager_id: Some(manager.admin_id),
            team_id: input
                .team_id
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
            auth: AuthMetadata::default(),
            created: stamp,
            updated: stamp,
            version: 0,
        })
    }

    /// Rehydrates a stored admin.
    pub fn from_record(record: AdminRecord) -> AppResult<Self> {
        Ok(Self {
            admin_id: record.admin_id,
            email: EmailAddress::new(record.email)?,
            role_id: record.role_id,
            access_level: record.access_level,
            status: record.status,
            can_create_sub_users: record.can_create_sub_users,
            max_sub_users: record.max_sub_users,
            created_sub_users_count: record.created_sub_users_count,
            manager_id: record.manager_id,
            team_id: record.team_id,
            auth: record.auth,
            created: record.created,
            updated: record.updated,
            version: record.version,
        })
    }

    /// Returns the admin identifier.
    #[must_use]
    pub fn admin_id(&self) -> AdminId {
        self.admin_id
    }

    /// Returns the login email.
    #[must_use]
    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    /// Returns the held role.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        self.role_id
    }

    /// Returns the cached access level label.
    #[must_use]
    pub fn access_level(&self) -> AccessLevel {
        self.access_level
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub fn status(&self) -> AdminStatus {
        self.status
    }

    /// Returns whether the account may act.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AdminStatus::Active
    }

    /// Returns the sub-user capability.
    #[must_use]
    pub fn can_create_sub_users(&self) -> bool {
        self.can_create_sub_users
    }

    /// Returns the sub-user quota.
    #[must_use]
    pub fn max_sub_users(&self) -> Option<u32> {
        self.max_sub_users
    }

    /// Returns the number of sub-users created so far.
    #[must_use]
    pub fn created_sub_users_count(&self) -> u32 {
        self.created_sub_users_count
    }

    /// Returns the creating admin.
    #[must_use]
    pub fn manager_id(&self) -> Option<AdminId> {
        self.manager_id
    }

    /// Returns the team grouping.
    #[must_use]
    pub fn team_id(&self) -> Option<&str> {
        self.team_id.as_deref()
    }

    /// Returns identity provider metadata.
    #[must_use]
    pub fn auth(&self) -> AuthMetadata {
        self.auth
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

    /// Returns whether another sub-user fits in the quota.
    #[must_use]
    pub fn has_sub_user_capacity(&self) -> bool {
        self.max_sub_users
            .is_none_or(|limit| self.created_sub_users_count < limit)
    }

    /// Checks capability and quota, then counts one more created sub-user.
    ///
    /// Stores call this inside the same transaction that inserts the sub-user.
    pub fn record_sub_user_created(&mut self, stamp: AuditStamp) -> AppResult<()> {
        if !self.is_active() || !self.can_create_sub_users {
            return Err(AppError::Forbidden(format!(
                "admin '{}' is not allowed to create sub-users",
                self.admin_id
            )));
        }

        if !self.has_sub_user_capacity() {
            return Err(AppError::QuotaExceeded(format!(
                "admin '{}' reached its sub-user quota of {}",
                self.admin_id,
                self.max_sub_users.unwrap_or_default()
            )));
        }

        self.created_sub_users_count += 1;
        self.updated = stamp;
        Ok(())
    }

    /// Returns a copy holding `role` with the access level re-derived.
    #[must_use]
    pub fn with_role(&self, role: &Role, stamp: AuditStamp) -> Self {
        let mut next = self.clone();
        next.role_id = role.role_id();
        next.access_level = AccessLevel::for_level(role.level());
        next.updated = stamp;
        next
    }

    /// Returns a copy with the access level re-derived from the held role.
    #[must_use]
    pub fn with_access_level_of(&self, role: &Role) -> Self {
        let mut next = self.clone();
        next.access_level = AccessLevel::for_level(role.level());
        next
    }

    /// Returns a copy in the requested status, rejecting illegal transitions.
    pub fn transitioned(&self, status: AdminStatus, stamp: AuditStamp) -> AppResult<Self> {
        if !self.status.can_transition_to(status) {
            return Err(AppError::Validation(format!(
                "admin '{}' cannot move from '{}' to '{}'",
                self.admin_id,
                self.status.as_str(),
                status.as_str()
            )));
        }

        let mut next = self.clone();
        next.status = status;
        next.updated = stamp;
        Ok(next)
    }

    /// Returns whether the cached access level agrees with the role's level.
    #[must_use]
    pub fn access_level_matches(&self, role: &Role) -> bool {
        self.role_id == role.role_id() && self.access_level == AccessLevel::for_level(role.level())
    }

    /// Returns a copy carrying a store-assigned version.
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }
}
