use std::str::FromStr;

use castellan_core::AppError;
use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by directory use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a role is created.
    RoleCreated,
    /// Emitted when a role definition changes.
    RoleUpdated,
    /// Emitted when a role is deactivated.
    RoleDeactivated,
    /// Emitted when a role is reactivated.
    RoleReactivated,
    /// Emitted when a custom role is deleted.
    RoleDeleted,
    /// Emitted when an admin is provisioned.
    AdminCreated,
    /// Emitted when an admin receives another role.
    AdminRoleAssigned,
    /// Emitted when an admin is suspended, reactivated or retired.
    AdminStatusChanged,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleCreated => "directory.role.created",
            Self::RoleUpdated => "directory.role.updated",
            Self::RoleDeactivated => "directory.role.deactivated",
            Self::RoleReactivated => "directory.role.reactivated",
            Self::RoleDeleted => "directory.role.deleted",
            Self::AdminCreated => "directory.admin.created",
            Self::AdminRoleAssigned => "directory.admin.role_assigned",
            Self::AdminStatusChanged => "directory.admin.status_changed",
        }
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "directory.role.created" => Ok(Self::RoleCreated),
            "directory.role.updated" => Ok(Self::RoleUpdated),
            "directory.role.deactivated" => Ok(Self::RoleDeactivated),
            "directory.role.reactivated" => Ok(Self::RoleReactivated),
            "directory.role.deleted" => Ok(Self::RoleDeleted),
            "directory.admin.created" => Ok(Self::AdminCreated),
            "directory.admin.role_assigned" => Ok(Self::AdminRoleAssigned),
            "directory.admin.status_changed" => Ok(Self::AdminStatusChanged),
            _ => Err(AppError::Validation(format!(
                "unknown audit action '{value}'"
            ))),
        }
    }
}
