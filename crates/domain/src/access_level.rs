use std::str::FromStr;

use castellan_core::AppError;
use serde::{Deserialize, Serialize};

use crate::RoleLevel;

/// Denormalized label derived from a role level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Level 0 only; bypasses every permission check.
    SuperAdmin,
    /// Levels 1..=10.
    SystemAdmin,
    /// Levels 11..=20.
    OpsAdmin,
    /// Levels 21..=30.
    FinanceAdmin,
    /// Levels 31..=40.
    SupportAdmin,
    /// Levels 41..=50.
    AuditAdmin,
    /// Levels 51..=60.
    MerchantSupportLead,
    /// Levels above 60.
    MerchantSupportAgent,
}

impl AccessLevel {
    /// Derives the label for a role level.
    #[must_use]
    pub fn for_level(level: RoleLevel) -> Self {
        match level.value() {
            0 => Self::SuperAdmin,
            1..=10 => Self::SystemAdmin,
            11..=20 => Self::OpsAdmin,
            21..=30 => Self::FinanceAdmin,
            31..=40 => Self::SupportAdmin,
            41..=50 => Self::AuditAdmin,
            51..=60 => Self::MerchantSupportLead,
            _ => Self::MerchantSupportAgent,
        }
    }

    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::SystemAdmin => "system_admin",
            Self::OpsAdmin => "ops_admin",
            Self::FinanceAdmin => "finance_admin",
            Self::SupportAdmin => "support_admin",
            Self::AuditAdmin => "audit_admin",
            Self::MerchantSupportLead => "merchant_support_lead",
            Self::MerchantSupportAgent => "merchant_support_agent",
        }
    }

    /// Returns whether this is the bypass tier.
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        matches!(self, Self::SuperAdmin)
    }
}

impl FromStr for AccessLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "super_admin" => Ok(Self::SuperAdmin),
            "system_admin" => Ok(Self::SystemAdmin),
            "ops_admin" => Ok(Self::OpsAdmin),
            "finance_admin" => Ok(Self::FinanceAdmin),
            "support_admin" => Ok(Self::SupportAdmin),
            "audit_admin" => Ok(Self::AuditAdmin),
            "merchant_support_lead" => Ok(Self::MerchantSupportLead),
            "merchant_support_agent" => Ok(Self::MerchantSupportAgent),
            _ => Err(AppError::Validation(format!(
                "unknown access level '{value}'"
            ))),
        }
    }
}
