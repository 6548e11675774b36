//! Shared primitives for all Rust crates in Castellan.

#![forbid(unsafe_code)]

/// Identity primitives handed over by the external identity provider.
pub mod auth;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::VerifiedIdentity;

/// Result type used across Castellan crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
///
/// Hierarchy and quota failures carry their own variants. `Forbidden` is the
/// permission-denied outcome.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state or lost an optimistic race.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller identity is missing.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is identified but not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Another active role already uses the name.
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    /// Role level is outside the supported range.
    #[error("invalid level: {0}")]
    InvalidLevel(String),

    /// Permission matrix references an unknown resource or action.
    #[error("invalid permission key: {0}")]
    InvalidPermissionKey(String),

    /// Structurally protected field of a system role would change.
    #[error("system role is immutable: {0}")]
    SystemRoleImmutable(String),

    /// Role is still referenced and cannot be retired.
    #[error("role in use: {0}")]
    RoleInUse(String),

    /// Parent/child level ordering is violated.
    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    /// Parent chain loops back or does not terminate.
    #[error("cycle detected: {0}")]
    CycleDetected(String),

    /// Actor attempted to grant privilege equal to or above its own.
    #[error("privilege escalation: {0}")]
    PrivilegeEscalation(String),

    /// Subordinate quota is exhausted or not granted.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Caller-supplied deadline elapsed before the operation finished.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns whether the error is an optimistic-concurrency conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
