use std::str::FromStr;

use castellan_core::{AppError, AppResult, VerifiedIdentity};
use castellan_domain::AdminId;

pub mod admins;
pub mod health;
pub mod permissions;
pub mod roles;

#[cfg(test)]
mod tests;

/// Resolves the caller's admin id from the verified identity.
fn caller_id(identity: &VerifiedIdentity) -> AppResult<AdminId> {
    AdminId::from_str(identity.subject()).map_err(|_| {
        AppError::Unauthorized(format!(
            "identity subject '{}' is not an admin id",
            identity.subject()
        ))
    })
}
