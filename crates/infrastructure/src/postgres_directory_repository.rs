use sqlx::PgPool;

use castellan_core::AppError;

mod admins;
mod provisioning;
mod roles;
mod rows;


/// PostgreSQL-backed directory of roles and admins.
///
/// Every mutation runs in one transaction and locks the rows it reads with
/// `FOR UPDATE`, so quota counters and versions are checked and written
/// atomically.
#[derive(Clone)]
pub struct PostgresDirectoryRepository {
    pool: PgPool,
}

impl PostgresDirectoryRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ACTIVE_ROLE_NAME_INDEX: &str = "directory_roles_active_name_idx";
const ADMIN_EMAIL_CONSTRAINT: &str = "directory_admins_email_unique";

fn database_error(operation: &str, error: sqlx::Error) -> AppError {
    AppError::Internal(format!("failed to {operation}: {error}"))
}

/// Maps unique violations to domain errors by constraint name.
fn map_unique_violation(operation: &str, error: sqlx::Error, subject: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return match database_error.constraint() {
            Some(ACTIVE_ROLE_NAME_INDEX) => {
                AppError::DuplicateName(format!("an active role named '{subject}' already exists"))
            }
            Some(ADMIN_EMAIL_CONSTRAINT) => {
                AppError::Validation(format!("email '{subject}' is already registered"))
            }
            _ => AppError::Conflict(format!("'{subject}' already exists")),
        };
    }

    database_error(operation, error)
}

fn conflict(kind: &str, id: impl std::fmt::Display, expected: u64, actual: u64) -> AppError {
    AppError::Conflict(format!(
        "{kind} '{id}' is at version {actual} but version {expected} was expected"
    ))
}
