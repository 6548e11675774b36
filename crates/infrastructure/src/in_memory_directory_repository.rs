mod admins;
mod provisioning;
mod roles;

use std::collections::HashMap;

use castellan_core::{AppError, AppResult};
use castellan_domain::{Admin, AdminId, Role, RoleId, RoleUsageStats};
use tokio::sync::RwLock;

/// In-memory directory store.
///
/// One lock guards roles and admins together, so every multi-record write is
/// a single critical section.
#[derive(Debug, Default)]
pub struct InMemoryDirectoryRepository {
    state: RwLock<DirectoryState>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    roles: HashMap<RoleId, Role>,
    admins: HashMap<AdminId, Admin>,
}

impl InMemoryDirectoryRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DirectoryState {
    fn role(&self, role_id: RoleId) -> AppResult<&Role> {
        self.roles
            .get(&role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))
    }

    fn admin(&self, admin_id: AdminId) -> AppResult<&Admin> {
        self.admins
            .get(&admin_id)
            .ok_or_else(|| AppError::NotFound(format!("admin '{admin_id}' does not exist")))
    }

    fn ensure_active_name_free(&self, role: &Role) -> AppResult<()> {
        if !role.is_active() {
            return Ok(());
        }

        let taken = self.roles.values().any(|other| {
            other.role_id() != role.role_id() && other.is_active() && other.name() == role.name()
        });
        if taken {
            return Err(AppError::DuplicateName(format!(
                "an active role named '{}' already exists",
                role.name()
            )));
        }

        Ok(())
    }

    /// Re-checks level ordering against the stored parent and children.
    fn ensure_hierarchy(&self, role: &Role) -> AppResult<()> {
        if let Some(parent_role_id) = role.parent_role_id() {
            self.role(parent_role_id)?.ensure_outranks_child(role)?;
        }

        self.roles
            .values()
            .filter(|child| child.parent_role_id() == Some(role.role_id()))
            .try_for_each(|child| role.ensure_outranks_child(child))
    }

    fn child_count(&self, parent_role_id: RoleId) -> usize {
        self.roles
            .values()
            .filter(|role| role.parent_role_id() == Some(parent_role_id))
            .count()
    }

    fn adjust_assigned(&mut self, role_id: RoleId, delta: i64) -> AppResult<()> {
        let role = self.role(role_id)?.clone();
        let next = i64::from(role.usage_stats().assigned_users_count) + delta;
        let assigned_users_count = u32::try_from(next).map_err(|_| {
            AppError::Internal(format!(
                "assigned user counter of role '{role_id}' would become {next}"
            ))
        })?;

        self.roles.insert(
            role_id,
            role.with_usage_stats(RoleUsageStats {
                assigned_users_count,
            }),
        );
        Ok(())
    }

    fn email_taken(&self, admin: &Admin) -> bool {
        self.admins
            .values()
            .any(|other| other.admin_id() != admin.admin_id() && other.email() == admin.email())
    }
}

fn conflict(kind: &str, id: impl std::fmt::Display, expected: u64, actual: u64) -> AppError {
    AppError::Conflict(format!(
        "{kind} '{id}' is at version {actual} but version {expected} was expected"
    ))
}

#[cfg(test)]
mod tests;
