use async_trait::async_trait;

use castellan_application::{AdminQuery, AdminRepository};
use castellan_core::{AppError, AppResult};
use castellan_domain::{Admin, AdminId, EmailAddress};

use super::{InMemoryDirectoryRepository, conflict};

#[async_trait]
impl AdminRepository for InMemoryDirectoryRepository {
    async fn find_admin(&self, admin_id: AdminId) -> AppResult<Option<Admin>> {
        Ok(self.state.read().await.admins.get(&admin_id).cloned())
    }

    async fn find_admin_by_email(&self, email: &EmailAddress) -> AppResult<Option<Admin>> {
        Ok(self
            .state
            .read()
            .await
            .admins
            .values()
            .find(|admin| admin.email() == email)
            .cloned())
    }

    async fn list_admins(&self, query: &AdminQuery) -> AppResult<Vec<Admin>> {
        let state = self.state.read().await;

        let mut admins: Vec<Admin> = state
            .admins
            .values()
            .filter(|admin| query.matches(admin))
            .cloned()
            .collect();
        admins.sort_by(|left, right| left.email().as_str().cmp(right.email().as_str()));

        Ok(admins
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn insert_root_admin(&self, admin: Admin) -> AppResult<Admin> {
        let mut state = self.state.write().await;

        if admin.manager_id().is_some() {
            return Err(AppError::Validation(
                "root admins cannot have a manager".to_owned(),
            ));
        }
        if state.email_taken(&admin) {
            return Err(AppError::Validation(format!(
                "email '{}' is already registered",
                admin.email().as_str()
            )));
        }

        let role = state.role(admin.role_id())?;
        if !admin.access_level_matches(role) {
            return Err(AppError::Validation(format!(
                "admin access level '{}' does not match role '{}'",
                admin.access_level().as_str(),
                role.name()
            )));
        }

        state.adjust_assigned(admin.role_id(), 1)?;
        let admin = admin.with_version(1);
        state.admins.insert(admin.admin_id(), admin.clone());

        Ok(admin)
    }

    async fn save_admin_status(&self, admin: Admin, expected_version: u64) -> AppResult<Admin> {
        let mut state = self.state.write().await;

        let current = state.admin(admin.admin_id())?;
        if current.version() != expected_version {
            return Err(conflict(
                "admin",
                admin.admin_id(),
                expected_version,
                current.version(),
            ));
        }

        // Only the lifecycle fields come from the caller.
        let next = current
            .transitioned(admin.status(), admin.updated())?
            .with_version(expected_version + 1);
        state.admins.insert(next.admin_id(), next.clone());

        Ok(next)
    }
}
