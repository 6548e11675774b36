use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use castellan_core::{AppError, AppResult};
use castellan_domain::{
    Admin, AdminId, EmailAddress, RoleId, RoleName, SUPER_ADMIN_ROLE_NAME, system_role_seeds,
};

use crate::{AdminRepository, RoleCatalogService, RoleRepository};

/// Outcome of a bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Names of system roles created by this run.
    pub created_roles: Vec<String>,
    /// Bootstrap super admin identifier.
    pub super_admin_id: AdminId,
    /// Whether the super admin was created by this run.
    pub super_admin_created: bool,
}

/// Seeds the system role catalog and the first super admin. Idempotent.
#[derive(Clone)]
pub struct DirectoryBootstrapService {
    catalog: RoleCatalogService,
    roles: Arc<dyn RoleRepository>,
    admins: Arc<dyn AdminRepository>,
}

impl DirectoryBootstrapService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        catalog: RoleCatalogService,
        roles: Arc<dyn RoleRepository>,
        admins: Arc<dyn AdminRepository>,
    ) -> Self {
        Self {
            catalog,
            roles,
            admins,
        }
    }

    /// Creates missing system roles by name, then the super admin by email.
    pub async fn bootstrap(&self, super_admin_email: &str) -> AppResult<BootstrapReport> {
        let mut role_ids: HashMap<String, RoleId> = HashMap::new();
        let mut created_roles = Vec::new();

        for seed in system_role_seeds()? {
            let seed_name = seed.definition.name.clone();
            let name = RoleName::new(seed_name.as_str())?;
            let role = match self.roles.find_active_role_by_name(&name).await? {
                Some(existing) => existing,
                None => {
                    let mut definition = seed.definition;
                    definition.parent_role_id = seed
                        .parent_name
                        .and_then(|parent_name| role_ids.get(parent_name).copied());
                    let role = self.catalog.create_system_role(definition).await?;
                    created_roles.push(seed_name.clone());
                    role
                }
            };

            role_ids.insert(seed_name, role.role_id());
        }

        let super_role_id = role_ids.get(SUPER_ADMIN_ROLE_NAME).copied().ok_or_else(|| {
            AppError::Internal("super admin system role is missing after seeding".to_owned())
        })?;
        let super_role = self.catalog.get_role(super_role_id).await?;

        let email = EmailAddress::new(super_admin_email)?;
        let (super_admin_id, super_admin_created) =
            match self.admins.find_admin_by_email(&email).await? {
                Some(existing) => (existing.admin_id(), false),
                None => {
                    let admin = Admin::new_root(email.as_str(), &super_role, Utc::now())?;
                    let admin = self.admins.insert_root_admin(admin).await?;
                    (admin.admin_id(), true)
                }
            };

        tracing::info!(
            created_roles = created_roles.len(),
            super_admin_created,
            "directory bootstrap finished"
        );

        Ok(BootstrapReport {
            created_roles,
            super_admin_id,
            super_admin_created,
        })
    }
}
