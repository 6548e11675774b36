use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderName;
use castellan_application::{
    AdminDirectoryService, AdminRepository, AuditRepository, DirectoryBootstrapService,
    PermissionResolver, ProvisioningGuard, ProvisioningRepository, RoleCatalogService,
    RoleHierarchyValidator, RoleRepository,
};
use castellan_core::AppError;
use castellan_infrastructure::{
    InMemoryDirectoryRepository, PostgresAuditRepository, PostgresDirectoryRepository,
    TracingAuditRepository,
};
use sqlx::PgPool;
use tracing::info;

use crate::api_config::ApiConfig;
use crate::state::AppState;

/// Port implementations backing one directory store.
#[derive(Clone)]
pub struct DirectoryAdapters {
    pub roles: Arc<dyn RoleRepository>,
    pub admins: Arc<dyn AdminRepository>,
    pub provisioning: Arc<dyn ProvisioningRepository>,
    pub audit: Arc<dyn AuditRepository>,
}

impl DirectoryAdapters {
    pub fn in_memory() -> Self {
        let directory = Arc::new(InMemoryDirectoryRepository::new());
        Self {
            roles: directory.clone(),
            admins: directory.clone(),
            provisioning: directory,
            audit: Arc::new(TracingAuditRepository::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        let directory = Arc::new(PostgresDirectoryRepository::new(pool.clone()));
        Self {
            roles: directory.clone(),
            admins: directory.clone(),
            provisioning: directory,
            audit: Arc::new(PostgresAuditRepository::new(pool)),
        }
    }
}

/// Tunables shared by the services.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub identity_header: String,
    pub max_conflict_retries: u32,
    pub hierarchy_hop_limit: usize,
    pub list_deadline: Option<Duration>,
    pub bootstrap_super_admin_email: Option<String>,
}

impl From<&ApiConfig> for ServiceSettings {
    fn from(config: &ApiConfig) -> Self {
        Self {
            identity_header: config.identity_header.clone(),
            max_conflict_retries: config.max_conflict_retries,
            hierarchy_hop_limit: config.hierarchy_hop_limit,
            list_deadline: config.list_deadline,
            bootstrap_super_admin_email: config.bootstrap_super_admin_email.clone(),
        }
    }
}

/// Wires the services over `adapters` and seeds the directory when configured.
pub async fn build_app_state(
    adapters: DirectoryAdapters,
    settings: ServiceSettings,
) -> Result<AppState, AppError> {
    let identity_header =
        HeaderName::from_bytes(settings.identity_header.as_bytes()).map_err(|error| {
            AppError::Validation(format!(
                "invalid IDENTITY_HEADER '{}': {error}",
                settings.identity_header
            ))
        })?;

    let hierarchy =
        RoleHierarchyValidator::new(adapters.roles.clone(), settings.hierarchy_hop_limit);
    let role_catalog_service = RoleCatalogService::new(adapters.roles.clone(), hierarchy);
    let admin_directory_service =
        AdminDirectoryService::new(adapters.admins.clone(), adapters.roles.clone());
    let permission_resolver =
        PermissionResolver::new(adapters.admins.clone(), adapters.roles.clone());
    let provisioning_guard = ProvisioningGuard::new(
        role_catalog_service.clone(),
        admin_directory_service.clone(),
        permission_resolver.clone(),
        adapters.provisioning.clone(),
        adapters.audit.clone(),
        settings.max_conflict_retries,
    );

    if let Some(email) = settings.bootstrap_super_admin_email.as_deref() {
        let report = DirectoryBootstrapService::new(
            role_catalog_service.clone(),
            adapters.roles.clone(),
            adapters.admins.clone(),
        )
        .bootstrap(email)
        .await?;
        info!(
            super_admin_id = %report.super_admin_id,
            created_roles = report.created_roles.len(),
            "directory bootstrapped"
        );
    }

    Ok(AppState {
        role_catalog_service,
        admin_directory_service,
        permission_resolver,
        provisioning_guard,
        identity_header,
        list_deadline: settings.list_deadline,
    })
}
