use std::time::Duration;

use axum::http::HeaderName;
use castellan_application::{
    AdminDirectoryService, PermissionResolver, ProvisioningGuard, RoleCatalogService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub role_catalog_service: RoleCatalogService,
    pub admin_directory_service: AdminDirectoryService,
    pub permission_resolver: PermissionResolver,
    pub provisioning_guard: ProvisioningGuard,
    pub identity_header: HeaderName,
    pub list_deadline: Option<Duration>,
}

impl AppState {
    /// Deadline for a listing started now.
    pub fn list_deadline(&self) -> Option<tokio::time::Instant> {
        self.list_deadline
            .map(|budget| tokio::time::Instant::now() + budget)
    }
}
