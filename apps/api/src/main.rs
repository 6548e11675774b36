//! Castellan API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use castellan_core::AppError;
use tracing::info;

use crate::api_config::{ApiConfig, DirectoryStoreConfig};
use crate::api_services::{DirectoryAdapters, ServiceSettings, build_app_state};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    api_config::init_tracing();

    let config = ApiConfig::load()?;

    let adapters = match &config.store {
        DirectoryStoreConfig::Memory => {
            if config.migrate_only {
                return Err(AppError::Validation(
                    "migrate requires DIRECTORY_STORE=postgres".to_owned(),
                ));
            }
            info!("using in-memory directory store");
            DirectoryAdapters::in_memory()
        }
        DirectoryStoreConfig::Postgres { database_url } => {
            let pool = api_services::connect_and_migrate(database_url).await?;
            if config.migrate_only {
                info!("database migrations applied successfully");
                return Ok(());
            }
            DirectoryAdapters::postgres(pool)
        }
    };

    let app_state = build_app_state(adapters, ServiceSettings::from(&config)).await?;
    let app = api_router::build_router(app_state, config.frontend_url.as_deref())?;

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "castellan-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
