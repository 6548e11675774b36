use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use castellan_application::{DEFAULT_HIERARCHY_HOP_LIMIT, DEFAULT_MAX_CONFLICT_RETRIES};
use castellan_core::AppError;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_IDENTITY_HEADER: &str = "x-admin-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryStoreConfig {
    Memory,
    Postgres { database_url: String },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub store: DirectoryStoreConfig,
    pub api_host: String,
    pub api_port: u16,
    pub identity_header: String,
    pub frontend_url: Option<String>,
    pub bootstrap_super_admin_email: Option<String>,
    pub max_conflict_retries: u32,
    pub hierarchy_hop_limit: usize,
    pub list_deadline: Option<Duration>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let store = match env::var("DIRECTORY_STORE")
            .unwrap_or_else(|_| "postgres".to_owned())
            .as_str()
        {
            "memory" => DirectoryStoreConfig::Memory,
            "postgres" => DirectoryStoreConfig::Postgres {
                database_url: required_non_empty_env("DATABASE_URL")?,
            },
            other => {
                return Err(AppError::Validation(format!(
                    "DIRECTORY_STORE must be either 'memory' or 'postgres', got '{other}'"
                )));
            }
        };

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let identity_header = optional_non_empty_env("IDENTITY_HEADER")
            .unwrap_or_else(|| DEFAULT_IDENTITY_HEADER.to_owned())
            .to_ascii_lowercase();
        let frontend_url = optional_non_empty_env("FRONTEND_URL");
        let bootstrap_super_admin_email = optional_non_empty_env("BOOTSTRAP_SUPER_ADMIN_EMAIL");

        let max_conflict_retries =
            parsed_env("PROVISIONING_MAX_CONFLICT_RETRIES")?.unwrap_or(DEFAULT_MAX_CONFLICT_RETRIES);
        let hierarchy_hop_limit =
            parsed_env("ROLE_HIERARCHY_HOP_LIMIT")?.unwrap_or(DEFAULT_HIERARCHY_HOP_LIMIT);
        if hierarchy_hop_limit == 0 {
            return Err(AppError::Validation(
                "ROLE_HIERARCHY_HOP_LIMIT must be greater than zero".to_owned(),
            ));
        }
        let list_deadline = parsed_env::<u64>("LIST_DEADLINE_MS")?
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis);

        Ok(Self {
            migrate_only,
            store,
            api_host,
            api_port,
            identity_header,
            frontend_url,
            bootstrap_super_admin_email,
            max_conflict_retries,
            hierarchy_hop_limit,
            list_deadline,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    optional_non_empty_env(name)
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn optional_non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parsed_env<T>(name: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_non_empty_env(name)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))
        })
        .transpose()
}
