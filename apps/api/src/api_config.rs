use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use axum::http::HeaderName;
use lineage_core::AppError;
use tracing_subscriber::EnvFilter;

/// What the process should do after loading configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCommand {
    Serve,
    Migrate,
    Seed,
}

/// Backend used for the role store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleStoreBackend {
    Postgres,
    Memory,
}

impl RoleStoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Memory => "memory",
        }
    }
}

impl FromStr for RoleStoreBackend {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(AppError::Validation(format!(
                "ROLE_STORE must be either 'postgres' or 'memory', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub command: ApiCommand,
    pub role_store: RoleStoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub api_host: String,
    pub api_port: u16,
    pub frontend_url: String,
    pub principal_roles_header: HeaderName,
    pub admin_role_name: String,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        Self::from_lookup(env::args().nth(1).as_deref(), |name| env::var(name).ok())
    }

    pub fn from_lookup(
        command: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let command = match command {
            None | Some("serve") => ApiCommand::Serve,
            Some("migrate") => ApiCommand::Migrate,
            Some("seed") => ApiCommand::Seed,
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "unknown command '{other}', expected 'migrate' or 'seed'"
                )));
            }
        };

        let role_store = lookup("ROLE_STORE")
            .map(|value| RoleStoreBackend::from_str(&value))
            .transpose()?
            .unwrap_or(RoleStoreBackend::Postgres);

        let database_url = lookup("DATABASE_URL").filter(|value| !value.trim().is_empty());
        if role_store == RoleStoreBackend::Postgres && database_url.is_none() {
            return Err(AppError::Validation(
                "DATABASE_URL is required when ROLE_STORE=postgres".to_owned(),
            ));
        }
        if role_store == RoleStoreBackend::Memory && command != ApiCommand::Serve {
            return Err(AppError::Validation(
                "migrate and seed require ROLE_STORE=postgres".to_owned(),
            ));
        }

        let database_max_connections =
            parse_or_default::<u32>(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;
        if database_max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be at least 1".to_owned(),
            ));
        }

        let api_host = lookup("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = parse_or_default::<u16>(&lookup, "API_PORT", 3001)?;
        let frontend_url =
            lookup("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".to_owned());

        let header_value = lookup("PRINCIPAL_ROLES_HEADER")
            .unwrap_or_else(|| "x-principal-roles".to_owned());
        let principal_roles_header = HeaderName::from_str(&header_value.trim().to_ascii_lowercase())
            .map_err(|error| {
                AppError::Validation(format!("invalid PRINCIPAL_ROLES_HEADER: {error}"))
            })?;

        let admin_role_name = lookup("ADMIN_ROLE_NAME")
            .map(|value| value.trim().to_owned())
            .unwrap_or_else(|| "admin".to_owned());
        if admin_role_name.is_empty() {
            return Err(AppError::Validation(
                "ADMIN_ROLE_NAME must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            command,
            role_store,
            database_url,
            database_max_connections,
            api_host,
            api_port,
            frontend_url,
            principal_roles_header,
            admin_role_name,
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

fn parse_or_default<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name} '{value}': {error}"))),
    }
}
