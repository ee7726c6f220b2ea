//! Lineage API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dev_seed;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use lineage_core::AppError;
use tracing::info;

use crate::api_config::{ApiCommand, ApiConfig, RoleStoreBackend};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    api_config::init_tracing();

    let config = ApiConfig::load()?;

    if config.command == ApiCommand::Migrate {
        let database_url = config.database_url.as_deref().ok_or_else(|| {
            AppError::Validation("DATABASE_URL is required for migrate".to_owned())
        })?;
        let pool =
            api_services::connect_pool(database_url, config.database_max_connections).await?;
        return api_services::run_migrations(&pool).await;
    }

    let repository = api_services::build_role_repository(&config).await?;
    let app_state = api_services::build_app_state(repository, &config).await?;

    if config.command == ApiCommand::Seed {
        return dev_seed::run(&app_state.role_service).await;
    }
    if config.role_store == RoleStoreBackend::Memory {
        dev_seed::run(&app_state.role_service).await?;
    }

    let app = api_router::build_router(app_state, &config.frontend_url)?;
    let address = config.socket_address()?;

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, role_store = config.role_store.as_str(), "lineage-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
