use std::sync::Arc;

use lineage_application::{HierarchyGraph, RoleRepository, RoleService};
use lineage_core::AppError;
use lineage_infrastructure::{InMemoryRoleRepository, PostgresRoleRepository};
use tracing::info;

use crate::api_config::{ApiConfig, RoleStoreBackend};
use crate::state::AppState;

use super::database::{connect_pool, run_migrations};

pub async fn build_role_repository(
    config: &ApiConfig,
) -> Result<Arc<dyn RoleRepository>, AppError> {
    match config.role_store {
        RoleStoreBackend::Memory => Ok(Arc::new(InMemoryRoleRepository::new())),
        RoleStoreBackend::Postgres => {
            let database_url = config.database_url.as_deref().ok_or_else(|| {
                AppError::Validation("DATABASE_URL is required when ROLE_STORE=postgres".to_owned())
            })?;
            let pool = connect_pool(database_url, config.database_max_connections).await?;
            run_migrations(&pool).await?;
            Ok(Arc::new(PostgresRoleRepository::new(pool)))
        }
    }
}

pub async fn build_app_state(
    repository: Arc<dyn RoleRepository>,
    config: &ApiConfig,
) -> Result<AppState, AppError> {
    let graph = HierarchyGraph::load(repository).await?;
    let snapshot = graph.snapshot().await;
    info!(
        role_store = config.role_store.as_str(),
        roles = snapshot.roles().count(),
        "role hierarchy loaded"
    );

    Ok(AppState {
        role_service: RoleService::new(graph),
        principal_header: config.principal_roles_header.clone(),
        admin_role_name: config.admin_role_name.clone(),
        role_store: config.role_store,
    })
}
