use axum::http::HeaderName;
use lineage_application::RoleService;

use crate::api_config::RoleStoreBackend;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub role_service: RoleService,
    pub principal_header: HeaderName,
    pub admin_role_name: String,
    pub role_store: RoleStoreBackend,
}
