use axum::Json;
use axum::extract::Extension;

use crate::dto::AccessResponse;
use crate::middleware::RequiredRoles;

pub async fn public_access_handler() -> Json<AccessResponse> {
    Json(AccessResponse {
        message: "any authenticated principal may access this resource".to_owned(),
        required_roles: Vec::new(),
    })
}

/// Shared by the role-gated demo routes; the middleware already admitted the caller.
pub async fn role_access_handler(
    Extension(required): Extension<RequiredRoles>,
) -> Json<AccessResponse> {
    let required_roles = required.as_slice().to_vec();

    Json(AccessResponse {
        message: format!("access granted to {}", required_roles.join(" or ")),
        required_roles,
    })
}
