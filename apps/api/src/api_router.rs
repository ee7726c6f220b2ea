use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use lineage_core::AppError;
use tower_http::trace::TraceLayer;

use crate::middleware::RequiredRoles;
use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;

pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let admin_required = RequiredRoles::any_of([app_state.admin_role_name.clone()]);
    let admin_routes = Router::new()
        .route(
            "/api/roles",
            get(handlers::roles::list_roles_handler).post(handlers::roles::create_role_handler),
        )
        .route(
            "/api/roles/{role_id}",
            get(handlers::roles::get_role_handler)
                .patch(handlers::roles::update_role_handler)
                .delete(handlers::roles::delete_role_handler),
        )
        .route(
            "/api/roles/{role_id}/children",
            get(handlers::roles::children_handler),
        )
        .route(
            "/api/roles/{role_id}/parents",
            get(handlers::roles::parents_handler),
        )
        .route(
            "/api/roles/{role_id}/ancestors",
            get(handlers::roles::ancestors_handler),
        )
        .route(
            "/api/roles/{role_id}/capabilities",
            get(handlers::roles::effective_capabilities_handler),
        )
        .route(
            "/api/roles/{role_id}/check-capability",
            get(handlers::roles::check_capability_handler),
        )
        .route(
            "/api/roles/{role_id}/hierarchy",
            delete(handlers::roles::detach_role_handler),
        )
        .route(
            "/api/roles/hierarchy",
            post(handlers::hierarchy::create_edge_handler),
        )
        .route(
            "/api/roles/hierarchy/{parent_role_id}/{child_role_id}",
            delete(handlers::hierarchy::delete_edge_handler),
        )
        .route(
            "/api/roles/hierarchy/visualization",
            get(handlers::hierarchy::visualization_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_roles,
        ))
        .layer(axum::Extension(admin_required));

    let access_routes = ["user", "editor", "manager", "admin"]
        .into_iter()
        .fold(
            Router::new().route(
                "/api/access/public",
                get(handlers::access::public_access_handler),
            ),
            |router, role_name| {
                router.merge(
                    Router::new()
                        .route(
                            &format!("/api/access/{role_name}"),
                            get(handlers::access::role_access_handler),
                        )
                        .route_layer(from_fn_with_state(
                            app_state.clone(),
                            middleware::require_roles,
                        ))
                        .layer(axum::Extension(RequiredRoles::any_of([role_name]))),
                )
            },
        );

    let principal_routes = Router::new()
        .merge(admin_routes)
        .merge(access_routes)
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_principal,
        ));

    let cors_layer = cors::build_cors_layer(frontend_url, app_state.principal_header.clone())?;

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(principal_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state))
}

#[cfg(test)]
mod tests;
