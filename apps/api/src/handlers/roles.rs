use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use lineage_domain::{Role, RoleId};

use crate::dto::{
    CapabilityCheckQuery, CapabilityCheckResponse, CreateRoleRequest, DetachRoleResponse,
    EffectiveCapabilitiesResponse, RoleResponse, UpdateRoleRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

mod capabilities;
mod neighbours;

pub use capabilities::{check_capability_handler, effective_capabilities_handler};
pub use neighbours::{ancestors_handler, children_handler, parents_handler};

pub async fn list_roles_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state
        .role_service
        .list_roles()
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn create_role_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let role = state.role_service.create_role(payload.into()).await?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

pub async fn get_role_handler(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
) -> ApiResult<Json<RoleResponse>> {
    let role = state.role_service.get_role(RoleId::new(role_id)).await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn update_role_handler(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    let role = state
        .role_service
        .update_role(RoleId::new(role_id), payload.into())
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn delete_role_handler(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.role_service.delete_role(RoleId::new(role_id)).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn detach_role_handler(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
) -> ApiResult<Json<DetachRoleResponse>> {
    let removed_edges = state.role_service.detach_role(RoleId::new(role_id)).await?;

    Ok(Json(DetachRoleResponse {
        role_id,
        removed_edges,
    }))
}

fn role_responses(roles: Vec<Role>) -> Vec<RoleResponse> {
    roles.into_iter().map(RoleResponse::from).collect()
}
