use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use lineage_domain::RoleId;

use crate::dto::{CreateHierarchyEdgeRequest, HierarchyEdgeResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_edge_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateHierarchyEdgeRequest>,
) -> ApiResult<(StatusCode, Json<HierarchyEdgeResponse>)> {
    let edge = state
        .role_service
        .link_roles(
            RoleId::new(payload.parent_role_id),
            RoleId::new(payload.child_role_id),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(HierarchyEdgeResponse::from(edge))))
}

/// Removing an absent edge also answers 204.
pub async fn delete_edge_handler(
    State(state): State<AppState>,
    Path((parent_role_id, child_role_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    state
        .role_service
        .unlink_roles(RoleId::new(parent_role_id), RoleId::new(child_role_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn visualization_handler(
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let rendered = state.role_service.visualize().await?;

    Ok(([(CONTENT_TYPE, "text/plain; charset=utf-8")], rendered))
}
