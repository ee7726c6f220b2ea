use super::*;

pub async fn children_handler(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let children = state.role_service.children(RoleId::new(role_id)).await?;

    Ok(Json(role_responses(children)))
}

pub async fn parents_handler(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let parents = state.role_service.parents(RoleId::new(role_id)).await?;

    Ok(Json(role_responses(parents)))
}

/// Ancestors ordered nearest first.
pub async fn ancestors_handler(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let ancestors = state.role_service.ancestors(RoleId::new(role_id)).await?;

    Ok(Json(role_responses(ancestors)))
}
