use super::*;

pub async fn effective_capabilities_handler(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
) -> ApiResult<Json<EffectiveCapabilitiesResponse>> {
    let capabilities = state
        .role_service
        .effective_capabilities(RoleId::new(role_id))
        .await?;

    Ok(Json(EffectiveCapabilitiesResponse {
        role_id,
        capabilities: capabilities.into_iter().collect(),
    }))
}

pub async fn check_capability_handler(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
    Query(query): Query<CapabilityCheckQuery>,
) -> ApiResult<Json<CapabilityCheckResponse>> {
    let granted = state
        .role_service
        .check_capability(RoleId::new(role_id), &query.name)
        .await?;

    Ok(Json(CapabilityCheckResponse {
        role_id,
        capability: query.name,
        granted,
    }))
}
