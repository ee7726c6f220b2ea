use std::sync::Arc;

use axum::Extension;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use lineage_core::{AppError, AppResult};
use lineage_domain::RoleRef;
use tracing::debug;

use crate::error::ApiResult;
use crate::state::AppState;

/// Authenticated caller with the roles the upstream auth layer assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    roles: Vec<RoleRef>,
}

impl Principal {
    pub fn roles(&self) -> &[RoleRef] {
        &self.roles
    }
}

/// Roles statically declared for a group of routes. Any one of them suffices.
#[derive(Debug, Clone)]
pub struct RequiredRoles(Arc<[String]>);

impl RequiredRoles {
    pub fn any_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(roles.into_iter().map(Into::into).collect())
    }

    pub fn authenticated() -> Self {
        Self(Arc::from(Vec::new()))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Parses a comma-separated role reference list. Empty items are skipped.
pub fn parse_principal_roles(value: &str) -> AppResult<Vec<RoleRef>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::parse::<RoleRef>)
        .collect()
}

pub async fn require_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let header = request
        .headers()
        .get(&state.principal_header)
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;
    let value = header.to_str().map_err(|_| {
        AppError::Unauthorized("principal roles header is not valid text".to_owned())
    })?;
    let roles = parse_principal_roles(value).map_err(|error| {
        AppError::Unauthorized(format!("malformed principal roles header: {error}"))
    })?;

    request.extensions_mut().insert(Principal { roles });
    Ok(next.run(request).await)
}

pub async fn require_roles(
    State(state): State<AppState>,
    Extension(required): Extension<RequiredRoles>,
    Extension(principal): Extension<Principal>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let allowed = state
        .role_service
        .guard()
        .is_authorized(principal.roles(), required.as_slice())
        .await;

    if !allowed {
        debug!(
            path = %request.uri().path(),
            required = ?required.as_slice(),
            "request denied by access guard"
        );
        return Err(AppError::Forbidden(format!(
            "requires one of the roles: {}",
            required.as_slice().join(", ")
        ))
        .into());
    }

    Ok(next.run(request).await)
}
