use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

mod access;
mod roles;

pub use access::AccessResponse;
pub use roles::{
    CapabilityCheckQuery, CapabilityCheckResponse, CreateHierarchyEdgeRequest, CreateRoleRequest,
    DetachRoleResponse, EffectiveCapabilitiesResponse, HierarchyEdgeResponse, RoleResponse,
    UpdateRoleRequest,
};

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
    pub role_store: &'static str,
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
