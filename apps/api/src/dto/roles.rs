use lineage_application::{CreateRoleInput, ParentAssignment, UpdateRoleInput};
use lineage_domain::{HierarchyEdge, Role, RoleId};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::deserialize_present;

/// API representation of a role.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/role-response.ts"
)]
pub struct RoleResponse {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub capabilities: Vec<String>,
}

impl From<Role> for RoleResponse {
    fn from(value: Role) -> Self {
        Self {
            id: value.id().as_i64(),
            name: value.name().as_str().to_owned(),
            description: value.description().map(str::to_owned),
            capabilities: value
                .capabilities()
                .iter()
                .map(|capability| capability.as_str().to_owned())
                .collect(),
        }
    }
}

/// Incoming payload for role creation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/create-role-request.ts"
)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    #[ts(type = "number | null")]
    pub parent_role_id: Option<i64>,
}

impl From<CreateRoleRequest> for CreateRoleInput {
    fn from(value: CreateRoleRequest) -> Self {
        Self {
            name: value.name,
            description: value.description,
            capabilities: value.capabilities,
            parent_role_id: value.parent_role_id.map(RoleId::new),
        }
    }
}

/// Incoming payload for role updates.
///
/// `parent_role_id` is tri-state: absent keeps the parents, `null` removes
/// them, and an id replaces them with that single parent.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/update-role-request.ts"
)]
pub struct UpdateRoleRequest {
    #[serde(default, deserialize_with = "deserialize_present")]
    #[ts(type = "string | null")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    #[ts(type = "number | null")]
    pub parent_role_id: Option<Option<i64>>,
}

impl From<UpdateRoleRequest> for UpdateRoleInput {
    fn from(value: UpdateRoleRequest) -> Self {
        let parent = match value.parent_role_id {
            None => ParentAssignment::Keep,
            Some(None) => ParentAssignment::Clear,
            Some(Some(parent_id)) => ParentAssignment::Replace(RoleId::new(parent_id)),
        };

        Self {
            description: value.description,
            capabilities: value.capabilities,
            parent,
        }
    }
}

/// Incoming payload for hierarchy edge creation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/create-hierarchy-edge-request.ts"
)]
pub struct CreateHierarchyEdgeRequest {
    #[ts(type = "number")]
    pub parent_role_id: i64,
    #[ts(type = "number")]
    pub child_role_id: i64,
}

/// API representation of a hierarchy edge.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/hierarchy-edge-response.ts"
)]
pub struct HierarchyEdgeResponse {
    #[ts(type = "number")]
    pub parent_role_id: i64,
    #[ts(type = "number")]
    pub child_role_id: i64,
    pub created_at: String,
}

impl From<HierarchyEdge> for HierarchyEdgeResponse {
    fn from(value: HierarchyEdge) -> Self {
        Self {
            parent_role_id: value.parent_id().as_i64(),
            child_role_id: value.child_id().as_i64(),
            created_at: value.created_at().to_owned(),
        }
    }
}

/// Query string of the capability check endpoint.
#[derive(Debug, Deserialize)]
pub struct CapabilityCheckQuery {
    pub name: String,
}

/// Result of a capability check.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/capability-check-response.ts"
)]
pub struct CapabilityCheckResponse {
    #[ts(type = "number")]
    pub role_id: i64,
    pub capability: String,
    pub granted: bool,
}

/// Effective capabilities of a role, sorted.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/effective-capabilities-response.ts"
)]
pub struct EffectiveCapabilitiesResponse {
    #[ts(type = "number")]
    pub role_id: i64,
    pub capabilities: Vec<String>,
}

/// Result of detaching a role from the hierarchy.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/detach-role-response.ts"
)]
pub struct DetachRoleResponse {
    #[ts(type = "number")]
    pub role_id: i64,
    #[ts(type = "number")]
    pub removed_edges: u64,
}
