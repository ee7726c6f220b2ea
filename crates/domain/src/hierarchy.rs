use lineage_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::RoleId;

/// Directed inheritance relation: the child inherits everything the parent grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyEdge {
    parent_id: RoleId,
    child_id: RoleId,
    created_at: String,
}

impl HierarchyEdge {
    /// Creates an edge, rejecting self-loops.
    pub fn new(parent_id: RoleId, child_id: RoleId, created_at: impl Into<String>) -> AppResult<Self> {
        if parent_id == child_id {
            return Err(AppError::CircularDependency(format!(
                "role {parent_id} cannot inherit from itself"
            )));
        }

        Ok(Self {
            parent_id,
            child_id,
            created_at: created_at.into(),
        })
    }

    /// Returns the role whose grants are inherited.
    #[must_use]
    pub fn parent_id(&self) -> RoleId {
        self.parent_id
    }

    /// Returns the inheriting role.
    #[must_use]
    pub fn child_id(&self) -> RoleId {
        self.child_id
    }

    /// Returns the creation timestamp in RFC3339.
    #[must_use]
    pub fn created_at(&self) -> &str {
        self.created_at.as_str()
    }

    /// Returns true when the edge touches `role_id` at either end.
    #[must_use]
    pub fn touches(&self, role_id: RoleId) -> bool {
        self.parent_id == role_id || self.child_id == role_id
    }
}
