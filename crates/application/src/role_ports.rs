use std::collections::BTreeSet;

use async_trait::async_trait;

use lineage_core::AppResult;
use lineage_domain::{Capability, HierarchyEdge, Role, RoleId, RoleName};

/// Payload for persisting a new role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    /// Unique role name.
    pub name: RoleName,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// Capabilities owned directly by the role.
    pub capabilities: BTreeSet<Capability>,
}

/// Mutable role attributes. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleChanges {
    /// Replacement description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// Replacement capability set.
    pub capabilities: Option<BTreeSet<Capability>>,
}

impl RoleChanges {
    /// Returns true when no attribute would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.capabilities.is_none()
    }

    /// Applies the changes to an in-memory role record.
    pub fn apply_to(&self, role: &mut Role) {
        if let Some(description) = &self.description {
            role.set_description(description.clone());
        }
        if let Some(capabilities) = &self.capabilities {
            role.set_capabilities(capabilities.clone());
        }
    }
}

/// Durable storage of role records and hierarchy edges.
///
/// Implementations must enforce role-name uniqueness (`Conflict`) and must
/// re-validate acyclicity inside their own serialization scope when
/// inserting edges (`CircularDependency`), so that cycle freedom holds for
/// the committed graph even across processes.
///
/// Every committed write, from any process, must advance [`revision`]
/// before the writing call returns.
///
/// [`revision`]: RoleRepository::revision
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Persists a role and returns it with its assigned id.
    async fn create_role(&self, role: NewRole) -> AppResult<Role>;

    /// Finds a role by id.
    ///
    /// Point lookups are part of the store contract; the hierarchy graph
    /// itself always reads whole snapshots and does not call them.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Finds a role by its unique name.
    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>>;

    /// Lists all roles ordered by ascending id.
    async fn list_roles(&self) -> AppResult<Vec<Role>>;

    /// Applies attribute changes and returns the updated role.
    async fn update_role(&self, role_id: RoleId, changes: RoleChanges) -> AppResult<Role>;

    /// Deletes a role and every edge where it is parent or child.
    async fn delete_role(&self, role_id: RoleId) -> AppResult<()>;

    /// Inserts an edge. Re-inserting an existing pair returns the stored edge.
    async fn insert_edge(&self, parent_id: RoleId, child_id: RoleId) -> AppResult<HierarchyEdge>;

    /// Deletes an edge, returning whether it existed.
    async fn delete_edge(&self, parent_id: RoleId, child_id: RoleId) -> AppResult<bool>;

    /// Deletes every edge touching the role, returning the number removed.
    async fn delete_edges_for_role(&self, role_id: RoleId) -> AppResult<u64>;

    /// Atomically replaces every parent edge of `child_id` with at most one
    /// edge from `parent_id`, returning the child's parent edges afterwards.
    async fn replace_parent_edges(
        &self,
        child_id: RoleId,
        parent_id: Option<RoleId>,
    ) -> AppResult<Vec<HierarchyEdge>>;

    /// Lists every edge ordered by (parent, child).
    async fn list_edges(&self) -> AppResult<Vec<HierarchyEdge>>;

    /// Monotonic change counter of the committed roles and edges.
    ///
    /// Equal values mean nothing was written in between. Read it before
    /// listing roles and edges so a snapshot is never newer than its revision.
    async fn revision(&self) -> AppResult<u64>;
}
