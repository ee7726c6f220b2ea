//! Role administration use-cases.
//!
//! Validates raw administrative input into domain values and drives the
//! hierarchy graph, which owns serialization of every mutation.

use std::collections::BTreeSet;
use std::sync::Arc;

use lineage_core::AppResult;
use lineage_domain::{Capability, HierarchyEdge, Role, RoleId, RoleName};

use crate::hierarchy_graph::role_not_found;
use crate::{
    AccessGuard, CapabilityResolver, HierarchyGraph, HierarchySnapshot, HierarchyVisualizer,
    NewRole, ParentAssignment, RoleChanges,
};

/// Input payload for role creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique role name.
    pub name: String,
    /// Optional description; blank values are stored as absent.
    pub description: Option<String>,
    /// Capabilities owned directly by the role.
    pub capabilities: Vec<String>,
    /// Existing role to link the new role under.
    pub parent_role_id: Option<RoleId>,
}

/// Input payload for role updates. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRoleInput {
    /// Replacement description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// Replacement capability set.
    pub capabilities: Option<Vec<String>>,
    /// Parent edge reassignment.
    pub parent: ParentAssignment,
}

/// Application service for role and hierarchy administration.
#[derive(Clone)]
pub struct RoleService {
    graph: HierarchyGraph,
    resolver: CapabilityResolver,
    visualizer: HierarchyVisualizer,
    guard: AccessGuard,
}

impl RoleService {
    /// Creates the service and its collaborators over one shared graph.
    #[must_use]
    pub fn new(graph: HierarchyGraph) -> Self {
        Self {
            resolver: CapabilityResolver::new(graph.clone()),
            visualizer: HierarchyVisualizer::new(graph.clone()),
            guard: AccessGuard::new(graph.clone()),
            graph,
        }
    }

    /// Returns the access guard sharing this service's graph.
    #[must_use]
    pub fn guard(&self) -> &AccessGuard {
        &self.guard
    }

    /// Returns the underlying hierarchy graph.
    #[must_use]
    pub fn graph(&self) -> &HierarchyGraph {
        &self.graph
    }

    /// Creates a role, optionally under an existing parent.
    pub async fn create_role(&self, input: CreateRoleInput) -> AppResult<Role> {
        let role = NewRole {
            name: RoleName::new(input.name)?,
            description: normalize_description(input.description),
            capabilities: Capability::parse_set(input.capabilities)?,
        };

        self.graph.create_role(role, input.parent_role_id).await
    }

    /// Lists roles by ascending id.
    pub async fn list_roles(&self) -> AppResult<Vec<Role>> {
        self.graph.roles().await
    }

    /// Returns one role.
    pub async fn get_role(&self, role_id: RoleId) -> AppResult<Role> {
        self.graph.role(role_id).await
    }

    /// Updates description, capabilities and parent assignment.
    pub async fn update_role(&self, role_id: RoleId, input: UpdateRoleInput) -> AppResult<Role> {
        let changes = RoleChanges {
            description: input.description.map(normalize_description),
            capabilities: input
                .capabilities
                .map(Capability::parse_set)
                .transpose()?,
        };

        self.graph.update_role(role_id, changes, input.parent).await
    }

    /// Deletes a role and its edges.
    pub async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        self.graph.delete_role(role_id).await
    }

    /// Links `child_id` under `parent_id`.
    pub async fn link_roles(&self, parent_id: RoleId, child_id: RoleId) -> AppResult<HierarchyEdge> {
        self.graph.add_edge(parent_id, child_id).await
    }

    /// Unlinks `child_id` from `parent_id`, returning whether an edge existed.
    pub async fn unlink_roles(&self, parent_id: RoleId, child_id: RoleId) -> AppResult<bool> {
        self.graph.remove_edge(parent_id, child_id).await
    }

    /// Removes every edge touching the role.
    pub async fn detach_role(&self, role_id: RoleId) -> AppResult<u64> {
        self.graph.remove_all_edges_for(role_id).await
    }

    /// Direct children as role records, ascending id.
    pub async fn children(&self, role_id: RoleId) -> AppResult<Vec<Role>> {
        let snapshot = self.verified_snapshot_with(role_id).await?;
        Ok(records(&snapshot, snapshot.children_of(role_id)))
    }

    /// Direct parents as role records, ascending id.
    pub async fn parents(&self, role_id: RoleId) -> AppResult<Vec<Role>> {
        let snapshot = self.verified_snapshot_with(role_id).await?;
        Ok(records(&snapshot, snapshot.parents_of(role_id)))
    }

    /// Ancestors as role records, nearest first.
    pub async fn ancestors(&self, role_id: RoleId) -> AppResult<Vec<Role>> {
        let snapshot = self.verified_snapshot_with(role_id).await?;
        let ancestor_ids = snapshot.ancestors_of(role_id);
        Ok(records(&snapshot, ancestor_ids.iter().copied()))
    }

    /// Returns whether the role effectively grants `target`.
    pub async fn check_capability(&self, role_id: RoleId, target: &str) -> AppResult<bool> {
        self.resolver.has_capability(role_id, target).await
    }

    /// Effective capability tokens of a role, sorted.
    pub async fn effective_capabilities(&self, role_id: RoleId) -> AppResult<BTreeSet<String>> {
        self.resolver.effective_capabilities(role_id).await
    }

    /// Renders the hierarchy as indented text.
    pub async fn visualize(&self) -> AppResult<String> {
        self.visualizer.render().await
    }

    async fn verified_snapshot_with(&self, role_id: RoleId) -> AppResult<Arc<HierarchySnapshot>> {
        let snapshot = self.graph.current_snapshot().await?;
        if snapshot.contains(role_id) {
            Ok(snapshot)
        } else {
            Err(role_not_found(role_id))
        }
    }
}

fn records(snapshot: &HierarchySnapshot, role_ids: impl IntoIterator<Item = RoleId>) -> Vec<Role> {
    role_ids
        .into_iter()
        .filter_map(|role_id| snapshot.role(role_id).cloned())
        .collect()
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
