use std::collections::BTreeSet;

use lineage_core::AppResult;
use lineage_domain::RoleId;

use crate::hierarchy_graph::{HierarchyGraph, HierarchySnapshot, role_not_found};

/// Answers whether a role effectively grants a capability or role name.
#[derive(Clone)]
pub struct CapabilityResolver {
    graph: HierarchyGraph,
}

impl CapabilityResolver {
    /// Creates a resolver over the shared hierarchy graph.
    #[must_use]
    pub fn new(graph: HierarchyGraph) -> Self {
        Self { graph }
    }

    /// Returns whether `role_id` grants `target` directly or through any ancestor.
    pub async fn has_capability(&self, role_id: RoleId, target: &str) -> AppResult<bool> {
        let snapshot = self.graph.current_snapshot().await?;
        Self::has_capability_in(&snapshot, role_id, target)
    }

    /// Same as [`Self::has_capability`], evaluated against a fixed snapshot.
    pub fn has_capability_in(
        snapshot: &HierarchySnapshot,
        role_id: RoleId,
        target: &str,
    ) -> AppResult<bool> {
        let role = snapshot.role(role_id).ok_or_else(|| role_not_found(role_id))?;
        if role.grants_directly(target) {
            return Ok(true);
        }

        Ok(snapshot
            .ancestors_of(role_id)
            .iter()
            .filter_map(|ancestor_id| snapshot.role(*ancestor_id))
            .any(|ancestor| ancestor.grants_directly(target)))
    }

    /// Union of own names and capabilities across the role and all its ancestors.
    pub async fn effective_capabilities(&self, role_id: RoleId) -> AppResult<BTreeSet<String>> {
        let snapshot = self.graph.current_snapshot().await?;
        let role = snapshot.role(role_id).ok_or_else(|| role_not_found(role_id))?;

        let mut capabilities: BTreeSet<String> = role.own_grants().map(str::to_owned).collect();
        for ancestor_id in snapshot.ancestors_of(role_id).iter() {
            if let Some(ancestor) = snapshot.role(*ancestor_id) {
                capabilities.extend(ancestor.own_grants().map(str::to_owned));
            }
        }

        Ok(capabilities)
    }
}
