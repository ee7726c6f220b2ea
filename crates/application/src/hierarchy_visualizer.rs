use std::collections::HashSet;

use tracing::error;

use lineage_core::AppResult;
use lineage_domain::RoleId;

use crate::{HierarchyGraph, HierarchySnapshot};

/// First line of every rendered hierarchy.
pub const VISUALIZATION_HEADER: &str = "Role Hierarchy:";

/// Suffix of a role whose subtree was already printed earlier in the output.
const REPEATED_SUBTREE_MARKER: &str = " (see above)";

/// Renders the role hierarchy as an indented text tree for diagnostics.
#[derive(Clone)]
pub struct HierarchyVisualizer {
    graph: HierarchyGraph,
}

impl HierarchyVisualizer {
    /// Creates a visualizer over the shared hierarchy graph.
    #[must_use]
    pub fn new(graph: HierarchyGraph) -> Self {
        Self { graph }
    }

    /// Renders the latest committed hierarchy.
    pub async fn render(&self) -> AppResult<String> {
        let snapshot = self.graph.current_snapshot().await?;
        Ok(Self::render_snapshot(&snapshot))
    }

    /// Renders one snapshot.
    ///
    /// Every role without parents starts a tree, roots and children in
    /// ascending id order. A role reachable through several parents is
    /// listed under each of them, but its children are expanded only the
    /// first time; later occurrences carry a `(see above)` marker. Output
    /// therefore grows with the number of edges, not the number of paths.
    #[must_use]
    pub fn render_snapshot(snapshot: &HierarchySnapshot) -> String {
        let mut output = format!("{VISUALIZATION_HEADER}\n");
        let mut walk = Walk {
            snapshot,
            path: HashSet::new(),
            expanded: HashSet::new(),
            output: &mut output,
        };

        for root_id in snapshot.roots() {
            walk.subtree(root_id, 0);
        }

        output
    }
}

struct Walk<'a> {
    snapshot: &'a HierarchySnapshot,
    path: HashSet<RoleId>,
    expanded: HashSet<RoleId>,
    output: &'a mut String,
}

impl Walk<'_> {
    fn subtree(&mut self, role_id: RoleId, depth: usize) {
        let snapshot = self.snapshot;
        let Some(role) = snapshot.role(role_id) else {
            return;
        };
        if self.path.contains(&role_id) {
            error!(%role_id, "hierarchy rendering looped back onto its own path");
            return;
        }

        let children = snapshot.children_of(role_id);
        let repeated = !children.is_empty() && !self.expanded.insert(role_id);
        let marker = if repeated { REPEATED_SUBTREE_MARKER } else { "" };
        self.output.push_str(&format!(
            "{:indent$}{} (ID: {}){marker}\n",
            "",
            role.name(),
            role.id(),
            indent = depth * 2
        ));
        if repeated {
            return;
        }

        self.path.insert(role_id);
        for child_id in children {
            self.subtree(child_id, depth + 1);
        }
        self.path.remove(&role_id);
    }
}
