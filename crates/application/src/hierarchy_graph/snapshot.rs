use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lineage_domain::{HierarchyEdge, Role, RoleId};
use tracing::{error, warn};

type AncestorClosure = Arc<[RoleId]>;
type EdgeKey = (RoleId, RoleId);

/// Immutable view of roles and inheritance edges at one point in time.
///
/// Mutations never touch a published snapshot; they derive a new one through
/// [`HierarchySnapshot::apply`]. Ancestor closures are memoized per snapshot
/// and carried forward into the next snapshot for every role whose ancestry
/// the change cannot affect.
#[derive(Debug)]
pub struct HierarchySnapshot {
    roles: BTreeMap<RoleId, Role>,
    names: HashMap<String, RoleId>,
    edges: BTreeMap<EdgeKey, HierarchyEdge>,
    parents: HashMap<RoleId, BTreeSet<RoleId>>,
    children: HashMap<RoleId, BTreeSet<RoleId>>,
    quarantined: HashSet<RoleId>,
    ancestor_cache: Mutex<HashMap<RoleId, AncestorClosure>>,
}

/// A single committed change to derive the next snapshot from.
#[derive(Debug, Clone)]
pub(crate) enum SnapshotChange {
    UpsertRole(Role),
    RemoveRole(RoleId),
    AddEdge(HierarchyEdge),
    RemoveEdge {
        parent_id: RoleId,
        child_id: RoleId,
    },
    RemoveEdgesFor(RoleId),
    ReplaceParents {
        child_id: RoleId,
        edges: Vec<HierarchyEdge>,
    },
}

impl HierarchySnapshot {
    /// Creates a snapshot without roles or edges.
    #[must_use]
    pub fn empty() -> Self {
        Self::build(Vec::new(), Vec::new())
    }

    /// Builds a snapshot from stored roles and edges.
    ///
    /// Edges referencing unknown roles are ignored. Roles that sit on or below
    /// a directed cycle are quarantined: their inherited grants resolve to
    /// nothing until the cycle is removed.
    #[must_use]
    pub fn build(roles: Vec<Role>, edges: Vec<HierarchyEdge>) -> Self {
        let roles = roles.into_iter().map(|role| (role.id(), role)).collect();
        let edges = edges
            .into_iter()
            .map(|edge| ((edge.parent_id(), edge.child_id()), edge))
            .collect();

        Self::assemble(roles, edges, HashMap::new())
    }

    fn assemble(
        roles: BTreeMap<RoleId, Role>,
        mut edges: BTreeMap<EdgeKey, HierarchyEdge>,
        carried_cache: HashMap<RoleId, AncestorClosure>,
    ) -> Self {
        edges.retain(|(parent_id, child_id), _| {
            let known = roles.contains_key(parent_id) && roles.contains_key(child_id);
            if !known {
                warn!(%parent_id, %child_id, "ignoring hierarchy edge with unknown endpoint");
            }
            known
        });

        let mut parents: HashMap<RoleId, BTreeSet<RoleId>> = HashMap::new();
        let mut children: HashMap<RoleId, BTreeSet<RoleId>> = HashMap::new();
        for (parent_id, child_id) in edges.keys() {
            parents.entry(*child_id).or_default().insert(*parent_id);
            children.entry(*parent_id).or_default().insert(*child_id);
        }

        let names = roles
            .values()
            .map(|role| (role.name().as_str().to_owned(), role.id()))
            .collect();

        let quarantined = cyclic_roles(&roles, &parents, &children);
        let ancestor_cache = if quarantined.is_empty() {
            carried_cache
        } else {
            error!(
                quarantined = quarantined.len(),
                "role hierarchy contains a directed cycle; inheritance through affected roles is disabled"
            );
            HashMap::new()
        };

        Self {
            roles,
            names,
            edges,
            parents,
            children,
            quarantined,
            ancestor_cache: Mutex::new(ancestor_cache),
        }
    }

    /// Derives the snapshot that results from a committed change.
    pub(crate) fn apply(&self, change: &SnapshotChange) -> Self {
        let mut roles = self.roles.clone();
        let mut edges = self.edges.clone();

        let invalidated = match change {
            SnapshotChange::UpsertRole(role) => {
                roles.insert(role.id(), role.clone());
                HashSet::new()
            }
            SnapshotChange::RemoveRole(role_id) => {
                roles.remove(role_id);
                edges.retain(|_, edge| !edge.touches(*role_id));
                self.self_and_descendants(*role_id)
            }
            SnapshotChange::AddEdge(edge) => {
                edges.insert((edge.parent_id(), edge.child_id()), edge.clone());
                self.self_and_descendants(edge.child_id())
            }
            SnapshotChange::RemoveEdge {
                parent_id,
                child_id,
            } => {
                edges.remove(&(*parent_id, *child_id));
                self.self_and_descendants(*child_id)
            }
            SnapshotChange::RemoveEdgesFor(role_id) => {
                edges.retain(|_, edge| !edge.touches(*role_id));
                self.self_and_descendants(*role_id)
            }
            SnapshotChange::ReplaceParents {
                child_id,
                edges: replacement,
            } => {
                edges.retain(|(_, stored_child_id), _| stored_child_id != child_id);
                for edge in replacement {
                    edges.insert((edge.parent_id(), edge.child_id()), edge.clone());
                }
                self.self_and_descendants(*child_id)
            }
        };

        let carried_cache = self
            .cache()
            .iter()
            .filter(|(role_id, _)| !invalidated.contains(role_id))
            .map(|(role_id, closure)| (*role_id, closure.clone()))
            .collect();

        Self::assemble(roles, edges, carried_cache)
    }

    /// Returns the role with the given id.
    #[must_use]
    pub fn role(&self, role_id: RoleId) -> Option<&Role> {
        self.roles.get(&role_id)
    }

    /// Returns the role with the given name.
    #[must_use]
    pub fn role_by_name(&self, name: &str) -> Option<&Role> {
        self.names
            .get(name)
            .and_then(|role_id| self.roles.get(role_id))
    }

    /// Returns true when the role exists.
    #[must_use]
    pub fn contains(&self, role_id: RoleId) -> bool {
        self.roles.contains_key(&role_id)
    }

    /// Iterates roles by ascending id.
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    /// Iterates edges ordered by (parent, child).
    pub fn edges(&self) -> impl Iterator<Item = &HierarchyEdge> {
        self.edges.values()
    }

    /// Returns the stored edge between two roles.
    #[must_use]
    pub fn edge(&self, parent_id: RoleId, child_id: RoleId) -> Option<&HierarchyEdge> {
        self.edges.get(&(parent_id, child_id))
    }

    /// Direct parents of a role.
    #[must_use]
    pub fn parents_of(&self, role_id: RoleId) -> BTreeSet<RoleId> {
        self.parents.get(&role_id).cloned().unwrap_or_default()
    }

    /// Direct children of a role.
    #[must_use]
    pub fn children_of(&self, role_id: RoleId) -> BTreeSet<RoleId> {
        self.children.get(&role_id).cloned().unwrap_or_default()
    }

    /// Roles without any parent edge, by ascending id.
    #[must_use]
    pub fn roots(&self) -> Vec<RoleId> {
        self.roles
            .keys()
            .filter(|role_id| !self.parents.contains_key(role_id))
            .copied()
            .collect()
    }

    /// Returns true when the role sits on or below a detected cycle.
    #[must_use]
    pub fn is_quarantined(&self, role_id: RoleId) -> bool {
        self.quarantined.contains(&role_id)
    }

    /// All ancestors of a role, nearest first, each listed once.
    ///
    /// Quarantined roles have no usable ancestry and yield an empty closure.
    #[must_use]
    pub fn ancestors_of(&self, role_id: RoleId) -> Arc<[RoleId]> {
        if self.quarantined.contains(&role_id) {
            error!(%role_id, "ancestor query reached a role inside a hierarchy cycle");
            return Arc::from(Vec::new());
        }

        if let Some(closure) = self.cache().get(&role_id) {
            return closure.clone();
        }

        let closure: AncestorClosure = Arc::from(self.walk_ancestors(role_id));
        self.cache().insert(role_id, closure.clone());
        closure
    }

    /// All descendants of a role in breadth-first order.
    #[must_use]
    pub fn descendants_of(&self, role_id: RoleId) -> Vec<RoleId> {
        let mut ordered = Vec::new();
        let mut visited = HashSet::from([role_id]);
        let mut queue = VecDeque::from([role_id]);

        while let Some(current) = queue.pop_front() {
            for child_id in self.children.get(&current).into_iter().flatten() {
                if visited.insert(*child_id) {
                    ordered.push(*child_id);
                    queue.push_back(*child_id);
                }
            }
        }

        ordered
    }

    /// Returns true when inserting `parent_id -> child_id` would close a cycle.
    ///
    /// Edges touching quarantined roles are refused as well.
    #[must_use]
    pub fn would_create_cycle(&self, parent_id: RoleId, child_id: RoleId) -> bool {
        parent_id == child_id
            || self.quarantined.contains(&parent_id)
            || self.quarantined.contains(&child_id)
            || self.ancestors_of(parent_id).contains(&child_id)
    }

    fn walk_ancestors(&self, role_id: RoleId) -> Vec<RoleId> {
        let mut ordered = Vec::new();
        let mut visited = HashSet::from([role_id]);
        let mut queue = VecDeque::from([role_id]);

        while let Some(current) = queue.pop_front() {
            for parent_id in self.parents.get(&current).into_iter().flatten() {
                if *parent_id == role_id {
                    error!(%role_id, "ancestor walk looped back to its starting role");
                    continue;
                }
                if visited.insert(*parent_id) {
                    ordered.push(*parent_id);
                    queue.push_back(*parent_id);
                }
            }
        }

        ordered
    }

    fn self_and_descendants(&self, role_id: RoleId) -> HashSet<RoleId> {
        let mut affected: HashSet<RoleId> = self.descendants_of(role_id).into_iter().collect();
        affected.insert(role_id);
        affected
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<RoleId, AncestorClosure>> {
        self.ancestor_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn cached_roles(&self) -> BTreeSet<RoleId> {
        self.cache().keys().copied().collect()
    }
}

/// Kahn's algorithm over parent edges: every role never released by the
/// in-degree countdown lies on a cycle or inherits from one.
fn cyclic_roles(
    roles: &BTreeMap<RoleId, Role>,
    parents: &HashMap<RoleId, BTreeSet<RoleId>>,
    children: &HashMap<RoleId, BTreeSet<RoleId>>,
) -> HashSet<RoleId> {
    let mut in_degree: HashMap<RoleId, usize> = roles
        .keys()
        .map(|role_id| (*role_id, parents.get(role_id).map_or(0, BTreeSet::len)))
        .collect();
    let mut queue: VecDeque<RoleId> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(role_id, _)| *role_id)
        .collect();
    let mut released = HashSet::new();

    while let Some(role_id) = queue.pop_front() {
        released.insert(role_id);
        for child_id in children.get(&role_id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(child_id) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    queue.push_back(*child_id);
                }
            }
        }
    }

    roles
        .keys()
        .filter(|role_id| !released.contains(role_id))
        .copied()
        .collect()
}
