use std::collections::{BTreeMap, HashSet, VecDeque};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use lineage_application::{NewRole, RoleChanges, RoleRepository};
use lineage_core::{AppError, AppResult};
use lineage_domain::{HierarchyEdge, Role, RoleId};
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Debug, Default)]
struct RoleTables {
    roles: BTreeMap<RoleId, Role>,
    edges: BTreeMap<(RoleId, RoleId), HierarchyEdge>,
    last_id: i64,
    revision: u64,
}

impl RoleTables {
    fn require_role(&self, role_id: RoleId) -> AppResult<()> {
        if self.roles.contains_key(&role_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("role {role_id} was not found")))
        }
    }

    /// Returns true when `candidate` is reachable from `role_id` through parent edges.
    fn is_ancestor(&self, candidate: RoleId, role_id: RoleId) -> bool {
        let mut visited = HashSet::from([role_id]);
        let mut queue = VecDeque::from([role_id]);

        while let Some(current) = queue.pop_front() {
            let parents = self
                .edges
                .keys()
                .filter(|(_, child_id)| *child_id == current)
                .map(|(parent_id, _)| *parent_id);
            for parent_id in parents {
                if parent_id == candidate {
                    return true;
                }
                if visited.insert(parent_id) {
                    queue.push_back(parent_id);
                }
            }
        }

        false
    }

    fn insert_checked_edge(
        &mut self,
        parent_id: RoleId,
        child_id: RoleId,
    ) -> AppResult<HierarchyEdge> {
        self.require_role(parent_id)?;
        self.require_role(child_id)?;

        if let Some(existing) = self.edges.get(&(parent_id, child_id)) {
            return Ok(existing.clone());
        }
        if parent_id == child_id || self.is_ancestor(child_id, parent_id) {
            warn!(%parent_id, %child_id, "store rejected hierarchy edge that would close a cycle");
            return Err(AppError::CircularDependency(format!(
                "linking role {child_id} under role {parent_id} would create a cycle"
            )));
        }

        let edge = HierarchyEdge::new(parent_id, child_id, timestamp())?;
        self.edges.insert((parent_id, child_id), edge.clone());
        self.revision += 1;
        Ok(edge)
    }
}

/// In-memory role store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryRoleRepository {
    tables: RwLock<RoleTables>,
}

impl InMemoryRoleRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn create_role(&self, role: NewRole) -> AppResult<Role> {
        let mut tables = self.tables.write().await;

        if tables.roles.values().any(|stored| stored.name() == &role.name) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name
            )));
        }

        tables.last_id += 1;
        let created = Role::new(
            RoleId::new(tables.last_id),
            role.name,
            role.description,
            role.capabilities,
        );
        tables.roles.insert(created.id(), created.clone());
        tables.revision += 1;
        Ok(created)
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.tables.read().await.roles.get(&role_id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        Ok(self
            .tables
            .read()
            .await
            .roles
            .values()
            .find(|role| role.name().as_str() == name)
            .cloned())
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        Ok(self.tables.read().await.roles.values().cloned().collect())
    }

    async fn update_role(&self, role_id: RoleId, changes: RoleChanges) -> AppResult<Role> {
        let mut tables = self.tables.write().await;
        let role = tables
            .roles
            .get_mut(&role_id)
            .ok_or_else(|| AppError::NotFound(format!("role {role_id} was not found")))?;

        changes.apply_to(role);
        let updated = role.clone();
        tables.revision += 1;
        Ok(updated)
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables.require_role(role_id)?;

        tables.roles.remove(&role_id);
        tables.edges.retain(|_, edge| !edge.touches(role_id));
        tables.revision += 1;
        Ok(())
    }

    async fn insert_edge(&self, parent_id: RoleId, child_id: RoleId) -> AppResult<HierarchyEdge> {
        self.tables
            .write()
            .await
            .insert_checked_edge(parent_id, child_id)
    }

    async fn delete_edge(&self, parent_id: RoleId, child_id: RoleId) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.edges.remove(&(parent_id, child_id)).is_some();
        if removed {
            tables.revision += 1;
        }
        Ok(removed)
    }

    async fn delete_edges_for_role(&self, role_id: RoleId) -> AppResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.edges.len();
        tables.edges.retain(|_, edge| !edge.touches(role_id));

        let removed = before - tables.edges.len();
        if removed > 0 {
            tables.revision += 1;
        }
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    async fn replace_parent_edges(
        &self,
        child_id: RoleId,
        parent_id: Option<RoleId>,
    ) -> AppResult<Vec<HierarchyEdge>> {
        let mut tables = self.tables.write().await;
        tables.require_role(child_id)?;

        let previous = tables.edges.clone();
        tables
            .edges
            .retain(|(_, stored_child_id), _| *stored_child_id != child_id);

        if let Some(parent_id) = parent_id {
            match tables.insert_checked_edge(parent_id, child_id) {
                Ok(edge) => {
                    tables.revision += 1;
                    return Ok(vec![edge]);
                }
                Err(error) => {
                    tables.edges = previous;
                    return Err(error);
                }
            }
        }

        tables.revision += 1;
        Ok(Vec::new())
    }

    async fn list_edges(&self) -> AppResult<Vec<HierarchyEdge>> {
        Ok(self.tables.read().await.edges.values().cloned().collect())
    }

    async fn revision(&self) -> AppResult<u64> {
        Ok(self.tables.read().await.revision)
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
