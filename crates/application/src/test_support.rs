use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use lineage_core::{AppError, AppResult};
use lineage_domain::{Capability, HierarchyEdge, Role, RoleId, RoleName};

use crate::{HierarchyGraph, NewRole, RoleChanges, RoleRepository};

const FIXED_TIMESTAMP: &str = "2024-01-01T00:00:00Z";

#[derive(Default)]
struct FakeState {
    roles: BTreeMap<RoleId, Role>,
    edges: BTreeMap<(RoleId, RoleId), HierarchyEdge>,
    next_id: i64,
    revision: u64,
}

/// Role store without its own cycle check, so tests exercise the graph's.
#[derive(Default)]
pub(crate) struct FakeRoleRepository {
    state: Mutex<FakeState>,
    fail_edge_inserts: AtomicBool,
    fail_parent_replacements: AtomicBool,
}

impl FakeRoleRepository {
    pub(crate) fn fail_edge_inserts(&self) {
        self.fail_edge_inserts.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_parent_replacements(&self) {
        self.fail_parent_replacements.store(true, Ordering::SeqCst);
    }

    pub(crate) async fn stored_edges(&self) -> Vec<(RoleId, RoleId)> {
        self.state.lock().await.edges.keys().copied().collect()
    }

    pub(crate) async fn stored_role_count(&self) -> usize {
        self.state.lock().await.roles.len()
    }

    /// Writes an edge behind the graph's back, bypassing every check.
    pub(crate) async fn force_edge(&self, parent_id: RoleId, child_id: RoleId) {
        if let Ok(edge) = HierarchyEdge::new(parent_id, child_id, FIXED_TIMESTAMP) {
            let mut state = self.state.lock().await;
            state.edges.insert((parent_id, child_id), edge);
            state.revision += 1;
        }
    }
}

#[async_trait]
impl RoleRepository for FakeRoleRepository {
    async fn create_role(&self, role: NewRole) -> AppResult<Role> {
        let mut state = self.state.lock().await;
        if state.roles.values().any(|stored| stored.name() == &role.name) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name
            )));
        }

        state.next_id += 1;
        let created = Role::new(
            RoleId::new(state.next_id),
            role.name,
            role.description,
            role.capabilities,
        );
        state.roles.insert(created.id(), created.clone());
        state.revision += 1;
        Ok(created)
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.state.lock().await.roles.get(&role_id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        Ok(self
            .state
            .lock()
            .await
            .roles
            .values()
            .find(|role| role.name().as_str() == name)
            .cloned())
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        Ok(self.state.lock().await.roles.values().cloned().collect())
    }

    async fn update_role(&self, role_id: RoleId, changes: RoleChanges) -> AppResult<Role> {
        let mut state = self.state.lock().await;
        let role = state
            .roles
            .get_mut(&role_id)
            .ok_or_else(|| AppError::NotFound(format!("role {role_id} was not found")))?;
        changes.apply_to(role);
        let updated = role.clone();
        state.revision += 1;
        Ok(updated)
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.roles.remove(&role_id).is_none() {
            return Err(AppError::NotFound(format!("role {role_id} was not found")));
        }
        state.edges.retain(|_, edge| !edge.touches(role_id));
        state.revision += 1;
        Ok(())
    }

    async fn insert_edge(&self, parent_id: RoleId, child_id: RoleId) -> AppResult<HierarchyEdge> {
        if self.fail_edge_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Internal("edge insert failed".to_owned()));
        }

        // Widen the window between the graph's check and this write.
        tokio::task::yield_now().await;

        let edge = HierarchyEdge::new(parent_id, child_id, FIXED_TIMESTAMP)?;
        let mut state = self.state.lock().await;
        state.edges.insert((parent_id, child_id), edge.clone());
        state.revision += 1;
        Ok(edge)
    }

    async fn delete_edge(&self, parent_id: RoleId, child_id: RoleId) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let removed = state.edges.remove(&(parent_id, child_id)).is_some();
        if removed {
            state.revision += 1;
        }
        Ok(removed)
    }

    async fn delete_edges_for_role(&self, role_id: RoleId) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.edges.len();
        state.edges.retain(|_, edge| !edge.touches(role_id));
        let removed = (before - state.edges.len()) as u64;
        if removed > 0 {
            state.revision += 1;
        }
        Ok(removed)
    }

    async fn replace_parent_edges(
        &self,
        child_id: RoleId,
        parent_id: Option<RoleId>,
    ) -> AppResult<Vec<HierarchyEdge>> {
        if self.fail_parent_replacements.load(Ordering::SeqCst) {
            return Err(AppError::Internal("connection reset".to_owned()));
        }

        let mut state = self.state.lock().await;
        state
            .edges
            .retain(|(_, stored_child_id), _| *stored_child_id != child_id);

        let mut replacement = Vec::new();
        if let Some(parent_id) = parent_id {
            let edge = HierarchyEdge::new(parent_id, child_id, FIXED_TIMESTAMP)?;
            state.edges.insert((parent_id, child_id), edge.clone());
            replacement.push(edge);
        }
        state.revision += 1;
        Ok(replacement)
    }

    async fn list_edges(&self) -> AppResult<Vec<HierarchyEdge>> {
        Ok(self.state.lock().await.edges.values().cloned().collect())
    }

    async fn revision(&self) -> AppResult<u64> {
        Ok(self.state.lock().await.revision)
    }
}

/// Ids of the default `user <- editor <- manager <- admin` chain.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Chain {
    pub(crate) user: RoleId,
    pub(crate) editor: RoleId,
    pub(crate) manager: RoleId,
    pub(crate) admin: RoleId,
}

impl Chain {
    pub(crate) fn all(&self) -> [RoleId; 4] {
        [self.user, self.editor, self.manager, self.admin]
    }
}

pub(crate) fn unwrap_ok<T>(result: AppResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => panic!("unexpected error: {error}"),
    }
}

pub(crate) fn new_role(name: &str, capabilities: &[&str]) -> NewRole {
    NewRole {
        name: unwrap_ok(RoleName::new(name)),
        description: None,
        capabilities: unwrap_ok(Capability::parse_set(capabilities.iter().copied())),
    }
}

pub(crate) async fn empty_graph() -> (HierarchyGraph, Arc<FakeRoleRepository>) {
    let repository = Arc::new(FakeRoleRepository::default());
    let graph = unwrap_ok(HierarchyGraph::load(repository.clone()).await);
    (graph, repository)
}

pub(crate) async fn seeded_chain_with_repository()
-> (HierarchyGraph, Chain, Arc<FakeRoleRepository>) {
    let (graph, repository) = empty_graph().await;

    let user = unwrap_ok(graph.create_role(new_role("user", &["read:own"]), None).await);
    let editor = unwrap_ok(
        graph
            .create_role(
                new_role("editor", &["create:content", "edit:content"]),
                Some(user.id()),
            )
            .await,
    );
    let manager = unwrap_ok(
        graph
            .create_role(
                new_role("manager", &["approve:content", "manage:users"]),
                Some(editor.id()),
            )
            .await,
    );
    let admin = unwrap_ok(
        graph
            .create_role(new_role("admin", &["delete:any"]), Some(manager.id()))
            .await,
    );

    let chain = Chain {
        user: user.id(),
        editor: editor.id(),
        manager: manager.id(),
        admin: admin.id(),
    };
    (graph, chain, repository)
}

pub(crate) async fn seeded_chain() -> (HierarchyGraph, Chain) {
    let (graph, chain, _) = seeded_chain_with_repository().await;
    (graph, chain)
}
