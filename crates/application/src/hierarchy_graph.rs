use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use lineage_core::{AppError, AppResult};
use lineage_domain::{HierarchyEdge, Role, RoleId};

use crate::role_ports::{NewRole, RoleChanges, RoleRepository};

mod snapshot;

#[cfg(test)]
mod tests;

pub use snapshot::HierarchySnapshot;
pub(crate) use snapshot::SnapshotChange;

/// How a role update treats the role's parent edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParentAssignment {
    /// Leave parent edges untouched.
    #[default]
    Keep,
    /// Remove every parent edge.
    Clear,
    /// Replace every parent edge with a single edge from this role.
    Replace(RoleId),
}

/// In-memory role hierarchy backed by a [`RoleRepository`].
///
/// Reads work on an immutable [`HierarchySnapshot`] and only wait on writers
/// when the store moved past the published snapshot. All mutations are serialized through a single
/// writer lock: each one validates against the latest committed snapshot,
/// persists the change, and publishes the next snapshot before returning.
///
/// Every decision path goes through [`current_snapshot`], which compares the
/// published snapshot with the store revision and reloads on mismatch. A
/// revocation committed by this process or any other one sharing the store
/// is therefore visible to every evaluation that starts after the mutating
/// call completes.
///
/// [`current_snapshot`]: HierarchyGraph::current_snapshot
#[derive(Clone)]
pub struct HierarchyGraph {
    repository: Arc<dyn RoleRepository>,
    state: Arc<GraphState>,
}

struct GraphState {
    published: RwLock<Published>,
    mutation: Mutex<()>,
}

struct Published {
    snapshot: Arc<HierarchySnapshot>,
    /// Store revision the snapshot was read at. `None` after a local write,
    /// which forces the next verified read to reload.
    revision: Option<u64>,
}

impl HierarchyGraph {
    /// Loads roles and edges from the repository.
    pub async fn load(repository: Arc<dyn RoleRepository>) -> AppResult<Self> {
        let revision = repository.revision().await?;
        let snapshot = read_snapshot(repository.as_ref()).await?;
        info!(
            revision,
            roles = snapshot.roles().count(),
            edges = snapshot.edges().count(),
            "role hierarchy loaded"
        );

        Ok(Self {
            repository,
            state: Arc::new(GraphState {
                published: RwLock::new(Published {
                    snapshot: Arc::new(snapshot),
                    revision: Some(revision),
                }),
                mutation: Mutex::new(()),
            }),
        })
    }

    /// Returns the last published snapshot without consulting the store.
    pub async fn snapshot(&self) -> Arc<HierarchySnapshot> {
        self.state.published.read().await.snapshot.clone()
    }

    /// Returns a snapshot that matches the store's committed revision,
    /// reloading first when the store changed since the last publish.
    pub async fn current_snapshot(&self) -> AppResult<Arc<HierarchySnapshot>> {
        let revision = self.repository.revision().await?;
        {
            let published = self.state.published.read().await;
            if published.revision == Some(revision) {
                return Ok(published.snapshot.clone());
            }
        }

        let _mutation = self.state.mutation.lock().await;
        self.refresh_locked().await
    }

    /// Returns a role by id.
    pub async fn role(&self, role_id: RoleId) -> AppResult<Role> {
        self.current_snapshot()
            .await?
            .role(role_id)
            .cloned()
            .ok_or_else(|| role_not_found(role_id))
    }

    /// Returns a role by name.
    pub async fn role_by_name(&self, name: &str) -> AppResult<Role> {
        self.current_snapshot()
            .await?
            .role_by_name(name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("role '{name}' was not found")))
    }

    /// Lists roles by ascending id.
    pub async fn roles(&self) -> AppResult<Vec<Role>> {
        Ok(self.current_snapshot().await?.roles().cloned().collect())
    }

    /// Lists edges ordered by (parent, child).
    pub async fn edges(&self) -> AppResult<Vec<HierarchyEdge>> {
        Ok(self.current_snapshot().await?.edges().cloned().collect())
    }

    /// Direct parents of a role.
    pub async fn parents_of(&self, role_id: RoleId) -> AppResult<BTreeSet<RoleId>> {
        let snapshot = self.current_snapshot().await?;
        ensure_role(&snapshot, role_id)?;
        Ok(snapshot.parents_of(role_id))
    }

    /// Direct children of a role.
    pub async fn children_of(&self, role_id: RoleId) -> AppResult<BTreeSet<RoleId>> {
        let snapshot = self.current_snapshot().await?;
        ensure_role(&snapshot, role_id)?;
        Ok(snapshot.children_of(role_id))
    }

    /// All ancestors of a role, nearest first.
    pub async fn ancestors_of(&self, role_id: RoleId) -> AppResult<Vec<RoleId>> {
        let snapshot = self.current_snapshot().await?;
        ensure_role(&snapshot, role_id)?;
        Ok(snapshot.ancestors_of(role_id).to_vec())
    }

    /// Links `child_id` under `parent_id`.
    ///
    /// Fails with `CircularDependency` for self-loops or when `child_id` is
    /// already an ancestor of `parent_id`, and with `NotFound` when either
    /// role is unknown. Linking an existing pair returns the stored edge.
    pub async fn add_edge(&self, parent_id: RoleId, child_id: RoleId) -> AppResult<HierarchyEdge> {
        if parent_id == child_id {
            return Err(self_loop(parent_id));
        }

        let _mutation = self.state.mutation.lock().await;
        let current = self.refresh_locked().await?;
        ensure_role(&current, parent_id)?;
        ensure_role(&current, child_id)?;

        if let Some(existing) = current.edge(parent_id, child_id) {
            return Ok(existing.clone());
        }

        if current.would_create_cycle(parent_id, child_id) {
            warn!(%parent_id, %child_id, "rejected hierarchy edge that would close a cycle");
            return Err(cycle_error(parent_id, child_id));
        }

        let edge = self.repository.insert_edge(parent_id, child_id).await?;
        self.publish(current.apply(&SnapshotChange::AddEdge(edge.clone())))
            .await;

        info!(%parent_id, %child_id, "hierarchy edge added");
        Ok(edge)
    }

    /// Unlinks `child_id` from `parent_id`. Removing a missing edge is a no-op.
    pub async fn remove_edge(&self, parent_id: RoleId, child_id: RoleId) -> AppResult<bool> {
        let _mutation = self.state.mutation.lock().await;
        let current = self.refresh_locked().await?;

        let removed = self.repository.delete_edge(parent_id, child_id).await?;
        if removed || current.edge(parent_id, child_id).is_some() {
            self.publish(current.apply(&SnapshotChange::RemoveEdge {
                parent_id,
                child_id,
            }))
            .await;
            info!(%parent_id, %child_id, "hierarchy edge removed");
        }

        Ok(removed)
    }

    /// Removes every edge where the role is parent or child.
    pub async fn remove_all_edges_for(&self, role_id: RoleId) -> AppResult<u64> {
        let _mutation = self.state.mutation.lock().await;
        let current = self.refresh_locked().await?;

        let removed = self.repository.delete_edges_for_role(role_id).await?;
        self.publish(current.apply(&SnapshotChange::RemoveEdgesFor(role_id)))
            .await;

        if removed > 0 {
            info!(%role_id, removed, "hierarchy edges removed for role");
        }
        Ok(removed)
    }

    /// Creates a role, optionally linking it under an existing parent.
    ///
    /// The parent is validated before anything is written. If linking fails
    /// after the role row exists, the role is deleted again.
    pub async fn create_role(&self, role: NewRole, parent_id: Option<RoleId>) -> AppResult<Role> {
        let _mutation = self.state.mutation.lock().await;
        let current = self.refresh_locked().await?;

        if let Some(parent_id) = parent_id {
            ensure_role(&current, parent_id)?;
        }
        if current.role_by_name(role.name.as_str()).is_some() {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name
            )));
        }

        let created = self.repository.create_role(role).await?;
        let mut next = current.apply(&SnapshotChange::UpsertRole(created.clone()));

        if let Some(parent_id) = parent_id {
            match self.repository.insert_edge(parent_id, created.id()).await {
                Ok(edge) => next = next.apply(&SnapshotChange::AddEdge(edge)),
                Err(link_error) => {
                    if let Err(cleanup_error) = self.repository.delete_role(created.id()).await {
                        error!(
                            role_id = %created.id(),
                            %cleanup_error,
                            "failed to roll back role after parent link failure"
                        );
                        self.publish(next).await;
                    }
                    return Err(link_error);
                }
            }
        }

        self.publish(next).await;
        info!(role_id = %created.id(), name = %created.name(), "role created");
        Ok(created)
    }

    /// Updates mutable role attributes and optionally reassigns its parents.
    ///
    /// A replacement parent is checked for cycles before any edge is removed.
    /// If the parent replacement fails after the attributes were written, the
    /// written attributes are still published before the error is returned.
    pub async fn update_role(
        &self,
        role_id: RoleId,
        changes: RoleChanges,
        parent: ParentAssignment,
    ) -> AppResult<Role> {
        let _mutation = self.state.mutation.lock().await;
        let current = self.refresh_locked().await?;
        let existing = current
            .role(role_id)
            .cloned()
            .ok_or_else(|| role_not_found(role_id))?;

        if let ParentAssignment::Replace(parent_id) = parent {
            if parent_id == role_id {
                return Err(self_loop(role_id));
            }
            ensure_role(&current, parent_id)?;
            if current.would_create_cycle(parent_id, role_id) {
                warn!(%parent_id, child_id = %role_id, "rejected parent reassignment that would close a cycle");
                return Err(cycle_error(parent_id, role_id));
            }
        }

        let updated = if changes.is_empty() {
            existing
        } else {
            self.repository.update_role(role_id, changes).await?
        };
        let mut next = current.apply(&SnapshotChange::UpsertRole(updated.clone()));

        let replacement_parent = match parent {
            ParentAssignment::Keep => None,
            ParentAssignment::Clear => Some(None),
            ParentAssignment::Replace(parent_id) => Some(Some(parent_id)),
        };
        if let Some(parent_id) = replacement_parent {
            match self.repository.replace_parent_edges(role_id, parent_id).await {
                Ok(edges) => {
                    next = next.apply(&SnapshotChange::ReplaceParents {
                        child_id: role_id,
                        edges,
                    });
                }
                Err(error) => {
                    // The attribute change is already committed.
                    warn!(%role_id, %error, "parent reassignment failed after role update");
                    self.publish(next).await;
                    return Err(error);
                }
            }
        }

        self.publish(next).await;
        info!(%role_id, "role updated");
        Ok(updated)
    }

    /// Deletes a role and every edge touching it. Descendant roles survive.
    pub async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let _mutation = self.state.mutation.lock().await;
        let current = self.refresh_locked().await?;
        ensure_role(&current, role_id)?;

        self.repository.delete_role(role_id).await?;
        self.publish(current.apply(&SnapshotChange::RemoveRole(role_id)))
            .await;

        info!(%role_id, "role deleted");
        Ok(())
    }

    /// Publishes a locally derived snapshot. Its revision is unknown, so the
    /// next verified read reloads from the store.
    async fn publish(&self, snapshot: HierarchySnapshot) {
        *self.state.published.write().await = Published {
            snapshot: Arc::new(snapshot),
            revision: None,
        };
    }

    /// Caller must hold the mutation lock.
    async fn refresh_locked(&self) -> AppResult<Arc<HierarchySnapshot>> {
        let revision = self.repository.revision().await?;
        {
            let published = self.state.published.read().await;
            if published.revision == Some(revision) {
                return Ok(published.snapshot.clone());
            }
        }

        let snapshot = Arc::new(read_snapshot(self.repository.as_ref()).await?);
        *self.state.published.write().await = Published {
            snapshot: snapshot.clone(),
            revision: Some(revision),
        };
        debug!(revision, "role hierarchy refreshed from store");
        Ok(snapshot)
    }
}

async fn read_snapshot(repository: &dyn RoleRepository) -> AppResult<HierarchySnapshot> {
    let roles = repository.list_roles().await?;
    let edges = repository.list_edges().await?;

    Ok(HierarchySnapshot::build(roles, edges))
}

fn ensure_role(snapshot: &HierarchySnapshot, role_id: RoleId) -> AppResult<()> {
    if snapshot.contains(role_id) {
        Ok(())
    } else {
        Err(role_not_found(role_id))
    }
}

pub(crate) fn role_not_found(role_id: RoleId) -> AppError {
    AppError::NotFound(format!("role {role_id} was not found"))
}

fn self_loop(role_id: RoleId) -> AppError {
    AppError::CircularDependency(format!("role {role_id} cannot inherit from itself"))
}

fn cycle_error(parent_id: RoleId, child_id: RoleId) -> AppError {
    AppError::CircularDependency(format!(
        "linking role {child_id} under role {parent_id} would create a cycle"
    ))
}
