use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use lineage_application::{NewRole, RoleChanges, RoleRepository};
use lineage_core::{AppError, AppResult};
use lineage_domain::{Capability, HierarchyEdge, Role, RoleId, RoleName};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};

mod hierarchy;
mod roles;


/// Advisory lock key serializing hierarchy writes across processes.
const HIERARCHY_LOCK_KEY: i64 = 0x6c69_6e65_6167_65;

/// PostgreSQL-backed role store.
///
/// Edge writes run in a transaction holding a transaction-scoped advisory
/// lock, and re-validate acyclicity against the committed edge table before
/// inserting. Statement triggers on `roles` and `role_hierarchy` advance the
/// `role_store_revision` counter in the writing transaction.
#[derive(Clone)]
pub struct PostgresRoleRepository {
    pool: PgPool,
}

impl PostgresRoleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin_hierarchy_write(&self) -> AppResult<Transaction<'_, Postgres>> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(HIERARCHY_LOCK_KEY)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to acquire hierarchy lock: {error}"))
            })?;

        Ok(transaction)
    }

    async fn revision_impl(&self) -> AppResult<u64> {
        let revision =
            sqlx::query_scalar::<_, i64>("SELECT revision FROM role_store_revision")
                .fetch_one(&self.pool)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to read role store revision: {error}"))
                })?;

        u64::try_from(revision).map_err(|_| {
            AppError::Internal(format!("role store revision {revision} is negative"))
        })
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    description: Option<String>,
    capabilities: Option<Json<Vec<String>>>,
}

impl TryFrom<RoleRow> for Role {
    type Error = AppError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        let capabilities = match row.capabilities {
            Some(Json(values)) => Capability::parse_set(values)?,
            None => BTreeSet::new(),
        };

        Ok(Role::new(
            RoleId::new(row.id),
            RoleName::new(row.name)?,
            row.description,
            capabilities,
        ))
    }
}

#[derive(Debug, FromRow)]
struct EdgeRow {
    parent_role_id: i64,
    child_role_id: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<EdgeRow> for HierarchyEdge {
    type Error = AppError;

    fn try_from(row: EdgeRow) -> Result<Self, Self::Error> {
        HierarchyEdge::new(
            RoleId::new(row.parent_role_id),
            RoleId::new(row.child_role_id),
            row.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
    }
}

fn capability_document(capabilities: &BTreeSet<Capability>) -> Json<Vec<String>> {
    Json(
        capabilities
            .iter()
            .map(|capability| capability.as_str().to_owned())
            .collect(),
    )
}

fn role_not_found(role_id: RoleId) -> AppError {
    AppError::NotFound(format!("role {role_id} was not found"))
}

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn create_role(&self, role: NewRole) -> AppResult<Role> {
        self.create_role_impl(role).await
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        self.find_role_impl(role_id).await
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        self.find_role_by_name_impl(name).await
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        self.list_roles_impl().await
    }

    async fn update_role(&self, role_id: RoleId, changes: RoleChanges) -> AppResult<Role> {
        self.update_role_impl(role_id, changes).await
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        self.delete_role_impl(role_id).await
    }

    async fn insert_edge(&self, parent_id: RoleId, child_id: RoleId) -> AppResult<HierarchyEdge> {
        self.insert_edge_impl(parent_id, child_id).await
    }

    async fn delete_edge(&self, parent_id: RoleId, child_id: RoleId) -> AppResult<bool> {
        self.delete_edge_impl(parent_id, child_id).await
    }

    async fn delete_edges_for_role(&self, role_id: RoleId) -> AppResult<u64> {
        self.delete_edges_for_role_impl(role_id).await
    }

    async fn replace_parent_edges(
        &self,
        child_id: RoleId,
        parent_id: Option<RoleId>,
    ) -> AppResult<Vec<HierarchyEdge>> {
        self.replace_parent_edges_impl(child_id, parent_id).await
    }

    async fn list_edges(&self) -> AppResult<Vec<HierarchyEdge>> {
        self.list_edges_impl().await
    }

    async fn revision(&self) -> AppResult<u64> {
        self.revision_impl().await
    }
}
