use tracing::warn;

use super::*;

const EDGE_COLUMNS: &str = "parent_role_id, child_role_id, created_at";

impl PostgresRoleRepository {
    pub(super) async fn insert_edge_impl(
        &self,
        parent_id: RoleId,
        child_id: RoleId,
    ) -> AppResult<HierarchyEdge> {
        let mut transaction = self.begin_hierarchy_write().await?;
        let edge = insert_checked_edge(&mut transaction, parent_id, child_id).await?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(edge)
    }

    pub(super) async fn delete_edge_impl(
        &self,
        parent_id: RoleId,
        child_id: RoleId,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM role_hierarchy
            WHERE parent_role_id = $1 AND child_role_id = $2
            "#,
        )
        .bind(parent_id.as_i64())
        .bind(child_id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to delete hierarchy edge: {error}"))
        })?;

        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn delete_edges_for_role_impl(&self, role_id: RoleId) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM role_hierarchy
            WHERE parent_role_id = $1 OR child_role_id = $1
            "#,
        )
        .bind(role_id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to delete hierarchy edges for role {role_id}: {error}"
            ))
        })?;

        Ok(result.rows_affected())
    }

    pub(super) async fn replace_parent_edges_impl(
        &self,
        child_id: RoleId,
        parent_id: Option<RoleId>,
    ) -> AppResult<Vec<HierarchyEdge>> {
        let mut transaction = self.begin_hierarchy_write().await?;
        ensure_role(&mut transaction, child_id).await?;

        sqlx::query("DELETE FROM role_hierarchy WHERE child_role_id = $1")
            .bind(child_id.as_i64())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to clear parent edges of role {child_id}: {error}"
                ))
            })?;

        let mut edges = Vec::new();
        if let Some(parent_id) = parent_id {
            edges.push(insert_checked_edge(&mut transaction, parent_id, child_id).await?);
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(edges)
    }

    pub(super) async fn list_edges_impl(&self) -> AppResult<Vec<HierarchyEdge>> {
        let rows = sqlx::query_as::<_, EdgeRow>(&format!(
            "SELECT {EDGE_COLUMNS} FROM role_hierarchy ORDER BY parent_role_id, child_role_id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list hierarchy edges: {error}"))
        })?;

        rows.into_iter().map(HierarchyEdge::try_from).collect()
    }
}

async fn insert_checked_edge(
    transaction: &mut Transaction<'_, Postgres>,
    parent_id: RoleId,
    child_id: RoleId,
) -> AppResult<HierarchyEdge> {
    ensure_role(transaction, parent_id).await?;
    ensure_role(transaction, child_id).await?;

    let existing = sqlx::query_as::<_, EdgeRow>(&format!(
        r#"
        SELECT {EDGE_COLUMNS}
        FROM role_hierarchy
        WHERE parent_role_id = $1 AND child_role_id = $2
        "#
    ))
    .bind(parent_id.as_i64())
    .bind(child_id.as_i64())
    .fetch_optional(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to load hierarchy edge: {error}")))?;
    if let Some(row) = existing {
        return HierarchyEdge::try_from(row);
    }

    if parent_id == child_id || is_ancestor(transaction, child_id, parent_id).await? {
        warn!(%parent_id, %child_id, "store rejected hierarchy edge that would close a cycle");
        return Err(AppError::CircularDependency(format!(
            "linking role {child_id} under role {parent_id} would create a cycle"
        )));
    }

    let row = sqlx::query_as::<_, EdgeRow>(&format!(
        r#"
        INSERT INTO role_hierarchy (parent_role_id, child_role_id)
        VALUES ($1, $2)
        RETURNING {EDGE_COLUMNS}
        "#
    ))
    .bind(parent_id.as_i64())
    .bind(child_id.as_i64())
    .fetch_one(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to insert hierarchy edge: {error}")))?;

    HierarchyEdge::try_from(row)
}

async fn ensure_role(
    transaction: &mut Transaction<'_, Postgres>,
    role_id: RoleId,
) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM roles WHERE id = $1)")
        .bind(role_id.as_i64())
        .fetch_one(&mut **transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to look up role {role_id}: {error}")))?;

    if exists {
        Ok(())
    } else {
        Err(role_not_found(role_id))
    }
}

/// Returns true when `candidate` is reachable from `role_id` through parent edges.
async fn is_ancestor(
    transaction: &mut Transaction<'_, Postgres>,
    candidate: RoleId,
    role_id: RoleId,
) -> AppResult<bool> {
    sqlx::query_scalar::<_, bool>(
        r#"
        WITH RECURSIVE ancestors (role_id) AS (
            SELECT parent_role_id
            FROM role_hierarchy
            WHERE child_role_id = $1
            UNION
            SELECT hierarchy.parent_role_id
            FROM role_hierarchy AS hierarchy
            JOIN ancestors ON hierarchy.child_role_id = ancestors.role_id
        )
        SELECT EXISTS (SELECT 1 FROM ancestors WHERE role_id = $2)
        "#,
    )
    .bind(role_id.as_i64())
    .bind(candidate.as_i64())
    .fetch_one(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to walk role ancestors: {error}")))
}
