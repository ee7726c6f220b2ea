use super::*;

const ROLE_COLUMNS: &str = "id, name, description, capabilities";

impl PostgresRoleRepository {
    pub(super) async fn create_role_impl(&self, role: NewRole) -> AppResult<Role> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            r#"
            INSERT INTO roles (name, description, capabilities)
            VALUES ($1, $2, $3)
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(role.name.as_str())
        .bind(role.description.as_deref())
        .bind(capability_document(&role.capabilities))
        .fetch_one(&self.pool)
        .await
        .map_err(|error| map_role_conflict(error, role.name.as_str()))?;

        Role::try_from(row)
    }

    pub(super) async fn find_role_impl(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"
        ))
        .bind(role_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role {role_id}: {error}")))?;

        row.map(Role::try_from).transpose()
    }

    pub(super) async fn find_role_by_name_impl(&self, name: &str) -> AppResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role '{name}': {error}")))?;

        row.map(Role::try_from).transpose()
    }

    pub(super) async fn list_roles_impl(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        rows.into_iter().map(Role::try_from).collect()
    }

    pub(super) async fn update_role_impl(
        &self,
        role_id: RoleId,
        changes: RoleChanges,
    ) -> AppResult<Role> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1 FOR UPDATE"
        ))
        .bind(role_id.as_i64())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role {role_id}: {error}")))?
        .ok_or_else(|| role_not_found(role_id))?;

        let mut role = Role::try_from(row)?;
        changes.apply_to(&mut role);

        sqlx::query(
            r#"
            UPDATE roles
            SET description = $2, capabilities = $3
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_i64())
        .bind(role.description())
        .bind(capability_document(role.capabilities()))
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update role {role_id}: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(role)
    }

    pub(super) async fn delete_role_impl(&self, role_id: RoleId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to delete role {role_id}: {error}"))
            })?;

        if result.rows_affected() == 0 {
            return Err(role_not_found(role_id));
        }

        Ok(())
    }
}

fn map_role_conflict(error: sqlx::Error, role_name: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("role '{role_name}' already exists"));
    }

    AppError::Internal(format!("failed to create role: {error}"))
}
