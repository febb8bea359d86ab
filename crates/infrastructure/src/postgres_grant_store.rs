use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use rolewarden_application::{GrantStore, UpsertGrantInput};
use rolewarden_core::{AppError, AppResult, GrantId, PrincipalId, RealmId, RoleId};
use rolewarden_domain::Grant;

#[cfg(test)]
mod tests;

/// PostgreSQL-backed store for temporary role grants.
#[derive(Clone)]
pub struct PostgresGrantStore {
    pool: PgPool,
}

impl PostgresGrantStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct GrantRow {
    id: i64,
    principal_id: i64,
    realm_id: i64,
    role_id: i64,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<GrantRow> for Grant {
    fn from(row: GrantRow) -> Self {
        Self {
            id: GrantId::new(row.id),
            principal_id: PrincipalId::new(row.principal_id),
            realm_id: RealmId::new(row.realm_id),
            role_id: RoleId::new(row.role_id),
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

fn storage_error(context: &str, error: sqlx::Error) -> AppError {
    AppError::StorageUnavailable(format!("{context}: {error}"))
}

#[async_trait]
impl GrantStore for PostgresGrantStore {
    async fn ensure_schema(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS temporary_role_grants (
                id BIGSERIAL PRIMARY KEY,
                principal_id BIGINT NOT NULL,
                realm_id BIGINT NOT NULL,
                role_id BIGINT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (principal_id, realm_id, role_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|error| storage_error("failed to create grant table", error))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_temporary_role_grants_expires_at
            ON temporary_role_grants (expires_at)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|error| storage_error("failed to create expiry index", error))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_temporary_role_grants_principal_realm
            ON temporary_role_grants (principal_id, realm_id)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|error| storage_error("failed to create principal index", error))?;

        Ok(())
    }

    async fn upsert(&self, input: UpsertGrantInput) -> AppResult<Grant> {
        let row = sqlx::query_as::<_, GrantRow>(
            r#"
            INSERT INTO temporary_role_grants (principal_id, realm_id, role_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (principal_id, realm_id, role_id)
            DO UPDATE SET expires_at = EXCLUDED.expires_at, created_at = EXCLUDED.created_at
            RETURNING id, principal_id, realm_id, role_id, expires_at, created_at
            "#,
        )
        .bind(input.principal_id.as_i64())
        .bind(input.realm_id.as_i64())
        .bind(input.role_id.as_i64())
        .bind(input.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| storage_error("failed to upsert grant", error))?;

        Ok(row.into())
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<Grant>> {
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT id, principal_id, realm_id, role_id, expires_at, created_at
            FROM temporary_role_grants
            WHERE expires_at <= $1
            ORDER BY expires_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_error("failed to list expired grants", error))?;

        Ok(rows.into_iter().map(Grant::from).collect())
    }

    async fn list_active(
        &self,
        principal_id: PrincipalId,
        realm_id: RealmId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Grant>> {
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT id, principal_id, realm_id, role_id, expires_at, created_at
            FROM temporary_role_grants
            WHERE principal_id = $1
              AND realm_id = $2
              AND expires_at > $3
            ORDER BY expires_at ASC
            "#,
        )
        .bind(principal_id.as_i64())
        .bind(realm_id.as_i64())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_error("failed to list active grants", error))?;

        Ok(rows.into_iter().map(Grant::from).collect())
    }

    async fn delete_many(&self, ids: &[GrantId]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let id_values: Vec<i64> = ids.iter().map(GrantId::as_i64).collect();

        let deleted = sqlx::query(
            r#"
            DELETE FROM temporary_role_grants
            WHERE id = ANY($1)
            "#,
        )
        .bind(&id_values)
        .execute(&self.pool)
        .await
        .map_err(|error| storage_error("failed to delete grants", error))?
        .rows_affected();

        Ok(deleted)
    }

    async fn count(&self) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM temporary_role_grants")
            .fetch_one(&self.pool)
            .await
            .map_err(|error| storage_error("failed to count grants", error))
    }
}
