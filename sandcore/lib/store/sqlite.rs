use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    migrate::Migrator,
    sqlite::{SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use tokio::fs;
use uuid::Uuid;

use crate::{
    models::{ProvisionHandle, SandboxRecord, SandboxStatus},
    SandcoreError, SandcoreResult,
};

use super::SandboxStore;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Migrator for the sandbox database
pub static SANDBOX_DB_MIGRATOR: Migrator = sqlx::migrate!("lib/store/migrations");

/// Maximum number of pooled connections.
const MAX_CONNECTIONS: u32 = 5;

const SELECT_COLUMNS: &str = "id, name, status, handle, created_at, updated_at, expires_at";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A [`SandboxStore`] backed by a SQLite database.
///
/// Every operation is a single statement, so each call is atomic on its own.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SqliteStore {
    /// Wraps an existing, already migrated connection pool.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `db_path` and runs migrations.
    pub async fn open(db_path: impl AsRef<Path>) -> SandcoreResult<Self> {
        let pool = init_db(db_path, &SANDBOX_DB_MIGRATOR).await?;
        Ok(Self::new(pool))
    }

    /// Returns the underlying connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Initializes a new SQLite database if it doesn't already exist at the specified path.
///
/// ## Arguments
///
/// * `db_path` - Path where the SQLite database file should be created
/// * `migrator` - SQLx migrator containing database schema migrations to run
pub async fn init_db(
    db_path: impl AsRef<Path>,
    migrator: &Migrator,
) -> SandcoreResult<Pool<Sqlite>> {
    let db_path = db_path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    // Create an empty database file if it doesn't exist
    if !db_path.exists() {
        fs::File::create(&db_path).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(&format!("sqlite://{}?mode=rwc", db_path.display()))
        .await?;

    migrator.run(&pool).await?;

    tracing::debug!(path = %db_path.display(), "sandbox database ready");

    Ok(pool)
}

fn to_micros(time: DateTime<Utc>) -> i64 {
    time.timestamp_micros()
}

fn from_micros(column: &str, micros: i64) -> SandcoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        SandcoreError::Store(format!("{column} out of range: {micros}"))
    })
}

fn row_to_record(row: &SqliteRow) -> SandcoreResult<SandboxRecord> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let handle: Option<String> = row.try_get("handle")?;

    Ok(SandboxRecord {
        id: Uuid::parse_str(&id)?,
        name: row.try_get("name")?,
        created_at: from_micros("created_at", row.try_get("created_at")?)?,
        updated_at: from_micros("updated_at", row.try_get("updated_at")?)?,
        expires_at: from_micros("expires_at", row.try_get("expires_at")?)?,
        status: status.parse()?,
        handle: handle.map(ProvisionHandle::new),
    })
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl SandboxStore for SqliteStore {
    async fn insert(&self, record: &SandboxRecord) -> SandcoreResult<Uuid> {
        sqlx::query(
            r#"
            INSERT INTO sandboxes (id, name, status, handle, created_at, updated_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.name)
        .bind(record.status.as_str())
        .bind(record.handle.as_ref().map(|h| h.as_str().to_string()))
        .bind(to_micros(record.created_at))
        .bind(to_micros(record.updated_at))
        .bind(to_micros(record.expires_at))
        .execute(&self.pool)
        .await?;

        Ok(record.id)
    }

    async fn get_by_id(&self, id: Uuid) -> SandcoreResult<SandboxRecord> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM sandboxes WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_record(&row),
            None => Err(SandcoreError::NotFound(id.to_string())),
        }
    }

    async fn get_by_name(&self, name: &str) -> SandcoreResult<Vec<SandboxRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM sandboxes WHERE name = ? ORDER BY created_at, id"
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn list_all(&self, limit: usize, offset: usize) -> SandcoreResult<Vec<SandboxRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM sandboxes ORDER BY created_at, id LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: SandboxStatus,
        at: DateTime<Utc>,
    ) -> SandcoreResult<bool> {
        let result = sqlx::query(
            "UPDATE sandboxes SET status = ?, updated_at = MAX(updated_at, ?) WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(to_micros(at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_expiration(
        &self,
        id: Uuid,
        expires_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> SandcoreResult<bool> {
        let result = sqlx::query(
            "UPDATE sandboxes SET expires_at = ?, updated_at = MAX(updated_at, ?) WHERE id = ?",
        )
        .bind(to_micros(expires_at))
        .bind(to_micros(at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn finish_provisioning(
        &self,
        id: Uuid,
        status: SandboxStatus,
        handle: Option<&ProvisionHandle>,
        at: DateTime<Utc>,
    ) -> SandcoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sandboxes
            SET status = ?, handle = ?, updated_at = MAX(updated_at, ?)
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(handle.map(|h| h.as_str().to_string()))
        .bind(to_micros(at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> SandcoreResult<bool> {
        let result = sqlx::query("DELETE FROM sandboxes WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_init_sandbox_db() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("nested").join("test_sandbox.db");

        let pool = init_db(&db_path, &SANDBOX_DB_MIGRATOR).await?;

        let tables = sqlx::query("SELECT name FROM sqlite_master WHERE type='table'")
            .fetch_all(&pool)
            .await?;

        let table_names: Vec<String> = tables
            .iter()
            .map(|row| row.get::<String, _>("name"))
            .collect();

        assert!(
            table_names.contains(&"sandboxes".to_string()),
            "sandboxes table not found"
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_timestamps_round_trip_at_microsecond_precision() -> anyhow::Result<()> {
        let micros = 1_700_000_000_123_456;
        let time = from_micros("created_at", micros)?;
        assert_eq!(to_micros(time), micros);
        Ok(())
    }
}
