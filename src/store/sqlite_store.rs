//! SQLite session store

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::{from_millis, to_millis, SessionStore};
use crate::config::StoreConfig;
use crate::error::{Operation, SessionError};
use crate::session::{Session, SessionData};
use crate::sweeper::{Purge, Sweeper};

const BACKEND: &str = "sqlite";

/// `SQLite`-backed session store.
///
/// # Table Schema
///
/// This store expects a table with the following schema
/// (created by [`SqliteStore::migrate`]):
///
/// ```sql
/// CREATE TABLE session (
///     id TEXT PRIMARY KEY,
///     expires_at TIMESTAMP NOT NULL,
///     data TEXT NOT NULL
/// );
///
/// CREATE INDEX idx_session_expires_at ON session(expires_at);
/// ```
///
/// `expires_at` holds unix milliseconds and `data` the JSON payload.
/// The pool is supplied by the caller and is never closed by the store.
pub struct SqliteStore {
    pool: SqlitePool,
    config: StoreConfig,
    sweeper: Sweeper,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    expires_at: i64,
    data: String,
}

#[derive(Clone)]
struct SqliteSweep {
    pool: SqlitePool,
}

#[async_trait]
impl Purge for SqliteSweep {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        let now = to_millis(Utc::now());
        let result = sqlx::query("DELETE FROM session WHERE expires_at < ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| SessionError::store(BACKEND, Operation::Sweep, e))?;

        Ok(result.rows_affected())
    }
}

impl SqliteStore {
    /// Creates a new `SQLite` session store whose sessions live for `max_age` seconds.
    ///
    /// Must be called inside a Tokio runtime, which runs the expiration sweeper.
    pub fn new(pool: SqlitePool, max_age: u64) -> Result<Self, SessionError> {
        Self::with_config(pool, StoreConfig::new(max_age))
    }

    /// Creates a new `SQLite` session store from a full configuration.
    pub fn with_config(pool: SqlitePool, config: StoreConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let sweeper = Sweeper::spawn(SqliteSweep { pool: pool.clone() }, config.max_age_duration())?;
        Ok(Self {
            pool,
            config,
            sweeper,
        })
    }

    /// Creates the `session` table and its expiration index if missing.
    pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS session (
                id TEXT PRIMARY KEY,
                expires_at TIMESTAMP NOT NULL,
                data TEXT NOT NULL
            )
            ",
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_session_expires_at ON session(expires_at)")
            .execute(pool)
            .await?;

        tracing::debug!("session table ready");
        Ok(())
    }

    /// Removes expired sessions now instead of waiting for the sweeper.
    pub async fn purge_expired(&self) -> Result<u64, SessionError> {
        SqliteSweep {
            pool: self.pool.clone(),
        }
        .purge_expired()
        .await
    }

    /// Whether the background sweeper is still running
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.is_running()
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn has(&self, id: &str) -> Result<bool, SessionError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM session WHERE id = ? AND expires_at >= ?")
                .bind(id)
                .bind(to_millis(Utc::now()))
                .fetch_one(&self.pool)
                .await
                .map_err(|e| SessionError::store(BACKEND, Operation::Has, e))?;

        Ok(count > 0)
    }

    async fn load(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT expires_at, data FROM session WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| SessionError::store(BACKEND, Operation::Load, e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        if row.expires_at < to_millis(Utc::now()) {
            return Ok(None);
        }

        let data: SessionData = serde_json::from_str(&row.data)
            .map_err(|e| SessionError::serialization(BACKEND, Operation::Load, e))?;
        Ok(Some(Session::from_parts(id.to_string(), data, from_millis(row.expires_at))))
    }

    async fn revoke(&self, id: &str) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM session WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| SessionError::store(BACKEND, Operation::Revoke, e))?;

        Ok(())
    }

    async fn save(&self, session: &Session) -> Result<(), SessionError> {
        let data = serde_json::to_string(&session.data())
            .map_err(|e| SessionError::serialization(BACKEND, Operation::Save, e))?;
        let expires_at = Utc::now() + self.config.max_age_delta();

        sqlx::query(
            r"
            INSERT INTO session (id, expires_at, data)
            VALUES (?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                expires_at = excluded.expires_at,
                data = excluded.data
            ",
        )
        .bind(session.id())
        .bind(to_millis(expires_at))
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::store(BACKEND, Operation::Save, e))?;

        session.set_expires_at(expires_at);
        Ok(())
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.sweeper.stop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::time::Duration;

    async fn memory_pool() -> SqlitePool {
        // One connection: every connection to :memory: is a separate database.
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn migrated_pool() -> SqlitePool {
        let pool = memory_pool().await;
        SqliteStore::migrate(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_sqlite_store_basic() {
        let store = SqliteStore::new(migrated_pool().await, 3600).unwrap();

        let session = Session::new("test-id");
        session.set("user", "alice");
        store.save(&session).await.unwrap();
        assert!(store.has("test-id").await.unwrap());

        let retrieved = store.load("test-id").await.unwrap().unwrap();
        assert_eq!(retrieved.get_as::<String>("user"), Some("alice".to_string()));
        assert_eq!(
            retrieved.expires_at().map(to_millis),
            session.expires_at().map(to_millis)
        );

        store.revoke("test-id").await.unwrap();
        assert!(store.load("test-id").await.unwrap().is_none());

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_migrate_is_repeatable() {
        let pool = migrated_pool().await;
        SqliteStore::migrate(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_replaces_payload_and_expiry() {
        let pool = migrated_pool().await;
        let store = SqliteStore::new(pool.clone(), 3600).unwrap();

        let session = Session::new("up");
        session.set("value", 123);
        store.save(&session).await.unwrap();
        let first = session.expires_at().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        session.set("value", 456);
        store.save(&session).await.unwrap();
        assert!(session.expires_at().unwrap() > first);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM session")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let stored: i64 = sqlx::query_scalar("SELECT expires_at FROM session WHERE id = 'up'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stored, to_millis(session.expires_at().unwrap()));

        let loaded = store.load("up").await.unwrap().unwrap();
        assert_eq!(loaded.get("value"), Some(json!(456)));

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_serialization_error() {
        let pool = migrated_pool().await;
        let store = SqliteStore::new(pool.clone(), 3600).unwrap();

        sqlx::query("INSERT INTO session (id, expires_at, data) VALUES ('bad', ?, '{not json')")
            .bind(to_millis(Utc::now()) + 60_000)
            .execute(&pool)
            .await
            .unwrap();

        let err = store.load("bad").await.unwrap_err();
        assert!(err.is_serialization());
        assert_eq!(err.backend(), Some("sqlite"));
        assert_eq!(err.operation(), Some(Operation::Load));

        // Not found stays distinct from corruption.
        assert!(store.load("missing").await.unwrap().is_none());

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_table_is_store_error() {
        let store = SqliteStore::new(memory_pool().await, 3600).unwrap();

        let err = store.has("x").await.unwrap_err();
        assert!(err.is_store());
        assert_eq!(err.operation(), Some(Operation::Has));

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_row_hidden_then_purged() {
        let pool = migrated_pool().await;
        let store = SqliteStore::new(pool.clone(), 3600).unwrap();

        sqlx::query("INSERT INTO session (id, expires_at, data) VALUES ('stale', ?, '{}')")
            .bind(to_millis(Utc::now()) - 1000)
            .execute(&pool)
            .await
            .unwrap();
        store.save(&Session::new("fresh")).await.unwrap();

        assert!(!store.has("stale").await.unwrap());
        assert!(store.load("stale").await.unwrap().is_none());

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.has("fresh").await.unwrap());

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_sweeps_do_not_stop_sweeper() {
        // No table: every sweep fails.
        let store = SqliteStore::new(memory_pool().await, 1).unwrap();
        tokio::time::sleep(Duration::from_millis(2200)).await;
        assert!(store.is_sweeping());
        store.close().await.unwrap();
        assert!(!store.is_sweeping());
    }

    #[tokio::test]
    async fn test_pool_can_close_right_after_store() {
        let pool = migrated_pool().await;
        let store = SqliteStore::new(pool.clone(), 1).unwrap();
        store.save(&Session::new("1")).await.unwrap();

        store.close().await.unwrap();
        pool.close().await;

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!store.is_sweeping());
        assert!(pool.is_closed());
    }
}
