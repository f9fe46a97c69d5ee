//! src/services/kv_store.rs
//!
//! The persistence port used by the move and package stores: a flat
//! string-keyed store of JSON documents. `SqliteKvStore` keeps slots in a
//! single SQLite table; `MemoryKvStore` keeps them in a map and is what the
//! tests inject.

use crate::errors::{StoreError, StoreResult};
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{
    collections::BTreeMap,
    future::Future,
    str::FromStr,
    sync::{Arc, Mutex},
};
use tracing::debug;

const MIGRATION_SQL: &str = include_str!("../../migrations/0001_init.sql");

/// String-keyed document storage.
///
/// Implementations must be cheap to clone; clones share the same underlying
/// data.
pub trait KvStore: Clone + Send + Sync + 'static {
    /// Read a slot. Absence is `Ok(None)`.
    fn get(&self, key: &str) -> impl Future<Output = StoreResult<Option<String>>> + Send;

    /// Create or overwrite a slot.
    fn set(&self, key: &str, value: String) -> impl Future<Output = StoreResult<()>> + Send;

    /// Remove a slot. Returns whether it existed.
    fn remove(&self, key: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Every key starting with `prefix`, sorted.
    fn keys_with_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = StoreResult<Vec<String>>> + Send;
}

/// Load a JSON array slot, treating a missing slot as empty.
pub async fn read_list<S, T>(store: &S, key: &str) -> StoreResult<Vec<T>>
where
    S: KvStore,
    T: DeserializeOwned,
{
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        }),
        None => Ok(Vec::new()),
    }
}

/// Persist a JSON array slot.
pub async fn write_list<S, T>(store: &S, key: &str, items: &[T]) -> StoreResult<()>
where
    S: KvStore,
    T: Serialize,
{
    let raw = serde_json::to_string(items)?;
    store.set(key, raw).await
}

/// SQLite-backed slots, one row per key.
#[derive(Clone)]
pub struct SqliteKvStore {
    pub db: Arc<SqlitePool>,
}

impl SqliteKvStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Open a pool for `database_url`, creating the database file if needed.
    ///
    /// In-memory databases are limited to one connection so every query sees
    /// the same database.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool_options = if database_url.contains(":memory:") {
            // closing the only connection would drop the database
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Run the embedded schema statements. Safe to call repeatedly.
    pub async fn migrate(&self) -> StoreResult<usize> {
        let statements = MIGRATION_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        for stmt in &statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }

        Ok(statements.len())
    }
}

impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&*self.db)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        // substr avoids LIKE treating `_` and `%` in ids as wildcards.
        let keys = sqlx::query_scalar::<_, String>(
            "SELECT key FROM kv_entries WHERE substr(key, 1, ?) = ? ORDER BY key ASC",
        )
        .bind(prefix.chars().count() as i64)
        .bind(prefix)
        .fetch_all(&*self.db)
        .await?;
        Ok(keys)
    }
}

/// Process-local slots. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<R>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> R) -> R {
        let mut guard = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.with_entries(|map| map.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: String) -> StoreResult<()> {
        self.with_entries(|map| map.insert(key.to_string(), value));
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        Ok(self.with_entries(|map| map.remove(key).is_some()))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self.with_entries(|map| {
            map.keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect()
        }))
    }
}
