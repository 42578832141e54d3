use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio::sync::Mutex;
use tracing::debug;

/// Key under which the session token is persisted.
pub const TOKEN_KEY: &str = "token";

/// Scoped key-value capability used to persist the session token.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite url '{database_url}'"))?
            .create_if_missing(true);
        // each in-memory connection would otherwise see its own database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open token database '{database_url}'"))?;
        let storage = Self { pool };
        storage.ensure_kv_table().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_kv_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                scope      TEXT NOT NULL,
                key        TEXT NOT NULL,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (scope, key)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure kv_entries table exists")?;
        Ok(())
    }

    pub async fn load_entry(&self, scope: &str, key: &str) -> Result<Option<StoredEntry>> {
        let row = sqlx::query("SELECT value, updated_at FROM kv_entries WHERE scope = ? AND key = ?")
            .bind(scope)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load '{key}' for scope '{scope}'"))?;

        row.map(|row| {
            Ok::<_, anyhow::Error>(StoredEntry {
                value: row.try_get("value")?,
                updated_at: row.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    pub async fn save_entry(&self, scope: &str, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_entries (scope, key, value, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(scope, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(scope)
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save '{key}' for scope '{scope}'"))?;
        Ok(())
    }

    /// Returns whether an entry was actually deleted.
    pub async fn delete_entry(&self, scope: &str, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE scope = ? AND key = ?")
            .bind(scope)
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete '{key}' for scope '{scope}'"))?;
        Ok(result.rows_affected() > 0)
    }

    pub fn scoped(&self, scope: impl Into<String>) -> ScopedTokenStore {
        ScopedTokenStore {
            storage: self.clone(),
            scope: scope.into(),
        }
    }
}

/// A [`TokenStore`] view over one scope of the sqlite key-value table.
#[derive(Clone)]
pub struct ScopedTokenStore {
    storage: Storage,
    scope: String,
}

impl ScopedTokenStore {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub async fn load_entry(&self, key: &str) -> Result<Option<StoredEntry>> {
        self.storage.load_entry(&self.scope, key).await
    }
}

#[async_trait]
impl TokenStore for ScopedTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load_entry(key).await?.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.storage.save_entry(&self.scope, key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let removed = self.storage.delete_entry(&self.scope, key).await?;
        debug!(scope = %self.scope, key, removed, "removed stored value");
        Ok(())
    }
}

/// Process-local store, for tests and ephemeral sessions.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(key.into(), value.into());
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
