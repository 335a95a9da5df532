use async_trait::async_trait;
use libsql::params;
use serde_json::Value;

use super::error::DatabaseError;
use crate::pool::{LibsqlManager, LibsqlPool};

/// Collection holding check definitions
pub const CHECKS: &str = "checks";

pub type DbResult<T> = Result<T, DatabaseError>;

/// Keyed record storage split into named collections
///
/// Records are opaque JSON and come back exactly as they were written.
/// Calls for different keys never interfere; calls for the same key are
/// applied one after another.
#[async_trait]
pub trait Database: Send + Sync {
    /// Store a new record, failing with `Conflict` if the key is taken
    async fn create(&self, collection: &str, key: &str, record: &Value) -> DbResult<()>;

    /// Fetch a record, failing with `NotFound` if the key is missing
    async fn read(&self, collection: &str, key: &str) -> DbResult<Value>;

    /// Replace an existing record, failing with `NotFound` if the key is missing
    async fn update(&self, collection: &str, key: &str, record: &Value) -> DbResult<()>;

    /// Remove a record, failing with `NotFound` if the key is missing
    async fn delete(&self, collection: &str, key: &str) -> DbResult<()>;

    /// All keys of a collection; an unknown collection is empty
    async fn list(&self, collection: &str) -> DbResult<Vec<String>>;
}

/// LibSQL database implementation
pub struct LibsqlDatabase {
    pool: LibsqlPool,
}

impl LibsqlDatabase {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> DbResult<deadpool::managed::Object<LibsqlManager>> {
        self.pool.get().await.map_err(|e| DatabaseError::Pool(e.to_string()))
    }
}

#[async_trait]
impl Database for LibsqlDatabase {
    async fn create(&self, collection: &str, key: &str, record: &Value) -> DbResult<()> {
        let conn = self.get_conn().await?;
        let body = serde_json::to_string(record)?;
        let now = chrono::Utc::now().timestamp_millis();

        let inserted = conn
            .execute(
                "INSERT INTO records (collection, key, body, created_at, updated_at) VALUES (?, ?, ?, ?, ?) ON CONFLICT(collection, key) DO NOTHING",
                params![collection.to_string(), key.to_string(), body, now, now],
            )
            .await?;

        if inserted == 0 { Err(DatabaseError::Conflict) } else { Ok(()) }
    }

    async fn read(&self, collection: &str, key: &str) -> DbResult<Value> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT body FROM records WHERE collection = ? AND key = ?",
                params![collection.to_string(), key.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let body: String = row.get(0)?;
                Ok(serde_json::from_str(&body)?)
            }
            None => Err(DatabaseError::NotFound),
        }
    }

    async fn update(&self, collection: &str, key: &str, record: &Value) -> DbResult<()> {
        let conn = self.get_conn().await?;
        let body = serde_json::to_string(record)?;
        let now = chrono::Utc::now().timestamp_millis();

        let updated = conn
            .execute(
                "UPDATE records SET body = ?, updated_at = ? WHERE collection = ? AND key = ?",
                params![body, now, collection.to_string(), key.to_string()],
            )
            .await?;

        if updated == 0 { Err(DatabaseError::NotFound) } else { Ok(()) }
    }

    async fn delete(&self, collection: &str, key: &str) -> DbResult<()> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute(
                "DELETE FROM records WHERE collection = ? AND key = ?",
                params![collection.to_string(), key.to_string()],
            )
            .await?;

        if deleted == 0 { Err(DatabaseError::NotFound) } else { Ok(()) }
    }

    async fn list(&self, collection: &str) -> DbResult<Vec<String>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT key FROM records WHERE collection = ? ORDER BY key",
                params![collection.to_string()],
            )
            .await?;

        let mut keys = Vec::new();
        while let Some(row) = rows.next().await? {
            keys.push(row.get::<String>(0)?);
        }

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::initialize_database;
    use crate::pool::open_pool;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;

    /// Helper to create a test database backed by a temp file
    async fn create_test_database() -> anyhow::Result<(LibsqlDatabase, tempfile::TempDir)> {
        let temp_dir = tempdir()?;
        let pool = open_pool(temp_dir.path().join("test.db"), 4).await?;

        let conn = pool.get().await.map_err(|e| anyhow::anyhow!(e.to_string()))?;
        initialize_database(&conn).await?;
        drop(conn);

        Ok((LibsqlDatabase::new_from_pool(pool), temp_dir))
    }

    #[tokio::test]
    async fn test_crud_round_trip() -> anyhow::Result<()> {
        let (db, _dir) = create_test_database().await?;
        let record = json!({ "id": "a", "nested": { "codes": [200, 201] }, "flag": true });

        db.create(CHECKS, "a", &record).await?;
        assert_eq!(db.read(CHECKS, "a").await?, record);

        let updated = json!({ "id": "a", "state": "up" });
        db.update(CHECKS, "a", &updated).await?;
        assert_eq!(db.read(CHECKS, "a").await?, updated);

        db.delete(CHECKS, "a").await?;
        assert!(matches!(db.read(CHECKS, "a").await, Err(DatabaseError::NotFound)));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_and_duplicate_keys() -> anyhow::Result<()> {
        let (db, _dir) = create_test_database().await?;
        let record = json!({ "id": "b" });

        db.create(CHECKS, "b", &record).await?;
        assert!(matches!(db.create(CHECKS, "b", &record).await, Err(DatabaseError::Conflict)));
        assert!(matches!(db.update(CHECKS, "zzz", &record).await, Err(DatabaseError::NotFound)));
        assert!(matches!(db.delete(CHECKS, "zzz").await, Err(DatabaseError::NotFound)));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_collection() -> anyhow::Result<()> {
        let (db, _dir) = create_test_database().await?;
        db.create(CHECKS, "c2", &json!({})).await?;
        db.create(CHECKS, "c1", &json!({})).await?;
        db.create("users", "5551234567", &json!({})).await?;

        assert_eq!(db.list(CHECKS).await?, vec!["c1".to_string(), "c2".to_string()]);
        assert_eq!(db.list("users").await?, vec!["5551234567".to_string()]);
        assert!(db.list("tokens").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_updates_to_different_keys() -> anyhow::Result<()> {
        let (db, _dir) = create_test_database().await?;
        let db = Arc::new(db);
        for i in 0..8 {
            db.create(CHECKS, &format!("k{i}"), &json!({ "n": 0 })).await?;
        }

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.update(CHECKS, &format!("k{i}"), &json!({ "n": i })).await
                })
            })
            .collect();

        for handle in handles {
            handle.await??;
        }

        for i in 0..8 {
            assert_eq!(db.read(CHECKS, &format!("k{i}")).await?, json!({ "n": i }));
        }
        Ok(())
    }
}
