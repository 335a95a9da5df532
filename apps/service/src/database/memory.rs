use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::error::DatabaseError;
use super::repository::{Database, DbResult};

/// In-process record store, used for dry runs and tests
#[derive(Default)]
pub struct MemoryDatabase {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn create(&self, collection: &str, key: &str, record: &Value) -> DbResult<()> {
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.to_string()).or_default();
        if records.contains_key(key) {
            return Err(DatabaseError::Conflict);
        }
        records.insert(key.to_string(), record.clone());
        Ok(())
    }

    async fn read(&self, collection: &str, key: &str) -> DbResult<Value> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .and_then(|records| records.get(key))
            .cloned()
            .ok_or(DatabaseError::NotFound)
    }

    async fn update(&self, collection: &str, key: &str, record: &Value) -> DbResult<()> {
        let mut collections = self.collections.write().await;
        let slot = collections
            .get_mut(collection)
            .and_then(|records| records.get_mut(key))
            .ok_or(DatabaseError::NotFound)?;
        *slot = record.clone();
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> DbResult<()> {
        let mut collections = self.collections.write().await;
        collections
            .get_mut(collection)
            .and_then(|records| records.remove(key))
            .map(|_| ())
            .ok_or(DatabaseError::NotFound)
    }

    async fn list(&self, collection: &str) -> DbResult<Vec<String>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default())
    }
}
