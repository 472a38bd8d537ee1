//! SQLite-backed registry.
//!
//! Definitions are stored as JSON blobs keyed by name, one table per object
//! kind. A single connection behind a mutex is plenty here: registry traffic
//! is administrative, not on the serving path.

use crate::entity::Entity;
use crate::error::{FeatureStoreError, Result};
use crate::feature_service::FeatureService;
use crate::feature_view::FeatureView;
use crate::registry::Registry;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

const TABLES: [&str; 3] = ["entities", "feature_views", "feature_services"];

pub struct SqliteRegistry {
    db: Mutex<Connection>,
}

impl SqliteRegistry {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Connection::open(db_path)
            .map_err(|e| FeatureStoreError::Registry(format!("Failed to open registry database: {}", e)))?;

        let registry = Self { db: Mutex::new(db) };
        registry.init_schema()?;
        info!(path = %db_path.display(), "opened registry");
        Ok(registry)
    }

    /// Purely in-memory registry, used by tests and throwaway repos.
    pub fn in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()
            .map_err(|e| FeatureStoreError::Registry(format!("Failed to open registry database: {}", e)))?;
        let registry = Self { db: Mutex::new(db) };
        registry.init_schema()?;
        Ok(registry)
    }

    fn init_schema(&self) -> Result<()> {
        let db = self.lock();
        for table in TABLES {
            db.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        name TEXT PRIMARY KEY,
                        data TEXT NOT NULL,
                        updated_timestamp TEXT NOT NULL
                    )",
                    table
                ),
                [],
            )
            .map_err(|e| FeatureStoreError::Registry(format!("Failed to create table {}: {}", table, e)))?;
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // Connection access never panics while holding the guard.
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn upsert<T: Serialize>(&self, table: &str, name: &str, object: &T) -> Result<()> {
        let payload = serde_json::to_string(object)?;
        self.lock()
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (name, data, updated_timestamp) VALUES (?1, ?2, ?3)",
                    table
                ),
                params![name, payload, Utc::now().to_rfc3339()],
            )
            .map_err(|e| FeatureStoreError::Registry(format!("Failed to write {}: {}", table, e)))?;
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, table: &str, name: &str) -> Result<Option<T>> {
        let payload: Option<String> = self
            .lock()
            .query_row(
                &format!("SELECT data FROM {} WHERE name = ?1", table),
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| FeatureStoreError::Registry(format!("Failed to read {}: {}", table, e)))?;

        match payload {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    fn fetch_all<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let db = self.lock();
        let mut statement = db
            .prepare(&format!("SELECT data FROM {} ORDER BY name", table))
            .map_err(|e| FeatureStoreError::Registry(format!("Failed to read {}: {}", table, e)))?;

        let rows = statement
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| FeatureStoreError::Registry(format!("Failed to read {}: {}", table, e)))?;

        let mut objects = Vec::new();
        for row in rows {
            let data = row
                .map_err(|e| FeatureStoreError::Registry(format!("Failed to read {}: {}", table, e)))?;
            objects.push(serde_json::from_str(&data)?);
        }
        Ok(objects)
    }

    fn remove(&self, table: &str, name: &str) -> Result<()> {
        self.lock()
            .execute(&format!("DELETE FROM {} WHERE name = ?1", table), params![name])
            .map_err(|e| FeatureStoreError::Registry(format!("Failed to delete from {}: {}", table, e)))?;
        Ok(())
    }
}

impl Registry for SqliteRegistry {
    fn apply_entity(&self, entity: &Entity) -> Result<()> {
        entity.validate()?;
        self.upsert("entities", &entity.name, entity)
    }

    fn apply_feature_view(&self, view: &FeatureView) -> Result<()> {
        view.validate()?;
        self.upsert("feature_views", &view.name, view)
    }

    fn apply_feature_service(&self, service: &FeatureService) -> Result<()> {
        service.validate()?;
        self.upsert("feature_services", &service.name, service)
    }

    fn get_entity(&self, name: &str) -> Result<Option<Entity>> {
        self.fetch("entities", name)
    }

    fn get_feature_view(&self, name: &str) -> Result<Option<FeatureView>> {
        self.fetch("feature_views", name)
    }

    fn get_feature_service(&self, name: &str) -> Result<Option<FeatureService>> {
        self.fetch("feature_services", name)
    }

    fn list_entities(&self) -> Result<Vec<Entity>> {
        self.fetch_all("entities")
    }

    fn list_feature_views(&self) -> Result<Vec<FeatureView>> {
        self.fetch_all("feature_views")
    }

    fn list_feature_services(&self) -> Result<Vec<FeatureService>> {
        self.fetch_all("feature_services")
    }

    fn delete_entity(&self, name: &str) -> Result<()> {
        self.remove("entities", name)
    }

    fn delete_feature_view(&self, name: &str) -> Result<()> {
        self.remove("feature_views", name)
    }

    fn delete_feature_service(&self, name: &str) -> Result<()> {
        self.remove("feature_services", name)
    }

    fn teardown(&self) -> Result<()> {
        let db = self.lock();
        for table in TABLES {
            db.execute(&format!("DELETE FROM {}", table), [])
                .map_err(|e| FeatureStoreError::Registry(format!("Failed to clear {}: {}", table, e)))?;
        }
        Ok(())
    }
}
