//! StateStore — redb-backed persistence for instance records.
//!
//! Provides typed CRUD operations over instances. All values are
//! JSON-serialized into redb's `&[u8]` value columns. The store supports
//! both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{InventoryError, InventoryResult};
use crate::tables::*;
use crate::types::*;

fn encode(instance: &Instance) -> InventoryResult<Vec<u8>> {
    serde_json::to_vec(instance).map_err(|source| InventoryError::Encode {
        name: instance.name.clone(),
        source,
    })
}

fn decode(name: &str, bytes: &[u8]) -> InventoryResult<Instance> {
    serde_json::from_slice(bytes).map_err(|source| InventoryError::Corrupt {
        name: name.to_string(),
        source,
    })
}

/// Thread-safe inventory store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> InventoryResult<Self> {
        let db = Database::create(path)?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "inventory store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> InventoryResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder().create_with_backend(backend)?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory inventory store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> InventoryResult<()> {
        let txn = self.db.begin_write()?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(INSTANCES)?;
        txn.commit()?;
        Ok(())
    }

    /// Insert or replace an instance record.
    pub fn put_instance(&self, instance: &Instance) -> InventoryResult<()> {
        let key = instance.table_key();
        let value = encode(instance)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(INSTANCES)?;
            table.insert(key, value.as_slice())?;
        }
        txn.commit()?;
        debug!(%key, state = %instance.state, "instance stored");
        Ok(())
    }

    /// Replace an existing instance record.
    ///
    /// Fails with [`InventoryError::NotFound`] if no record with the same name
    /// exists; the existence check and the write share one transaction.
    pub fn update_instance(&self, instance: &Instance) -> InventoryResult<()> {
        let key = instance.table_key();
        let value = encode(instance)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(INSTANCES)?;
            if table.get(key)?.is_none() {
                return Err(InventoryError::NotFound(key.to_string()));
            }
            table.insert(key, value.as_slice())?;
        }
        txn.commit()?;
        debug!(%key, state = %instance.state, "instance updated");
        Ok(())
    }

    /// Get an instance by name.
    pub fn get_instance(&self, name: &str) -> InventoryResult<Option<Instance>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(INSTANCES)?;
        match table.get(name)? {
            Some(guard) => {
                let instance = decode(name, guard.value())?;
                Ok(Some(instance))
            }
            None => Ok(None),
        }
    }

    /// List all instances, ordered by name.
    pub fn list_instances(&self) -> InventoryResult<Vec<Instance>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(INSTANCES)?;
        let mut results = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            results.push(decode(key.value(), value.value())?);
        }
        Ok(results)
    }

    /// List instances currently in the given lifecycle state.
    pub fn list_instances_in_state(&self, state: LifecycleState) -> InventoryResult<Vec<Instance>> {
        Ok(self
            .list_instances()?
            .into_iter()
            .filter(|i| i.state == state)
            .collect())
    }

    /// Delete an instance by name. Returns true if it existed.
    pub fn delete_instance(&self, name: &str) -> InventoryResult<bool> {
        let txn = self.db.begin_write()?;
        let existed;
        {
            let mut table = txn.open_table(INSTANCES)?;
            existed = table.remove(name)?.is_some();
        }
        txn.commit()?;
        debug!(%name, existed, "instance deleted");
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_instance(name: &str, state: LifecycleState) -> Instance {
        Instance {
            name: name.to_string(),
            provider: "amazon".to_string(),
            address: "10.0.0.1".to_string(),
            image: "ubuntu-22.04".to_string(),
            region: "us-east-1".to_string(),
            size: "t3.medium".to_string(),
            capacity: 2,
            state,
            error: None,
            created: 1000,
            updated: 1000,
        }
    }

    #[test]
    fn instance_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let inst = test_instance("agent-1", LifecycleState::Running);

        store.put_instance(&inst).unwrap();
        let retrieved = store.get_instance("agent-1").unwrap();

        assert_eq!(retrieved, Some(inst));
    }

    #[test]
    fn instance_get_nonexistent_returns_none() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.get_instance("nope").unwrap().is_none());
    }

    #[test]
    fn instance_list_all() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_instance(&test_instance("b", LifecycleState::Running)).unwrap();
        store.put_instance(&test_instance("a", LifecycleState::Pending)).unwrap();
        store.put_instance(&test_instance("c", LifecycleState::Running)).unwrap();

        let all = store.list_instances().unwrap();
        let names: Vec<_> = all.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn instance_list_by_state() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_instance(&test_instance("a", LifecycleState::Running)).unwrap();
        store.put_instance(&test_instance("b", LifecycleState::Pending)).unwrap();
        store.put_instance(&test_instance("c", LifecycleState::Running)).unwrap();

        let running = store.list_instances_in_state(LifecycleState::Running).unwrap();
        assert_eq!(running.len(), 2);
        let shutdown = store
            .list_instances_in_state(LifecycleState::ShutdownRequested)
            .unwrap();
        assert!(shutdown.is_empty());
    }

    #[test]
    fn update_replaces_existing_record() {
        let store = StateStore::open_in_memory().unwrap();
        let mut inst = test_instance("agent-1", LifecycleState::Running);
        store.put_instance(&inst).unwrap();

        inst.state = LifecycleState::ShutdownRequested;
        inst.updated = 2000;
        store.update_instance(&inst).unwrap();

        let retrieved = store.get_instance("agent-1").unwrap().unwrap();
        assert_eq!(retrieved.state, LifecycleState::ShutdownRequested);
        assert_eq!(retrieved.updated, 2000);
    }

    #[test]
    fn update_missing_record_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        let inst = test_instance("ghost", LifecycleState::Running);

        let err = store.update_instance(&inst).unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(ref key) if key == "ghost"));
        assert!(store.get_instance("ghost").unwrap().is_none());
    }

    #[test]
    fn undecodable_record_is_reported_as_corrupt() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_instance(&test_instance("agent-1", LifecycleState::Running)).unwrap();
        let txn = store.db.begin_write().unwrap();
        {
            let mut table = txn.open_table(INSTANCES).unwrap();
            table.insert("agent-2", b"not json".as_slice()).unwrap();
        }
        txn.commit().unwrap();

        let err = store.list_instances().unwrap_err();
        assert!(matches!(err, InventoryError::Corrupt { ref name, .. } if name == "agent-2"));
        assert!(store.get_instance("agent-1").unwrap().is_some());
    }

    #[test]
    fn instance_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_instance(&test_instance("agent-1", LifecycleState::Stopped)).unwrap();

        assert!(store.delete_instance("agent-1").unwrap());
        assert!(!store.delete_instance("agent-1").unwrap());
        assert!(store.get_instance("agent-1").unwrap().is_none());
    }

    #[test]
    fn error_field_round_trips() {
        let store = StateStore::open_in_memory().unwrap();
        let mut inst = test_instance("broken", LifecycleState::Error);
        inst.error = Some("quota exceeded".to_string());
        store.put_instance(&inst).unwrap();

        let retrieved = store.get_instance("broken").unwrap().unwrap();
        assert_eq!(retrieved.error.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("inventory.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.put_instance(&test_instance("agent-1", LifecycleState::Running)).unwrap();
        }

        let store = StateStore::open(&db_path).unwrap();
        let inst = store.get_instance("agent-1").unwrap();
        assert_eq!(inst.map(|i| i.state), Some(LifecycleState::Running));
    }

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();

        assert!(store.list_instances().unwrap().is_empty());
        assert!(!store.delete_instance("nope").unwrap());
    }
}
