//! ConfigStore — persistence for the shared endpoint record.
//!
//! The record is a read-modify-write target without compare-and-swap:
//! concurrent writers can lose updates, and every write carries the full
//! derived state so the next successful write repairs it.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase};
use tracing::debug;

use crate::endpoints::EndpointRecord;
use crate::error::{StateError, StateResult};
use crate::tables::MON_ENDPOINTS;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Key/value record shared by every component of a cluster.
pub trait ConfigStore: Send + Sync {
    /// Load the record for a cluster namespace, if one was written.
    fn load(&self, namespace: &str) -> StateResult<Option<EndpointRecord>>;

    /// Replace the record for a cluster namespace.
    fn save(&self, namespace: &str, record: &EndpointRecord) -> StateResult<()>;
}

/// Endpoint store backed by redb.
#[derive(Clone)]
pub struct RedbConfigStore {
    db: Arc<Database>,
}

impl RedbConfigStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "endpoint store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory endpoint store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(MON_ENDPOINTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

impl ConfigStore for RedbConfigStore {
    fn load(&self, namespace: &str) -> StateResult<Option<EndpointRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(MON_ENDPOINTS).map_err(map_err!(Table))?;
        match table.get(namespace).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: EndpointRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn save(&self, namespace: &str, record: &EndpointRecord) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(MON_ENDPOINTS).map_err(map_err!(Table))?;
            table
                .insert(namespace, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%namespace, endpoints = %record.data, "endpoint record stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(data: &str) -> EndpointRecord {
        EndpointRecord {
            data: data.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn load_missing_returns_none() {
        let store = RedbConfigStore::open_in_memory().unwrap();
        assert!(store.load("storage").unwrap().is_none());
    }

    #[test]
    fn save_and_load() {
        let store = RedbConfigStore::open_in_memory().unwrap();
        let rec = record("a=10.0.0.1:6789");
        store.save("storage", &rec).unwrap();
        assert_eq!(store.load("storage").unwrap(), Some(rec));
    }

    #[test]
    fn save_overwrites_and_is_namespaced() {
        let store = RedbConfigStore::open_in_memory().unwrap();
        store.save("one", &record("a=10.0.0.1:6789")).unwrap();
        store.save("one", &record("b=10.0.0.2:6789")).unwrap();
        store.save("two", &record("c=10.0.0.3:6789")).unwrap();

        assert_eq!(store.load("one").unwrap().unwrap().data, "b=10.0.0.2:6789");
        assert_eq!(store.load("two").unwrap().unwrap().data, "c=10.0.0.3:6789");
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("endpoints.redb");

        {
            let store = RedbConfigStore::open(&db_path).unwrap();
            store.save("prod", &record("a=10.0.0.1:6789")).unwrap();
        }

        let store = RedbConfigStore::open(&db_path).unwrap();
        let loaded = store.load("prod").unwrap().unwrap();
        assert_eq!(loaded.data, "a=10.0.0.1:6789");
        assert_eq!(loaded.max_id, -1);
    }
}
