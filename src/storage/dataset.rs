//! # Durable Graph Dataset
//!
//! redb-backed persistence for named graphs. One table maps graph name to
//! its postcard-encoded [`GraphSnapshot`]; every operation runs in its own
//! transaction, so a successful return means a durable commit.
//!
//! The database handle lives in an `Option`: [`Dataset::close`] drops it,
//! and every later operation reports [`StoreError::BackendUnavailable`].

use crate::types::{GraphSnapshot, StoreError};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

/// graph name -> postcard-encoded snapshot
const GRAPHS: TableDefinition<&str, &[u8]> = TableDefinition::new("graphs");

/// Database file name inside a store directory.
const DATASET_FILE: &str = "graphs.redb";

/// Durable name -> snapshot dataset for one local store.
pub struct Dataset {
    db: RwLock<Option<Database>>,
}

impl Dataset {
    /// Open (or create) the dataset inside a store directory.
    pub fn open(directory: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(directory)?;
        let db = Database::create(directory.join(DATASET_FILE))
            .map_err(|e| StoreError::BackendUnavailable(e.to_string()))?;

        // Create the table up front so reads never hit a missing table.
        let write_txn = db
            .begin_write()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        write_txn
            .open_table(GRAPHS)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        write_txn
            .commit()
            .map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(Self {
            db: RwLock::new(Some(db)),
        })
    }

    fn db_guard(&self) -> RwLockReadGuard<'_, Option<Database>> {
        self.db.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn closed() -> StoreError {
        StoreError::BackendUnavailable("dataset is closed".to_string())
    }

    /// Fetch one graph's persisted snapshot.
    pub fn get_named(&self, name: &str) -> Result<Option<GraphSnapshot>, StoreError> {
        let guard = self.db_guard();
        let db = guard.as_ref().ok_or_else(Self::closed)?;

        let read_txn = db
            .begin_read()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        let table = read_txn
            .open_table(GRAPHS)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        let value = table
            .get(name)
            .map_err(|e| StoreError::Io(e.to_string()))?;

        match value {
            Some(bytes) => {
                let snapshot = postcard::from_bytes(bytes.value())
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Persist one graph's snapshot with a durable commit.
    pub fn put_named(&self, name: &str, snapshot: &GraphSnapshot) -> Result<(), StoreError> {
        let guard = self.db_guard();
        let db = guard.as_ref().ok_or_else(Self::closed)?;

        let bytes = postcard::to_allocvec(snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let write_txn = db
            .begin_write()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(GRAPHS)
                .map_err(|e| StoreError::Io(e.to_string()))?;
            table
                .insert(name, bytes.as_slice())
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    /// Persist a batch of snapshots in one write transaction (all-or-nothing;
    /// this is the `sync()` path).
    pub fn put_all(&self, snapshots: &BTreeMap<String, GraphSnapshot>) -> Result<(), StoreError> {
        let guard = self.db_guard();
        let db = guard.as_ref().ok_or_else(Self::closed)?;

        let write_txn = db
            .begin_write()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(GRAPHS)
                .map_err(|e| StoreError::Io(e.to_string()))?;
            for (name, snapshot) in snapshots {
                let bytes = postcard::to_allocvec(snapshot)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                table
                    .insert(name.as_str(), bytes.as_slice())
                    .map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }
        write_txn
            .commit()
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    /// Delete one graph's persisted record. Returns whether it existed.
    pub fn remove_named(&self, name: &str) -> Result<bool, StoreError> {
        let guard = self.db_guard();
        let db = guard.as_ref().ok_or_else(Self::closed)?;

        let write_txn = db
            .begin_write()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        let existed = {
            let mut table = write_txn
                .open_table(GRAPHS)
                .map_err(|e| StoreError::Io(e.to_string()))?;
            table
                .remove(name)
                .map_err(|e| StoreError::Io(e.to_string()))?
                .is_some()
        };
        write_txn
            .commit()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(existed)
    }

    /// All persisted graph names, in deterministic order.
    pub fn list_names(&self) -> Result<Vec<String>, StoreError> {
        let guard = self.db_guard();
        let db = guard.as_ref().ok_or_else(Self::closed)?;

        let read_txn = db
            .begin_read()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        let table = read_txn
            .open_table(GRAPHS)
            .map_err(|e| StoreError::Io(e.to_string()))?;

        let mut names = Vec::new();
        for entry in table.iter().map_err(|e| StoreError::Io(e.to_string()))? {
            let (key, _) = entry.map_err(|e| StoreError::Io(e.to_string()))?;
            names.push(key.value().to_string());
        }
        Ok(names)
    }

    /// Empty durable commit: forces pending state to stable storage.
    pub fn flush(&self) -> Result<(), StoreError> {
        let guard = self.db_guard();
        let db = guard.as_ref().ok_or_else(Self::closed)?;

        let write_txn = db
            .begin_write()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        write_txn
            .commit()
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    /// Release the database handle. Idempotent; later operations report
    /// `BackendUnavailable`.
    pub fn close(&self) {
        self.db
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

// =============================================================================
// TESTS
// =============================================================================
