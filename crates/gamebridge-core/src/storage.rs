//! On-device persistent storage for the local host simulator.
//!
//! Storage is a flat string-to-string map. Callers namespace their keys
//! (see [`crate::simulator`]) so game saves and leaderboard boards can share
//! one store without colliding.
//!
//! Two backends are provided:
//! - [`RedbStore`]: ACID persistence in a single redb file
//! - [`MemoryStore`]: process-lifetime map for tests and ephemeral sessions

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};

use crate::error::BridgeError;

// Table definitions
const LOCAL_STORAGE_TABLE: TableDefinition<&str, &str> = TableDefinition::new("local_storage");

/// Key/value storage used by the local simulator.
pub trait LocalStore: Send + Sync {
    /// Read a value; `None` if the key has never been written.
    fn get(&self, key: &str) -> Result<Option<String>, BridgeError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), BridgeError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), BridgeError>;

    /// Delete every key starting with `prefix`, returning how many were removed.
    fn remove_prefix(&self, prefix: &str) -> Result<usize, BridgeError>;
}

/// Storage layer using redb for ACID-compliant persistence
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<RwLock<Database>>,
}

impl RedbStore {
    /// Create a new store at the given path.
    ///
    /// This will:
    /// - Create the database directory if it doesn't exist
    /// - Initialize the database file
    /// - Create the storage table
    pub fn new(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(LOCAL_STORAGE_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }
}

impl LocalStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<String>, BridgeError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(LOCAL_STORAGE_TABLE)?;

        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BridgeError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(LOCAL_STORAGE_TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BridgeError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(LOCAL_STORAGE_TABLE)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove_prefix(&self, prefix: &str) -> Result<usize, BridgeError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        let removed;
        {
            let mut table = write_txn.open_table(LOCAL_STORAGE_TABLE)?;

            let mut doomed = Vec::new();
            for entry in table.range(prefix..)? {
                let (key, _) = entry?;
                let key = key.value();
                if !key.starts_with(prefix) {
                    break;
                }
                doomed.push(key.to_string());
            }

            for key in &doomed {
                table.remove(key.as_str())?;
            }
            removed = doomed.len();
        }
        write_txn.commit()?;
        Ok(removed)
    }
}

/// In-memory store. Contents live as long as the last clone.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, BridgeError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BridgeError> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BridgeError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn remove_prefix(&self, prefix: &str) -> Result<usize, BridgeError> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok(before - entries.len())
    }
}
