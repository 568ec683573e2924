//! Sled-backed durable storage slot

use crate::error::StorageError;
use crate::storage::KeyValueStorage;
use std::path::Path;

const DEFAULT_TREE: &str = "maylo_local";

/// Durable slot that survives process restarts
pub struct SledStorage {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledStorage {
    /// Open (or create) a sled database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            StorageError::Unavailable(format!(
                "Failed to open sled database at {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_db(db)
    }

    /// Wrap an already opened database (e.g. a temporary one in tests)
    pub fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let tree = db.open_tree(DEFAULT_TREE)?;
        Ok(Self { db, tree })
    }

    pub fn db(&self) -> &sled::Db {
        &self.db
    }
}

impl KeyValueStorage for SledStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let Some(raw) = self.tree.get(key.as_bytes())? else {
            return Ok(None);
        };
        let value = String::from_utf8(raw.to_vec()).map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            value: String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })?;
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.tree.insert(key.as_bytes(), value.as_bytes())?;
        self.tree.flush()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.tree.remove(key.as_bytes())?;
        self.tree.flush()?;
        Ok(())
    }
}
