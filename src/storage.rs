//! Local key/value storage
//!
//! The guest session keeps one flag in a volatile slot (scoped to the running
//! context) and one expiry boundary in a durable slot. Both slots share the
//! [`KeyValueStorage`] interface; implementations report failures and the
//! guest store decides how to degrade.

pub mod memory;
pub mod sled_store;

pub use memory::{MemoryStorage, UnavailableStorage};
pub use sled_store::SledStorage;

use crate::error::StorageError;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Synchronous, best-effort string key/value slot
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Where durable slots live on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of the durable store; the platform data dir when unset
    #[serde(default)]
    pub durable_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the durable store directory.
    ///
    /// Falls back to `<data dir>/maylo/local` from the platform project dirs,
    /// then to `.maylo/local` when no home directory can be determined.
    pub fn resolve_durable_path(&self) -> PathBuf {
        if let Some(path) = &self.durable_path {
            return path.clone();
        }
        ProjectDirs::from("", "", "maylo")
            .map(|dirs| dirs.data_dir().join("local"))
            .unwrap_or_else(|| PathBuf::from(".maylo").join("local"))
    }

    pub fn validate(&self) -> Result<(), String> {
        match &self.durable_path {
            Some(path) if path.as_os_str().is_empty() => {
                Err("durable_path cannot be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}
