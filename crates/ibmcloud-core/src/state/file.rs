// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: the new document goes to `<path>.tmp`, then is renamed
// - Backup: the previous document is copied to `<path>.backup` before each write
// - Corruption detection: JSON validation on load
// - Recovery: falls back to the backup if the main file cannot be parsed
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "serial": 7,
//   "resources": {
//     "ibm_dns_zone.main": {
//       "mode": "managed",
//       "resource_type": "ibm_dns_zone",
//       "id": "instance-guid/zone-id",
//       "attributes": { "name": "example.com", "state": "PENDING_NETWORK_ADD" },
//       "dependencies": [],
//       "schema_version": 0,
//       "last_updated": "2025-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{ResourceState, StateStore};

/// State file format version
const STATE_FILE_VERSION: &str = "1.0";

/// File-based state store with crash recovery
///
/// Every `put` and `remove` is written through immediately; `flush` only
/// writes when a previous write failed and left the store dirty.
///
/// # Example
///
/// ```rust,no_run
/// use ibmcloud_core::state::FileStateStore;
/// use ibmcloud_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("terraform.tfstate.json").await?;
///     for address in store.list().await? {
///         println!("{}", address);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    resources: BTreeMap<String, ResourceState>,
    serial: u64,
    dirty: bool,
}

/// Serializable state file format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateFileFormat {
    version: String,
    #[serde(default)]
    serial: u64,
    resources: BTreeMap<String, ResourceState>,
}

/// Why a state file could not be loaded
enum LoadFailure {
    /// Unparseable content; recoverable from backup
    Corrupt(String),
    /// Anything else (permissions, I/O)
    Fatal(Error),
}

impl FileStateStore {
    /// Create or load a file state store
    ///
    /// 1. Create parent directories if needed
    /// 2. Load the existing state file
    /// 3. If it is corrupted, load the backup and restore it
    /// 4. If both fail, start with empty state
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let loaded = Self::load_state_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                resources: loaded.resources,
                serial: loaded.serial,
                dirty: false,
            })),
        })
    }

    fn empty() -> StateFileFormat {
        StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            serial: 0,
            resources: BTreeMap::new(),
        }
    }

    async fn load_state_with_recovery(path: &Path) -> Result<StateFileFormat, Error> {
        let reason = match Self::load_state(path).await {
            Ok(state) => {
                tracing::debug!("Loaded state from file: {} resources", state.resources.len());
                return Ok(state);
            }
            Err(LoadFailure::Fatal(e)) => return Err(e),
            Err(LoadFailure::Corrupt(reason)) => reason,
        };

        tracing::warn!(
            "State file appears corrupted: {}. Attempting recovery from backup.",
            reason
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with empty state.");
            return Ok(Self::empty());
        }

        match Self::load_state(&backup_path).await {
            Ok(state) => {
                tracing::info!(
                    "Recovered state from backup: {} resources",
                    state.resources.len()
                );
                if let Err(restore_err) = Self::restore_from_backup(path, &backup_path).await {
                    tracing::error!("Failed to restore state file from backup: {}", restore_err);
                }
                Ok(state)
            }
            Err(LoadFailure::Corrupt(backup_reason)) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting with empty state.",
                    backup_reason
                );
                Ok(Self::empty())
            }
            Err(LoadFailure::Fatal(e)) => Err(e),
        }
    }

    async fn load_state(path: &Path) -> Result<StateFileFormat, LoadFailure> {
        if !path.exists() {
            tracing::debug!("State file does not exist: {}", path.display());
            return Ok(Self::empty());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadFailure::Fatal(Error::state_store(format!(
                "Failed to read state file {}: {}",
                path.display(),
                e
            )))
        })?;

        let state_file: StateFileFormat = serde_json::from_str(&content)
            .map_err(|e| LoadFailure::Corrupt(format!("{}: {}", path.display(), e)))?;

        if state_file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "State file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STATE_FILE_VERSION,
                state_file.version
            );
        }

        Ok(state_file)
    }

    /// Write state to file atomically
    async fn write_state(&self) -> Result<(), Error> {
        let mut guard = self.state.write().await;
        guard.serial += 1;

        let state_file = StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            serial: guard.serial,
            resources: guard.resources.clone(),
        };

        let json = serde_json::to_string_pretty(&state_file)
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {}", e)))?;

        let temp_path = self.temp_path();
        fs::write(&temp_path, json.as_bytes()).await.map_err(|e| {
            Error::state_store(format!("Failed to write {}: {}", temp_path.display(), e))
        })?;

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        guard.dirty = false;
        tracing::trace!("State serial {} written to {}", guard.serial, self.path.display());
        Ok(())
    }

    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("Restored state file from backup");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        PathBuf::from(temp)
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf().into_os_string();
        backup.push(".backup");
        PathBuf::from(backup)
    }

    /// Number of writes since the file was created
    pub async fn serial(&self) -> u64 {
        self.state.read().await.serial
    }

    /// Force immediate write to disk
    pub async fn sync(&self) -> Result<(), Error> {
        self.write_state().await
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, address: &str) -> Result<Option<ResourceState>, Error> {
        let guard = self.state.read().await;
        Ok(guard.resources.get(address).cloned())
    }

    async fn put(&self, address: &str, state: &ResourceState) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            guard.resources.insert(address.to_string(), state.clone());
            guard.dirty = true;
        }
        self.write_state().await
    }

    async fn remove(&self, address: &str) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            if guard.resources.remove(address).is_none() {
                return Ok(());
            }
            guard.dirty = true;
        }
        self.write_state().await
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        let guard = self.state.read().await;
        Ok(guard.resources.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty {
            self.write_state().await
        } else {
            Ok(())
        }
    }
}
