// # State Store Implementations
//
// This module provides implementations of the StateStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use crate::config::StateStoreConfig;
use crate::traits::StateStore;
use std::sync::Arc;

/// Open the state store described by the configuration
pub async fn open_state_store(config: &StateStoreConfig) -> crate::Result<Arc<dyn StateStore>> {
    match config {
        StateStoreConfig::File { path } => Ok(Arc::new(FileStateStore::new(path).await?)),
        StateStoreConfig::Memory => Ok(Arc::new(MemoryStateStore::new())),
    }
}
