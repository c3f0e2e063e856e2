// # State Store Trait
//
// Defines the interface for persistent state management.
//
// ## Purpose
//
// The state store records every object the engine manages, keyed by its
// address (`ibm_dns_zone.main`, `data.ibm_dns_zones.all`):
// - The composite ID needed to re-read the object
// - The attributes last read back from the API
// - The addresses it depends on, so deletion can run in reverse order
//
// ## Implementations
//
// - Memory: tests and dry runs
// - File: JSON document with atomic writes and a backup copy

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Whether a state record belongs to a managed resource or a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Managed,
    Data,
}

/// State record for one address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub mode: Mode,
    pub resource_type: String,
    /// Composite ID as set by the adapter
    pub id: String,
    pub attributes: Map<String, Value>,
    /// Addresses this object was created after
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub schema_version: u64,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl ResourceState {
    pub fn new(
        mode: Mode,
        resource_type: impl Into<String>,
        id: impl Into<String>,
        attributes: Map<String, Value>,
    ) -> Self {
        Self {
            mode,
            resource_type: resource_type.into(),
            id: id.into(),
            attributes,
            dependencies: Vec::new(),
            schema_version: 0,
            last_updated: chrono::Utc::now(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Check if the record is stale (older than given duration)
    pub fn is_stale(&self, max_age: chrono::Duration) -> bool {
        let now = chrono::Utc::now();
        now.signed_duration_since(self.last_updated) > max_age
    }
}

/// Trait for state store implementations
///
/// All methods must be safe to call concurrently from multiple tasks: the
/// engine persists results of parallel operations as they complete.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the state record for an address
    ///
    /// - `Ok(Some(_))`: known object
    /// - `Ok(None)`: nothing recorded
    async fn get(&self, address: &str) -> Result<Option<ResourceState>, crate::Error>;

    /// Create or replace the record for an address
    async fn put(&self, address: &str, state: &ResourceState) -> Result<(), crate::Error>;

    /// Forget an address (no error if absent)
    async fn remove(&self, address: &str) -> Result<(), crate::Error>;

    /// All recorded addresses
    async fn list(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
