// # ibmcloud-core
//
// Core library for the IBM Cloud declarative resource provider.
//
// ## Architecture Overview
//
// - **Schema**: static declaration of every attribute a resource accepts
// - **Resource / DataSource**: CRUD adapters implemented by the service crates
// - **ResourceData**: the attribute bag an adapter reads config from and writes state into
// - **StateStore**: persistent record of what was created, keyed by address
// - **Engine**: plans and applies a configuration document against the registry
// - **ResourceRegistry**: plugin registry of resource and data source types
// - **MutexKv**: process-wide named locks around remote read-modify-write
//
// ## Design Principles
//
// 1. Adapters stay thin: marshal attributes, call the API, unmarshal the response
// 2. A 404 on read or delete means the object is gone, never a failure
// 3. Composite IDs carry everything needed to re-read an object
// 4. Plugin-based: services register their types, the engine never names them

pub mod config;
pub mod diagnostics;
pub mod document;
pub mod engine;
pub mod error;
pub mod id;
pub mod mutex;
pub mod registry;
pub mod resource_data;
pub mod schema;
pub mod state;
pub mod timeouts;
pub mod traits;
pub mod wait;

// Re-export core types for convenience
pub use config::{EngineConfig, ProviderConfig, StateStoreConfig, Visibility};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use document::{BlockConfig, Configuration};
pub use engine::{Action, ApplyReport, Engine, EngineEvent, Plan};
pub use error::{Error, ErrorContext, NotFoundExt, Result};
pub use id::{join_id, split_id};
pub use mutex::MutexKv;
pub use registry::ResourceRegistry;
pub use resource_data::ResourceData;
pub use schema::{Attribute, Schema, Validator, ValueType};
pub use state::{FileStateStore, MemoryStateStore};
pub use timeouts::Timeouts;
pub use traits::{DataSource, Mode, Resource, ResourceState, StateStore};
pub use wait::StateChangeConf;
