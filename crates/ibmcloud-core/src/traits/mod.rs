//! Core traits for the provider
//!
//! - [`Resource`]: CRUD adapter for one remote object type
//! - [`DataSource`]: read-only query against a remote API
//! - [`StateStore`]: persistent record of managed objects

pub mod data_source;
pub mod resource;
pub mod state_store;

pub use data_source::DataSource;
pub use resource::Resource;
pub use state_store::{Mode, ResourceState, StateStore};
