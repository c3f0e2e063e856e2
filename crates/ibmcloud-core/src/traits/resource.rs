// # Resource Trait
//
// Defines the interface every managed resource type implements.
//
// ## Lifecycle contract
//
// - `create`: build the request from configuration, call the API, set the
//   composite ID, then read back computed attributes
// - `read`: decode the ID and fetch the object; on 404 clear the ID and
//   return Ok (the engine treats the object as gone)
// - `update`: send only the changed attributes, then read back
// - `delete`: remove the object; a 404 counts as success
//
// Adapters never retry, never touch the state store and never decide
// ordering. Those belong to the engine.

use async_trait::async_trait;

use crate::resource_data::ResourceData;
use crate::schema::Schema;
use crate::timeouts::Timeouts;

/// CRUD adapter for one resource type
///
/// Implementations must be `Send + Sync`: the engine calls different
/// resources of the same type from concurrent tasks.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name used in configuration, e.g. `ibm_dns_zone`
    fn type_name(&self) -> &'static str;

    /// Attribute contract
    fn schema(&self) -> Schema;

    /// Default deadlines, overridable per block with `timeouts`
    fn timeouts(&self) -> Timeouts {
        Timeouts::default()
    }

    async fn create(&self, data: &mut ResourceData) -> crate::Result<()>;

    async fn read(&self, data: &mut ResourceData) -> crate::Result<()>;

    async fn update(&self, data: &mut ResourceData) -> crate::Result<()>;

    async fn delete(&self, data: &mut ResourceData) -> crate::Result<()>;
}
