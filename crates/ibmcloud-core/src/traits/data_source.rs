use async_trait::async_trait;

use crate::resource_data::ResourceData;
use crate::schema::Schema;

/// Read-only query against a remote API
///
/// `read` fills computed attributes from the response and must set an ID
/// (usually the query scope or a hash of it).
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Type name used in configuration, e.g. `ibm_dns_zones`
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn read(&self, data: &mut ResourceData) -> crate::Result<()>;
}
