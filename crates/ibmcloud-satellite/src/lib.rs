// # Satellite
//
// Locations, hosts and clusters of IBM Cloud Satellite, served by the
// containers API (`/v2/satellite/*`, `/v2/getCluster`, `/v1/...`).
//
// | Resource                 | ID                |
// |--------------------------|-------------------|
// | `ibm_satellite_location` | location name     |
// | `ibm_satellite_host`     | `location/host`   |
// | `ibm_satellite_cluster`  | cluster ID        |
//
// Provisioning is asynchronous. Create and delete poll the object with
// `StateChangeConf` until it settles; the poll cadence is set per adapter with
// `with_polling`. Host assignment and removal hold the location lock.

mod common;

pub mod cluster;
pub mod host;
pub mod location;

pub use cluster::{SatelliteCluster, SatelliteClusterSource};
pub use common::Polling;
pub use host::SatelliteHost;
pub use location::{SatelliteLocation, SatelliteLocationSource};

use ibmcloud_conns::Session;
use ibmcloud_core::ResourceRegistry;
use std::sync::Arc;

/// Register every Satellite resource and data source
pub fn register(registry: &ResourceRegistry, session: Arc<Session>) {
    registry.register_resource(Arc::new(SatelliteLocation::new(session.clone())));
    registry.register_resource(Arc::new(SatelliteHost::new(session.clone())));
    registry.register_resource(Arc::new(SatelliteCluster::new(session.clone())));
    registry.register_data_source(Arc::new(SatelliteLocationSource::new(session.clone())));
    registry.register_data_source(Arc::new(SatelliteClusterSource::new(session)));
    tracing::debug!("Registered Satellite resources");
}
