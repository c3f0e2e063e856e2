// # DNS Services
//
// Resources and data sources for IBM Cloud DNS Services: private zones,
// their records and permitted VPCs, global load balancing (monitors, pools,
// load balancers) and custom resolvers with forwarding rules.
//
// ## Identifiers
//
// Every object lives under a service instance, so IDs are composite:
//
// | resource                                  | ID                        |
// |-------------------------------------------|---------------------------|
// | `ibm_dns_zone`                            | `instance/zone`           |
// | `ibm_dns_permitted_network`               | `instance/zone/network`   |
// | `ibm_dns_resource_record`                 | `instance/zone/record`    |
// | `ibm_dns_glb_monitor`                     | `instance/monitor`        |
// | `ibm_dns_glb_pool`                        | `instance/pool`           |
// | `ibm_dns_glb`                             | `instance/zone/glb`       |
// | `ibm_dns_custom_resolver`                 | `instance/resolver`       |
// | `ibm_dns_custom_resolver_forwarding_rule` | `instance/resolver/rule`  |
//
// ## Locking
//
// Records and permitted networks take the `instance/zone` lock; resolver
// locations and forwarding rules take the resolver ID lock.

mod common;

pub mod custom_resolver;
pub mod data_sources;
pub mod forwarding_rule;
pub mod glb;
pub mod glb_monitor;
pub mod glb_pool;
pub mod permitted_network;
pub mod resource_record;
pub mod zone;

pub use custom_resolver::DnsCustomResolver;
pub use data_sources::ListDataSource;
pub use forwarding_rule::DnsForwardingRule;
pub use glb::DnsGlb;
pub use glb_monitor::DnsGlbMonitor;
pub use glb_pool::DnsGlbPool;
pub use permitted_network::DnsPermittedNetwork;
pub use resource_record::DnsResourceRecord;
pub use zone::DnsZone;

use ibmcloud_conns::Session;
use ibmcloud_core::ResourceRegistry;
use std::sync::Arc;

/// Register every DNS Services resource and data source
pub fn register(registry: &ResourceRegistry, session: Arc<Session>) {
    registry.register_resource(Arc::new(DnsZone::new(session.clone())));
    registry.register_resource(Arc::new(DnsPermittedNetwork::new(session.clone())));
    registry.register_resource(Arc::new(DnsResourceRecord::new(session.clone())));
    registry.register_resource(Arc::new(DnsGlbMonitor::new(session.clone())));
    registry.register_resource(Arc::new(DnsGlbPool::new(session.clone())));
    registry.register_resource(Arc::new(DnsGlb::new(session.clone())));
    registry.register_resource(Arc::new(DnsCustomResolver::new(session.clone())));
    registry.register_resource(Arc::new(DnsForwardingRule::new(session.clone())));

    for spec in data_sources::ALL {
        registry.register_data_source(Arc::new(ListDataSource::new(session.clone(), *spec)));
    }
    tracing::debug!("Registered DNS Services resources");
}
