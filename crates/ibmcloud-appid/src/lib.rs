// # App ID
//
// Cloud Directory policy documents and OAuth applications of an App ID
// tenant. All paths are below `/management/v4/{tenant_id}`.
//
// The policy resources (`ibm_appid_apm`, `ibm_appid_password_regex`,
// `ibm_appid_mfa`, `ibm_appid_token_config`) are singletons per tenant:
// their ID is the tenant ID, writes hold the tenant lock, and deleting one
// restores the service defaults rather than removing anything.
//
// App ID has no private endpoint; a session with `private` visibility fails
// to build a client for it.

pub mod apm;
pub mod application;
pub mod mfa;
pub mod password_regex;
pub mod tenant_config;
pub mod token_config;

pub use apm::AdvancedPasswordManagement;
pub use application::{AppIdApplication, AppIdApplicationSource, AppIdApplicationsSource};
pub use mfa::Mfa;
pub use password_regex::PasswordRegex;
pub use tenant_config::{ConfigDocument, TenantConfig, TenantConfigSource};
pub use token_config::TokenConfig;

use ibmcloud_conns::Session;
use ibmcloud_core::ResourceRegistry;
use std::sync::Arc;

fn register_document<D: ConfigDocument>(registry: &ResourceRegistry, session: &Arc<Session>) {
    registry.register_resource(Arc::new(TenantConfig::<D>::new(session.clone())));
    registry.register_data_source(Arc::new(TenantConfigSource::<D>::new(session.clone())));
}

/// Register every App ID resource and data source
pub fn register(registry: &ResourceRegistry, session: Arc<Session>) {
    register_document::<AdvancedPasswordManagement>(registry, &session);
    register_document::<PasswordRegex>(registry, &session);
    register_document::<Mfa>(registry, &session);
    register_document::<TokenConfig>(registry, &session);

    registry.register_resource(Arc::new(AppIdApplication::new(session.clone())));
    registry.register_data_source(Arc::new(AppIdApplicationSource::new(session.clone())));
    registry.register_data_source(Arc::new(AppIdApplicationsSource::new(session)));
    tracing::debug!("Registered App ID resources");
}
