//! Plugin-based resource registry
//!
//! Service crates register their resource and data source types at startup;
//! the engine looks them up by the type name used in configuration, so it
//! never needs to know which services exist.
//!
//! ```rust,ignore
//! let registry = ResourceRegistry::new();
//! ibmcloud_dns::register(&registry, session.clone());
//! ibmcloud_appid::register(&registry, session.clone());
//!
//! let zone = registry.resource("ibm_dns_zone")?;
//! ```

use crate::error::{Error, Result};
use crate::traits::{DataSource, Resource};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry of resource and data source types
///
/// Interior mutability lets `register` take `&self`, so a shared registry can
/// be filled by several service crates.
#[derive(Default)]
pub struct ResourceRegistry {
    resources: RwLock<HashMap<String, Arc<dyn Resource>>>,
    data_sources: RwLock<HashMap<String, Arc<dyn DataSource>>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource type under its own type name
    ///
    /// A later registration of the same name replaces the earlier one.
    pub fn register_resource(&self, resource: Arc<dyn Resource>) {
        let name = resource.type_name().to_string();
        let mut resources = self
            .resources
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if resources.insert(name.clone(), resource).is_some() {
            tracing::warn!("Resource type {} registered twice", name);
        }
    }

    /// Register a data source type under its own type name
    pub fn register_data_source(&self, data_source: Arc<dyn DataSource>) {
        let name = data_source.type_name().to_string();
        let mut sources = self
            .data_sources
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if sources.insert(name.clone(), data_source).is_some() {
            tracing::warn!("Data source type {} registered twice", name);
        }
    }

    /// Look up a resource type
    ///
    /// - `Err(Error::Config)` if the type is not registered
    pub fn resource(&self, type_name: &str) -> Result<Arc<dyn Resource>> {
        let resources = self
            .resources
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        resources
            .get(type_name)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown resource type: {}", type_name)))
    }

    /// Look up a data source type
    pub fn data_source(&self, type_name: &str) -> Result<Arc<dyn DataSource>> {
        let sources = self
            .data_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        sources
            .get(type_name)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown data source type: {}", type_name)))
    }

    /// Registered resource type names, sorted
    pub fn list_resources(&self) -> Vec<String> {
        let resources = self
            .resources
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = resources.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered data source type names, sorted
    pub fn list_data_sources(&self) -> Vec<String> {
        let sources = self
            .data_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = sources.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_resource(&self, name: &str) -> bool {
        let resources = self
            .resources
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        resources.contains_key(name)
    }

    pub fn has_data_source(&self, name: &str) -> bool {
        let sources = self
            .data_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        sources.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_data::ResourceData;
    use crate::schema::Schema;
    use async_trait::async_trait;

    struct NoopResource;

    #[async_trait]
    impl Resource for NoopResource {
        fn type_name(&self) -> &'static str {
            "ibm_noop"
        }

        fn schema(&self) -> Schema {
            Schema::new()
        }

        async fn create(&self, data: &mut ResourceData) -> Result<()> {
            data.set_id("noop");
            Ok(())
        }

        async fn read(&self, _data: &mut ResourceData) -> Result<()> {
            Ok(())
        }

        async fn update(&self, _data: &mut ResourceData) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _data: &mut ResourceData) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ResourceRegistry::new();
        assert!(!registry.has_resource("ibm_noop"));

        registry.register_resource(Arc::new(NoopResource));

        assert!(registry.has_resource("ibm_noop"));
        assert!(!registry.has_data_source("ibm_noop"));
        assert_eq!(registry.list_resources(), vec!["ibm_noop"]);
        assert!(registry.resource("ibm_noop").is_ok());
    }

    #[test]
    fn test_unknown_type_is_config_error() {
        let registry = ResourceRegistry::new();
        let err = registry.resource("ibm_missing").err().unwrap();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("ibm_missing"));
    }
}
