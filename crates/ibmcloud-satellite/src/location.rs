//! `ibm_satellite_location`: a Satellite control plane
//!
//! Locations are keyed by name. Creation returns before the control plane is
//! usable, so create waits until the location asks for hosts (`action
//! required`) or is already `normal`; delete waits until the name no longer
//! resolves.

use crate::common::{at, resource_group, satellite_client, Polling};
use async_trait::async_trait;
use ibmcloud_conns::Session;
use ibmcloud_core::schema::validator;
use ibmcloud_core::{
    Attribute, DataSource, Error, ErrorContext, NotFoundExt, Resource, ResourceData, Result,
    Schema, Timeouts, ValueType,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

const PROVISIONING: &[&str] = &["deploying", "deploy in progress", "provisioning", "pending"];
const READY: &[&str] = &["action required", "normal"];
const DELETING: &[&str] = &["deleting", "delete in progress", "action required", "normal"];

pub(crate) async fn get_location(
    session: &Arc<Session>,
    resource_group_id: Option<&str>,
    name: &str,
) -> Result<Option<Value>> {
    satellite_client(session, resource_group_id)?
        .get_query(
            &["v2", "satellite", "getController"],
            &[("controller", name)],
        )
        .await
        .or_gone()
        .with_context(|| format!("Error getting Satellite location {}", name))
}

fn location_state(location: &Value) -> String {
    location
        .get("state")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn set_location(data: &mut ResourceData, location: &Value) {
    data.set("location", at(location, "/name"));
    data.set("managed_from", at(location, "/datacenter"));
    data.set("description", at(location, "/description"));
    data.set("location_id", at(location, "/id"));
    data.set("crn", at(location, "/crn"));
    data.set("state", at(location, "/state"));
    data.set("resource_group_id", at(location, "/resourceGroup"));
    data.set("created_on", at(location, "/createdDate"));
    data.set("ingress_hostname", at(location, "/ingress/hostname"));
    data.set("host_attached_count", at(location, "/hosts/total"));
    data.set("host_available_count", at(location, "/hosts/available"));
    data.set(
        "zones",
        location
            .get("workerZones")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())),
    );
}

fn computed_fields(schema: Schema) -> Schema {
    schema
        .attr("location_id", Attribute::string().computed())
        .attr("crn", Attribute::string().computed())
        .attr("state", Attribute::string().computed())
        .attr("created_on", Attribute::string().computed())
        .attr("ingress_hostname", Attribute::string().computed())
        .attr("host_attached_count", Attribute::int().computed())
        .attr("host_available_count", Attribute::int().computed())
}

pub struct SatelliteLocation {
    session: Arc<Session>,
    polling: Polling,
}

impl SatelliteLocation {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            polling: Polling::default(),
        }
    }

    pub fn with_polling(mut self, polling: Polling) -> Self {
        self.polling = polling;
        self
    }

    async fn wait_for(
        &self,
        resource_group_id: Option<&str>,
        name: &str,
        pending: &[&str],
        target: &[&str],
        timeout: Duration,
    ) -> Result<Option<Value>> {
        let session = &self.session;
        self.polling
            .conf(pending, target, timeout)
            .wait_for_state(move || async move {
                Ok(get_location(session, resource_group_id, name)
                    .await?
                    .map(|location| {
                        let state = location_state(&location);
                        (location, state)
                    }))
            })
            .await
    }
}

#[async_trait]
impl Resource for SatelliteLocation {
    fn type_name(&self) -> &'static str {
        "ibm_satellite_location"
    }

    fn schema(&self) -> Schema {
        computed_fields(
            Schema::new()
                .attr(
                    "location",
                    Attribute::string()
                        .required()
                        .force_new()
                        .validate(validator::string_len_between(1, 32)),
                )
                .attr(
                    "managed_from",
                    Attribute::string()
                        .required()
                        .force_new()
                        .description("The IBM Cloud metro from which the location is managed"),
                )
                .attr("description", Attribute::string().optional().force_new())
                .attr("logging_account_id", Attribute::string().optional().force_new())
                .attr(
                    "zones",
                    Attribute::set(ValueType::String)
                        .optional_computed()
                        .force_new(),
                )
                .attr(
                    "resource_group_id",
                    Attribute::string().optional_computed().force_new(),
                )
                .attr("coreos_enabled", Attribute::bool().optional().force_new())
                .attr(
                    "cos_config",
                    Attribute::block(
                        Schema::new()
                            .attr("bucket", Attribute::string().optional())
                            .attr("endpoint", Attribute::string().optional())
                            .attr("region", Attribute::string().optional()),
                    )
                    .optional()
                    .force_new()
                    .max_items(1),
                ),
        )
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::default()
            .with_create(Duration::from_secs(2 * 60 * 60))
            .with_update(Duration::from_secs(60 * 60))
            .with_delete(Duration::from_secs(60 * 60))
    }

    async fn create(&self, data: &mut ResourceData) -> Result<()> {
        let name = data.require_str("location")?.to_string();
        let group = resource_group(data);

        let mut body = Map::new();
        body.insert("name".into(), json!(name));
        body.insert("location".into(), json!(data.require_str("managed_from")?));
        if let Some(description) = data.get_str("description") {
            body.insert("description".into(), json!(description));
        }
        if let Some(account) = data.get_str("logging_account_id") {
            body.insert("logging_account".into(), json!(account));
        }
        let zones = data.get_string_list("zones");
        if !zones.is_empty() {
            body.insert("zones".into(), json!(zones));
        }
        if let Some(coreos) = data.get_bool("coreos_enabled") {
            body.insert("coreos_enabled".into(), json!(coreos));
        }
        if let Some(cos) = data.get_block("cos_config") {
            body.insert("cos_config".into(), Value::Object(cos.clone()));
        }

        satellite_client(&self.session, group.as_deref())?
            .post(&["v2", "satellite", "createController"], &Value::Object(body))
            .await
            .with_context(|| format!("Error creating Satellite location {}", name))?;
        data.set_id(name.clone());

        tracing::info!("Waiting for Satellite location {} to be provisioned", name);
        self.wait_for(
            group.as_deref(),
            &name,
            PROVISIONING,
            READY,
            self.timeouts().create,
        )
        .await
        .with_context(|| format!("Error waiting for Satellite location {}", name))?;

        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let name = data.require_id()?.to_string();
        let group = resource_group(data);

        let Some(location) = get_location(&self.session, group.as_deref(), &name).await? else {
            tracing::warn!("Satellite location {} not found, removing from state", name);
            data.clear_id();
            return Ok(());
        };

        set_location(data, &location);
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData) -> Result<()> {
        // Every configurable attribute forces replacement
        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let name = data.require_id()?.to_string();
        let group = resource_group(data);

        let removed = satellite_client(&self.session, group.as_deref())?
            .delete(&["v1", "locations", &name])
            .await
            .or_gone()
            .with_context(|| format!("Error deleting Satellite location {}", name))?;

        if removed.is_some() {
            self.wait_for(
                group.as_deref(),
                &name,
                DELETING,
                &[],
                self.timeouts().delete,
            )
            .await
            .with_context(|| format!("Error waiting for Satellite location {} removal", name))?;
        }

        data.clear_id();
        Ok(())
    }
}

/// `ibm_satellite_location` data source, looked up by name
pub struct SatelliteLocationSource {
    session: Arc<Session>,
}

impl SatelliteLocationSource {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl DataSource for SatelliteLocationSource {
    fn type_name(&self) -> &'static str {
        "ibm_satellite_location"
    }

    fn schema(&self) -> Schema {
        computed_fields(
            Schema::new()
                .attr("location", Attribute::string().required())
                .attr("managed_from", Attribute::string().computed())
                .attr("description", Attribute::string().computed())
                .attr("zones", Attribute::set(ValueType::String).computed())
                .attr("resource_group_id", Attribute::string().computed()),
        )
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let name = data.require_str("location")?.to_string();

        let location = get_location(&self.session, None, &name)
            .await?
            .ok_or_else(|| Error::not_found(format!("Satellite location {}", name)))?;

        set_location(data, &location);
        data.set_id(name);
        Ok(())
    }
}
