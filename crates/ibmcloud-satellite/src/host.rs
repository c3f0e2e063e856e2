//! `ibm_satellite_host`: a host attached to a Satellite location
//!
//! Host operations on one location are serialized under the location name.

use crate::common::{at, expand_labels, flatten_labels, satellite_client, Polling};
use async_trait::async_trait;
use ibmcloud_conns::Session;
use ibmcloud_core::schema::validator;
use ibmcloud_core::{
    join_id, split_id, Attribute, ErrorContext, MutexKv, NotFoundExt, Resource, ResourceData,
    Result, Schema, Timeouts, ValueType,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

const ASSIGNED: &[&str] = &["normal", "provisioning"];

/// The host named `host_id` (by ID or name) in `location`, if both exist
async fn find_host(session: &Arc<Session>, location: &str, host_id: &str) -> Result<Option<Value>> {
    let Some(hosts) = satellite_client(session, None)?
        .get_query(&["v2", "satellite", "getHosts"], &[("controller", location)])
        .await
        .or_gone()
        .with_context(|| format!("Error listing hosts of Satellite location {}", location))?
    else {
        return Ok(None);
    };

    Ok(hosts
        .as_array()
        .into_iter()
        .flatten()
        .find(|host| {
            [host.get("id"), host.get("name")]
                .into_iter()
                .flatten()
                .any(|v| v.as_str() == Some(host_id))
        })
        .cloned())
}

fn health_state(host: &Value) -> String {
    host.pointer("/health/status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub struct SatelliteHost {
    session: Arc<Session>,
    polling: Polling,
}

impl SatelliteHost {
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
}

#[async_trait]
impl Resource for SatelliteHost {
    fn type_name(&self) -> &'static str {
        "ibm_satellite_host"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("location", Attribute::string().required().force_new())
            .attr(
                "host_id",
                Attribute::string()
                    .required()
                    .force_new()
                    .description("The ID or name of the host"),
            )
            .attr(
                "labels",
                Attribute::set(ValueType::String)
                    .optional_computed()
                    .validate(validator::key_value_label()),
            )
            .attr("zone", Attribute::string().optional_computed().force_new())
            .attr("host_provider", Attribute::string().optional().force_new())
            .attr("host_state", Attribute::string().computed())
            .attr("health_state", Attribute::string().computed())
            .attr("cluster", Attribute::string().computed())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::default()
            .with_create(Duration::from_secs(60 * 60))
            .with_update(Duration::from_secs(30 * 60))
            .with_delete(Duration::from_secs(30 * 60))
    }

    async fn create(&self, data: &mut ResourceData) -> Result<()> {
        let location = data.require_str("location")?.to_string();
        let host_id = data.require_str("host_id")?.to_string();

        let mut body = Map::new();
        body.insert("controller".into(), json!(location));
        body.insert("hostID".into(), json!(host_id));
        body.insert("labels".into(), expand_labels(&data.get_string_list("labels")));
        if let Some(zone) = data.get_str("zone") {
            body.insert("zone".into(), json!(zone));
        }

        {
            let _guard = MutexKv::global().lock(&location).await;
            satellite_client(&self.session, None)?
                .post(&["v2", "satellite", "assignHost"], &Value::Object(body))
                .await
                .with_context(|| {
                    format!("Error assigning host {} to Satellite location {}", host_id, location)
                })?;
        }
        data.set_id(join_id(&[&location, &host_id]));

        let session = &self.session;
        let (loc, host) = (location.as_str(), host_id.as_str());
        self.polling
            .conf(&[], ASSIGNED, self.timeouts().create)
            .wait_for_state(move || async move {
                Ok(find_host(session, loc, host).await?.map(|h| {
                    let state = health_state(&h);
                    (h, state)
                }))
            })
            .await
            .with_context(|| format!("Error waiting for host {} to be assigned", host_id))?;

        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [location, host_id] = split_id::<2>(&id)?;

        let Some(host) = find_host(&self.session, location, host_id).await? else {
            tracing::warn!("Satellite host {} not found, removing from state", id);
            data.clear_id();
            return Ok(());
        };

        data.set("location", location);
        data.set("host_id", host_id);
        data.set("labels", flatten_labels(host.get("labels")));
        data.set("zone", at(&host, "/assignment/zone"));
        data.set("cluster", at(&host, "/assignment/clusterName"));
        data.set("host_state", at(&host, "/state"));
        data.set("health_state", at(&host, "/health/status"));
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [location, host_id] = split_id::<2>(&id)?;

        if data.has_change("labels") {
            let body = json!({
                "controller": location,
                "hostID": host_id,
                "labels": expand_labels(&data.get_string_list("labels")),
            });
            let _guard = MutexKv::global().lock(location).await;
            satellite_client(&self.session, None)?
                .post(&["v2", "satellite", "updateHost"], &body)
                .await
                .with_context(|| format!("Error updating labels of Satellite host {}", host_id))?;
        }

        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [location, host_id] = split_id::<2>(&id)?;

        let _guard = MutexKv::global().lock(location).await;
        satellite_client(&self.session, None)?
            .post(
                &["v2", "satellite", "removeHost"],
                &json!({ "controller": location, "hostID": host_id }),
            )
            .await
            .or_gone()
            .with_context(|| format!("Error removing Satellite host {}", host_id))?;

        data.clear_id();
        Ok(())
    }
}
