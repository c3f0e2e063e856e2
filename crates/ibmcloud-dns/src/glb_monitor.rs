//! `ibm_dns_glb_monitor`: health check used by load balancer pools

use crate::common::{dns_client, insert_opt, join_pair, response_id, set_fields};
use async_trait::async_trait;
use ibmcloud_conns::Session;
use ibmcloud_core::schema::validator;
use ibmcloud_core::{
    split_id, Attribute, ErrorContext, NotFoundExt, Resource, ResourceData, Result, Schema,
    ValueType,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

const FIELDS: &[&str] = &[
    "name",
    "description",
    "type",
    "port",
    "interval",
    "retries",
    "timeout",
    "method",
    "path",
    "allow_insecure",
    "expected_codes",
    "expected_body",
    "created_on",
    "modified_on",
];

pub struct DnsGlbMonitor {
    session: Arc<Session>,
}

impl DnsGlbMonitor {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    fn request_body(data: &ResourceData) -> Result<Value> {
        let mut body = Map::new();
        body.insert("name".into(), json!(data.require_str("name")?));
        body.insert("type".into(), json!(data.get_str("type").unwrap_or("HTTP")));
        body.insert("interval".into(), json!(data.get_i64("interval").unwrap_or(60)));
        body.insert("retries".into(), json!(data.get_i64("retries").unwrap_or(1)));
        body.insert("timeout".into(), json!(data.get_i64("timeout").unwrap_or(5)));
        insert_opt(&mut body, "description", data.get_str("description"));
        insert_opt(&mut body, "port", data.get_i64("port"));
        insert_opt(&mut body, "method", data.get_str("method"));
        insert_opt(&mut body, "path", data.get_str("path"));
        insert_opt(&mut body, "allow_insecure", data.get_bool("allow_insecure"));
        insert_opt(&mut body, "expected_codes", data.get_str("expected_codes"));
        insert_opt(&mut body, "expected_body", data.get_str("expected_body"));

        let headers: Vec<Value> = data
            .get_blocks("headers")
            .into_iter()
            .map(|h| {
                json!({
                    "name": h.get("name").cloned().unwrap_or(Value::Null),
                    "value": h.get("value").cloned().unwrap_or_else(|| json!([])),
                })
            })
            .collect();
        if !headers.is_empty() {
            body.insert("headers".into(), Value::Array(headers));
        }
        Ok(Value::Object(body))
    }
}

#[async_trait]
impl Resource for DnsGlbMonitor {
    fn type_name(&self) -> &'static str {
        "ibm_dns_glb_monitor"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("instance_id", Attribute::string().required().force_new())
            .attr("name", Attribute::string().required())
            .attr("description", Attribute::string().optional())
            .attr(
                "type",
                Attribute::string()
                    .default_value("HTTP")
                    .validate(validator::one_of(&["HTTP", "HTTPS", "TCP"])),
            )
            .attr("port", Attribute::int().optional_computed())
            .attr(
                "interval",
                Attribute::int()
                    .default_value(60)
                    .validate(validator::int_between(5, 3600)),
            )
            .attr(
                "retries",
                Attribute::int()
                    .default_value(1)
                    .validate(validator::int_between(0, 5)),
            )
            .attr(
                "timeout",
                Attribute::int()
                    .default_value(5)
                    .validate(validator::int_between(1, 15)),
            )
            .attr(
                "method",
                Attribute::string()
                    .optional_computed()
                    .validate(validator::one_of(&["GET", "HEAD"])),
            )
            .attr("path", Attribute::string().optional_computed())
            .attr(
                "headers",
                Attribute::block(
                    Schema::new()
                        .attr("name", Attribute::string().required())
                        .attr("value", Attribute::list(ValueType::String).required()),
                )
                .optional(),
            )
            .attr("allow_insecure", Attribute::bool().optional_computed())
            .attr("expected_codes", Attribute::string().optional_computed())
            .attr("expected_body", Attribute::string().optional())
            .attr("monitor_id", Attribute::string().computed())
            .attr("created_on", Attribute::string().computed())
            .attr("modified_on", Attribute::string().computed())
    }

    async fn create(&self, data: &mut ResourceData) -> Result<()> {
        let instance_id = data.require_str("instance_id")?.to_string();
        let body = Self::request_body(data)?;

        let monitor = dns_client(&self.session)?
            .post(&["instances", &instance_id, "monitors"], &body)
            .await
            .context("Error creating DNS load balancer monitor")?;

        data.set_id(join_pair(&instance_id, response_id(&monitor, "monitor")?));
        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, monitor_id] = split_id::<2>(&id)?;

        let Some(monitor) = dns_client(&self.session)?
            .get(&["instances", instance_id, "monitors", monitor_id])
            .await
            .or_gone()
            .with_context(|| format!("Error reading DNS load balancer monitor {}", monitor_id))?
        else {
            tracing::warn!("GLB monitor {} not found, removing from state", id);
            data.clear_id();
            return Ok(());
        };

        data.set("instance_id", instance_id);
        data.set("monitor_id", monitor_id);
        set_fields(data, &monitor, FIELDS);
        let headers = monitor.get("headers").cloned().unwrap_or_else(|| json!([]));
        data.set("headers", headers);
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, monitor_id] = split_id::<2>(&id)?;

        if data.changed_keys().next().is_some() {
            let body = Self::request_body(data)?;
            dns_client(&self.session)?
                .put(&["instances", instance_id, "monitors", monitor_id], &body)
                .await
                .with_context(|| {
                    format!("Error updating DNS load balancer monitor {}", monitor_id)
                })?;
        }

        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, monitor_id] = split_id::<2>(&id)?;

        dns_client(&self.session)?
            .delete(&["instances", instance_id, "monitors", monitor_id])
            .await
            .or_gone()
            .with_context(|| format!("Error deleting DNS load balancer monitor {}", monitor_id))?;

        data.clear_id();
        Ok(())
    }
}
