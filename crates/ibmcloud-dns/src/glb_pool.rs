//! `ibm_dns_glb_pool`: a set of origins behind a global load balancer

use crate::common::{dns_client, insert_opt, join_pair, response_id, set_fields, string_array};
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
    "enabled",
    "healthy_origins_threshold",
    "monitor",
    "notification_channel",
    "healthcheck_region",
    "healthcheck_subnets",
    "health",
    "created_on",
    "modified_on",
];

pub struct DnsGlbPool {
    session: Arc<Session>,
}

impl DnsGlbPool {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    fn request_body(data: &ResourceData) -> Result<Value> {
        let origins: Vec<Value> = data
            .get_blocks("origins")
            .into_iter()
            .map(|o| {
                let mut origin = Map::new();
                for key in ["name", "address", "enabled", "description"] {
                    if let Some(v) = o.get(key).filter(|v| !v.is_null()) {
                        origin.insert(key.to_string(), v.clone());
                    }
                }
                Value::Object(origin)
            })
            .collect();

        let mut body = Map::new();
        body.insert("name".into(), json!(data.require_str("name")?));
        body.insert("origins".into(), Value::Array(origins));
        body.insert("enabled".into(), json!(data.get_bool("enabled").unwrap_or(true)));
        body.insert(
            "healthy_origins_threshold".into(),
            json!(data.get_i64("healthy_origins_threshold").unwrap_or(1)),
        );
        insert_opt(&mut body, "description", data.get_str("description"));
        insert_opt(&mut body, "monitor", data.get_str("monitor"));
        insert_opt(&mut body, "notification_channel", data.get_str("notification_channel"));
        insert_opt(&mut body, "healthcheck_region", data.get_str("healthcheck_region"));
        if data.get("healthcheck_subnets").is_some() {
            body.insert("healthcheck_subnets".into(), string_array(data, "healthcheck_subnets"));
        }
        Ok(Value::Object(body))
    }
}

fn origin_schema() -> Schema {
    Schema::new()
        .attr("name", Attribute::string().required())
        .attr("address", Attribute::string().required())
        .attr("enabled", Attribute::bool().default_value(true))
        .attr("description", Attribute::string().optional())
        .attr("health", Attribute::bool().computed())
        .attr("health_failure_reason", Attribute::string().computed())
}

#[async_trait]
impl Resource for DnsGlbPool {
    fn type_name(&self) -> &'static str {
        "ibm_dns_glb_pool"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("instance_id", Attribute::string().required().force_new())
            .attr("name", Attribute::string().required())
            .attr("description", Attribute::string().optional())
            .attr("enabled", Attribute::bool().default_value(true))
            .attr(
                "healthy_origins_threshold",
                Attribute::int()
                    .default_value(1)
                    .validate(validator::int_between(1, 64)),
            )
            .attr(
                "origins",
                Attribute::block(origin_schema()).required().min_items(1),
            )
            .attr("monitor", Attribute::string().optional())
            .attr("notification_channel", Attribute::string().optional())
            .attr(
                "healthcheck_region",
                Attribute::string().optional().validate(validator::one_of(&[
                    "us-south", "us-east", "eu-gb", "eu-du", "au-syd", "jp-tok",
                ])),
            )
            .attr("healthcheck_subnets", Attribute::list(ValueType::String).optional())
            .attr("pool_id", Attribute::string().computed())
            .attr("health", Attribute::string().computed())
            .attr("created_on", Attribute::string().computed())
            .attr("modified_on", Attribute::string().computed())
    }

    async fn create(&self, data: &mut ResourceData) -> Result<()> {
        let instance_id = data.require_str("instance_id")?.to_string();
        let body = Self::request_body(data)?;

        let pool = dns_client(&self.session)?
            .post(&["instances", &instance_id, "pools"], &body)
            .await
            .context("Error creating DNS load balancer pool")?;

        data.set_id(join_pair(&instance_id, response_id(&pool, "pool")?));
        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, pool_id] = split_id::<2>(&id)?;

        let Some(pool) = dns_client(&self.session)?
            .get(&["instances", instance_id, "pools", pool_id])
            .await
            .or_gone()
            .with_context(|| format!("Error reading DNS load balancer pool {}", pool_id))?
        else {
            tracing::warn!("GLB pool {} not found, removing from state", id);
            data.clear_id();
            return Ok(());
        };

        data.set("instance_id", instance_id);
        data.set("pool_id", pool_id);
        set_fields(data, &pool, FIELDS);

        let origins: Vec<Value> = pool
            .get("origins")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|o| {
                let field = |k: &str| o.get(k).cloned().unwrap_or(Value::Null);
                json!({
                    "name": field("name"),
                    "address": field("address"),
                    "enabled": field("enabled"),
                    "description": field("description"),
                    "health": field("health"),
                    "health_failure_reason": field("health_failure_reason"),
                })
            })
            .collect();
        data.set("origins", origins);
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, pool_id] = split_id::<2>(&id)?;

        if data.changed_keys().next().is_some() {
            let body = Self::request_body(data)?;
            dns_client(&self.session)?
                .put(&["instances", instance_id, "pools", pool_id], &body)
                .await
                .with_context(|| format!("Error updating DNS load balancer pool {}", pool_id))?;
        }

        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, pool_id] = split_id::<2>(&id)?;

        dns_client(&self.session)?
            .delete(&["instances", instance_id, "pools", pool_id])
            .await
            .or_gone()
            .with_context(|| format!("Error deleting DNS load balancer pool {}", pool_id))?;

        data.clear_id();
        Ok(())
    }
}
