//! `ibm_dns_glb`: a global load balancer answering for a name in a zone

use crate::common::{dns_client, insert_opt, response_id, set_fields, string_array};
use async_trait::async_trait;
use ibmcloud_conns::Session;
use ibmcloud_core::schema::validator;
use ibmcloud_core::{
    join_id, split_id, Attribute, ErrorContext, NotFoundExt, Resource, ResourceData, Result,
    Schema, ValueType,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

const FIELDS: &[&str] = &[
    "name",
    "description",
    "enabled",
    "ttl",
    "health",
    "fallback_pool",
    "default_pools",
    "created_on",
    "modified_on",
];

pub struct DnsGlb {
    session: Arc<Session>,
}

impl DnsGlb {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    fn request_body(data: &ResourceData) -> Result<Value> {
        let az_pools: Vec<Value> = data
            .get_blocks("az_pools")
            .into_iter()
            .map(|az| {
                json!({
                    "availability_zone": az.get("availability_zone").cloned().unwrap_or(Value::Null),
                    "pools": az.get("pools").cloned().unwrap_or_else(|| json!([])),
                })
            })
            .collect();

        let mut body = Map::new();
        body.insert("name".into(), json!(data.require_str("name")?));
        body.insert("fallback_pool".into(), json!(data.require_str("fallback_pool")?));
        body.insert("default_pools".into(), string_array(data, "default_pools"));
        body.insert("enabled".into(), json!(data.get_bool("enabled").unwrap_or(true)));
        body.insert("ttl".into(), json!(data.get_i64("ttl").unwrap_or(60)));
        insert_opt(&mut body, "description", data.get_str("description"));
        if !az_pools.is_empty() {
            body.insert("az_pools".into(), Value::Array(az_pools));
        }
        Ok(Value::Object(body))
    }
}

#[async_trait]
impl Resource for DnsGlb {
    fn type_name(&self) -> &'static str {
        "ibm_dns_glb"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("instance_id", Attribute::string().required().force_new())
            .attr("zone_id", Attribute::string().required().force_new())
            .attr("name", Attribute::string().required())
            .attr("description", Attribute::string().optional())
            .attr("enabled", Attribute::bool().default_value(true))
            .attr(
                "ttl",
                Attribute::int()
                    .default_value(60)
                    .validate(validator::int_between(1, 86400)),
            )
            .attr("fallback_pool", Attribute::string().required())
            .attr(
                "default_pools",
                Attribute::list(ValueType::String).required().min_items(1),
            )
            .attr(
                "az_pools",
                Attribute::block(
                    Schema::new()
                        .attr("availability_zone", Attribute::string().required())
                        .attr("pools", Attribute::list(ValueType::String).required()),
                )
                .optional(),
            )
            .attr("glb_id", Attribute::string().computed())
            .attr("health", Attribute::string().computed())
            .attr("created_on", Attribute::string().computed())
            .attr("modified_on", Attribute::string().computed())
    }

    async fn create(&self, data: &mut ResourceData) -> Result<()> {
        let instance_id = data.require_str("instance_id")?.to_string();
        let zone_id = data.require_str("zone_id")?.to_string();
        let body = Self::request_body(data)?;

        let glb = dns_client(&self.session)?
            .post(
                &["instances", &instance_id, "dnszones", &zone_id, "load_balancers"],
                &body,
            )
            .await
            .context("Error creating DNS load balancer")?;

        let glb_id = response_id(&glb, "load balancer")?;
        data.set_id(join_id(&[&instance_id, &zone_id, glb_id]));
        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, zone_id, glb_id] = split_id::<3>(&id)?;

        let Some(glb) = dns_client(&self.session)?
            .get(&["instances", instance_id, "dnszones", zone_id, "load_balancers", glb_id])
            .await
            .or_gone()
            .with_context(|| format!("Error reading DNS load balancer {}", glb_id))?
        else {
            tracing::warn!("GLB {} not found, removing from state", id);
            data.clear_id();
            return Ok(());
        };

        data.set("instance_id", instance_id);
        data.set("zone_id", zone_id);
        data.set("glb_id", glb_id);
        set_fields(data, &glb, FIELDS);
        data.set("az_pools", glb.get("az_pools").cloned().unwrap_or_else(|| json!([])));
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, zone_id, glb_id] = split_id::<3>(&id)?;

        if data.changed_keys().next().is_some() {
            let body = Self::request_body(data)?;
            dns_client(&self.session)?
                .put(
                    &["instances", instance_id, "dnszones", zone_id, "load_balancers", glb_id],
                    &body,
                )
                .await
                .with_context(|| format!("Error updating DNS load balancer {}", glb_id))?;
        }

        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, zone_id, glb_id] = split_id::<3>(&id)?;

        dns_client(&self.session)?
            .delete(&["instances", instance_id, "dnszones", zone_id, "load_balancers", glb_id])
            .await
            .or_gone()
            .with_context(|| format!("Error deleting DNS load balancer {}", glb_id))?;

        data.clear_id();
        Ok(())
    }
}
