//! `ibm_dns_zone`: a private DNS zone inside a DNS Services instance

use crate::common::{dns_client, insert_opt, response_id, set_fields};
use async_trait::async_trait;
use ibmcloud_conns::Session;
use ibmcloud_core::schema::validator;
use ibmcloud_core::{
    join_id, split_id, Attribute, ErrorContext, NotFoundExt, Resource, ResourceData, Result,
    Schema,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub struct DnsZone {
    session: Arc<Session>,
}

impl DnsZone {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Resource for DnsZone {
    fn type_name(&self) -> &'static str {
        "ibm_dns_zone"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr(
                "instance_id",
                Attribute::string()
                    .required()
                    .force_new()
                    .description("Instance ID"),
            )
            .attr(
                "name",
                Attribute::string()
                    .required()
                    .force_new()
                    .validate(validator::string_len_between(1, 255))
                    .description("Zone name"),
            )
            .attr("description", Attribute::string().optional())
            .attr("label", Attribute::string().optional())
            .attr("zone_id", Attribute::string().computed())
            .attr("state", Attribute::string().computed())
            .attr("created_on", Attribute::string().computed())
            .attr("modified_on", Attribute::string().computed())
    }

    async fn create(&self, data: &mut ResourceData) -> Result<()> {
        let instance_id = data.require_str("instance_id")?.to_string();
        let name = data.require_str("name")?.to_string();

        let mut body = Map::new();
        body.insert("name".into(), json!(name));
        insert_opt(&mut body, "description", data.get_str("description"));
        insert_opt(&mut body, "label", data.get_str("label"));

        let zone = dns_client(&self.session)?
            .post(&["instances", &instance_id, "dnszones"], &Value::Object(body))
            .await
            .with_context(|| format!("Error creating pdns zone {}", name))?;

        let zone_id = response_id(&zone, "zone")?;
        data.set_id(join_id(&[&instance_id, zone_id]));
        tracing::info!("Created DNS zone {} ({})", name, zone_id);

        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, zone_id] = split_id::<2>(&id)?;

        let Some(zone) = dns_client(&self.session)?
            .get(&["instances", instance_id, "dnszones", zone_id])
            .await
            .or_gone()
            .with_context(|| format!("Error fetching pdns zone {}", zone_id))?
        else {
            tracing::warn!("DNS zone {} not found, removing from state", id);
            data.clear_id();
            return Ok(());
        };

        data.set("instance_id", instance_id);
        data.set("zone_id", zone_id);
        set_fields(
            data,
            &zone,
            &["name", "description", "label", "state", "created_on", "modified_on"],
        );
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, zone_id] = split_id::<2>(&id)?;

        if data.has_changes(&["description", "label"]) {
            let body = json!({
                "description": data.get_str("description").unwrap_or_default(),
                "label": data.get_str("label").unwrap_or_default(),
            });
            dns_client(&self.session)?
                .patch(&["instances", instance_id, "dnszones", zone_id], &body)
                .await
                .with_context(|| format!("Error updating pdns zone {}", zone_id))?;
        }

        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, zone_id] = split_id::<2>(&id)?;

        dns_client(&self.session)?
            .delete(&["instances", instance_id, "dnszones", zone_id])
            .await
            .or_gone()
            .with_context(|| format!("Error deleting pdns zone {}", zone_id))?;

        data.clear_id();
        Ok(())
    }
}
