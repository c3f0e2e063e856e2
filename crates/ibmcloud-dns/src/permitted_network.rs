//! `ibm_dns_permitted_network`: a VPC allowed to resolve a zone
//!
//! Permitted networks are attached to the zone as a whole, so create and
//! delete of networks in one zone are serialized on the `instance/zone` key.

use crate::common::{dns_client, response_id, set_fields};
use async_trait::async_trait;
use ibmcloud_conns::Session;
use ibmcloud_core::schema::validator;
use ibmcloud_core::{
    join_id, split_id, Attribute, ErrorContext, MutexKv, NotFoundExt, Resource, ResourceData,
    Result, Schema,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub struct DnsPermittedNetwork {
    session: Arc<Session>,
}

impl DnsPermittedNetwork {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Resource for DnsPermittedNetwork {
    fn type_name(&self) -> &'static str {
        "ibm_dns_permitted_network"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("instance_id", Attribute::string().required().force_new())
            .attr("zone_id", Attribute::string().required().force_new())
            .attr(
                "vpc_crn",
                Attribute::string()
                    .required()
                    .force_new()
                    .description("VPC CRN id"),
            )
            .attr(
                "type",
                Attribute::string()
                    .default_value("vpc")
                    .force_new()
                    .validate(validator::one_of(&["vpc"])),
            )
            .attr("permitted_network_id", Attribute::string().computed())
            .attr("state", Attribute::string().computed())
            .attr("created_on", Attribute::string().computed())
            .attr("modified_on", Attribute::string().computed())
    }

    async fn create(&self, data: &mut ResourceData) -> Result<()> {
        let instance_id = data.require_str("instance_id")?.to_string();
        let zone_id = data.require_str("zone_id")?.to_string();
        let vpc_crn = data.require_str("vpc_crn")?.to_string();
        let network_type = data.get_str("type").unwrap_or("vpc").to_string();

        let _guard = MutexKv::global()
            .lock(join_id(&[&instance_id, &zone_id]))
            .await;

        let body = json!({
            "type": network_type,
            "permitted_network": { "vpc_crn": vpc_crn },
        });
        let network = dns_client(&self.session)?
            .post(
                &["instances", &instance_id, "dnszones", &zone_id, "permitted_networks"],
                &body,
            )
            .await
            .with_context(|| format!("Error creating permitted network for zone {}", zone_id))?;

        let network_id = response_id(&network, "permitted network")?;
        data.set_id(join_id(&[&instance_id, &zone_id, network_id]));
        drop(_guard);

        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, zone_id, network_id] = split_id::<3>(&id)?;

        let Some(network) = dns_client(&self.session)?
            .get(&[
                "instances",
                instance_id,
                "dnszones",
                zone_id,
                "permitted_networks",
                network_id,
            ])
            .await
            .or_gone()
            .with_context(|| format!("Error reading permitted network {}", network_id))?
        else {
            tracing::warn!("Permitted network {} not found, removing from state", id);
            data.clear_id();
            return Ok(());
        };

        data.set("instance_id", instance_id);
        data.set("zone_id", zone_id);
        data.set("permitted_network_id", network_id);
        data.set(
            "vpc_crn",
            network
                .pointer("/permitted_network/vpc_crn")
                .cloned()
                .unwrap_or(Value::Null),
        );
        set_fields(data, &network, &["type", "state", "created_on", "modified_on"]);
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData) -> Result<()> {
        // Every configurable attribute forces replacement
        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, zone_id, network_id] = split_id::<3>(&id)?;

        let _guard = MutexKv::global()
            .lock(join_id(&[instance_id, zone_id]))
            .await;

        dns_client(&self.session)?
            .delete(&[
                "instances",
                instance_id,
                "dnszones",
                zone_id,
                "permitted_networks",
                network_id,
            ])
            .await
            .or_gone()
            .with_context(|| format!("Error deleting permitted network {}", network_id))?;

        data.clear_id();
        Ok(())
    }
}
