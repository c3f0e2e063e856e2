//! `ibm_dns_custom_resolver_forwarding_rule`: forward matching queries to
//! upstream resolvers

use crate::common::{dns_client, insert_opt, response_id, set_fields, string_array};
use async_trait::async_trait;
use ibmcloud_conns::Session;
use ibmcloud_core::schema::validator;
use ibmcloud_core::{
    join_id, split_id, Attribute, Error, ErrorContext, MutexKv, NotFoundExt, Resource,
    ResourceData, Result, Schema, ValueType,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub struct DnsForwardingRule {
    session: Arc<Session>,
}

impl DnsForwardingRule {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Resource for DnsForwardingRule {
    fn type_name(&self) -> &'static str {
        "ibm_dns_custom_resolver_forwarding_rule"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("instance_id", Attribute::string().required().force_new())
            .attr("resolver_id", Attribute::string().required().force_new())
            .attr(
                "type",
                Attribute::string()
                    .default_value("zone")
                    .force_new()
                    .validate(validator::one_of(&["zone", "hostname"])),
            )
            .attr(
                "match",
                Attribute::string()
                    .required()
                    .description("The matching zone or hostname"),
            )
            .attr(
                "forward_to",
                Attribute::list(ValueType::String)
                    .required()
                    .min_items(1)
                    .validate(validator::ip_address()),
            )
            .attr("description", Attribute::string().optional())
            .attr("rule_id", Attribute::string().computed())
    }

    async fn create(&self, data: &mut ResourceData) -> Result<()> {
        let instance_id = data.require_str("instance_id")?.to_string();
        let resolver_id = data.require_str("resolver_id")?.to_string();

        let mut body = Map::new();
        body.insert("type".into(), json!(data.get_str("type").unwrap_or("zone")));
        body.insert("match".into(), json!(data.require_str("match")?));
        body.insert("forward_to".into(), string_array(data, "forward_to"));
        insert_opt(&mut body, "description", data.get_str("description"));

        let _guard = MutexKv::global().lock(resolver_id.as_str()).await;
        let rule = dns_client(&self.session)?
            .post(
                &["instances", &instance_id, "custom_resolvers", &resolver_id, "forwarding_rules"],
                &Value::Object(body),
            )
            .await
            .with_context(|| {
                format!("Error creating forwarding rule for custom resolver {}", resolver_id)
            })?;

        let rule_id = response_id(&rule, "forwarding rule")?;
        data.set_id(join_id(&[&instance_id, &resolver_id, rule_id]));
        drop(_guard);

        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, resolver_id, rule_id] = split_id::<3>(&id)?;

        let Some(rule) = dns_client(&self.session)?
            .get(&[
                "instances",
                instance_id,
                "custom_resolvers",
                resolver_id,
                "forwarding_rules",
                rule_id,
            ])
            .await
            .or_gone()
            .with_context(|| format!("Error reading forwarding rule {}", rule_id))?
        else {
            tracing::warn!("Forwarding rule {} not found, removing from state", id);
            data.clear_id();
            return Ok(());
        };

        data.set("instance_id", instance_id);
        data.set("resolver_id", resolver_id);
        data.set("rule_id", rule_id);
        set_fields(data, &rule, &["type", "match", "forward_to", "description"]);
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, resolver_id, rule_id] = split_id::<3>(&id)?;

        if data.has_changes(&["match", "forward_to", "description"]) {
            let body = json!({
                "match": data.require_str("match")?,
                "forward_to": string_array(data, "forward_to"),
                "description": data.get_str("description").unwrap_or_default(),
            });

            let _guard = MutexKv::global().lock(resolver_id).await;
            dns_client(&self.session)?
                .patch(
                    &[
                        "instances",
                        instance_id,
                        "custom_resolvers",
                        resolver_id,
                        "forwarding_rules",
                        rule_id,
                    ],
                    &body,
                )
                .await
                .with_context(|| format!("Error updating forwarding rule {}", rule_id))?;
        }

        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, resolver_id, rule_id] = split_id::<3>(&id)?;

        if data.get_state("type").and_then(Value::as_str) == Some("default") {
            return Err(Error::validation(
                "the default forwarding rule of a custom resolver cannot be deleted",
            ));
        }

        let _guard = MutexKv::global().lock(resolver_id).await;
        dns_client(&self.session)?
            .delete(&[
                "instances",
                instance_id,
                "custom_resolvers",
                resolver_id,
                "forwarding_rules",
                rule_id,
            ])
            .await
            .or_gone()
            .with_context(|| format!("Error deleting forwarding rule {}", rule_id))?;

        data.clear_id();
        Ok(())
    }
}
