//! `ibm_dns_resource_record`: one record in a private zone
//!
//! The flat `rdata` attribute plus the MX/SRV extras are expanded into the
//! type-specific `rdata` object the API expects, and flattened back on read.

use crate::common::{dns_client, response_id, set_fields};
use async_trait::async_trait;
use ibmcloud_conns::Session;
use ibmcloud_core::schema::validator;
use ibmcloud_core::{
    join_id, split_id, Attribute, Error, ErrorContext, MutexKv, NotFoundExt, Resource,
    ResourceData, Result, Schema,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

const RECORD_TYPES: &[&str] = &["A", "AAAA", "CNAME", "MX", "SRV", "TXT", "PTR"];

/// Build the API `rdata` object for a record type
pub(crate) fn expand_rdata(record_type: &str, data: &ResourceData) -> Result<Value> {
    let rdata = data.require_str("rdata")?;
    let rdata = match record_type {
        "A" | "AAAA" => json!({ "ip": rdata }),
        "CNAME" => json!({ "cname": rdata }),
        "PTR" => json!({ "ptrdname": rdata }),
        "TXT" => json!({ "text": rdata }),
        "MX" => json!({
            "exchange": rdata,
            "preference": data.get_i64("preference").unwrap_or(0),
        }),
        "SRV" => json!({
            "target": rdata,
            "priority": data.get_i64("priority").unwrap_or(0),
            "weight": data.get_i64("weight").unwrap_or(0),
            "port": data.get_i64("port").unwrap_or(0),
        }),
        other => {
            return Err(Error::validation(format!(
                "unsupported resource record type {}",
                other
            )))
        }
    };
    Ok(rdata)
}

/// Write the API `rdata` object back into the flat attributes
pub(crate) fn flatten_rdata(record_type: &str, rdata: &Value, data: &mut ResourceData) {
    let field = |key: &str| rdata.get(key).cloned().unwrap_or(Value::Null);
    match record_type {
        "A" | "AAAA" => data.set("rdata", field("ip")),
        "CNAME" => data.set("rdata", field("cname")),
        "PTR" => data.set("rdata", field("ptrdname")),
        "TXT" => data.set("rdata", field("text")),
        "MX" => {
            data.set("rdata", field("exchange"));
            data.set("preference", field("preference"));
        }
        "SRV" => {
            data.set("rdata", field("target"));
            data.set("priority", field("priority"));
            data.set("weight", field("weight"));
            data.set("port", field("port"));
        }
        _ => {}
    }
}

/// The API returns fully qualified names (`www.example.com`, or
/// `_sip._udp.www.example.com` for SRV); keep the configured short form
/// when it is the same record.
pub(crate) fn flatten_name(configured: Option<&str>, returned: &str) -> String {
    let Some(name) = configured else {
        return returned.to_string();
    };
    let same = |candidate: &str| candidate == name || candidate.starts_with(&format!("{}.", name));
    if same(returned) || srv_owner(returned).is_some_and(same) {
        name.to_string()
    } else {
        returned.to_string()
    }
}

/// Owner name after the `_service._proto.` prefix of an SRV record
fn srv_owner(returned: &str) -> Option<&str> {
    let mut labels = returned.splitn(3, '.');
    let service = labels.next()?;
    let proto = labels.next()?;
    let owner = labels.next()?;
    (service.starts_with('_') && proto.starts_with('_')).then_some(owner)
}

pub struct DnsResourceRecord {
    session: Arc<Session>,
}

impl DnsResourceRecord {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    fn request_body(data: &ResourceData, record_type: &str) -> Result<Value> {
        let mut body = Map::new();
        body.insert("name".into(), json!(data.require_str("name")?));
        body.insert("rdata".into(), expand_rdata(record_type, data)?);
        body.insert("ttl".into(), json!(data.get_i64("ttl").unwrap_or(900)));
        if record_type == "SRV" {
            body.insert("service".into(), json!(data.require_str("service")?));
            body.insert("protocol".into(), json!(data.require_str("protocol")?));
        }
        Ok(Value::Object(body))
    }
}

#[async_trait]
impl Resource for DnsResourceRecord {
    fn type_name(&self) -> &'static str {
        "ibm_dns_resource_record"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("instance_id", Attribute::string().required().force_new())
            .attr("zone_id", Attribute::string().required().force_new())
            .attr(
                "type",
                Attribute::string()
                    .required()
                    .force_new()
                    .validate(validator::one_of(RECORD_TYPES)),
            )
            .attr("name", Attribute::string().required())
            .attr("rdata", Attribute::string().required())
            .attr(
                "ttl",
                Attribute::int()
                    .default_value(900)
                    .validate(validator::int_between(60, 2147483647)),
            )
            .attr(
                "preference",
                Attribute::int()
                    .default_value(0)
                    .validate(validator::int_between(0, 65535))
                    .description("DNS maximum preference (MX only)"),
            )
            .attr("priority", Attribute::int().optional().validate(validator::int_between(0, 65535)))
            .attr("weight", Attribute::int().optional().validate(validator::int_between(0, 65535)))
            .attr("port", Attribute::int().optional().validate(validator::int_between(1, 65535)))
            .attr("service", Attribute::string().optional().force_new())
            .attr(
                "protocol",
                Attribute::string()
                    .optional()
                    .force_new()
                    .validate(validator::one_of(&["udp", "tcp", "tls"])),
            )
            .attr("resource_record_id", Attribute::string().computed())
            .attr("created_on", Attribute::string().computed())
            .attr("modified_on", Attribute::string().computed())
    }

    async fn create(&self, data: &mut ResourceData) -> Result<()> {
        let instance_id = data.require_str("instance_id")?.to_string();
        let zone_id = data.require_str("zone_id")?.to_string();
        let record_type = data.require_str("type")?.to_string();

        let mut body = Self::request_body(data, &record_type)?;
        if let Value::Object(map) = &mut body {
            map.insert("type".into(), json!(record_type));
        }

        let _guard = MutexKv::global()
            .lock(join_id(&[&instance_id, &zone_id]))
            .await;

        let record = dns_client(&self.session)?
            .post(
                &["instances", &instance_id, "dnszones", &zone_id, "resource_records"],
                &body,
            )
            .await
            .with_context(|| format!("Error creating pdns resource record in zone {}", zone_id))?;

        let record_id = response_id(&record, "resource record")?;
        data.set_id(join_id(&[&instance_id, &zone_id, record_id]));
        drop(_guard);

        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, zone_id, record_id] = split_id::<3>(&id)?;

        let Some(record) = dns_client(&self.session)?
            .get(&[
                "instances",
                instance_id,
                "dnszones",
                zone_id,
                "resource_records",
                record_id,
            ])
            .await
            .or_gone()
            .with_context(|| format!("Error reading pdns resource record {}", record_id))?
        else {
            tracing::warn!("Resource record {} not found, removing from state", id);
            data.clear_id();
            return Ok(());
        };

        let record_type = record
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if let Some(returned) = record.get("name").and_then(Value::as_str) {
            let name = flatten_name(data.get_str("name"), returned);
            data.set("name", name);
        }
        flatten_rdata(&record_type, record.get("rdata").unwrap_or(&Value::Null), data);

        data.set("instance_id", instance_id);
        data.set("zone_id", zone_id);
        data.set("resource_record_id", record_id);
        set_fields(data, &record, &["type", "ttl", "created_on", "modified_on"]);
        if record_type == "SRV" {
            set_fields(data, &record, &["service", "protocol"]);
        }
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, zone_id, record_id] = split_id::<3>(&id)?;
        let record_type = data.require_str("type")?.to_string();

        if data.has_changes(&["name", "rdata", "ttl", "preference", "priority", "weight", "port"]) {
            let body = Self::request_body(data, &record_type)?;

            let _guard = MutexKv::global()
                .lock(join_id(&[instance_id, zone_id]))
                .await;
            dns_client(&self.session)?
                .patch(
                    &[
                        "instances",
                        instance_id,
                        "dnszones",
                        zone_id,
                        "resource_records",
                        record_id,
                    ],
                    &body,
                )
                .await
                .with_context(|| format!("Error updating pdns resource record {}", record_id))?;
        }

        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, zone_id, record_id] = split_id::<3>(&id)?;

        let _guard = MutexKv::global()
            .lock(join_id(&[instance_id, zone_id]))
            .await;

        dns_client(&self.session)?
            .delete(&[
                "instances",
                instance_id,
                "dnszones",
                zone_id,
                "resource_records",
                record_id,
            ])
            .await
            .or_gone()
            .with_context(|| format!("Error deleting pdns resource record {}", record_id))?;

        data.clear_id();
        Ok(())
    }
}
