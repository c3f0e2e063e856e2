//! List data sources
//!
//! Every DNS Services collection endpoint has the same shape: a scoped path,
//! an array under a collection key, and offset/limit paging with
//! `total_count`. One table-driven adapter serves all of them.

use crate::common::dns_client;
use async_trait::async_trait;
use ibmcloud_conns::Session;
use ibmcloud_core::{
    join_id, Attribute, DataSource, ErrorContext, ResourceData, Result, Schema, ValueType,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use Kind::{Bool, Int, Object, Objects, Str, StrList};
use Segment::{Arg, Literal};

/// Page size requested from collection endpoints
const PAGE_LIMIT: usize = 200;

/// Path element of a collection URL
#[derive(Debug, Clone, Copy)]
pub enum Segment {
    Literal(&'static str),
    /// Value of a required argument
    Arg(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub enum Kind {
    Str,
    Int,
    Bool,
    StrList,
    Object,
    Objects,
}

impl Kind {
    fn value_type(self) -> ValueType {
        match self {
            Kind::Str => ValueType::String,
            Kind::Int => ValueType::Int,
            Kind::Bool => ValueType::Bool,
            Kind::StrList => ValueType::List(Box::new(ValueType::String)),
            Kind::Object => ValueType::Map(Box::new(ValueType::String)),
            Kind::Objects => {
                ValueType::List(Box::new(ValueType::Map(Box::new(ValueType::String))))
            }
        }
    }
}

/// Item attribute and the JSON pointer it is read from
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub pointer: &'static str,
    pub kind: Kind,
}

const fn field(name: &'static str, pointer: &'static str, kind: Kind) -> Field {
    Field { name, pointer, kind }
}

/// Static description of one list data source
#[derive(Debug)]
pub struct ListSpec {
    pub type_name: &'static str,
    pub path: &'static [Segment],
    /// Array key in the response body
    pub collection: &'static str,
    /// Computed list attribute holding the items
    pub attribute: &'static str,
    pub fields: &'static [Field],
}

impl ListSpec {
    fn args(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.path.iter().filter_map(|s| match s {
            Segment::Arg(name) => Some(*name),
            Segment::Literal(_) => None,
        })
    }
}

/// Project one API item onto the declared fields
pub(crate) fn flatten_item(item: &Value, fields: &[Field]) -> Value {
    let mut out = Map::new();
    for f in fields {
        out.insert(
            f.name.to_string(),
            item.pointer(f.pointer).cloned().unwrap_or(Value::Null),
        );
    }
    Value::Object(out)
}

pub struct ListDataSource {
    session: Arc<Session>,
    spec: &'static ListSpec,
}

impl ListDataSource {
    pub fn new(session: Arc<Session>, spec: &'static ListSpec) -> Self {
        Self { session, spec }
    }
}

#[async_trait]
impl DataSource for ListDataSource {
    fn type_name(&self) -> &'static str {
        self.spec.type_name
    }

    fn schema(&self) -> Schema {
        let mut item = Schema::new();
        for f in self.spec.fields {
            item = item.attr(f.name, Attribute::new(f.kind.value_type()).computed());
        }
        let mut schema = Schema::new();
        for arg in self.spec.args() {
            schema = schema.attr(arg, Attribute::string().required());
        }
        schema.attr(self.spec.attribute, Attribute::block(item).computed())
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let mut args = Vec::new();
        for arg in self.spec.args() {
            args.push(data.require_str(arg)?.to_string());
        }

        let mut arg_values = args.iter();
        let segments: Vec<&str> = self
            .spec
            .path
            .iter()
            .map(|s| match s {
                Segment::Literal(lit) => *lit,
                Segment::Arg(_) => arg_values.next().map(String::as_str).unwrap_or_default(),
            })
            .collect();

        let client = dns_client(&self.session)?;
        let mut items = Vec::new();
        loop {
            let offset = items.len().to_string();
            let limit = PAGE_LIMIT.to_string();
            let page = client
                .get_query(&segments, &[("offset", offset.as_str()), ("limit", limit.as_str())])
                .await
                .with_context(|| format!("Error listing {}", self.spec.collection))?;

            let batch = page
                .get(self.spec.collection)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let fetched = batch.len();
            items.extend(batch.iter().map(|i| flatten_item(i, self.spec.fields)));

            let total = page.get("total_count").and_then(Value::as_u64);
            let more = match total {
                Some(total) => (items.len() as u64) < total,
                None => false,
            };
            if fetched == 0 || !more {
                break;
            }
        }

        tracing::debug!("{} returned {} items", self.spec.type_name, items.len());
        let id_parts: Vec<&str> = args.iter().map(String::as_str).collect();
        data.set_id(join_id(&id_parts));
        data.set(self.spec.attribute, items);
        Ok(())
    }
}

const INSTANCE: Segment = Arg("instance_id");

pub static ZONES: ListSpec = ListSpec {
    type_name: "ibm_dns_zones",
    path: &[Literal("instances"), INSTANCE, Literal("dnszones")],
    collection: "dnszones",
    attribute: "dns_zones",
    fields: &[
        field("zone_id", "/id", Str),
        field("instance_id", "/instance_id", Str),
        field("name", "/name", Str),
        field("description", "/description", Str),
        field("label", "/label", Str),
        field("state", "/state", Str),
        field("created_on", "/created_on", Str),
        field("modified_on", "/modified_on", Str),
    ],
};

pub static PERMITTED_NETWORKS: ListSpec = ListSpec {
    type_name: "ibm_dns_permitted_networks",
    path: &[
        Literal("instances"),
        INSTANCE,
        Literal("dnszones"),
        Arg("zone_id"),
        Literal("permitted_networks"),
    ],
    collection: "permitted_networks",
    attribute: "dns_permitted_networks",
    fields: &[
        field("permitted_network_id", "/id", Str),
        field("type", "/type", Str),
        field("vpc_crn", "/permitted_network/vpc_crn", Str),
        field("state", "/state", Str),
        field("created_on", "/created_on", Str),
        field("modified_on", "/modified_on", Str),
    ],
};

pub static RESOURCE_RECORDS: ListSpec = ListSpec {
    type_name: "ibm_dns_resource_records",
    path: &[
        Literal("instances"),
        INSTANCE,
        Literal("dnszones"),
        Arg("zone_id"),
        Literal("resource_records"),
    ],
    collection: "resource_records",
    attribute: "dns_resource_records",
    fields: &[
        field("resource_record_id", "/id", Str),
        field("name", "/name", Str),
        field("type", "/type", Str),
        field("ttl", "/ttl", Int),
        field("rdata", "/rdata", Object),
        field("created_on", "/created_on", Str),
        field("modified_on", "/modified_on", Str),
    ],
};

pub static GLB_MONITORS: ListSpec = ListSpec {
    type_name: "ibm_dns_glb_monitors",
    path: &[Literal("instances"), INSTANCE, Literal("monitors")],
    collection: "monitors",
    attribute: "dns_glb_monitors",
    fields: &[
        field("monitor_id", "/id", Str),
        field("name", "/name", Str),
        field("description", "/description", Str),
        field("type", "/type", Str),
        field("port", "/port", Int),
        field("interval", "/interval", Int),
        field("retries", "/retries", Int),
        field("timeout", "/timeout", Int),
        field("method", "/method", Str),
        field("path", "/path", Str),
        field("allow_insecure", "/allow_insecure", Bool),
        field("expected_codes", "/expected_codes", Str),
        field("expected_body", "/expected_body", Str),
        field("created_on", "/created_on", Str),
        field("modified_on", "/modified_on", Str),
    ],
};

pub static GLB_POOLS: ListSpec = ListSpec {
    type_name: "ibm_dns_glb_pools",
    path: &[Literal("instances"), INSTANCE, Literal("pools")],
    collection: "pools",
    attribute: "dns_glb_pools",
    fields: &[
        field("pool_id", "/id", Str),
        field("name", "/name", Str),
        field("description", "/description", Str),
        field("enabled", "/enabled", Bool),
        field("healthy_origins_threshold", "/healthy_origins_threshold", Int),
        field("origins", "/origins", Objects),
        field("monitor", "/monitor", Str),
        field("notification_channel", "/notification_channel", Str),
        field("healthcheck_region", "/healthcheck_region", Str),
        field("healthcheck_subnets", "/healthcheck_subnets", StrList),
        field("health", "/health", Str),
        field("created_on", "/created_on", Str),
        field("modified_on", "/modified_on", Str),
    ],
};

pub static GLBS: ListSpec = ListSpec {
    type_name: "ibm_dns_glbs",
    path: &[
        Literal("instances"),
        INSTANCE,
        Literal("dnszones"),
        Arg("zone_id"),
        Literal("load_balancers"),
    ],
    collection: "load_balancers",
    attribute: "dns_glbs",
    fields: &[
        field("glb_id", "/id", Str),
        field("name", "/name", Str),
        field("description", "/description", Str),
        field("enabled", "/enabled", Bool),
        field("ttl", "/ttl", Int),
        field("health", "/health", Str),
        field("fallback_pool", "/fallback_pool", Str),
        field("default_pools", "/default_pools", StrList),
        field("az_pools", "/az_pools", Objects),
        field("created_on", "/created_on", Str),
        field("modified_on", "/modified_on", Str),
    ],
};

pub static CUSTOM_RESOLVERS: ListSpec = ListSpec {
    type_name: "ibm_dns_custom_resolvers",
    path: &[Literal("instances"), INSTANCE, Literal("custom_resolvers")],
    collection: "custom_resolvers",
    attribute: "custom_resolvers",
    fields: &[
        field("custom_resolver_id", "/id", Str),
        field("name", "/name", Str),
        field("description", "/description", Str),
        field("enabled", "/enabled", Bool),
        field("health", "/health", Str),
        field("locations", "/locations", Objects),
        field("created_on", "/created_on", Str),
        field("modified_on", "/modified_on", Str),
    ],
};

pub static FORWARDING_RULES: ListSpec = ListSpec {
    type_name: "ibm_dns_custom_resolver_forwarding_rules",
    path: &[
        Literal("instances"),
        INSTANCE,
        Literal("custom_resolvers"),
        Arg("resolver_id"),
        Literal("forwarding_rules"),
    ],
    collection: "forwarding_rules",
    attribute: "forwarding_rules",
    fields: &[
        field("rule_id", "/id", Str),
        field("description", "/description", Str),
        field("type", "/type", Str),
        field("match", "/match", Str),
        field("forward_to", "/forward_to", StrList),
        field("created_on", "/created_on", Str),
        field("modified_on", "/modified_on", Str),
    ],
};

/// Every list data source this crate provides
pub static ALL: &[&ListSpec] = &[
    &ZONES,
    &PERMITTED_NETWORKS,
    &RESOURCE_RECORDS,
    &GLB_MONITORS,
    &GLB_POOLS,
    &GLBS,
    &CUSTOM_RESOLVERS,
    &FORWARDING_RULES,
];
