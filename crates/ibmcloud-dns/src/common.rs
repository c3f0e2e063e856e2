//! Helpers shared by the DNS Services adapters

use ibmcloud_conns::{ApiClient, Service, Session};
use ibmcloud_core::{ResourceData, Result};
use serde_json::{Map, Value};
use std::sync::Arc;

pub(crate) fn dns_client(session: &Arc<Session>) -> Result<ApiClient> {
    session.client(Service::Dns)
}

/// Insert `value` under `key` unless it is absent
pub(crate) fn insert_opt(body: &mut Map<String, Value>, key: &str, value: Option<impl Into<Value>>) {
    if let Some(value) = value {
        body.insert(key.to_string(), value.into());
    }
}

/// Copy top-level fields of an API object into same-named attributes
///
/// Missing fields are written as null so stale state does not linger.
pub(crate) fn set_fields(data: &mut ResourceData, object: &Value, keys: &[&str]) {
    for key in keys {
        data.set(*key, object.get(*key).cloned().unwrap_or(Value::Null));
    }
}

/// `id` field of an API response, required after a create
pub(crate) fn response_id<'a>(object: &'a Value, what: &str) -> Result<&'a str> {
    object
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ibmcloud_core::Error::Other(format!("{} response carried no ID", what)))
}

/// String values of a list attribute as a JSON array
pub(crate) fn string_array(data: &ResourceData, key: &str) -> Value {
    Value::Array(
        data.get_string_list(key)
            .into_iter()
            .map(Value::String)
            .collect(),
    )
}

/// `instance/object` identifier
pub(crate) fn join_pair(instance_id: &str, object_id: &str) -> String {
    ibmcloud_core::join_id(&[instance_id, object_id])
}
