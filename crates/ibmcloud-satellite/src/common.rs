//! Helpers shared by the Satellite adapters

use ibmcloud_conns::{ApiClient, Service, Session};
use ibmcloud_core::{ResourceData, Result, StateChangeConf};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

const RESOURCE_GROUP_HEADER: &str = "X-Auth-Resource-Group";

/// Satellite client, scoped to a resource group when one is given
pub(crate) fn satellite_client(
    session: &Arc<Session>,
    resource_group_id: Option<&str>,
) -> Result<ApiClient> {
    let client = session.client(Service::Satellite)?;
    Ok(match resource_group_id {
        Some(group) => client.with_header(RESOURCE_GROUP_HEADER, group),
        None => client,
    })
}

/// How often provisioning waits poll the API
#[derive(Debug, Clone, Copy)]
pub struct Polling {
    pub delay: Duration,
    pub interval: Duration,
}

impl Polling {
    pub fn new(delay: Duration, interval: Duration) -> Self {
        Self { delay, interval }
    }

    pub(crate) fn conf(&self, pending: &[&str], target: &[&str], timeout: Duration) -> StateChangeConf {
        StateChangeConf::new(pending, target, timeout)
            .with_delay(self.delay)
            .with_poll_interval(self.interval)
    }
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(10),
            interval: Duration::from_secs(30),
        }
    }
}

/// String at a JSON pointer, or null
pub(crate) fn at(object: &Value, pointer: &str) -> Value {
    object.pointer(pointer).cloned().unwrap_or(Value::Null)
}

/// `k=v` label strings as the JSON object the API expects
pub(crate) fn expand_labels(labels: &[String]) -> Value {
    let map: Map<String, Value> = labels
        .iter()
        .filter_map(|label| label.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), Value::String(v.trim().to_string())))
        .collect();
    Value::Object(map)
}

/// Sorted `k=v` strings from a label object
pub(crate) fn flatten_labels(labels: Option<&Value>) -> Value {
    let mut out: Vec<String> = labels
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .map(|(k, v)| format!("{}={}", k, v.as_str().unwrap_or_default()))
                .collect()
        })
        .unwrap_or_default();
    out.sort();
    Value::Array(out.into_iter().map(Value::String).collect())
}

/// Resource group configured on the resource, else the one recorded in state
pub(crate) fn resource_group(data: &ResourceData) -> Option<String> {
    data.get_str("resource_group_id").map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_labels_round_trip_sorted() {
        let labels = vec!["env=prod".to_string(), "cpu = 4".to_string(), "junk".to_string()];
        let expanded = expand_labels(&labels);
        assert_eq!(expanded, json!({"env": "prod", "cpu": "4"}));
        assert_eq!(flatten_labels(Some(&expanded)), json!(["cpu=4", "env=prod"]));
        assert_eq!(flatten_labels(None), json!([]));
    }

    #[test]
    fn test_at_pointer() {
        let object = json!({"ingress": {"hostname": "h.example"}});
        assert_eq!(at(&object, "/ingress/hostname"), json!("h.example"));
        assert_eq!(at(&object, "/ingress/secret"), Value::Null);
    }
}
