//! `ibm_dns_custom_resolver`: resolver endpoints placed in VPC subnets
//!
//! Locations are managed through their own sub-collection. An update diffs
//! the configured locations against state by subnet CRN and adds, toggles or
//! removes them one call at a time while holding the resolver's lock. A
//! location or resolver must be disabled before the API lets it go.

use crate::common::{dns_client, insert_opt, join_pair, response_id, set_fields};
use async_trait::async_trait;
use ibmcloud_conns::{ApiClient, Session};
use ibmcloud_core::{
    split_id, Attribute, ErrorContext, MutexKv, NotFoundExt, Resource, ResourceData, Result,
    Schema, Timeouts,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const FIELDS: &[&str] = &[
    "name",
    "description",
    "enabled",
    "high_availability",
    "health",
    "created_on",
    "modified_on",
];

/// One location as configured or as last seen
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Location {
    pub subnet_crn: String,
    pub enabled: bool,
    pub location_id: Option<String>,
}

impl Location {
    fn from_block(block: &Map<String, Value>) -> Option<Self> {
        Some(Self {
            subnet_crn: block.get("subnet_crn")?.as_str()?.to_string(),
            enabled: block.get("enabled").and_then(Value::as_bool).unwrap_or(true),
            location_id: block
                .get("location_id")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }
}

/// Changes needed to move from `current` to `desired` locations
#[derive(Debug, Default, PartialEq)]
pub(crate) struct LocationChanges {
    pub add: Vec<Location>,
    /// (location ID, new enabled flag)
    pub toggle: Vec<(String, bool)>,
    /// (location ID, currently enabled)
    pub remove: Vec<(String, bool)>,
}

pub(crate) fn diff_locations(current: &[Location], desired: &[Location]) -> LocationChanges {
    let by_subnet: HashMap<&str, &Location> =
        current.iter().map(|l| (l.subnet_crn.as_str(), l)).collect();
    let wanted: HashMap<&str, &Location> =
        desired.iter().map(|l| (l.subnet_crn.as_str(), l)).collect();

    let mut changes = LocationChanges::default();
    for location in desired {
        match by_subnet.get(location.subnet_crn.as_str()) {
            None => changes.add.push(location.clone()),
            Some(existing) if existing.enabled != location.enabled => {
                if let Some(id) = &existing.location_id {
                    changes.toggle.push((id.clone(), location.enabled));
                }
            }
            Some(_) => {}
        }
    }
    for location in current {
        if !wanted.contains_key(location.subnet_crn.as_str()) {
            if let Some(id) = &location.location_id {
                changes.remove.push((id.clone(), location.enabled));
            }
        }
    }
    changes
}

fn locations_of(blocks: Vec<&Map<String, Value>>) -> Vec<Location> {
    blocks.into_iter().filter_map(Location::from_block).collect()
}

pub struct DnsCustomResolver {
    session: Arc<Session>,
}

impl DnsCustomResolver {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    async fn set_enabled(
        client: &ApiClient,
        instance_id: &str,
        resolver_id: &str,
        enabled: bool,
    ) -> Result<()> {
        client
            .patch(
                &["instances", instance_id, "custom_resolvers", resolver_id],
                &json!({ "enabled": enabled }),
            )
            .await
            .with_context(|| {
                format!("Error updating enabled flag of custom resolver {}", resolver_id)
            })?;
        Ok(())
    }

    async fn apply_location_changes(
        client: &ApiClient,
        instance_id: &str,
        resolver_id: &str,
        changes: LocationChanges,
    ) -> Result<()> {
        let locations = ["instances", instance_id, "custom_resolvers", resolver_id, "locations"];

        for location in changes.add {
            tracing::debug!("Adding resolver location in {}", location.subnet_crn);
            client
                .post(
                    &locations,
                    &json!({ "subnet_crn": location.subnet_crn, "enabled": location.enabled }),
                )
                .await
                .with_context(|| {
                    format!("Error creating location for custom resolver {}", resolver_id)
                })?;
        }

        for (location_id, enabled) in changes.toggle {
            let mut path = locations.to_vec();
            path.push(location_id.as_str());
            client
                .patch(&path, &json!({ "enabled": enabled }))
                .await
                .with_context(|| format!("Error updating resolver location {}", location_id))?;
        }

        for (location_id, enabled) in changes.remove {
            let mut path = locations.to_vec();
            path.push(location_id.as_str());
            if enabled {
                client
                    .patch(&path, &json!({ "enabled": false }))
                    .await
                    .or_gone()
                    .with_context(|| {
                        format!("Error disabling resolver location {}", location_id)
                    })?;
            }
            client
                .delete(&path)
                .await
                .or_gone()
                .with_context(|| format!("Error deleting resolver location {}", location_id))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for DnsCustomResolver {
    fn type_name(&self) -> &'static str {
        "ibm_dns_custom_resolver"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("instance_id", Attribute::string().required().force_new())
            .attr("name", Attribute::string().required())
            .attr("description", Attribute::string().optional())
            .attr("enabled", Attribute::bool().default_value(true))
            .attr("high_availability", Attribute::bool().default_value(true))
            .attr(
                "locations",
                Attribute::block(
                    Schema::new()
                        .attr("subnet_crn", Attribute::string().required())
                        .attr("enabled", Attribute::bool().default_value(true))
                        .attr("location_id", Attribute::string().computed())
                        .attr("dns_server_ip", Attribute::string().computed())
                        .attr("healthy", Attribute::bool().computed()),
                )
                .optional(),
            )
            .attr("custom_resolver_id", Attribute::string().computed())
            .attr("health", Attribute::string().computed())
            .attr("created_on", Attribute::string().computed())
            .attr("modified_on", Attribute::string().computed())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::default()
            .with_create(Duration::from_secs(10 * 60))
            .with_update(Duration::from_secs(10 * 60))
            .with_delete(Duration::from_secs(10 * 60))
    }

    async fn create(&self, data: &mut ResourceData) -> Result<()> {
        let instance_id = data.require_str("instance_id")?.to_string();
        let name = data.require_str("name")?.to_string();
        let enabled = data.get_bool("enabled").unwrap_or(true);

        let locations: Vec<Value> = locations_of(data.get_blocks("locations"))
            .into_iter()
            .map(|l| json!({ "subnet_crn": l.subnet_crn, "enabled": l.enabled }))
            .collect();

        let mut body = Map::new();
        body.insert("name".into(), json!(name));
        body.insert(
            "high_availability".into(),
            json!(data.get_bool("high_availability").unwrap_or(true)),
        );
        insert_opt(&mut body, "description", data.get_str("description"));
        if !locations.is_empty() {
            body.insert("locations".into(), Value::Array(locations));
        }

        let client = dns_client(&self.session)?;
        let resolver = client
            .post(&["instances", &instance_id, "custom_resolvers"], &Value::Object(body))
            .await
            .with_context(|| format!("Error creating custom resolver {}", name))?;

        let resolver_id = response_id(&resolver, "custom resolver")?.to_string();
        data.set_id(join_pair(&instance_id, &resolver_id));

        // New resolvers start disabled
        if enabled {
            Self::set_enabled(&client, &instance_id, &resolver_id, true).await?;
        }

        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, resolver_id] = split_id::<2>(&id)?;

        let Some(resolver) = dns_client(&self.session)?
            .get(&["instances", instance_id, "custom_resolvers", resolver_id])
            .await
            .or_gone()
            .with_context(|| format!("Error reading custom resolver {}", resolver_id))?
        else {
            tracing::warn!("Custom resolver {} not found, removing from state", id);
            data.clear_id();
            return Ok(());
        };

        data.set("instance_id", instance_id);
        data.set("custom_resolver_id", resolver_id);
        set_fields(data, &resolver, FIELDS);

        let locations: Vec<Value> = resolver
            .get("locations")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|l| {
                let field = |k: &str| l.get(k).cloned().unwrap_or(Value::Null);
                json!({
                    "location_id": field("id"),
                    "subnet_crn": field("subnet_crn"),
                    "enabled": field("enabled"),
                    "healthy": field("healthy"),
                    "dns_server_ip": field("dns_server_ip"),
                })
            })
            .collect();
        data.set("locations", locations);
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, resolver_id] = split_id::<2>(&id)?;
        let client = dns_client(&self.session)?;

        if data.has_changes(&["name", "description", "enabled", "high_availability"]) {
            let mut body = Map::new();
            body.insert("name".into(), json!(data.require_str("name")?));
            body.insert(
                "description".into(),
                json!(data.get_str("description").unwrap_or_default()),
            );
            body.insert("enabled".into(), json!(data.get_bool("enabled").unwrap_or(true)));
            body.insert(
                "high_availability".into(),
                json!(data.get_bool("high_availability").unwrap_or(true)),
            );
            client
                .patch(
                    &["instances", instance_id, "custom_resolvers", resolver_id],
                    &Value::Object(body),
                )
                .await
                .with_context(|| format!("Error updating custom resolver {}", resolver_id))?;
        }

        if data.has_change("locations") {
            let current: Vec<Location> = data
                .get_state("locations")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Value::as_object).collect())
                .map(locations_of)
                .unwrap_or_default();
            let desired = locations_of(data.get_blocks("locations"));
            let changes = diff_locations(&current, &desired);

            let _guard = MutexKv::global().lock(resolver_id).await;
            Self::apply_location_changes(&client, instance_id, resolver_id, changes).await?;
        }

        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [instance_id, resolver_id] = split_id::<2>(&id)?;
        let client = dns_client(&self.session)?;

        if data.get_state("enabled").and_then(Value::as_bool).unwrap_or(false) {
            match Self::set_enabled(&client, instance_id, resolver_id, false).await {
                Err(e) if e.is_not_found() => {
                    data.clear_id();
                    return Ok(());
                }
                other => other?,
            }
        }

        client
            .delete(&["instances", instance_id, "custom_resolvers", resolver_id])
            .await
            .or_gone()
            .with_context(|| format!("Error deleting custom resolver {}", resolver_id))?;

        data.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(subnet: &str, enabled: bool, id: Option<&str>) -> Location {
        Location {
            subnet_crn: subnet.to_string(),
            enabled,
            location_id: id.map(str::to_string),
        }
    }

    #[test]
    fn test_diff_locations() {
        let current = vec![
            loc("crn:a", true, Some("loc-a")),
            loc("crn:b", true, Some("loc-b")),
            loc("crn:c", false, Some("loc-c")),
        ];
        let desired = vec![loc("crn:a", true, None), loc("crn:b", false, None), loc("crn:d", true, None)];

        let changes = diff_locations(&current, &desired);
        assert_eq!(changes.add, vec![loc("crn:d", true, None)]);
        assert_eq!(changes.toggle, vec![("loc-b".to_string(), false)]);
        assert_eq!(changes.remove, vec![("loc-c".to_string(), false)]);
    }

    #[test]
    fn test_no_changes() {
        let current = vec![loc("crn:a", true, Some("loc-a"))];
        let desired = vec![loc("crn:a", true, None)];
        assert_eq!(diff_locations(&current, &desired), LocationChanges::default());
    }
}
