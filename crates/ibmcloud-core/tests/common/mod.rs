//! Test doubles shared by the engine contract tests
//!
//! `FakeCloud` stands in for a remote API: an in-memory object table plus a
//! log of every adapter call, so tests can assert both results and ordering.

#![allow(dead_code)]

use async_trait::async_trait;
use ibmcloud_core::error::{Error, Result};
use ibmcloud_core::traits::{DataSource, Resource};
use ibmcloud_core::{Attribute, ResourceData, ResourceRegistry, Schema, Timeouts, ValueType};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory remote API shared by the fake adapters
#[derive(Clone, Default)]
pub struct FakeCloud {
    objects: Arc<Mutex<HashMap<String, Map<String, Value>>>>,
    calls: Arc<Mutex<Vec<String>>>,
    next_id: Arc<AtomicUsize>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn allocate(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn insert(&self, id: &str, object: Map<String, Value>) {
        self.objects.lock().unwrap().insert(id.to_string(), object);
    }

    pub fn get(&self, id: &str) -> Option<Map<String, Value>> {
        self.objects.lock().unwrap().get(id).cloned()
    }

    /// Delete an object behind the engine's back
    pub fn remove(&self, id: &str) -> bool {
        self.objects.lock().unwrap().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Every call so far, as "<op> <type> <id-or-name>"
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls of one operation against one type
    pub fn count(&self, op: &str, resource_type: &str) -> usize {
        let prefix = format!("{} {}", op, resource_type);
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    /// Position of the first call starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.calls.lock().unwrap().iter().position(|c| c.starts_with(prefix))
    }
}

/// Zone-like resource: `name` forces replacement, `label` updates in place
pub struct FakeZone {
    pub cloud: FakeCloud,
    pub create_delay: Duration,
}

impl FakeZone {
    pub fn new(cloud: FakeCloud) -> Self {
        Self {
            cloud,
            create_delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl Resource for FakeZone {
    fn type_name(&self) -> &'static str {
        "ibm_fake_zone"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::string().required().force_new())
            .attr("label", Attribute::string().optional())
            .attr("zone_id", Attribute::string().computed())
            .attr("state", Attribute::string().computed())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::uniform(Duration::from_secs(30))
    }

    async fn create(&self, data: &mut ResourceData) -> Result<()> {
        let name = data.require_str("name")?.to_string();
        self.cloud.log(format!("create ibm_fake_zone {}", name));
        if name == "fail" {
            return Err(Error::api("fake", 500, "zone creation failed"));
        }
        if name == "crash" {
            panic!("zone adapter crashed");
        }
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }

        let id = self.cloud.allocate("zone");
        let mut object = Map::new();
        object.insert("name".to_string(), json!(name));
        if let Some(label) = data.get_str("label") {
            object.insert("label".to_string(), json!(label));
        }
        self.cloud.insert(&id, object);
        data.set_id(id);
        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        self.cloud.log(format!("read ibm_fake_zone {}", id));
        let Some(object) = self.cloud.get(&id) else {
            data.clear_id();
            return Ok(());
        };
        data.set("name", object["name"].clone());
        data.set_opt("label", object.get("label").cloned());
        data.set("zone_id", id);
        data.set("state", "ACTIVE");
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        self.cloud.log(format!("update ibm_fake_zone {}", id));
        let mut object = self
            .cloud
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("zone {}", id)))?;
        if data.has_change("label") {
            object.insert("label".to_string(), data.get("label").cloned().unwrap_or(Value::Null));
        }
        self.cloud.insert(&id, object);
        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        self.cloud.log(format!("delete ibm_fake_zone {}", id));
        if !self.cloud.remove(&id) {
            return Err(Error::not_found(format!("zone {}", id)));
        }
        Ok(())
    }
}

/// Record-like resource that can only be created inside an existing zone
pub struct FakeRecord {
    pub cloud: FakeCloud,
}

#[async_trait]
impl Resource for FakeRecord {
    fn type_name(&self) -> &'static str {
        "ibm_fake_record"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("zone_id", Attribute::string().required().force_new())
            .attr("value", Attribute::string().required())
            .attr("ttl", Attribute::int().optional().default_value(900))
            .attr("record_id", Attribute::string().computed())
    }

    async fn create(&self, data: &mut ResourceData) -> Result<()> {
        let zone_id = data.require_str("zone_id")?.to_string();
        self.cloud.log(format!("create ibm_fake_record {}", zone_id));
        if self.cloud.get(&zone_id).is_none() {
            return Err(Error::api("fake", 400, format!("zone {} does not exist", zone_id)));
        }
        let id = self.cloud.allocate("record");
        let mut object = Map::new();
        object.insert("zone_id".to_string(), json!(zone_id));
        object.insert("value".to_string(), json!(data.require_str("value")?));
        object.insert("ttl".to_string(), json!(data.get_i64("ttl").unwrap_or(900)));
        self.cloud.insert(&id, object);
        data.set_id(id);
        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        self.cloud.log(format!("read ibm_fake_record {}", id));
        let Some(object) = self.cloud.get(&id) else {
            data.clear_id();
            return Ok(());
        };
        for (key, value) in object {
            data.set(key, value);
        }
        data.set("record_id", id);
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        self.cloud.log(format!("update ibm_fake_record {}", id));
        let mut object = self
            .cloud
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("record {}", id)))?;
        for key in ["value", "ttl"] {
            if data.has_change(key) {
                object.insert(key.to_string(), data.get(key).cloned().unwrap_or(Value::Null));
            }
        }
        self.cloud.insert(&id, object);
        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        self.cloud.log(format!("delete ibm_fake_record {}", id));
        if !self.cloud.remove(&id) {
            return Err(Error::not_found(format!("record {}", id)));
        }
        Ok(())
    }
}

/// Data source listing zone names
pub struct FakeZones {
    pub cloud: FakeCloud,
}

#[async_trait]
impl DataSource for FakeZones {
    fn type_name(&self) -> &'static str {
        "ibm_fake_zones"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("prefix", Attribute::string().optional())
            .attr("names", Attribute::list(ValueType::String).computed())
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        self.cloud.log("read ibm_fake_zones".to_string());
        let prefix = data.get_str("prefix").unwrap_or("").to_string();
        let mut names: Vec<String> = self
            .cloud
            .objects
            .lock()
            .unwrap()
            .values()
            .filter_map(|o| o.get("name").and_then(Value::as_str))
            .filter(|n| n.starts_with(&prefix))
            .map(str::to_string)
            .collect();
        names.sort();
        data.set("names", names);
        data.set_id(format!("zones/{}", prefix));
        Ok(())
    }
}

/// Registry with every fake type
pub fn fake_registry(cloud: &FakeCloud) -> Arc<ResourceRegistry> {
    registry_with_zone(cloud, FakeZone::new(cloud.clone()))
}

pub fn registry_with_zone(cloud: &FakeCloud, zone: FakeZone) -> Arc<ResourceRegistry> {
    let registry = ResourceRegistry::new();
    registry.register_resource(Arc::new(zone));
    registry.register_resource(Arc::new(FakeRecord {
        cloud: cloud.clone(),
    }));
    registry.register_data_source(Arc::new(FakeZones {
        cloud: cloud.clone(),
    }));
    Arc::new(registry)
}
