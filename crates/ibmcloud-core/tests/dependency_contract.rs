//! Contract Test: Dependency Ordering
//!
//! Constraints verified:
//! - Referenced attributes are substituted before the dependent is created
//! - Dependents are created after, and destroyed before, what they reference
//! - A failed block causes its dependents to be skipped, not attempted
//! - Data sources are read and their attributes are usable as references

mod common;

use common::*;
use ibmcloud_core::traits::StateStore;
use ibmcloud_core::{Configuration, Engine, EngineConfig, MemoryStateStore};
use serde_json::json;
use std::sync::Arc;

fn zone_and_record(zone_name: &str) -> Configuration {
    Configuration::from_value(&json!({
        "resource": {
            "ibm_fake_record": {
                "www": {
                    "zone_id": "${ibm_fake_zone.main.zone_id}",
                    "value": "10.0.0.1"
                }
            },
            "ibm_fake_zone": {"main": {"name": zone_name}}
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn references_are_resolved_in_dependency_order() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let (engine, _events) =
        Engine::new(fake_registry(&cloud), state.clone(), EngineConfig::default()).unwrap();

    let report = engine.apply(&zone_and_record("example.com")).await.unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(report.created.len(), 2);

    let zone = state.get("ibm_fake_zone.main").await.unwrap().unwrap();
    let record = state.get("ibm_fake_record.www").await.unwrap().unwrap();
    assert_eq!(record.attributes["zone_id"], json!(zone.id));
    assert_eq!(record.attributes["ttl"], json!(900));
    assert_eq!(record.dependencies, vec!["ibm_fake_zone.main"]);

    assert!(
        cloud.position("create ibm_fake_zone").unwrap()
            < cloud.position("create ibm_fake_record").unwrap()
    );
}

#[tokio::test]
async fn destroy_removes_dependents_first() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let (engine, _events) =
        Engine::new(fake_registry(&cloud), state.clone(), EngineConfig::default()).unwrap();
    let config = zone_and_record("example.com");

    engine.apply(&config).await.unwrap();
    let report = engine.destroy(&config).await.unwrap();

    assert_eq!(
        report.deleted,
        vec!["ibm_fake_record.www", "ibm_fake_zone.main"]
    );
    assert!(
        cloud.position("delete ibm_fake_record").unwrap()
            < cloud.position("delete ibm_fake_zone").unwrap()
    );
    assert_eq!(cloud.len(), 0);
}

#[tokio::test]
async fn failed_dependency_skips_dependents() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let (engine, _events) =
        Engine::new(fake_registry(&cloud), state.clone(), EngineConfig::default()).unwrap();

    let report = engine.apply(&zone_and_record("fail")).await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.skipped, vec!["ibm_fake_record.www"]);
    assert_eq!(cloud.count("create", "ibm_fake_record"), 0);
}

#[tokio::test]
async fn data_source_feeds_resources() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let (engine, _events) =
        Engine::new(fake_registry(&cloud), state.clone(), EngineConfig::default()).unwrap();

    engine.apply(&zone_and_record("example.com")).await.unwrap();

    let config = Configuration::from_value(&json!({
        "resource": {
            "ibm_fake_zone": {
                "main": {"name": "example.com"},
                "copy": {"name": "copy-of-${data.ibm_fake_zones.all.names.0}"}
            },
            "ibm_fake_record": {
                "www": {"zone_id": "${ibm_fake_zone.main.zone_id}", "value": "10.0.0.1"}
            }
        },
        "data": {"ibm_fake_zones": {"all": {"prefix": "example"}}}
    }))
    .unwrap();

    let report = engine.apply(&config).await.unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(report.read, vec!["data.ibm_fake_zones.all"]);
    assert_eq!(report.created, vec!["ibm_fake_zone.copy"]);

    let copy = state.get("ibm_fake_zone.copy").await.unwrap().unwrap();
    assert_eq!(copy.attributes["name"], json!("copy-of-example.com"));

    let data = state.get("data.ibm_fake_zones.all").await.unwrap().unwrap();
    assert_eq!(data.id, "zones/example");
}

#[tokio::test]
async fn parallel_wave_respects_parallelism() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let config = EngineConfig {
        parallelism: 2,
        ..EngineConfig::default()
    };
    let (engine, _events) = Engine::new(fake_registry(&cloud), state.clone(), config).unwrap();

    let mut zones = serde_json::Map::new();
    for i in 0..6 {
        zones.insert(format!("z{}", i), json!({"name": format!("zone{}.com", i)}));
    }
    let config = Configuration::from_value(&json!({"resource": {"ibm_fake_zone": zones}})).unwrap();

    let report = engine.apply(&config).await.unwrap();
    assert_eq!(report.created.len(), 6);
    assert_eq!(state.list().await.unwrap().len(), 6);
}
