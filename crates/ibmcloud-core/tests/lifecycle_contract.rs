//! Contract Test: Resource Lifecycle
//!
//! Constraints verified:
//! - Create persists the composite ID and read-back attributes
//! - A second apply of the same configuration calls no mutating operation
//! - Changing an updatable attribute updates in place
//! - Changing a force-new attribute deletes and recreates
//! - An object deleted outside the engine is recreated
//! - Removing a block from configuration deletes the object
//! - Removing an optional attribute clears it remotely and converges
//! - A crashing adapter fails its own block without aborting the run

mod common;

use common::*;
use ibmcloud_core::traits::StateStore;
use ibmcloud_core::{Action, Configuration, Engine, EngineConfig, MemoryStateStore};
use serde_json::json;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn zone_config(name: &str, label: Option<&str>) -> Configuration {
    let mut body = json!({"name": name});
    if let Some(label) = label {
        body["label"] = json!(label);
    }
    Configuration::from_value(&json!({
        "resource": {"ibm_fake_zone": {"main": body}}
    }))
    .expect("valid configuration")
}

fn engine(cloud: &FakeCloud, state: Arc<MemoryStateStore>) -> Engine {
    let (engine, _events) =
        Engine::new(fake_registry(cloud), state, EngineConfig::default()).expect("engine");
    engine
}

#[tokio::test]
async fn create_persists_id_and_computed_attributes() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let engine = engine(&cloud, state.clone());

    let report = assert_ok!(engine.apply(&zone_config("example.com", Some("prod"))).await);

    assert!(report.is_success());
    assert_eq!(report.created, vec!["ibm_fake_zone.main"]);

    let record = state.get("ibm_fake_zone.main").await.unwrap().unwrap();
    assert_eq!(record.id, "zone-1");
    assert_eq!(record.attributes["zone_id"], json!("zone-1"));
    assert_eq!(record.attributes["state"], json!("ACTIVE"));
    assert_eq!(record.attributes["label"], json!("prod"));
    assert_eq!(cloud.len(), 1);
}

#[tokio::test]
async fn second_apply_is_a_no_op() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let engine = engine(&cloud, state.clone());
    let config = zone_config("example.com", None);

    engine.apply(&config).await.unwrap();
    let report = engine.apply(&config).await.unwrap();

    assert_eq!(report.unchanged, vec!["ibm_fake_zone.main"]);
    assert_eq!(cloud.count("create", "ibm_fake_zone"), 1);
    assert_eq!(cloud.count("update", "ibm_fake_zone"), 0);
    assert_eq!(cloud.count("delete", "ibm_fake_zone"), 0);

    let plan = engine.plan(&config).await.unwrap();
    assert!(!plan.has_changes());
}

#[tokio::test]
async fn label_change_updates_in_place() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let engine = engine(&cloud, state.clone());

    engine.apply(&zone_config("example.com", Some("dev"))).await.unwrap();
    let report = engine
        .apply(&zone_config("example.com", Some("prod")))
        .await
        .unwrap();

    assert_eq!(report.updated, vec!["ibm_fake_zone.main"]);
    assert_eq!(cloud.count("update", "ibm_fake_zone"), 1);
    assert_eq!(cloud.get("zone-1").unwrap()["label"], json!("prod"));

    let record = state.get("ibm_fake_zone.main").await.unwrap().unwrap();
    assert_eq!(record.id, "zone-1");
    assert_eq!(record.attributes["label"], json!("prod"));
}

#[tokio::test]
async fn force_new_change_replaces() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let engine = engine(&cloud, state.clone());

    engine.apply(&zone_config("example.com", None)).await.unwrap();

    let config = zone_config("example.org", None);
    let plan = engine.plan(&config).await.unwrap();
    assert_eq!(
        plan.get("ibm_fake_zone.main"),
        Some(&ibmcloud_core::Action::Replace(vec!["name".to_string()]))
    );

    let report = engine.apply(&config).await.unwrap();
    assert_eq!(report.replaced, vec!["ibm_fake_zone.main"]);
    assert!(cloud.get("zone-1").is_none());
    assert_eq!(cloud.get("zone-2").unwrap()["name"], json!("example.org"));

    let record = state.get("ibm_fake_zone.main").await.unwrap().unwrap();
    assert_eq!(record.id, "zone-2");
    let deleted = cloud.position("delete ibm_fake_zone").unwrap();
    let created = cloud.position("create ibm_fake_zone example.org").unwrap();
    assert!(deleted < created);
}

#[tokio::test]
async fn vanished_object_is_recreated() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let engine = engine(&cloud, state.clone());
    let config = zone_config("example.com", None);

    engine.apply(&config).await.unwrap();
    assert!(cloud.remove("zone-1"));

    let plan = engine.plan(&config).await.unwrap();
    assert_eq!(plan.get("ibm_fake_zone.main"), Some(&ibmcloud_core::Action::Create));

    let report = engine.apply(&config).await.unwrap();
    assert_eq!(report.created, vec!["ibm_fake_zone.main"]);
    let record = state.get("ibm_fake_zone.main").await.unwrap().unwrap();
    assert_eq!(record.id, "zone-2");
}

#[tokio::test]
async fn refresh_forgets_vanished_objects() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let engine = engine(&cloud, state.clone());
    let config = zone_config("example.com", None);

    engine.apply(&config).await.unwrap();
    cloud.remove("zone-1");

    let report = engine.refresh(&config).await.unwrap();
    assert_eq!(report.vanished, vec!["ibm_fake_zone.main"]);
    assert!(state.get("ibm_fake_zone.main").await.unwrap().is_none());
}

#[tokio::test]
async fn removed_block_is_deleted() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let engine = engine(&cloud, state.clone());

    engine.apply(&zone_config("example.com", None)).await.unwrap();

    let empty = Configuration::from_value(&json!({})).unwrap();
    let plan = engine.plan(&empty).await.unwrap();
    assert_eq!(plan.get("ibm_fake_zone.main"), Some(&ibmcloud_core::Action::Delete));

    let report = engine.apply(&empty).await.unwrap();
    assert_eq!(report.deleted, vec!["ibm_fake_zone.main"]);
    assert_eq!(cloud.len(), 0);
    assert!(state.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_tolerates_already_gone() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let engine = engine(&cloud, state.clone());
    let config = zone_config("example.com", None);

    engine.apply(&config).await.unwrap();
    cloud.remove("zone-1");

    let report = engine.destroy(&config).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.deleted, vec!["ibm_fake_zone.main"]);
    assert!(state.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_create_is_reported_not_persisted() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let engine = engine(&cloud, state.clone());

    let report = engine.apply(&zone_config("fail", None)).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "ibm_fake_zone.main");
    assert!(report.failed[0].1.contains("zone creation failed"));
    assert!(state.get("ibm_fake_zone.main").await.unwrap().is_none());
}

#[tokio::test]
async fn invalid_configuration_touches_nothing() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let engine = engine(&cloud, state.clone());

    let config = Configuration::from_value(&json!({
        "resource": {"ibm_fake_zone": {"main": {"label": "x", "zone_id": "z"}}}
    }))
    .unwrap();

    let diags = engine.validate(&config);
    assert!(diags.has_errors());
    let attributes: Vec<String> = diags.iter().filter_map(|d| d.attribute.clone()).collect();
    assert!(attributes.contains(&"ibm_fake_zone.main.name".to_string()));
    assert!(attributes.contains(&"ibm_fake_zone.main.zone_id".to_string()));

    assert_err!(engine.apply(&config).await);
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn removed_optional_attribute_is_cleared() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let engine = engine(&cloud, state.clone());

    assert_ok!(engine.apply(&zone_config("example.com", Some("prod"))).await);
    let id = state.get("ibm_fake_zone.main").await.unwrap().unwrap().id;

    let unlabelled = zone_config("example.com", None);
    let report = assert_ok!(engine.apply(&unlabelled).await);
    assert_eq!(report.updated, vec!["ibm_fake_zone.main"]);
    assert!(cloud.get(&id).unwrap().get("label").is_none_or(|v| v.is_null()));

    let stored = state.get("ibm_fake_zone.main").await.unwrap().unwrap();
    assert!(stored.attributes.get("label").is_none_or(|v| v.is_null()));

    let plan = assert_ok!(engine.plan(&unlabelled).await);
    assert_eq!(plan.get("ibm_fake_zone.main"), Some(&Action::NoOp));
}

#[tokio::test]
async fn crashing_adapter_fails_only_its_block() {
    let cloud = FakeCloud::new();
    let state = Arc::new(MemoryStateStore::new());
    let engine = engine(&cloud, state.clone());

    let config = Configuration::from_value(&json!({
        "resource": {"ibm_fake_zone": {
            "broken": {"name": "crash"},
            "main": {"name": "example.com"}
        }}
    }))
    .unwrap();

    let report = assert_ok!(engine.apply(&config).await);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "ibm_fake_zone.broken");
    assert_eq!(report.created, vec!["ibm_fake_zone.main"]);
    assert!(state.get("ibm_fake_zone.main").await.unwrap().is_some());
    assert!(state.get("ibm_fake_zone.broken").await.unwrap().is_none());
}
