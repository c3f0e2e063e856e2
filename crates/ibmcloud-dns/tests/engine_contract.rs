//! Zone and record driven through the engine: references resolve in
//! dependency order and destroy runs dependents first

mod common;

use common::mock_session;
use ibmcloud_core::traits::StateStore;
use ibmcloud_core::{Action, Configuration, Engine, EngineConfig, MemoryStateStore, ResourceRegistry};
use serde_json::json;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, Request, Respond, ResponseTemplate};

/// A single zone kept in memory: POST creates, PATCH merges, GET reads
#[derive(Clone, Default)]
struct ZoneApi {
    zone: Arc<Mutex<Option<Value>>>,
    patches: Arc<Mutex<Vec<Value>>>,
}

impl Respond for ZoneApi {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut zone = self.zone.lock().unwrap();
        match request.method.as_str() {
            "POST" => {
                let mut created: Value = request.body_json().unwrap();
                created["id"] = json!("zone-1");
                created["state"] = json!("ACTIVE");
                *zone = Some(created);
            }
            "PATCH" => {
                let patch: Value = request.body_json().unwrap();
                self.patches.lock().unwrap().push(patch.clone());
                if let (Some(current), Some(fields)) = (zone.as_mut(), patch.as_object()) {
                    for (k, v) in fields {
                        current[k] = v.clone();
                    }
                }
            }
            _ => {}
        }
        match zone.as_ref() {
            Some(current) => ResponseTemplate::new(200).set_body_json(current),
            None => ResponseTemplate::new(404),
        }
    }
}

#[tokio::test]
async fn test_record_waits_for_zone_and_destroy_reverses() {
    let (server, session) = mock_session().await;

    let zone = json!({"id": "zone-9", "name": "example.com", "state": "ACTIVE"});
    Mock::given(method("POST"))
        .and(path("/instances/inst-1/dnszones"))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone.clone()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/instances/inst-1/dnszones/zone-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone))
        .mount(&server)
        .await;

    let record = json!({
        "id": "rec-1", "type": "A", "name": "www.example.com", "ttl": 900,
        "rdata": {"ip": "10.1.2.3"}
    });
    Mock::given(method("POST"))
        .and(path("/instances/inst-1/dnszones/zone-9/resource_records"))
        .and(body_json(json!({
            "type": "A", "name": "www", "ttl": 900, "rdata": {"ip": "10.1.2.3"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(record.clone()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/instances/inst-1/dnszones/zone-9/resource_records/rec-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(record))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/instances/inst-1/dnszones/zone-9/resource_records/rec-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/instances/inst-1/dnszones/zone-9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let registry = Arc::new(ResourceRegistry::new());
    ibmcloud_dns::register(&registry, session);

    let config = Configuration::from_value(&json!({
        "resource": {
            "ibm_dns_zone": {"main": {"instance_id": "inst-1", "name": "example.com"}},
            "ibm_dns_resource_record": {
                "www": {
                    "instance_id": "inst-1",
                    "zone_id": "${ibm_dns_zone.main.zone_id}",
                    "type": "A",
                    "name": "www",
                    "rdata": "10.1.2.3"
                }
            }
        }
    }))
    .unwrap();

    let state = Arc::new(MemoryStateStore::new());
    let (engine, _events) = Engine::new(registry, state.clone(), EngineConfig::default()).unwrap();

    let report = assert_ok!(engine.apply(&config).await);
    assert!(report.is_success(), "{}", report.summary());

    let stored = state.get("ibm_dns_resource_record.www").await.unwrap().unwrap();
    assert_eq!(stored.id, "inst-1/zone-9/rec-1");
    assert_eq!(stored.attributes["zone_id"], json!("zone-9"));
    assert_eq!(stored.attributes["name"], json!("www"));

    let report = assert_ok!(engine.destroy(&config).await);
    assert_eq!(
        report.deleted,
        vec!["ibm_dns_resource_record.www", "ibm_dns_zone.main"]
    );
}

#[tokio::test]
async fn test_removed_description_is_cleared_and_converges() {
    let (server, session) = mock_session().await;
    let api = ZoneApi::default();
    Mock::given(path("/instances/inst-1/dnszones"))
        .respond_with(api.clone())
        .mount(&server)
        .await;
    Mock::given(path("/instances/inst-1/dnszones/zone-1"))
        .respond_with(api.clone())
        .mount(&server)
        .await;

    let registry = Arc::new(ResourceRegistry::new());
    ibmcloud_dns::register(&registry, session);
    let state = Arc::new(MemoryStateStore::new());
    let (engine, _events) = Engine::new(registry, state.clone(), EngineConfig::default()).unwrap();

    let with_description = Configuration::from_value(&json!({
        "resource": {"ibm_dns_zone": {"main": {
            "instance_id": "inst-1", "name": "example.com", "description": "old"
        }}}
    }))
    .unwrap();
    let report = assert_ok!(engine.apply(&with_description).await);
    assert!(report.is_success(), "{}", report.summary());

    let without_description = Configuration::from_value(&json!({
        "resource": {"ibm_dns_zone": {"main": {
            "instance_id": "inst-1", "name": "example.com"
        }}}
    }))
    .unwrap();
    let plan = assert_ok!(engine.plan(&without_description).await);
    assert_eq!(
        plan.get("ibm_dns_zone.main"),
        Some(&Action::Update(vec!["description".to_string()]))
    );

    let report = assert_ok!(engine.apply(&without_description).await);
    assert!(report.is_success(), "{}", report.summary());
    assert_eq!(
        *api.patches.lock().unwrap(),
        vec![json!({"description": "", "label": ""})]
    );

    let stored = state.get("ibm_dns_zone.main").await.unwrap().unwrap();
    assert_eq!(stored.attributes["description"], json!(""));

    let plan = assert_ok!(engine.plan(&without_description).await);
    assert_eq!(plan.get("ibm_dns_zone.main"), Some(&Action::NoOp));
}
