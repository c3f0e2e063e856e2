//! Satellite location and host adapters against a mock containers API

mod common;

use common::{config, existing, fast, mock_session};
use ibmcloud_core::{DataSource, Resource};
use ibmcloud_satellite::{SatelliteHost, SatelliteLocation, SatelliteLocationSource};
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn location_body(state: &str) -> Value {
    json!({
        "id": "c1a2b3",
        "name": "edge",
        "datacenter": "wdc",
        "description": "edge location",
        "state": state,
        "crn": "crn:v1:bluemix:public:satellite:us-east:a/acct::location:c1a2b3",
        "resourceGroup": "rg-1",
        "createdDate": "2024-03-01T10:00:00+0000",
        "ingress": {"hostname": "edge.satellite.example"},
        "workerZones": ["zone-1", "zone-2", "zone-3"],
        "hosts": {"total": 3, "available": 1}
    })
}

#[tokio::test]
async fn test_location_create_waits_for_action_required() {
    let (server, session) = mock_session().await;

    Mock::given(method("POST"))
        .and(path("/v2/satellite/createController"))
        .and(header("X-Auth-Resource-Group", "rg-1"))
        .and(body_json(json!({
            "name": "edge",
            "location": "wdc",
            "description": "edge location",
            "zones": ["zone-1", "zone-2", "zone-3"]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "c1a2b3"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/satellite/getController"))
        .and(query_param("controller", "edge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(location_body("deploying")))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/satellite/getController"))
        .and(query_param("controller", "edge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(location_body("action required")))
        .mount(&server)
        .await;

    let mut data = config(json!({
        "location": "edge",
        "managed_from": "wdc",
        "description": "edge location",
        "resource_group_id": "rg-1",
        "zones": ["zone-1", "zone-2", "zone-3"]
    }));
    let location = SatelliteLocation::new(session).with_polling(fast());
    assert_ok!(location.create(&mut data).await);

    assert_eq!(data.id(), Some("edge"));
    assert_eq!(data.get_state("state"), Some(&json!("action required")));
    assert_eq!(data.get_state("host_attached_count"), Some(&json!(3)));
    assert_eq!(data.get_state("ingress_hostname"), Some(&json!("edge.satellite.example")));
}

#[tokio::test]
async fn test_location_create_fails_on_unexpected_state() {
    let (server, session) = mock_session().await;

    Mock::given(method("POST"))
        .and(path("/v2/satellite/createController"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "c1a2b3"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/satellite/getController"))
        .respond_with(ResponseTemplate::new(200).set_body_json(location_body("critical")))
        .mount(&server)
        .await;

    let mut data = config(json!({"location": "edge", "managed_from": "wdc"}));
    let err = assert_err!(
        SatelliteLocation::new(session)
            .with_polling(fast())
            .create(&mut data)
            .await
    );
    assert!(err.to_string().contains("Error waiting for Satellite location edge"));
}

#[tokio::test]
async fn test_location_delete_waits_until_gone() {
    let (server, session) = mock_session().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/locations/edge"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/satellite/getController"))
        .respond_with(ResponseTemplate::new(200).set_body_json(location_body("deleting")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/satellite/getController"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "E0008",
            "description": "The specified location could not be found."
        })))
        .mount(&server)
        .await;

    let mut data = existing("edge", json!({"location": "edge"}));
    assert_ok!(
        SatelliteLocation::new(session)
            .with_polling(fast())
            .delete(&mut data)
            .await
    );
    assert!(data.is_gone());
}

#[tokio::test]
async fn test_location_data_source_missing_is_error() {
    let (server, session) = mock_session().await;

    Mock::given(method("GET"))
        .and(path("/v2/satellite/getController"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut data = config(json!({"location": "nowhere"}));
    let err = assert_err!(SatelliteLocationSource::new(session).read(&mut data).await);
    assert!(err.is_not_found());
}

fn hosts_body(labels: Value) -> Value {
    json!([
        {
            "id": "host-a",
            "name": "vm-a",
            "labels": labels,
            "state": "assigned",
            "health": {"status": "normal"},
            "assignment": {"zone": "zone-1", "clusterName": "infrastructure"}
        },
        {
            "id": "host-b",
            "name": "vm-b",
            "labels": {},
            "state": "unassigned",
            "health": {"status": "ready"}
        }
    ])
}

#[tokio::test]
async fn test_host_assign_update_remove() {
    let (server, session) = mock_session().await;

    Mock::given(method("POST"))
        .and(path("/v2/satellite/assignHost"))
        .and(body_json(json!({
            "controller": "edge",
            "hostID": "host-a",
            "labels": {"env": "prod"},
            "zone": "zone-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hostID": "host-a"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/satellite/getHosts"))
        .and(query_param("controller", "edge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hosts_body(json!({"env": "prod"}))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/satellite/updateHost"))
        .and(body_json(json!({
            "controller": "edge",
            "hostID": "host-a",
            "labels": {"env": "prod", "tier": "gold"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/satellite/removeHost"))
        .and(body_json(json!({"controller": "edge", "hostID": "host-a"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let host = SatelliteHost::new(session).with_polling(fast());

    let mut data = config(json!({
        "location": "edge",
        "host_id": "host-a",
        "labels": ["env=prod"],
        "zone": "zone-1"
    }));
    assert_ok!(host.create(&mut data).await);
    assert_eq!(data.id(), Some("edge/host-a"));
    assert_eq!(data.get_state("health_state"), Some(&json!("normal")));
    assert_eq!(data.get_state("cluster"), Some(&json!("infrastructure")));
    assert_eq!(data.get_state("labels"), Some(&json!(["env=prod"])));

    let mut data = existing("edge/host-a", json!({"location": "edge", "labels": ["env=prod"]}))
        .with_changes(
            json!({"location": "edge", "host_id": "host-a", "labels": ["env=prod", "tier=gold"]})
                .as_object()
                .cloned()
                .unwrap(),
            vec!["labels".to_string()],
        );
    assert_ok!(host.update(&mut data).await);

    assert_ok!(host.delete(&mut data).await);
    assert!(data.is_gone());
}

#[tokio::test]
async fn test_host_missing_from_location_clears_id() {
    let (server, session) = mock_session().await;

    Mock::given(method("GET"))
        .and(path("/v2/satellite/getHosts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hosts_body(json!({}))))
        .mount(&server)
        .await;

    let host = SatelliteHost::new(session);

    let mut data = existing("edge/host-z", json!({"location": "edge"}));
    assert_ok!(host.read(&mut data).await);
    assert!(data.is_gone());

    let mut by_name = existing("edge/vm-b", json!({"location": "edge"}));
    assert_ok!(host.read(&mut by_name).await);
    assert_eq!(by_name.get_state("host_state"), Some(&json!("unassigned")));
    assert_eq!(by_name.get_state("health_state"), Some(&json!("ready")));
}
