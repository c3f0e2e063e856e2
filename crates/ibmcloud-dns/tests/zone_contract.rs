//! Zone, permitted network and resource record adapters against a mock API

mod common;

use common::{config, existing, mock_session};
use ibmcloud_core::{Resource, ResourceData};
use ibmcloud_dns::{DnsPermittedNetwork, DnsResourceRecord, DnsZone};
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

fn zone_body() -> serde_json::Value {
    json!({
        "id": "zone-1",
        "instance_id": "inst-1",
        "name": "example.com",
        "description": "private zone",
        "label": "prod",
        "state": "PENDING_NETWORK_ADD",
        "created_on": "2024-01-01T00:00:00Z",
        "modified_on": "2024-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn test_zone_create_reads_back_computed_fields() {
    let (server, session) = mock_session().await;

    Mock::given(method("POST"))
        .and(path("/instances/inst-1/dnszones"))
        .and(body_json(json!({
            "name": "example.com",
            "description": "private zone",
            "label": "prod"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/instances/inst-1/dnszones/zone-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_body()))
        .mount(&server)
        .await;

    let zone = DnsZone::new(session);
    let mut data = config(json!({
        "instance_id": "inst-1",
        "name": "example.com",
        "description": "private zone",
        "label": "prod"
    }));
    assert_ok!(zone.create(&mut data).await);

    assert_eq!(data.id(), Some("inst-1/zone-1"));
    assert_eq!(data.get_str("zone_id"), Some("zone-1"));
    assert_eq!(data.get_str("state"), Some("PENDING_NETWORK_ADD"));
}

#[tokio::test]
async fn test_zone_read_404_clears_id() {
    let (server, session) = mock_session().await;

    Mock::given(method("GET"))
        .and(path("/instances/inst-1/dnszones/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errors": [{"code": "not_found", "message": "zone not found"}]
        })))
        .mount(&server)
        .await;

    let mut data = existing("inst-1/gone", json!({"name": "example.com"}));
    assert_ok!(DnsZone::new(session).read(&mut data).await);
    assert!(data.is_gone());
}

#[tokio::test]
async fn test_zone_read_failure_is_wrapped() {
    let (server, session) = mock_session().await;

    Mock::given(method("GET"))
        .and(path("/instances/inst-1/dnszones/zone-1"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "internal"})))
        .mount(&server)
        .await;

    let mut data = existing("inst-1/zone-1", json!({}));
    let err = DnsZone::new(session).read(&mut data).await.unwrap_err();
    assert!(err.to_string().starts_with("Error fetching pdns zone zone-1"));
    assert_eq!(err.status(), Some(500));
    assert_eq!(data.id(), Some("inst-1/zone-1"));
}

#[tokio::test]
async fn test_zone_update_sends_only_mutable_fields() {
    let (server, session) = mock_session().await;

    Mock::given(method("PATCH"))
        .and(path("/instances/inst-1/dnszones/zone-1"))
        .and(body_json(json!({"description": "private zone", "label": "staging"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/instances/inst-1/dnszones/zone-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "zone-1", "name": "example.com", "description": "private zone",
            "label": "staging", "state": "ACTIVE"
        })))
        .mount(&server)
        .await;

    let mut data = existing(
        "inst-1/zone-1",
        json!({"instance_id": "inst-1", "name": "example.com", "description": "private zone", "label": "prod"}),
    )
    .with_changes(
        json!({"instance_id": "inst-1", "name": "example.com", "description": "private zone", "label": "staging"})
            .as_object()
            .cloned()
            .unwrap(),
        vec!["label".to_string()],
    );

    assert_ok!(DnsZone::new(session).update(&mut data).await);
    assert_eq!(data.get_state("label"), Some(&json!("staging")));
    assert_eq!(data.get_state("state"), Some(&json!("ACTIVE")));
}

#[tokio::test]
async fn test_zone_delete_tolerates_404() {
    let (server, session) = mock_session().await;

    Mock::given(method("DELETE"))
        .and(path("/instances/inst-1/dnszones/zone-1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let mut data = existing("inst-1/zone-1", json!({}));
    assert_ok!(DnsZone::new(session).delete(&mut data).await);
    assert!(data.is_gone());
}

#[tokio::test]
async fn test_zone_rejects_malformed_id() {
    let (_server, session) = mock_session().await;
    let mut data = existing("only-one-part", json!({}));
    let err = DnsZone::new(session).read(&mut data).await.unwrap_err();
    assert!(err.to_string().contains("incorrect ID only-one-part"));
}

#[tokio::test]
async fn test_permitted_network_create() {
    let (server, session) = mock_session().await;

    let network = json!({
        "id": "pn-1",
        "type": "vpc",
        "permitted_network": {"vpc_crn": "crn:v1:bluemix:public:is:us-south:a/1::vpc:r006"},
        "state": "ACTIVE",
        "created_on": "2024-01-01T00:00:00Z",
        "modified_on": "2024-01-01T00:00:00Z"
    });
    Mock::given(method("POST"))
        .and(path("/instances/inst-1/dnszones/zone-1/permitted_networks"))
        .and(body_json(json!({
            "type": "vpc",
            "permitted_network": {"vpc_crn": "crn:v1:bluemix:public:is:us-south:a/1::vpc:r006"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(network.clone()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/instances/inst-1/dnszones/zone-1/permitted_networks/pn-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(network))
        .mount(&server)
        .await;

    let mut data = config(json!({
        "instance_id": "inst-1",
        "zone_id": "zone-1",
        "vpc_crn": "crn:v1:bluemix:public:is:us-south:a/1::vpc:r006",
        "type": "vpc"
    }));
    assert_ok!(DnsPermittedNetwork::new(session).create(&mut data).await);
    assert_eq!(data.id(), Some("inst-1/zone-1/pn-1"));
    assert_eq!(data.get_str("permitted_network_id"), Some("pn-1"));
    assert_eq!(data.get_str("state"), Some("ACTIVE"));
}

#[tokio::test]
async fn test_mx_record_round_trip() {
    let (server, session) = mock_session().await;

    Mock::given(method("POST"))
        .and(path("/instances/inst-1/dnszones/zone-1/resource_records"))
        .and(body_json(json!({
            "type": "MX",
            "name": "mail",
            "ttl": 900,
            "rdata": {"exchange": "mx.example.com", "preference": 10}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "rec-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/instances/inst-1/dnszones/zone-1/resource_records/rec-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "rec-1",
            "type": "MX",
            "name": "mail.example.com",
            "ttl": 900,
            "rdata": {"exchange": "mx.example.com", "preference": 10},
            "created_on": "2024-01-01T00:00:00Z",
            "modified_on": "2024-01-01T00:00:00Z"
        })))
        .mount(&server)
        .await;

    let mut data = config(json!({
        "instance_id": "inst-1",
        "zone_id": "zone-1",
        "type": "MX",
        "name": "mail",
        "rdata": "mx.example.com",
        "preference": 10,
        "ttl": 900
    }));
    assert_ok!(DnsResourceRecord::new(session).create(&mut data).await);

    assert_eq!(data.id(), Some("inst-1/zone-1/rec-1"));
    let attrs = data.into_attributes();
    assert_eq!(attrs["name"], json!("mail"));
    assert_eq!(attrs["rdata"], json!("mx.example.com"));
    assert_eq!(attrs["preference"], json!(10));
    assert_eq!(attrs["resource_record_id"], json!("rec-1"));
}

#[tokio::test]
async fn test_srv_record_read_flattens_rdata() {
    let (server, session) = mock_session().await;

    Mock::given(method("GET"))
        .and(path("/instances/inst-1/dnszones/zone-1/resource_records/srv-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "srv-1",
            "type": "SRV",
            "name": "_sip._udp.voip.example.com",
            "ttl": 300,
            "service": "_sip",
            "protocol": "udp",
            "rdata": {"target": "sip.example.com", "priority": 1, "weight": 5, "port": 5060}
        })))
        .mount(&server)
        .await;

    let mut data: ResourceData = existing("inst-1/zone-1/srv-1", json!({"name": "voip"}));
    assert_ok!(DnsResourceRecord::new(session).read(&mut data).await);

    assert_eq!(data.get_str("name"), Some("voip"));
    assert_eq!(data.get_str("rdata"), Some("sip.example.com"));
    assert_eq!(data.get_i64("port"), Some(5060));
    assert_eq!(data.get_str("protocol"), Some("udp"));
    assert_eq!(data.get_i64("ttl"), Some(300));
}
