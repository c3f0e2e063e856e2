//! Mock DNS Services API shared by the adapter tests

use ibmcloud_conns::Session;
use ibmcloud_core::{ProviderConfig, ResourceData};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Session whose IAM and DNS endpoints are the mock server
pub async fn mock_session() -> (MockServer, Arc<Session>) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "dns-test-token",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let mut config = ProviderConfig {
        ibmcloud_api_key: Some("test-key".to_string()),
        max_retries: 0,
        retry_delay_secs: 0,
        ..ProviderConfig::default()
    };
    config.endpoints.insert("iam".to_string(), server.uri());
    config.endpoints.insert("dns".to_string(), server.uri());

    let session = Session::new(config).unwrap();
    (server, session)
}

/// Resource data for a create from a JSON object
pub fn config(value: Value) -> ResourceData {
    ResourceData::new(value.as_object().cloned().unwrap())
}

/// Resource data for a read/delete of an existing object
pub fn existing(id: &str, state: Value) -> ResourceData {
    ResourceData::from_state(id, state.as_object().cloned().unwrap())
}
