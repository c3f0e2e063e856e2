//! Mock containers API shared by the Satellite adapter tests

use ibmcloud_conns::Session;
use ibmcloud_core::{ProviderConfig, ResourceData};
use ibmcloud_satellite::Polling;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Session whose IAM and Satellite endpoints are the mock server
pub async fn mock_session() -> (MockServer, Arc<Session>) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "satellite-test-token",
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
    config.endpoints.insert("satellite".to_string(), server.uri());

    let session = Session::new(config).unwrap();
    (server, session)
}

/// Poll immediately and often
pub fn fast() -> Polling {
    Polling::new(Duration::ZERO, Duration::from_millis(10))
}

pub fn config(value: Value) -> ResourceData {
    ResourceData::new(value.as_object().cloned().unwrap())
}

pub fn existing(id: &str, state: Value) -> ResourceData {
    ResourceData::from_state(id, state.as_object().cloned().unwrap())
}
