//! Shared helpers for session tests against a mock IAM and service API

use ibmcloud_conns::Session;
use ibmcloud_core::ProviderConfig;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Provider configuration with every service pointed at the mock server
pub fn config_for(server: &MockServer) -> ProviderConfig {
    let mut config = ProviderConfig {
        ibmcloud_api_key: Some("test-api-key".to_string()),
        max_retries: 2,
        retry_delay_secs: 0,
        ..ProviderConfig::default()
    };
    for service in ["iam", "dns", "appid", "satellite"] {
        config.endpoints.insert(service.to_string(), server.uri());
    }
    config
}

pub fn session_for(server: &MockServer) -> Arc<Session> {
    Session::new(config_for(server)).unwrap()
}

/// IAM answers every API key exchange with `token`
pub async fn mount_iam(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "refresh_token": "next-refresh",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}
