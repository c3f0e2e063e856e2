//! Mock App ID management API shared by the adapter tests

use ibmcloud_conns::Session;
use ibmcloud_core::{ProviderConfig, ResourceData};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TENANT: &str = "tenant-1";

/// Session whose IAM and App ID endpoints are the mock server
pub async fn mock_session() -> (MockServer, Arc<Session>) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "appid-test-token",
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
    config.endpoints.insert("appid".to_string(), server.uri());

    let session = Session::new(config).unwrap();
    (server, session)
}

/// A tenant document that keeps whatever was last `PUT`
///
/// `GET` answers 404 until the first write, like a tenant that does not exist yet.
#[derive(Clone, Default)]
pub struct DocumentStore {
    document: Arc<Mutex<Option<Value>>>,
}

impl DocumentStore {
    pub fn seeded(document: Value) -> Self {
        Self {
            document: Arc::new(Mutex::new(Some(document))),
        }
    }

    pub fn current(&self) -> Option<Value> {
        self.document.lock().unwrap().clone()
    }

    /// Serve `GET` and `PUT` of the document below the tenant
    pub async fn mount(&self, server: &MockServer, suffix: &str) {
        let path_str = format!("/management/v4/{}/{}", TENANT, suffix);
        for verb in ["GET", "PUT"] {
            Mock::given(method(verb))
                .and(path(path_str.as_str()))
                .respond_with(self.clone())
                .mount(server)
                .await;
        }
    }
}

impl Respond for DocumentStore {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut document = self.document.lock().unwrap();
        if request.method.as_str() == "PUT" {
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            *document = Some(body.clone());
            return ResponseTemplate::new(200).set_body_json(body);
        }
        match document.as_ref() {
            Some(body) => ResponseTemplate::new(200).set_body_json(body),
            None => ResponseTemplate::new(404).set_body_json(json!({"message": "tenant not found"})),
        }
    }
}

/// Resource data for a create from a JSON object
pub fn config(value: Value) -> ResourceData {
    ResourceData::new(value.as_object().cloned().unwrap())
}

/// Resource data for a read/delete of an existing object
pub fn existing(id: &str, state: Value) -> ResourceData {
    ResourceData::from_state(id, state.as_object().cloned().unwrap())
}
