//! REST client for one IBM Cloud service

use crate::endpoints::Service;
use crate::session::Session;
use ibmcloud_core::{Error, Result};
use reqwest::header::ACCEPT;
use reqwest::{Method, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Upper bound for a single retry delay
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Truncate a response body for logging and drop control characters
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };
    truncated.replace(|c: char| c.is_control() && c != ' ', "")
}

/// Human-readable message from an IBM Cloud error body
///
/// Services disagree on the shape: `{"errors":[{"message":..}]}` (DNS),
/// `{"message":..}` or `{"description":..}` (Satellite, App ID),
/// `{"errorMessage":..}` (IAM), `{"error":..}`.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    let candidates = [
        json.pointer("/errors/0/message"),
        json.get("message"),
        json.get("description"),
        json.get("errorMessage"),
        json.pointer("/error/message"),
        json.get("error"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(sanitize_for_log)
}

pub(crate) fn map_status(service: Service, status: u16, message: String) -> Error {
    match status {
        401 | 403 => Error::auth(format!("{} API ({}): {}", service, status, message)),
        404 => Error::not_found(message),
        429 => Error::rate_limited(format!("{} API: {}", service, message)),
        _ => Error::api(service.name(), status, message),
    }
}

/// Delay before retry number `attempt` (0-based), doubling from `base`
pub(crate) fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1 << attempt.min(10)).min(MAX_RETRY_DELAY)
}

/// Authenticated JSON client for one service
///
/// Paths are given as segments and percent-encoded individually, so IDs
/// containing `/` or spaces cannot escape their position in the URL.
///
/// ```rust,ignore
/// let client = session.client(Service::Dns)?;
/// let zone = client.get(&["instances", instance_id, "dnszones", zone_id]).await?;
/// ```
#[derive(Clone)]
pub struct ApiClient {
    session: Arc<Session>,
    service: Service,
    base_url: String,
    headers: Vec<(String, String)>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("service", &self.service)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ApiClient {
    pub(crate) fn new(session: Arc<Session>, service: Service, base_url: String) -> Self {
        Self {
            session,
            service,
            base_url,
            headers: Vec::new(),
        }
    }

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send an extra header with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub async fn get(&self, segments: &[&str]) -> Result<Value> {
        self.send(Method::GET, segments, &[], None).await
    }

    pub async fn get_query(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Value> {
        self.send(Method::GET, segments, query, None).await
    }

    pub async fn post(&self, segments: &[&str], body: &Value) -> Result<Value> {
        self.send(Method::POST, segments, &[], Some(body)).await
    }

    pub async fn put(&self, segments: &[&str], body: &Value) -> Result<Value> {
        self.send(Method::PUT, segments, &[], Some(body)).await
    }

    pub async fn patch(&self, segments: &[&str], body: &Value) -> Result<Value> {
        self.send(Method::PATCH, segments, &[], Some(body)).await
    }

    pub async fn delete(&self, segments: &[&str]) -> Result<Value> {
        self.send(Method::DELETE, segments, &[], None).await
    }

    pub async fn delete_query(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Value> {
        self.send(Method::DELETE, segments, query, None).await
    }

    /// Full URL for a path, mostly useful for logging and tests
    pub fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            Error::config(format!("invalid {} endpoint '{}': {}", self.service, self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                Error::config(format!("{} endpoint '{}' cannot carry a path", self.service, self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = self.url(segments, query)?;
        let (max_retries, base_delay) = self.session.retry_policy();

        let mut attempt = 0;
        loop {
            match self.send_once(&method, &url, body).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let delay = backoff(base_delay, attempt);
                    tracing::warn!(
                        "{} {} failed ({}), retry {}/{} in {:?}",
                        method,
                        url.path(),
                        e,
                        attempt + 1,
                        max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, method: &Method, url: &Url, body: Option<&Value>) -> Result<Value> {
        let token = self.session.access_token().await?;

        tracing::debug!("{} {}", method, url);
        let mut request = self
            .session
            .http()
            .request(method.clone(), url.clone())
            .bearer_auth(token)
            .header(ACCEPT, "application/json");
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            Error::http(format!("{} {} failed: {}", method, url.path(), e))
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("failed to read {} response: {}", self.service, e)))?;

        if !status.is_success() {
            tracing::debug!(
                "{} API error: {} - {}",
                self.service,
                status,
                sanitize_for_log(&text)
            );
            let message = error_message(&text).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            return Err(map_status(self.service, status.as_u16(), message));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            Error::Other(format!(
                "invalid JSON from {} API ({}): {}",
                self.service,
                e,
                sanitize_for_log(&text)
            ))
        })
    }
}
