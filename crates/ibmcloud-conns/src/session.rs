//! Authenticated session shared by every resource of a provider instance

use crate::client::{error_message, sanitize_for_log, ApiClient};
use crate::endpoints::{Endpoints, Service};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ibmcloud_core::{Error, ProviderConfig, Result};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const USER_AGENT: &str = concat!("ibmcloud-tf/", env!("CARGO_PKG_VERSION"));

/// Tokens are renewed this long before IAM says they expire
const EXPIRY_MARGIN_SECS: i64 = 60;

const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

const APIKEY_GRANT: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Client credentials IAM expects on refresh-token grants from CLI tooling
const REFRESH_CLIENT_ID: &str = "bx";
const REFRESH_CLIENT_SECRET: &str = "bx";

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Utc::now() + ChronoDuration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Absolute expiry as a unix timestamp
    #[serde(default)]
    expiration: Option<i64>,
}

enum Grant {
    ApiKey(String),
    RefreshToken(String),
}

/// Provider-wide connection state
///
/// Built once from the provider configuration and shared as `Arc<Session>`
/// by every registered resource. IAM tokens are exchanged lazily on the
/// first request and cached until shortly before they expire.
pub struct Session {
    config: ProviderConfig,
    endpoints: Endpoints,
    http: reqwest::Client,
    token: RwLock<Option<CachedToken>>,
}

// Tokens never appear in Debug output
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("endpoints", &self.endpoints)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl Session {
    /// Validate the configuration and resolve endpoints from it and the environment
    pub fn new(config: ProviderConfig) -> Result<Arc<Self>> {
        config.validate()?;
        let endpoints = Endpoints::from_config(&config)?;
        Self::with_endpoints(config, endpoints)
    }

    pub fn with_endpoints(config: ProviderConfig, endpoints: Endpoints) -> Result<Arc<Self>> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.ibmcloud_timeout))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        tracing::debug!(
            "Session for region {} ({} endpoints)",
            config.region,
            config.visibility
        );

        Ok(Arc::new(Self {
            config,
            endpoints,
            http,
            token: RwLock::new(None),
        }))
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn region(&self) -> &str {
        &self.config.region
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn retry_policy(&self) -> (u32, Duration) {
        (
            self.config.max_retries,
            Duration::from_secs(self.config.retry_delay_secs),
        )
    }

    /// Client for one service, failing when the service has no usable endpoint
    pub fn client(self: &Arc<Self>, service: Service) -> Result<ApiClient> {
        let base_url = self.endpoints.url(service)?;
        Ok(ApiClient::new(Arc::clone(self), service, base_url))
    }

    /// A valid IAM access token, exchanging credentials when needed
    pub async fn access_token(&self) -> Result<String> {
        let Some(grant) = self.grant() else {
            let token = self
                .config
                .iam_token
                .as_deref()
                .ok_or_else(|| Error::auth("no IBM Cloud credentials configured"))?;
            return Ok(token.strip_prefix("Bearer ").unwrap_or(token).to_string());
        };

        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
                return Ok(token.access_token.clone());
            }
        }

        let mut cached = self.token.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let grant = match (grant, cached.as_ref().and_then(|t| t.refresh_token.clone())) {
            (Grant::RefreshToken(_), Some(latest)) => Grant::RefreshToken(latest),
            (grant, _) => grant,
        };
        let fresh = self.request_token(grant).await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    /// API key wins over refresh token; a static token needs no exchange
    fn grant(&self) -> Option<Grant> {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        non_empty(&self.config.ibmcloud_api_key)
            .map(Grant::ApiKey)
            .or_else(|| non_empty(&self.config.iam_refresh_token).map(Grant::RefreshToken))
    }

    async fn request_token(&self, grant: Grant) -> Result<CachedToken> {
        let iam = self.endpoints.url(Service::Iam)?;
        let url = format!("{}/identity/token", iam);

        let request = match &grant {
            Grant::ApiKey(key) => self
                .http
                .post(&url)
                .form(&[("grant_type", APIKEY_GRANT), ("apikey", key.as_str())]),
            Grant::RefreshToken(token) => self
                .http
                .post(&url)
                .basic_auth(REFRESH_CLIENT_ID, Some(REFRESH_CLIENT_SECRET))
                .form(&[("grant_type", "refresh_token"), ("refresh_token", token.as_str())]),
        };

        tracing::debug!("Requesting IAM token from {}", url);
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::http(format!("IAM token request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("failed to read IAM response: {}", e)))?;

        if !status.is_success() {
            tracing::debug!("IAM error: {} - {}", status, sanitize_for_log(&text));
            let message = error_message(&text).unwrap_or_else(|| status.to_string());
            return Err(Error::auth(format!("IAM token exchange failed: {}", message)));
        }

        let body: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| Error::auth(format!("unexpected IAM token response: {}", e)))?;

        let expires_at = body
            .expiration
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(|| {
                Utc::now()
                    + ChronoDuration::seconds(
                        body.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
                    )
            });

        Ok(CachedToken {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProviderConfig {
        ProviderConfig {
            iam_token: Some("Bearer static-token".to_string()),
            ..ProviderConfig::default()
        }
    }

    #[tokio::test]
    async fn test_static_token_strips_bearer() {
        let session = Session::new(config()).unwrap();
        assert_eq!(session.access_token().await.unwrap(), "static-token");
    }

    #[test]
    fn test_api_key_preferred_over_refresh_token() {
        let mut cfg = config();
        cfg.ibmcloud_api_key = Some("key".to_string());
        cfg.iam_refresh_token = Some("refresh".to_string());
        let session = Session::new(cfg).unwrap();
        assert!(matches!(session.grant(), Some(Grant::ApiKey(k)) if k == "key"));
    }

    #[test]
    fn test_debug_redacts() {
        let mut cfg = config();
        cfg.ibmcloud_api_key = Some("super-secret".to_string());
        let session = Session::new(cfg).unwrap();
        let debug = format!("{:?}", session);
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("static-token"));
    }

    #[test]
    fn test_cached_token_margin() {
        let token = CachedToken {
            access_token: "t".into(),
            refresh_token: None,
            expires_at: Utc::now() + ChronoDuration::seconds(30),
        };
        assert!(!token.is_fresh());
        let token = CachedToken {
            expires_at: Utc::now() + ChronoDuration::seconds(600),
            ..token
        };
        assert!(token.is_fresh());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        assert!(Session::new(ProviderConfig::default()).is_err());
    }
}
