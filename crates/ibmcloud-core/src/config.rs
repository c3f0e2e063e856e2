//! Configuration types for the provider
//!
//! [`ProviderConfig`] holds credentials and connection settings, read from
//! the environment and optionally overridden by the `provider.ibm` block of a
//! configuration document. [`EngineConfig`] and [`StateStoreConfig`] tune the
//! lifecycle engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Which network the service endpoints are reached over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    PublicAndPrivate,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::PublicAndPrivate => "public-and-private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            "public-and-private" => Ok(Visibility::PublicAndPrivate),
            other => Err(crate::Error::config(format!(
                "visibility '{}' is not valid. Valid values: public, private, public-and-private",
                other
            ))),
        }
    }
}

/// Provider credentials and connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// IBM Cloud API key exchanged for IAM tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ibmcloud_api_key: Option<String>,

    /// Pre-issued IAM access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_token: Option<String>,

    /// IAM refresh token used when no API key is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_refresh_token: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    /// Resource group ID used where an API requires one and none is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub ibmcloud_timeout: u64,

    /// Retries for rate-limited and transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries in seconds (doubles per attempt)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    #[serde(default)]
    pub visibility: Visibility,

    /// JSON file mapping endpoint variables to URLs per visibility and region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints_file_path: Option<String>,

    /// Explicit endpoint overrides keyed by service (`iam`, `dns`, `appid`, `satellite`)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub endpoints: HashMap<String, String>,
}

// Credentials never appear in Debug output
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<REDACTED>");
        f.debug_struct("ProviderConfig")
            .field("ibmcloud_api_key", &redact(&self.ibmcloud_api_key))
            .field("iam_token", &redact(&self.iam_token))
            .field("iam_refresh_token", &redact(&self.iam_refresh_token))
            .field("region", &self.region)
            .field("zone", &self.zone)
            .field("resource_group", &self.resource_group)
            .field("ibmcloud_timeout", &self.ibmcloud_timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("visibility", &self.visibility)
            .field("endpoints_file_path", &self.endpoints_file_path)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            ibmcloud_api_key: None,
            iam_token: None,
            iam_refresh_token: None,
            region: default_region(),
            zone: None,
            resource_group: None,
            ibmcloud_timeout: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            visibility: Visibility::default(),
            endpoints_file_path: None,
            endpoints: HashMap::new(),
        }
    }
}

/// First non-empty value among several environment variable names
fn first_of<F>(lookup: &F, names: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .filter_map(|name| lookup(name))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

impl ProviderConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> crate::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            ibmcloud_api_key: first_of(&lookup, &["IC_API_KEY", "IBMCLOUD_API_KEY"]),
            iam_token: first_of(&lookup, &["IC_IAM_TOKEN", "IBMCLOUD_IAM_TOKEN"]),
            iam_refresh_token: first_of(
                &lookup,
                &["IC_IAM_REFRESH_TOKEN", "IBMCLOUD_IAM_REFRESH_TOKEN"],
            ),
            zone: first_of(&lookup, &["IC_ZONE", "IBMCLOUD_ZONE"]),
            resource_group: first_of(&lookup, &["IC_RESOURCE_GROUP", "IBMCLOUD_RESOURCE_GROUP"]),
            endpoints_file_path: first_of(&lookup, &["IBMCLOUD_ENDPOINTS_FILE_PATH", "IC_ENDPOINTS_FILE_PATH"]),
            ..Self::default()
        };

        if let Some(region) = first_of(
            &lookup,
            &["IC_REGION", "IBMCLOUD_REGION", "BM_REGION", "BLUEMIX_REGION"],
        ) {
            config.region = region;
        }

        if let Some(timeout) = first_of(&lookup, &["IC_TIMEOUT", "IBMCLOUD_TIMEOUT"]) {
            config.ibmcloud_timeout = timeout.parse().map_err(|_| {
                crate::Error::config(format!("IC_TIMEOUT must be a number of seconds, got '{}'", timeout))
            })?;
        }

        if let Some(retries) = first_of(&lookup, &["MAX_RETRIES"]) {
            config.max_retries = retries.parse().map_err(|_| {
                crate::Error::config(format!("MAX_RETRIES must be a number, got '{}'", retries))
            })?;
        }

        if let Some(visibility) = first_of(&lookup, &["IC_ENV_TYPE", "IBMCLOUD_VISIBILITY"]) {
            config.visibility = visibility.parse()?;
        }

        Ok(config)
    }

    /// Apply a `provider` block from a configuration document over this config
    pub fn merge(&mut self, block: &Map<String, Value>) -> crate::Result<()> {
        let mut base = serde_json::to_value(&*self)?;
        if let Value::Object(fields) = &mut base {
            for (key, value) in block {
                if value.is_null() {
                    continue;
                }
                fields.insert(key.clone(), value.clone());
            }
        }
        *self = serde_json::from_value(base)
            .map_err(|e| crate::Error::config(format!("invalid provider block: {}", e)))?;
        Ok(())
    }

    /// Validate the provider configuration
    pub fn validate(&self) -> crate::Result<()> {
        let has_credentials = [
            &self.ibmcloud_api_key,
            &self.iam_token,
            &self.iam_refresh_token,
        ]
        .iter()
        .any(|c| c.as_ref().is_some_and(|v| !v.is_empty()));
        if !has_credentials {
            return Err(crate::Error::config(
                "one of ibmcloud_api_key, iam_token or iam_refresh_token is required. \
                Set it via: export IC_API_KEY=your_api_key",
            ));
        }

        if self.region.is_empty() {
            return Err(crate::Error::config("region cannot be empty"));
        }

        if self.ibmcloud_timeout == 0 {
            return Err(crate::Error::config("ibmcloud_timeout must be > 0"));
        }

        for (service, url) in &self.endpoints {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(crate::Error::config(format!(
                    "endpoint for {} must be an http(s) URL, got '{}'",
                    service, url
                )));
            }
        }

        Ok(())
    }
}

fn default_region() -> String {
    "us-south".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    10
}

fn default_retry_delay_secs() -> u64 {
    2
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of concurrent operations within one dependency wave
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Read every known object before planning changes
    #[serde(default = "default_refresh")]
    pub refresh: bool,

    /// Capacity of the event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            refresh: default_refresh(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.parallelism == 0 {
            return Err(crate::Error::config("parallelism must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }
}

fn default_parallelism() -> usize {
    10
}

fn default_refresh() -> bool {
    true
}

fn default_event_channel_capacity() -> usize {
    1000
}
