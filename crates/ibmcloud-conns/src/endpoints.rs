// # Service endpoints
//
// Resolution order for each service URL:
//
// 1. `endpoints` override in the provider configuration
// 2. The service's environment variable (a bare host becomes `https://<host>/v1`)
// 3. The endpoints file, `{"<VAR>": {"<visibility>": {"<region>": "<url>"}}}`,
//    consulted unless visibility is `public-and-private`
// 4. The built-in default for the visibility and region

use ibmcloud_core::config::{ProviderConfig, Visibility};
use ibmcloud_core::{Error, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

const CLOUD_DOMAIN: &str = "cloud.ibm.com";

/// Remote services the provider talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Iam,
    Dns,
    AppId,
    Satellite,
}

impl Service {
    pub const ALL: [Service; 4] = [Service::Iam, Service::Dns, Service::AppId, Service::Satellite];

    /// Key used in `endpoints` overrides and in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Service::Iam => "iam",
            Service::Dns => "dns",
            Service::AppId => "appid",
            Service::Satellite => "satellite",
        }
    }

    pub fn env_var(&self) -> &'static str {
        match self {
            Service::Iam => "IBMCLOUD_IAM_API_ENDPOINT",
            Service::Dns => "IBMCLOUD_PRIVATE_DNS_API_ENDPOINT",
            Service::AppId => "IBMCLOUD_APPID_MANAGEMENT_API_ENDPOINT",
            Service::Satellite => "IBMCLOUD_SATELLITE_API_ENDPOINT",
        }
    }

    fn default_url(&self, visibility: Visibility, region: &str) -> String {
        let private = visibility != Visibility::Public;
        match self {
            Service::Iam if private && matches!(region, "us-south" | "us-east") => {
                format!("https://private.{}.iam.{}", region, CLOUD_DOMAIN)
            }
            Service::Iam if private => format!("https://private.iam.{}", CLOUD_DOMAIN),
            Service::Iam => format!("https://iam.{}", CLOUD_DOMAIN),
            Service::Dns if private => format!("https://api.private.dns-svcs.{}/v1", CLOUD_DOMAIN),
            Service::Dns => format!("https://api.dns-svcs.{}/v1", CLOUD_DOMAIN),
            Service::AppId => format!("https://{}.appid.{}", region, CLOUD_DOMAIN),
            Service::Satellite if private => {
                format!("https://private.{}.containers.{}/global", region, CLOUD_DOMAIN)
            }
            Service::Satellite => format!("https://containers.{}/global", CLOUD_DOMAIN),
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved endpoint inputs for one provider configuration
#[derive(Debug, Clone)]
pub struct Endpoints {
    visibility: Visibility,
    region: String,
    overrides: HashMap<String, String>,
    env: HashMap<Service, String>,
    file: Option<Map<String, Value>>,
}

impl Endpoints {
    /// Resolve against the process environment
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    /// Resolve with a custom environment lookup
    pub fn from_lookup<F>(config: &ProviderConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Service::ALL
            .iter()
            .filter_map(|service| {
                lookup(service.env_var())
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .map(|v| (*service, normalize_env_url(&v)))
            })
            .collect();

        let file = match &config.endpoints_file_path {
            Some(path) if !path.is_empty() => Some(load_endpoints_file(path)?),
            _ => None,
        };

        Ok(Self {
            visibility: config.visibility,
            region: config.region.clone(),
            overrides: config.endpoints.clone(),
            env,
            file,
        })
    }

    /// Base URL for a service, without a trailing slash
    ///
    /// - `Err(Error::Config)` for App ID over private endpoints
    pub fn url(&self, service: Service) -> Result<String> {
        if service == Service::AppId && self.visibility == Visibility::Private {
            return Err(Error::config(
                "App Id resources does not support private endpoints",
            ));
        }

        let url = self
            .overrides
            .get(service.name())
            .cloned()
            .or_else(|| self.env.get(&service).cloned())
            .or_else(|| self.from_file(service))
            .unwrap_or_else(|| service.default_url(self.visibility, &self.region));
        Ok(url.trim_end_matches('/').to_string())
    }

    fn from_file(&self, service: Service) -> Option<String> {
        if self.visibility == Visibility::PublicAndPrivate {
            return None;
        }
        self.file
            .as_ref()?
            .get(service.env_var())?
            .get(self.visibility.as_str())?
            .get(&self.region)?
            .as_str()
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    }
}

fn normalize_env_url(value: &str) -> String {
    if value.starts_with("https://") || value.starts_with("http://") {
        value.to_string()
    } else {
        format!("https://{}/v1", value)
    }
}

fn load_endpoints_file(path: &str) -> Result<Map<String, Value>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("failed to read endpoints file {}: {}", path, e)))?;
    match serde_json::from_str(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::config(format!(
            "endpoints file {} must contain a JSON object",
            path
        ))),
        Err(e) => Err(Error::config(format!(
            "endpoints file {} is not valid JSON: {}",
            path, e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config(visibility: Visibility, region: &str) -> ProviderConfig {
        ProviderConfig {
            ibmcloud_api_key: Some("key".to_string()),
            region: region.to_string(),
            visibility,
            ..ProviderConfig::default()
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_public_defaults() {
        let endpoints = Endpoints::from_lookup(&config(Visibility::Public, "eu-de"), no_env).unwrap();
        assert_eq!(endpoints.url(Service::Iam).unwrap(), "https://iam.cloud.ibm.com");
        assert_eq!(
            endpoints.url(Service::Dns).unwrap(),
            "https://api.dns-svcs.cloud.ibm.com/v1"
        );
        assert_eq!(
            endpoints.url(Service::AppId).unwrap(),
            "https://eu-de.appid.cloud.ibm.com"
        );
        assert_eq!(
            endpoints.url(Service::Satellite).unwrap(),
            "https://containers.cloud.ibm.com/global"
        );
    }

    #[test]
    fn test_private_defaults() {
        let endpoints =
            Endpoints::from_lookup(&config(Visibility::Private, "us-east"), no_env).unwrap();
        assert_eq!(
            endpoints.url(Service::Iam).unwrap(),
            "https://private.us-east.iam.cloud.ibm.com"
        );
        assert_eq!(
            endpoints.url(Service::Dns).unwrap(),
            "https://api.private.dns-svcs.cloud.ibm.com/v1"
        );
        let err = endpoints.url(Service::AppId).unwrap_err();
        assert!(err.to_string().contains("does not support private endpoints"));

        let endpoints =
            Endpoints::from_lookup(&config(Visibility::Private, "eu-gb"), no_env).unwrap();
        assert_eq!(
            endpoints.url(Service::Iam).unwrap(),
            "https://private.iam.cloud.ibm.com"
        );
    }

    #[test]
    fn test_precedence() {
        let mut cfg = config(Visibility::Public, "us-south");
        cfg.endpoints
            .insert("dns".to_string(), "http://127.0.0.1:8080/v1/".to_string());

        let lookup = |name: &str| match name {
            "IBMCLOUD_PRIVATE_DNS_API_ENDPOINT" => Some("dns.example.net".to_string()),
            "IBMCLOUD_APPID_MANAGEMENT_API_ENDPOINT" => Some("appid.example.net".to_string()),
            _ => None,
        };
        let endpoints = Endpoints::from_lookup(&cfg, lookup).unwrap();

        assert_eq!(endpoints.url(Service::Dns).unwrap(), "http://127.0.0.1:8080/v1");
        assert_eq!(
            endpoints.url(Service::AppId).unwrap(),
            "https://appid.example.net/v1"
        );
    }

    #[test]
    fn test_endpoints_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"IBMCLOUD_SATELLITE_API_ENDPOINT": {{"public": {{"us-south": "https://sat.test/global"}}}}}}"#
        )
        .unwrap();

        let mut cfg = config(Visibility::Public, "us-south");
        cfg.endpoints_file_path = Some(file.path().display().to_string());
        let endpoints = Endpoints::from_lookup(&cfg, no_env).unwrap();
        assert_eq!(
            endpoints.url(Service::Satellite).unwrap(),
            "https://sat.test/global"
        );

        cfg.visibility = Visibility::PublicAndPrivate;
        let endpoints = Endpoints::from_lookup(&cfg, no_env).unwrap();
        assert_eq!(
            endpoints.url(Service::Satellite).unwrap(),
            "https://private.us-south.containers.cloud.ibm.com/global"
        );
    }

    #[test]
    fn test_missing_endpoints_file_is_config_error() {
        let mut cfg = config(Visibility::Public, "us-south");
        cfg.endpoints_file_path = Some("/nonexistent/endpoints.json".to_string());
        let err = Endpoints::from_lookup(&cfg, no_env).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
