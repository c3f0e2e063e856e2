//! Configuration documents
//!
//! The engine consumes the JSON flavour of the declarative language:
//!
//! ```json
//! {
//!   "provider": { "ibm": { "region": "us-south" } },
//!   "resource": {
//!     "ibm_dns_zone": {
//!       "main": { "instance_id": "...", "name": "example.com" }
//!     },
//!     "ibm_dns_permitted_network": {
//!       "vpc": {
//!         "instance_id": "...",
//!         "zone_id": "${ibm_dns_zone.main.zone_id}",
//!         "vpc_crn": "crn:v1:...",
//!         "timeouts": { "create": "10m" }
//!       }
//!     }
//!   },
//!   "data": { "ibm_dns_zones": { "all": { "instance_id": "..." } } }
//! }
//! ```

use crate::error::{Error, Result};
use crate::timeouts::Timeouts;
use crate::traits::Mode;
use serde_json::{Map, Value};
use std::path::Path;

/// Name of the only provider block this plugin understands
pub const PROVIDER_NAME: &str = "ibm";

/// One `resource` or `data` block
#[derive(Debug, Clone, PartialEq)]
pub struct BlockConfig {
    pub mode: Mode,
    pub resource_type: String,
    pub name: String,
    /// Attribute values, with meta-arguments removed
    pub body: Map<String, Value>,
    pub depends_on: Vec<String>,
    /// Raw `timeouts` block, merged over the resource defaults at apply time
    pub timeouts: Map<String, Value>,
}

impl BlockConfig {
    pub fn address(&self) -> String {
        format_address(self.mode, &self.resource_type, &self.name)
    }

    /// Resource defaults overridden by this block's `timeouts`
    pub fn timeouts(&self, defaults: Timeouts) -> Result<Timeouts> {
        defaults.merge(&self.timeouts)
    }
}

pub fn format_address(mode: Mode, resource_type: &str, name: &str) -> String {
    match mode {
        Mode::Managed => format!("{}.{}", resource_type, name),
        Mode::Data => format!("data.{}.{}", resource_type, name),
    }
}

/// Split an address into mode, type and name
pub fn parse_address(address: &str) -> Result<(Mode, &str, &str)> {
    let parts: Vec<&str> = address.split('.').collect();
    match parts.as_slice() {
        ["data", ty, name] if !ty.is_empty() && !name.is_empty() => Ok((Mode::Data, ty, name)),
        [ty, name] if !ty.is_empty() && !name.is_empty() && *ty != "data" => {
            Ok((Mode::Managed, ty, name))
        }
        _ => Err(Error::config(format!("invalid address '{}'", address))),
    }
}

/// A parsed configuration document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    /// Body of `provider.ibm`
    pub provider: Map<String, Value>,
    pub blocks: Vec<BlockConfig>,
}

impl Configuration {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::config(format!("configuration is not valid JSON: {}", e)))?;
        Self::from_value(&value)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!("failed to read configuration {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let root = value
            .as_object()
            .ok_or_else(|| Error::config("configuration must be a JSON object"))?;

        let mut config = Configuration::default();
        for (key, section) in root {
            match key.as_str() {
                "provider" => config.provider = parse_provider(section)?,
                "resource" => parse_section(Mode::Managed, section, &mut config.blocks)?,
                "data" => parse_section(Mode::Data, section, &mut config.blocks)?,
                "terraform" | "variable" | "output" | "locals" => {
                    tracing::debug!("Ignoring top-level '{}' section", key);
                }
                other => {
                    return Err(Error::config(format!("unknown top-level section '{}'", other)));
                }
            }
        }
        Ok(config)
    }

    pub fn find(&self, address: &str) -> Option<&BlockConfig> {
        self.blocks.iter().find(|b| b.address() == address)
    }

    pub fn addresses(&self) -> Vec<String> {
        self.blocks.iter().map(BlockConfig::address).collect()
    }
}

fn parse_provider(section: &Value) -> Result<Map<String, Value>> {
    let providers = section
        .as_object()
        .ok_or_else(|| Error::config("'provider' must be an object"))?;
    let mut body = Map::new();
    for (name, block) in providers {
        if name != PROVIDER_NAME {
            return Err(Error::config(format!(
                "unsupported provider '{}', only '{}' is available",
                name, PROVIDER_NAME
            )));
        }
        body = block
            .as_object()
            .cloned()
            .ok_or_else(|| Error::config("provider block must be an object"))?;
    }
    Ok(body)
}

fn parse_section(mode: Mode, section: &Value, blocks: &mut Vec<BlockConfig>) -> Result<()> {
    let types = section
        .as_object()
        .ok_or_else(|| Error::config("resource and data sections must be objects"))?;

    for (resource_type, named) in types {
        let named = named.as_object().ok_or_else(|| {
            Error::config(format!("'{}' must map block names to bodies", resource_type))
        })?;
        for (name, body) in named {
            let mut body = body.as_object().cloned().ok_or_else(|| {
                Error::config(format!("body of {}.{} must be an object", resource_type, name))
            })?;

            let depends_on = match body.remove("depends_on") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| {
                        let address = item.as_str().ok_or_else(|| {
                            Error::config("depends_on entries must be strings")
                        })?;
                        parse_address(address)?;
                        Ok(address.to_string())
                    })
                    .collect::<Result<Vec<_>>>()?,
                Some(_) => return Err(Error::config("depends_on must be a list of addresses")),
            };

            let timeouts = match body.remove("timeouts") {
                None | Some(Value::Null) => Map::new(),
                Some(Value::Object(t)) => t,
                Some(_) => return Err(Error::config("timeouts must be an object")),
            };

            blocks.push(BlockConfig {
                mode,
                resource_type: resource_type.clone(),
                name: name.clone(),
                body,
                depends_on,
                timeouts,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_parse_document() {
        let doc = json!({
            "provider": {"ibm": {"region": "eu-gb"}},
            "resource": {
                "ibm_appid_mfa": {
                    "mfa": {"tenant_id": "t1", "is_active": true}
                },
                "ibm_appid_apm": {
                    "apm": {
                        "tenant_id": "t1",
                        "enabled": true,
                        "depends_on": ["ibm_appid_mfa.mfa"],
                        "timeouts": {"update": "5m"}
                    }
                }
            },
            "data": {"ibm_appid_apm": {"current": {"tenant_id": "t1"}}}
        });

        let config = Configuration::from_value(&doc).unwrap();
        assert_eq!(config.provider["region"], json!("eu-gb"));
        assert_eq!(config.blocks.len(), 3);

        let apm = config.find("ibm_appid_apm.apm").unwrap();
        assert_eq!(apm.depends_on, vec!["ibm_appid_mfa.mfa"]);
        assert!(!apm.body.contains_key("depends_on"));
        assert!(!apm.body.contains_key("timeouts"));
        let timeouts = apm.timeouts(Timeouts::default()).unwrap();
        assert_eq!(timeouts.update, Duration::from_secs(300));

        assert!(config.find("data.ibm_appid_apm.current").is_some());
    }

    #[test]
    fn test_rejects_foreign_provider() {
        let doc = json!({"provider": {"aws": {}}});
        assert!(Configuration::from_value(&doc).is_err());
    }

    #[test]
    fn test_rejects_bad_depends_on() {
        let doc = json!({"resource": {"ibm_appid_mfa": {"m": {"depends_on": ["nonsense"]}}}});
        assert!(Configuration::from_value(&doc).is_err());
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(
            parse_address("ibm_dns_zone.main").unwrap(),
            (Mode::Managed, "ibm_dns_zone", "main")
        );
        assert_eq!(
            parse_address("data.ibm_dns_zones.all").unwrap(),
            (Mode::Data, "ibm_dns_zones", "all")
        );
        assert!(parse_address("ibm_dns_zone").is_err());
        assert!(parse_address("data.x").is_err());
    }
}
