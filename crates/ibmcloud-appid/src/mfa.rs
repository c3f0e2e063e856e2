//! `ibm_appid_mfa`: multi-factor authentication switch for Cloud Directory

use crate::tenant_config::ConfigDocument;
use ibmcloud_core::{Attribute, ResourceData, Result, Schema};
use serde_json::{json, Value};

pub struct Mfa;

impl ConfigDocument for Mfa {
    const TYPE_NAME: &'static str = "ibm_appid_mfa";
    const DESCRIPTION: &'static str = "MFA configuration";
    const PATH: &'static [&'static str] = &["config", "cloud_directory", "mfa"];

    fn attributes() -> Schema {
        Schema::new().attr("is_active", Attribute::bool().required())
    }

    fn expand(data: &ResourceData) -> Result<Value> {
        Ok(json!({ "isActive": data.get_bool("is_active").unwrap_or(false) }))
    }

    fn flatten(document: &Value, data: &mut ResourceData) {
        data.set(
            "is_active",
            document.get("isActive").and_then(Value::as_bool).unwrap_or(false),
        );
    }

    fn defaults() -> Value {
        json!({ "isActive": false })
    }
}
