//! `ibm_appid_password_regex`: Cloud Directory password strength rule

use crate::tenant_config::ConfigDocument;
use ibmcloud_core::{Attribute, ResourceData, Result, Schema};
use serde_json::{json, Map, Value};

pub struct PasswordRegex;

impl ConfigDocument for PasswordRegex {
    const TYPE_NAME: &'static str = "ibm_appid_password_regex";
    const DESCRIPTION: &'static str = "password regex";
    const PATH: &'static [&'static str] = &["config", "cloud_directory", "password_regex"];

    fn attributes() -> Schema {
        Schema::new()
            .attr(
                "regex",
                Attribute::string()
                    .required()
                    .description("The escaped regex expression rule for acceptable password"),
            )
            .attr(
                "error_message",
                Attribute::string()
                    .optional()
                    .description("Custom error message shown when the password does not match"),
            )
            .attr("base64_encoded_regex", Attribute::string().computed())
    }

    fn expand(data: &ResourceData) -> Result<Value> {
        let mut body = Map::new();
        body.insert("regex".into(), json!(data.require_str("regex")?));
        if let Some(message) = data.get_str("error_message") {
            body.insert("error_message".into(), json!(message));
        }
        Ok(Value::Object(body))
    }

    fn flatten(document: &Value, data: &mut ResourceData) {
        for key in ["regex", "error_message", "base64_encoded_regex"] {
            data.set(key, document.get(key).cloned().unwrap_or(Value::Null));
        }
    }

    fn defaults() -> Value {
        json!({ "regex": "" })
    }
}
