//! `ibm_appid_token_config`: token lifetimes and custom claims

use crate::tenant_config::ConfigDocument;
use ibmcloud_core::schema::validator;
use ibmcloud_core::{Attribute, ResourceData, Result, Schema};
use serde_json::{json, Map, Value};

const DEFAULT_ACCESS_EXPIRES_IN: i64 = 3600;
const DEFAULT_REFRESH_EXPIRES_IN: i64 = 2_592_000;
const DEFAULT_ANONYMOUS_EXPIRES_IN: i64 = 2_592_000;

const CLAIM_SOURCES: &[&str] = &[
    "saml",
    "cloud_directory",
    "facebook",
    "google",
    "appid_custom",
    "ibmid",
    "roles",
    "attributes",
];

/// (attribute, wire) names of a claim mapping
const CLAIM_FIELDS: &[(&str, &str)] = &[
    ("source", "source"),
    ("source_claim", "sourceClaim"),
    ("destination_claim", "destinationClaim"),
];

fn claim_block() -> Attribute {
    Attribute::block(
        Schema::new()
            .attr(
                "source",
                Attribute::string()
                    .required()
                    .validate(validator::one_of(CLAIM_SOURCES)),
            )
            .attr("source_claim", Attribute::string().optional())
            .attr("destination_claim", Attribute::string().optional()),
    )
    .optional()
}

fn expand_claims(data: &ResourceData, attribute: &str) -> Value {
    data.get_blocks(attribute)
        .into_iter()
        .map(|block| {
            let mut claim = Map::new();
            for (attr, wire) in CLAIM_FIELDS {
                if let Some(v) = block.get(*attr).filter(|v| !v.is_null()) {
                    claim.insert(wire.to_string(), v.clone());
                }
            }
            Value::Object(claim)
        })
        .collect()
}

fn flatten_claims(claims: Option<&Value>) -> Value {
    claims
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|claim| {
            let block: Map<String, Value> = CLAIM_FIELDS
                .iter()
                .map(|(attr, wire)| {
                    (
                        attr.to_string(),
                        claim.get(*wire).cloned().unwrap_or(Value::Null),
                    )
                })
                .collect();
            Value::Object(block)
        })
        .collect()
}

pub struct TokenConfig;

impl ConfigDocument for TokenConfig {
    const TYPE_NAME: &'static str = "ibm_appid_token_config";
    const DESCRIPTION: &'static str = "token configuration";
    const PATH: &'static [&'static str] = &["config", "tokens"];

    fn attributes() -> Schema {
        Schema::new()
            .attr(
                "access_token_expires_in",
                Attribute::int()
                    .default_value(DEFAULT_ACCESS_EXPIRES_IN)
                    .validate(validator::int_between(900, 86400)),
            )
            .attr("refresh_token_enabled", Attribute::bool().optional_computed())
            .attr(
                "refresh_token_expires_in",
                Attribute::int()
                    .default_value(DEFAULT_REFRESH_EXPIRES_IN)
                    .validate(validator::int_between(86400, 7_776_000)),
            )
            .attr("anonymous_access_enabled", Attribute::bool().optional_computed())
            .attr(
                "anonymous_token_expires_in",
                Attribute::int()
                    .default_value(DEFAULT_ANONYMOUS_EXPIRES_IN)
                    .validate(validator::int_between(86400, 7_776_000)),
            )
            .attr("access_token_claim", claim_block())
            .attr("id_token_claim", claim_block())
    }

    fn expand(data: &ResourceData) -> Result<Value> {
        let int = |key: &str, default: i64| data.get_i64(key).unwrap_or(default);

        let mut body = Map::new();
        body.insert(
            "access".into(),
            json!({ "expires_in": int("access_token_expires_in", DEFAULT_ACCESS_EXPIRES_IN) }),
        );
        body.insert(
            "refresh".into(),
            json!({
                "enabled": data.get_bool("refresh_token_enabled").unwrap_or(false),
                "expires_in": int("refresh_token_expires_in", DEFAULT_REFRESH_EXPIRES_IN),
            }),
        );
        body.insert(
            "anonymousAccess".into(),
            json!({
                "enabled": data.get_bool("anonymous_access_enabled").unwrap_or(false),
                "expires_in": int("anonymous_token_expires_in", DEFAULT_ANONYMOUS_EXPIRES_IN),
            }),
        );

        let access_claims = expand_claims(data, "access_token_claim");
        if access_claims.as_array().is_some_and(|c| !c.is_empty()) {
            body.insert("accessTokenClaims".into(), access_claims);
        }
        let id_claims = expand_claims(data, "id_token_claim");
        if id_claims.as_array().is_some_and(|c| !c.is_empty()) {
            body.insert("idTokenClaims".into(), id_claims);
        }
        Ok(Value::Object(body))
    }

    fn flatten(document: &Value, data: &mut ResourceData) {
        let int = |pointer: &str, default: i64| {
            document.pointer(pointer).and_then(Value::as_i64).unwrap_or(default)
        };
        let flag = |pointer: &str| document.pointer(pointer).and_then(Value::as_bool).unwrap_or(false);

        data.set("access_token_expires_in", int("/access/expires_in", DEFAULT_ACCESS_EXPIRES_IN));
        data.set("refresh_token_enabled", flag("/refresh/enabled"));
        data.set("refresh_token_expires_in", int("/refresh/expires_in", DEFAULT_REFRESH_EXPIRES_IN));
        data.set("anonymous_access_enabled", flag("/anonymousAccess/enabled"));
        data.set(
            "anonymous_token_expires_in",
            int("/anonymousAccess/expires_in", DEFAULT_ANONYMOUS_EXPIRES_IN),
        );
        data.set("access_token_claim", flatten_claims(document.get("accessTokenClaims")));
        data.set("id_token_claim", flatten_claims(document.get("idTokenClaims")));
    }

    fn defaults() -> Value {
        json!({
            "access": { "expires_in": DEFAULT_ACCESS_EXPIRES_IN },
            "refresh": { "enabled": false, "expires_in": DEFAULT_REFRESH_EXPIRES_IN },
            "anonymousAccess": { "enabled": false, "expires_in": DEFAULT_ANONYMOUS_EXPIRES_IN },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_round_trip_through_wire_names() {
        let data = ResourceData::new(
            json!({
                "access_token_claim": [
                    {"source": "roles", "destination_claim": "groups"}
                ]
            })
            .as_object()
            .cloned()
            .unwrap(),
        );

        let body = TokenConfig::expand(&data).unwrap();
        assert_eq!(body["accessTokenClaims"], json!([{"source": "roles", "destinationClaim": "groups"}]));
        assert!(body.get("idTokenClaims").is_none());
        assert_eq!(body["access"]["expires_in"], json!(3600));

        let flat = flatten_claims(body.get("accessTokenClaims"));
        assert_eq!(
            flat,
            json!([{"source": "roles", "source_claim": null, "destination_claim": "groups"}])
        );
    }
}
