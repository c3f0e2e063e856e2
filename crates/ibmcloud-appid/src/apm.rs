//! `ibm_appid_apm`: Cloud Directory advanced password management
//!
//! Wire format (camelCase, every policy wrapped in `enabled` + `config`):
//!
//! ```json
//! {
//!   "advancedPasswordManagement": {
//!     "enabled": true,
//!     "passwordReuse": { "enabled": true, "config": { "maxPasswordReuse": 4 } },
//!     "preventPasswordWithUsername": { "enabled": true },
//!     "passwordExpiration": { "enabled": true, "config": { "daysToExpire": 30 } },
//!     "lockOutPolicy": { "enabled": true, "config": { "lockOutTimeSec": 1800, "numOfAttempts": 3 } },
//!     "minPasswordChangeInterval": { "enabled": true, "config": { "minHoursToChangePassword": 0 } }
//!   }
//! }
//! ```

use crate::tenant_config::ConfigDocument;
use ibmcloud_core::schema::validator;
use ibmcloud_core::{Attribute, ResourceData, Result, Schema};
use serde_json::{json, Map, Value};

const DEFAULT_MAX_PASSWORD_REUSE: i64 = 8;
const DEFAULT_DAYS_TO_EXPIRE: i64 = 30;
const DEFAULT_LOCKOUT_TIME_SEC: i64 = 1800;
const DEFAULT_NUM_OF_ATTEMPTS: i64 = 3;
const DEFAULT_MIN_HOURS_TO_CHANGE: i64 = 0;

/// A policy block and its integer settings as (attribute, wire key, default)
struct Policy {
    attribute: &'static str,
    wire: &'static str,
    settings: &'static [(&'static str, &'static str, i64)],
}

const POLICIES: &[Policy] = &[
    Policy {
        attribute: "password_reuse",
        wire: "passwordReuse",
        settings: &[("max_password_reuse", "maxPasswordReuse", DEFAULT_MAX_PASSWORD_REUSE)],
    },
    Policy {
        attribute: "password_expiration",
        wire: "passwordExpiration",
        settings: &[("days_to_expire", "daysToExpire", DEFAULT_DAYS_TO_EXPIRE)],
    },
    Policy {
        attribute: "lockout_policy",
        wire: "lockOutPolicy",
        settings: &[
            ("lockout_time_sec", "lockOutTimeSec", DEFAULT_LOCKOUT_TIME_SEC),
            ("num_of_attempts", "numOfAttempts", DEFAULT_NUM_OF_ATTEMPTS),
        ],
    },
    Policy {
        attribute: "min_password_change_interval",
        wire: "minPasswordChangeInterval",
        settings: &[(
            "min_hours_to_change_password",
            "minHoursToChangePassword",
            DEFAULT_MIN_HOURS_TO_CHANGE,
        )],
    },
];

fn policy_block(settings: Schema) -> Attribute {
    Attribute::block(
        settings.attr("enabled", Attribute::bool().default_value(false)),
    )
    .optional_computed()
    .max_items(1)
}

pub struct AdvancedPasswordManagement;

impl ConfigDocument for AdvancedPasswordManagement {
    const TYPE_NAME: &'static str = "ibm_appid_apm";
    const DESCRIPTION: &'static str = "APM configuration";
    const PATH: &'static [&'static str] =
        &["config", "cloud_directory", "advanced_password_management"];

    fn attributes() -> Schema {
        Schema::new()
            .attr("enabled", Attribute::bool().required())
            .attr(
                "prevent_password_with_username",
                Attribute::bool().optional_computed(),
            )
            .attr(
                "password_reuse",
                policy_block(Schema::new().attr(
                    "max_password_reuse",
                    Attribute::int()
                        .default_value(DEFAULT_MAX_PASSWORD_REUSE)
                        .validate(validator::int_between(1, 8)),
                )),
            )
            .attr(
                "password_expiration",
                policy_block(Schema::new().attr(
                    "days_to_expire",
                    Attribute::int()
                        .default_value(DEFAULT_DAYS_TO_EXPIRE)
                        .validate(validator::int_between(1, 90)),
                )),
            )
            .attr(
                "lockout_policy",
                policy_block(
                    Schema::new()
                        .attr(
                            "lockout_time_sec",
                            Attribute::int()
                                .default_value(DEFAULT_LOCKOUT_TIME_SEC)
                                .validate(validator::int_between(60, 86400)),
                        )
                        .attr(
                            "num_of_attempts",
                            Attribute::int()
                                .default_value(DEFAULT_NUM_OF_ATTEMPTS)
                                .validate(validator::int_between(1, 50)),
                        ),
                ),
            )
            .attr(
                "min_password_change_interval",
                policy_block(Schema::new().attr(
                    "min_hours_to_change_password",
                    Attribute::int()
                        .default_value(DEFAULT_MIN_HOURS_TO_CHANGE)
                        .validate(validator::int_between(0, 720)),
                )),
            )
    }

    fn expand(data: &ResourceData) -> Result<Value> {
        let mut apm = Map::new();
        apm.insert("enabled".into(), json!(data.get_bool("enabled").unwrap_or(false)));
        apm.insert(
            "preventPasswordWithUsername".into(),
            json!({ "enabled": data.get_bool("prevent_password_with_username").unwrap_or(false) }),
        );

        for policy in POLICIES {
            let block = data.get_block(policy.attribute);
            let enabled = block
                .and_then(|b| b.get("enabled"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let mut config = Map::new();
            for (attribute, wire, default) in policy.settings {
                let value = block
                    .and_then(|b| b.get(*attribute))
                    .and_then(Value::as_i64)
                    .unwrap_or(*default);
                config.insert(wire.to_string(), json!(value));
            }
            apm.insert(
                policy.wire.to_string(),
                json!({ "enabled": enabled, "config": config }),
            );
        }

        Ok(json!({ "advancedPasswordManagement": apm }))
    }

    fn flatten(document: &Value, data: &mut ResourceData) {
        let apm = document
            .get("advancedPasswordManagement")
            .unwrap_or(&Value::Null);

        data.set(
            "enabled",
            apm.get("enabled").and_then(Value::as_bool).unwrap_or(false),
        );
        data.set(
            "prevent_password_with_username",
            apm.pointer("/preventPasswordWithUsername/enabled")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        );

        for policy in POLICIES {
            let wire = apm.get(policy.wire).unwrap_or(&Value::Null);
            let mut block = Map::new();
            block.insert(
                "enabled".into(),
                json!(wire.get("enabled").and_then(Value::as_bool).unwrap_or(false)),
            );
            for (attribute, key, default) in policy.settings {
                let value = wire
                    .get("config")
                    .and_then(|c| c.get(*key))
                    .and_then(Value::as_i64)
                    .unwrap_or(*default);
                block.insert(attribute.to_string(), json!(value));
            }
            data.set(policy.attribute, json!([block]));
        }
    }

    fn defaults() -> Value {
        let mut apm = Map::new();
        apm.insert("enabled".into(), json!(false));
        apm.insert("preventPasswordWithUsername".into(), json!({ "enabled": false }));
        for policy in POLICIES {
            let config: Map<String, Value> = policy
                .settings
                .iter()
                .map(|(_, wire, default)| (wire.to_string(), json!(default)))
                .collect();
            apm.insert(
                policy.wire.to_string(),
                json!({ "enabled": false, "config": config }),
            );
        }
        json!({ "advancedPasswordManagement": apm })
    }
}
