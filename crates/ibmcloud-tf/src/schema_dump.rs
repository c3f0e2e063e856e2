//! JSON description of every registered type, printed by `ibmcloud-tf schema`

use ibmcloud_core::{Attribute, ResourceRegistry, Result, Schema, ValueType};
use serde_json::{Map, Value, json};

fn element_type(ty: &ValueType) -> Value {
    match ty {
        ValueType::List(elem) | ValueType::Set(elem) | ValueType::Map(elem) => {
            json!([ty.name(), element_type(elem)])
        }
        ValueType::Block(schema) => json!({ "block": describe(schema) }),
        scalar => json!(scalar.name()),
    }
}

fn describe_attribute(attribute: &Attribute) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), element_type(&attribute.value_type));
    for (flag, set) in [
        ("required", attribute.required),
        ("optional", attribute.optional),
        ("computed", attribute.computed),
        ("force_new", attribute.force_new),
        ("sensitive", attribute.sensitive),
    ] {
        if set {
            out.insert(flag.into(), json!(true));
        }
    }
    if let Some(default) = &attribute.default {
        out.insert("default".into(), default.clone());
    }
    if !attribute.description.is_empty() {
        out.insert("description".into(), json!(attribute.description));
    }
    Value::Object(out)
}

fn describe(schema: &Schema) -> Value {
    Value::Object(
        schema
            .iter()
            .map(|(name, attribute)| (name.to_string(), describe_attribute(attribute)))
            .collect(),
    )
}

/// `{"resources": {type: {attr: ..}}, "data_sources": {..}}`
pub fn dump(registry: &ResourceRegistry) -> Result<Value> {
    let mut resources = Map::new();
    for name in registry.list_resources() {
        let resource = registry.resource(&name)?;
        resources.insert(name, describe(&resource.schema()));
    }

    let mut data_sources = Map::new();
    for name in registry.list_data_sources() {
        let source = registry.data_source(&name)?;
        data_sources.insert(name, describe(&source.schema()));
    }

    Ok(json!({ "resources": resources, "data_sources": data_sources }))
}
