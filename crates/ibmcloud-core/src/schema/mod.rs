//! Resource schema declaration and validation
//!
//! A [`Schema`] is the static contract of a resource or data source: which
//! attributes exist, their types, and whether the user must, may, or cannot
//! set them. The engine uses it to validate configuration, fill defaults and
//! decide between an in-place update and a replacement.
//!
//! ```rust
//! use ibmcloud_core::schema::{Attribute, Schema, validator};
//!
//! let schema = Schema::new()
//!     .attr("instance_id", Attribute::string().required().force_new())
//!     .attr("ttl", Attribute::int().default_value(900).validate(validator::int_between(60, 2147483647)))
//!     .attr("created_on", Attribute::string().computed());
//! assert!(schema.get("ttl").is_some());
//! ```

pub mod validator;

pub use validator::Validator;

use crate::diagnostics::{Diagnostic, Diagnostics};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Attribute value type
#[derive(Debug, Clone)]
pub enum ValueType {
    String,
    Bool,
    Int,
    Float,
    /// Ordered list of the element type
    List(Box<ValueType>),
    /// Unordered collection; compared without regard to order
    Set(Box<ValueType>),
    /// String-keyed map of the element type
    Map(Box<ValueType>),
    /// Repeated nested block, stored as a list of objects
    Block(Schema),
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Bool => "bool",
            ValueType::Int => "number",
            ValueType::Float => "number",
            ValueType::List(_) => "list",
            ValueType::Set(_) => "set",
            ValueType::Map(_) => "map",
            ValueType::Block(_) => "block",
        }
    }
}

/// One attribute in a schema
#[derive(Debug, Clone)]
pub struct Attribute {
    pub value_type: ValueType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub force_new: bool,
    pub sensitive: bool,
    pub default: Option<Value>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub validators: Vec<Validator>,
    pub description: String,
}

impl Attribute {
    /// Optional attribute of the given type
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            required: false,
            optional: true,
            computed: false,
            force_new: false,
            sensitive: false,
            default: None,
            min_items: None,
            max_items: None,
            validators: Vec::new(),
            description: String::new(),
        }
    }

    pub fn string() -> Self {
        Self::new(ValueType::String)
    }

    pub fn bool() -> Self {
        Self::new(ValueType::Bool)
    }

    pub fn int() -> Self {
        Self::new(ValueType::Int)
    }

    pub fn float() -> Self {
        Self::new(ValueType::Float)
    }

    pub fn list(elem: ValueType) -> Self {
        Self::new(ValueType::List(Box::new(elem)))
    }

    pub fn set(elem: ValueType) -> Self {
        Self::new(ValueType::Set(Box::new(elem)))
    }

    pub fn map(elem: ValueType) -> Self {
        Self::new(ValueType::Map(Box::new(elem)))
    }

    pub fn block(schema: Schema) -> Self {
        Self::new(ValueType::Block(schema))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self.optional = true;
        self
    }

    /// Set by the provider. Combined with [`Attribute::optional`] the user may
    /// also set it; on its own the attribute is read-only.
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self.optional = false;
        self
    }

    /// Optional attribute the provider fills in when the user leaves it out
    pub fn optional_computed(mut self) -> Self {
        self.computed = true;
        self.optional = true;
        self.required = false;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self.optional = true;
        self.required = false;
        self
    }

    pub fn min_items(mut self, n: usize) -> Self {
        self.min_items = Some(n);
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The same attribute as a read-only result, for data sources that
    /// mirror a resource schema
    pub fn into_computed(mut self) -> Self {
        self.required = false;
        self.optional = false;
        self.computed = true;
        self.force_new = false;
        self.default = None;
        self.validators.clear();
        self
    }

    /// Read-only attribute the user can never set
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// Declared attributes of a resource, data source or nested block
#[derive(Debug, Clone, Default)]
pub struct Schema {
    attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute (builder style)
    pub fn attr(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Attributes whose change requires destroying and recreating the object
    pub fn force_new_attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter(|(_, a)| a.force_new)
            .map(|(k, _)| k.as_str())
    }

    /// Fill defaults for unset attributes and normalize single nested blocks
    /// written as an object into a one-element list.
    pub fn apply_defaults(&self, config: &mut Map<String, Value>) {
        for (name, attr) in &self.attributes {
            if config.get(name).is_none_or(Value::is_null) {
                if let Some(default) = &attr.default {
                    config.insert(name.clone(), default.clone());
                }
                continue;
            }

            let ValueType::Block(nested) = &attr.value_type else {
                continue;
            };
            if let Some(value) = config.get_mut(name) {
                if value.is_object() {
                    *value = Value::Array(vec![value.take()]);
                }
                if let Value::Array(items) = value {
                    for item in items.iter_mut() {
                        if let Value::Object(obj) = item {
                            nested.apply_defaults(obj);
                        }
                    }
                }
            }
        }
    }

    /// Validate a configuration body, collecting every problem
    pub fn validate(&self, config: &Map<String, Value>) -> Diagnostics {
        let mut diags = Diagnostics::new();
        self.validate_at("", config, &mut diags);
        diags
    }

    fn validate_at(&self, prefix: &str, config: &Map<String, Value>, diags: &mut Diagnostics) {
        for key in config.keys() {
            if !self.attributes.contains_key(key) {
                diags.push(
                    Diagnostic::error("Unsupported argument")
                        .with_attribute(format!("{}{}", prefix, key))
                        .with_detail(format!("An argument named \"{}\" is not expected here", key)),
                );
            }
        }

        for (name, attr) in &self.attributes {
            let path = format!("{}{}", prefix, name);
            let value = config.get(name).filter(|v| !v.is_null());

            let Some(value) = value else {
                if attr.required {
                    diags.push(
                        Diagnostic::error("Missing required argument").with_attribute(path),
                    );
                }
                continue;
            };

            if attr.is_computed_only() {
                diags.push(
                    Diagnostic::error("Value for unconfigurable attribute")
                        .with_attribute(path)
                        .with_detail("This attribute is set by the provider and cannot be configured"),
                );
                continue;
            }

            validate_value(&attr.value_type, attr, &path, value, diags);
        }
    }

    /// Names of configurable attributes whose desired value differs from state
    ///
    /// Unset optional attributes only count as changed when the state holds a
    /// non-zero value; unset optional+computed attributes never do.
    pub fn diff(&self, config: &Map<String, Value>, state: &Map<String, Value>) -> Vec<String> {
        let mut changed = Vec::new();
        for (name, attr) in &self.attributes {
            if attr.is_computed_only() {
                continue;
            }
            let desired = config.get(name).filter(|v| !v.is_null());
            let current = state.get(name).filter(|v| !v.is_null());

            let differs = match (desired, current) {
                (None, None) => false,
                (None, Some(current)) => !attr.computed && !is_zero_value(current),
                (Some(desired), _) if is_unknown(desired) => true,
                (Some(desired), None) => !is_zero_value(desired),
                (Some(desired), Some(current)) => !values_match(&attr.value_type, desired, current),
            };
            if differs {
                changed.push(name.clone());
            }
        }
        changed
    }
}

fn validate_value(
    ty: &ValueType,
    attr: &Attribute,
    path: &str,
    value: &Value,
    diags: &mut Diagnostics,
) {
    if is_unknown(value) {
        return;
    }

    let type_error = |diags: &mut Diagnostics| {
        diags.push(
            Diagnostic::error("Incorrect attribute value type")
                .with_attribute(path.to_string())
                .with_detail(format!("expected {}", ty.name())),
        );
    };

    match ty {
        ValueType::String | ValueType::Bool | ValueType::Int | ValueType::Float => {
            if !scalar_matches(ty, value) {
                type_error(diags);
                return;
            }
            for validator in &attr.validators {
                if let Err(reason) = validator.check(value) {
                    diags.push(
                        Diagnostic::error("Invalid attribute value")
                            .with_attribute(path.to_string())
                            .with_detail(reason),
                    );
                }
            }
        }
        ValueType::List(elem) | ValueType::Set(elem) => {
            let Some(items) = value.as_array() else {
                type_error(diags);
                return;
            };
            check_item_count(attr, path, items.len(), diags);
            for (i, item) in items.iter().enumerate() {
                validate_value(elem, attr, &format!("{}.{}", path, i), item, diags);
            }
        }
        ValueType::Map(elem) => {
            let Some(entries) = value.as_object() else {
                type_error(diags);
                return;
            };
            for (k, v) in entries {
                if !is_unknown(v) && !scalar_matches(elem, v) {
                    diags.push(
                        Diagnostic::error("Incorrect attribute value type")
                            .with_attribute(format!("{}.{}", path, k))
                            .with_detail(format!("expected {}", elem.name())),
                    );
                }
            }
        }
        ValueType::Block(nested) => {
            let items: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                Value::Object(_) => vec![value],
                _ => {
                    type_error(diags);
                    return;
                }
            };
            check_item_count(attr, path, items.len(), diags);
            for (i, item) in items.iter().enumerate() {
                match item.as_object() {
                    Some(obj) => nested.validate_at(&format!("{}.{}.", path, i), obj, diags),
                    None => diags.push(
                        Diagnostic::error("Incorrect attribute value type")
                            .with_attribute(format!("{}.{}", path, i))
                            .with_detail("expected a block"),
                    ),
                }
            }
        }
    }
}

fn check_item_count(attr: &Attribute, path: &str, len: usize, diags: &mut Diagnostics) {
    if let Some(min) = attr.min_items {
        if len < min {
            diags.push(
                Diagnostic::error("Not enough list items")
                    .with_attribute(path.to_string())
                    .with_detail(format!("at least {} item(s) required, got {}", min, len)),
            );
        }
    }
    if let Some(max) = attr.max_items {
        if len > max {
            diags.push(
                Diagnostic::error("Too many list items")
                    .with_attribute(path.to_string())
                    .with_detail(format!("at most {} item(s) allowed, got {}", max, len)),
            );
        }
    }
}

fn scalar_matches(ty: &ValueType, value: &Value) -> bool {
    match ty {
        ValueType::String => value.is_string(),
        ValueType::Bool => value.is_boolean(),
        ValueType::Int => value.is_i64() || value.is_u64(),
        ValueType::Float => value.is_number(),
        _ => false,
    }
}

/// Whether a value still contains an unresolved `${...}` reference
pub fn is_unknown(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.contains("${"))
}

/// Zero values are treated like an unset attribute
pub fn is_zero_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Compare a desired value against the value held in state
///
/// Nested block fields the user did not set are ignored when computed or
/// when the state holds a zero value. Sets ignore ordering.
pub fn values_match(ty: &ValueType, desired: &Value, current: &Value) -> bool {
    match ty {
        ValueType::Set(_) => match (desired.as_array(), current.as_array()) {
            (Some(a), Some(b)) => {
                let mut a: Vec<String> = a.iter().map(Value::to_string).collect();
                let mut b: Vec<String> = b.iter().map(Value::to_string).collect();
                a.sort();
                b.sort();
                a == b
            }
            _ => desired == current,
        },
        ValueType::List(elem) => match (desired.as_array(), current.as_array()) {
            (Some(a), Some(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_match(elem, x, y))
            }
            _ => desired == current,
        },
        ValueType::Block(nested) => match (desired.as_array(), current.as_array()) {
            (Some(a), Some(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| match (x.as_object(), y.as_object()) {
                        (Some(x), Some(y)) => nested.diff(x, y).is_empty(),
                        _ => x == y,
                    })
            }
            _ => desired == current,
        },
        ValueType::Int | ValueType::Float => match (desired.as_f64(), current.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => desired == current,
        },
        _ => desired == current,
    }
}
