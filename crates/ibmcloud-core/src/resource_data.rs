//! Attribute bag handed to resource adapters
//!
//! Adapters read desired values with the `get_*` accessors (configuration
//! wins over known state) and write what the API returned with [`ResourceData::set`].
//! Clearing the ID during a read tells the engine the remote object is gone.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    id: Option<String>,
    config: Map<String, Value>,
    state: Map<String, Value>,
    changed: BTreeSet<String>,
    written: BTreeSet<String>,
}

impl ResourceData {
    /// Data for a create: every configured attribute counts as changed
    pub fn new(config: Map<String, Value>) -> Self {
        let changed = config
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, _)| k.clone())
            .collect();
        Self {
            id: None,
            config,
            state: Map::new(),
            changed,
            written: BTreeSet::new(),
        }
    }

    /// Data for a read or delete of an existing object
    pub fn from_state(id: impl Into<String>, state: Map<String, Value>) -> Self {
        Self {
            id: Some(id.into()),
            config: Map::new(),
            state,
            changed: BTreeSet::new(),
            written: BTreeSet::new(),
        }
    }

    /// Attach the desired configuration and the attributes that differ from state
    pub fn with_changes(
        mut self,
        config: Map<String, Value>,
        changed: impl IntoIterator<Item = String>,
    ) -> Self {
        self.config = config;
        self.changed = changed.into_iter().collect();
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The ID, or an error when the adapter is asked to act on nothing
    pub fn require_id(&self) -> Result<&str> {
        self.id
            .as_deref()
            .ok_or_else(|| Error::invalid_id("resource has no ID"))
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Mark the remote object as gone
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    /// True once a read has found the remote object missing
    pub fn is_gone(&self) -> bool {
        self.id.is_none()
    }

    /// Desired value if configured, otherwise the last known value
    ///
    /// A changed attribute with no configured value was removed by the user
    /// and reads as absent until the adapter writes it again.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let desired = self.config.get(key).filter(|v| !v.is_null());
        if desired.is_some() || (self.changed.contains(key) && !self.written.contains(key)) {
            return desired;
        }
        self.state.get(key).filter(|v| !v.is_null())
    }

    /// Last known value, ignoring configuration
    pub fn get_state(&self, key: &str) -> Option<&Value> {
        self.state.get(key).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_list(&self, key: &str) -> &[Value] {
        self.get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get_list(key)
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    }

    /// Every element of a nested block
    pub fn get_blocks(&self, key: &str) -> Vec<&Map<String, Value>> {
        self.get_list(key).iter().filter_map(Value::as_object).collect()
    }

    /// First element of a nested block (blocks declared with `max_items(1)`)
    pub fn get_block(&self, key: &str) -> Option<&Map<String, Value>> {
        self.get_blocks(key).into_iter().next()
    }

    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.get_str(key)
            .ok_or_else(|| Error::validation(format!("\"{}\" is required", key)))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        self.written.insert(key.clone());
        self.state.insert(key, value.into());
    }

    /// Set a value, writing null when absent
    pub fn set_opt<T: Into<Value>>(&mut self, key: impl Into<String>, value: Option<T>) {
        self.set(key, value.map(Into::into).unwrap_or(Value::Null));
    }

    pub fn has_change(&self, key: &str) -> bool {
        self.changed.contains(key)
    }

    pub fn has_changes(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.changed.contains(*k))
    }

    pub fn changed_keys(&self) -> impl Iterator<Item = &str> {
        self.changed.iter().map(String::as_str)
    }

    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    pub fn state(&self) -> &Map<String, Value> {
        &self.state
    }

    /// Final attribute map: configuration overlaid with known state
    ///
    /// Prior state of a changed attribute is dropped unless the adapter wrote
    /// it again, so a stale value never masks the one just applied.
    pub fn into_attributes(self) -> Map<String, Value> {
        let mut attributes = self.config;
        for (k, v) in self.state {
            if self.changed.contains(&k) && !self.written.contains(&k) {
                continue;
            }
            attributes.insert(k, v);
        }
        if let Some(id) = self.id {
            attributes.insert("id".to_string(), Value::String(id));
        }
        attributes
    }
}
