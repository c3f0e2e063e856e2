// # Dependency graph
//
// References take the form `${<type>.<name>.<attr>[.<key>|.<index>]...}`
// (prefixed with `data.` for data sources). A block depends on every address
// it references plus its explicit `depends_on`. Blocks are grouped into waves:
// every block in a wave only depends on blocks from earlier waves.

use crate::document::{BlockConfig, parse_address};
use crate::error::{Error, Result};
use crate::traits::Mode;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

/// Attribute maps of already-known objects, keyed by address
pub type Known = HashMap<String, Map<String, Value>>;

/// A parsed `${...}` expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub address: String,
    pub path: Vec<String>,
}

impl Reference {
    /// Parse the inside of `${...}`
    pub fn parse(expr: &str) -> Option<Self> {
        let parts: Vec<&str> = expr.trim().split('.').collect();
        let split = if parts.first() == Some(&"data") { 3 } else { 2 };
        if parts.len() <= split || parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        let address = parts[..split].join(".");
        parse_address(&address).ok()?;
        Some(Self {
            address,
            path: parts[split..].iter().map(|p| p.to_string()).collect(),
        })
    }
}

/// Every `${...}` span in a string, as (start, end, expression) byte ranges
fn spans(text: &str) -> Vec<(usize, usize, &str)> {
    let mut found = Vec::new();
    let mut offset = 0;
    while let Some(start) = text[offset..].find("${") {
        let start = offset + start;
        let Some(len) = text[start..].find('}') else {
            break;
        };
        let end = start + len + 1;
        found.push((start, end, &text[start + 2..end - 1]));
        offset = end;
    }
    found
}

/// All references inside a value, recursively
pub fn references(value: &Value) -> Vec<Reference> {
    let mut refs = Vec::new();
    collect(value, &mut refs);
    refs
}

fn collect(value: &Value, refs: &mut Vec<Reference>) {
    match value {
        Value::String(s) => {
            refs.extend(spans(s).into_iter().filter_map(|(_, _, e)| Reference::parse(e)));
        }
        Value::Array(items) => items.iter().for_each(|v| collect(v, refs)),
        Value::Object(map) => map.values().for_each(|v| collect(v, refs)),
        _ => {}
    }
}

/// Addresses a block must wait for
pub fn dependencies(block: &BlockConfig) -> BTreeSet<String> {
    let mut deps: BTreeSet<String> = block.depends_on.iter().cloned().collect();
    for value in block.body.values() {
        deps.extend(references(value).into_iter().map(|r| r.address));
    }
    deps
}

/// Follow an attribute path through nested objects and lists
pub fn lookup_path<'a>(attributes: &'a Map<String, Value>, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = attributes.get(first)?;
    for segment in rest {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Substitute known references
///
/// A string that is exactly one reference takes the referenced value with its
/// JSON type. References embedded in text are interpolated. Anything that
/// cannot be resolved yet is left untouched.
pub fn resolve(value: &Value, known: &Known) -> Value {
    match value {
        Value::String(s) => resolve_str(s, known),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve(v, known)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve(v, known)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn lookup<'a>(expr: &str, known: &'a Known) -> Option<&'a Value> {
    let reference = Reference::parse(expr)?;
    let attributes = known.get(&reference.address)?;
    lookup_path(attributes, &reference.path).filter(|v| !v.is_null())
}

fn resolve_str(text: &str, known: &Known) -> Value {
    let found = spans(text);
    if found.is_empty() {
        return Value::String(text.to_string());
    }

    if let [(0, end, expr)] = found.as_slice() {
        if *end == text.len() {
            return lookup(expr, known)
                .cloned()
                .unwrap_or_else(|| Value::String(text.to_string()));
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, end, expr) in found {
        out.push_str(&text[last..start]);
        match lookup(expr, known) {
            Some(Value::String(s)) => out.push_str(s),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => out.push_str(&v.to_string()),
            _ => out.push_str(&text[start..end]),
        }
        last = end;
    }
    out.push_str(&text[last..]);
    Value::String(out)
}

/// Group block indices into dependency waves
///
/// - `Err(Error::Validation)` on a reference to an undeclared block or a cycle
pub fn dependency_waves(blocks: &[BlockConfig]) -> Result<Vec<Vec<usize>>> {
    let index: HashMap<String, usize> = blocks
        .iter()
        .enumerate()
        .map(|(i, b)| (b.address(), i))
        .collect();

    let mut pending: Vec<usize> = Vec::with_capacity(blocks.len());
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); blocks.len()];
    for (i, block) in blocks.iter().enumerate() {
        let deps = dependencies(block);
        for dep in &deps {
            let Some(&j) = index.get(dep) else {
                return Err(Error::validation(format!(
                    "{} references undeclared {}",
                    block.address(),
                    dep
                )));
            };
            if j == i {
                return Err(Error::validation(format!("{} references itself", dep)));
            }
            edges[j].push(i);
        }
        pending.push(deps.len());
    }

    let mut waves = Vec::new();
    let mut ready: Vec<usize> = (0..blocks.len()).filter(|&i| pending[i] == 0).collect();
    let mut placed = 0;
    while !ready.is_empty() {
        let mut next = Vec::new();
        for &i in &ready {
            for &dependent in &edges[i] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        placed += ready.len();
        waves.push(std::mem::replace(&mut ready, next));
    }

    if placed < blocks.len() {
        let mut cycle: Vec<String> = (0..blocks.len())
            .filter(|&i| pending[i] > 0)
            .map(|i| blocks[i].address())
            .collect();
        cycle.sort();
        return Err(Error::validation(format!(
            "dependency cycle between {}",
            cycle.join(", ")
        )));
    }
    Ok(waves)
}

/// Order recorded addresses so that dependents come before what they depend on
///
/// `records` maps an address to its recorded dependencies. Dependencies that
/// are not in the map are ignored. Leftovers from a cycle in stale state are
/// appended in name order rather than rejected.
pub fn reverse_order(records: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut remaining: BTreeSet<&str> = records.keys().map(String::as_str).collect();
    let mut order = Vec::with_capacity(records.len());

    loop {
        let removable: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|addr| {
                !remaining.iter().any(|other| {
                    records[*other].iter().any(|dep| dep == addr)
                })
            })
            .collect();
        if removable.is_empty() {
            break;
        }
        for addr in removable {
            remaining.remove(addr);
            order.push(addr.to_string());
        }
    }
    order.extend(remaining.into_iter().map(str::to_string));
    order
}

/// Mode of the block an address names
pub fn mode_of(address: &str) -> Mode {
    if address.starts_with("data.") {
        Mode::Data
    } else {
        Mode::Managed
    }
}
