//! Value validators attached to schema attributes

use serde_json::Value;
use std::fmt;
use std::net::IpAddr;

/// Constraint checked against a single scalar value
#[derive(Clone)]
pub enum Validator {
    /// String must be one of the listed values
    OneOf(&'static [&'static str]),
    /// Integer must fall in the inclusive range
    IntBetween(i64, i64),
    /// String length (in chars) must fall in the inclusive range
    StringLenBetween(usize, usize),
    /// Arbitrary check returning a human readable reason on failure
    Func(&'static str, fn(&Value) -> Result<(), String>),
}

impl Validator {
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Validator::OneOf(allowed) => match value.as_str() {
                Some(s) if allowed.contains(&s) => Ok(()),
                Some(s) => Err(format!(
                    "expected one of [{}], got \"{}\"",
                    allowed.join(", "),
                    s
                )),
                None => Err("expected a string".to_string()),
            },
            Validator::IntBetween(min, max) => match value.as_i64() {
                Some(n) if (*min..=*max).contains(&n) => Ok(()),
                Some(n) => Err(format!("expected to be in the range ({} - {}), got {}", min, max, n)),
                None => Err("expected an integer".to_string()),
            },
            Validator::StringLenBetween(min, max) => match value.as_str() {
                Some(s) => {
                    let len = s.chars().count();
                    if (*min..=*max).contains(&len) {
                        Ok(())
                    } else {
                        Err(format!(
                            "expected length to be in the range ({} - {}), got {}",
                            min, max, len
                        ))
                    }
                }
                None => Err("expected a string".to_string()),
            },
            Validator::Func(_, check) => check(value),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::OneOf(allowed) => f.debug_tuple("OneOf").field(allowed).finish(),
            Validator::IntBetween(min, max) => {
                f.debug_tuple("IntBetween").field(min).field(max).finish()
            }
            Validator::StringLenBetween(min, max) => {
                f.debug_tuple("StringLenBetween").field(min).field(max).finish()
            }
            Validator::Func(name, _) => f.debug_tuple("Func").field(name).finish(),
        }
    }
}

pub fn one_of(allowed: &'static [&'static str]) -> Validator {
    Validator::OneOf(allowed)
}

pub fn int_between(min: i64, max: i64) -> Validator {
    Validator::IntBetween(min, max)
}

pub fn string_len_between(min: usize, max: usize) -> Validator {
    Validator::StringLenBetween(min, max)
}

/// IPv4 or IPv6 address
pub fn ip_address() -> Validator {
    Validator::Func("ip_address", |value| match value.as_str() {
        Some(s) if s.parse::<IpAddr>().is_ok() => Ok(()),
        Some(s) => Err(format!("\"{}\" is not a valid IP address", s)),
        None => Err("expected a string".to_string()),
    })
}

/// `key=value` label as accepted by Satellite host assignment
pub fn key_value_label() -> Validator {
    Validator::Func("key_value_label", |value| match value.as_str() {
        Some(s) => match s.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() && !v.trim().is_empty() => Ok(()),
            _ => Err(format!("\"{}\" must be of the form key=value", s)),
        },
        None => Err("expected a string".to_string()),
    })
}
