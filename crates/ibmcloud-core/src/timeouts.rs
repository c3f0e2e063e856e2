//! Per-operation deadlines

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Deadline for each lifecycle operation of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::uniform(DEFAULT_TIMEOUT)
    }
}

impl Timeouts {
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            create: timeout,
            read: timeout,
            update: timeout,
            delete: timeout,
        }
    }

    pub fn with_create(mut self, timeout: Duration) -> Self {
        self.create = timeout;
        self
    }

    pub fn with_update(mut self, timeout: Duration) -> Self {
        self.update = timeout;
        self
    }

    pub fn with_delete(mut self, timeout: Duration) -> Self {
        self.delete = timeout;
        self
    }

    /// Override from a `timeouts` block such as `{"create": "45m"}`
    pub fn merge(mut self, block: &Map<String, Value>) -> Result<Self> {
        for (key, value) in block {
            let text = value.as_str().ok_or_else(|| {
                Error::config(format!("timeouts.{} must be a duration string", key))
            })?;
            let duration = parse_duration(text)?;
            match key.as_str() {
                "create" => self.create = duration,
                "read" => self.read = duration,
                "update" => self.update = duration,
                "delete" => self.delete = duration,
                other => {
                    return Err(Error::config(format!("unknown timeout \"{}\"", other)));
                }
            }
        }
        Ok(self)
    }
}

/// Parse durations like `90s`, `30m`, `1h`, `1h30m`
pub fn parse_duration(text: &str) -> Result<Duration> {
    let invalid = || Error::config(format!("invalid duration \"{}\"", text));
    if text.is_empty() {
        return Err(invalid());
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let n: u64 = digits.parse().map_err(|_| invalid())?;
        digits.clear();
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };
        total = n
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(invalid)?;
    }
    if !digits.is_empty() {
        return Err(invalid());
    }
    Ok(Duration::from_secs(total))
}
