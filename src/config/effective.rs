//! Resolved configuration with provenance
//!
//! The configuration captures the evaluated fields of the requested
//! profiles plus information about which documents contributed to it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;
use strata_value::{Mapping, Value};

/// A contributing document
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConfigSource {
    /// Name given to the document
    pub name: String,

    /// File path (None for in-memory documents)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of the raw document text
    pub digest: String,
}

/// Evaluated configuration for a list of profiles
#[derive(Debug, Clone, Serialize)]
pub struct Configuration {
    /// Requested profile names, without the implicit profiles
    pub profile: Vec<String>,

    /// When this configuration was computed
    pub created_at: DateTime<Utc>,

    /// Evaluated profile fields
    pub fields: Mapping,

    /// Contributing documents in precedence order
    pub sources: Vec<ConfigSource>,
}

impl Configuration {
    /// Get a top-level field
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field names in profile order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Get a value by path (dot-separated, numbers index sequences)
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Mapping(map) => map.get(part)?,
                Value::Sequence(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Get a value as string
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get_path(path).and_then(|v| v.as_str())
    }

    /// Get a value as i64
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get_path(path).and_then(|v| v.as_i64())
    }

    /// Get a value as bool
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get_path(path).and_then(|v| v.as_bool())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            )
        })?;
        fs::write(path, json)
    }
}
