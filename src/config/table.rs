//! Named profile table
//!
//! Every profile declaration read from every document is folded into one
//! table. Repeated declarations of the same name are deep-merged in the
//! order they were read.

use indexmap::IndexMap;
use strata_value::{merge_mappings_into, Mapping, Value};
use tracing::debug;

use super::error::ConfigError;
use super::BASIC_PROFILES;

/// Profile name to declared profile fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileTable {
    profiles: IndexMap<String, Mapping>,
}

impl ProfileTable {
    /// Table holding only the implicit profiles (`^top`, `^base`, `default`).
    pub fn new() -> Self {
        let mut table = Self::empty();
        for name in BASIC_PROFILES {
            table.profiles.insert(name.to_string(), Mapping::new());
        }
        table
    }

    /// Table with no profiles at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from (profile name, profile value) pairs.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut table = Self::new();
        for (name, value) in pairs {
            table.declare(name, value)?;
        }
        Ok(table)
    }

    /// Add a profile declaration, merging it into any existing one.
    pub fn declare(&mut self, name: String, value: Value) -> Result<(), ConfigError> {
        let values = match value {
            Value::Mapping(map) => map,
            // `foo:` with nothing under it
            Value::Null => Mapping::new(),
            other => {
                return Err(ConfigError::MalformedStructure(format!(
                    "profile `{}` must be a mapping, got {}",
                    name,
                    other.type_name()
                )))
            }
        };

        match self.profiles.get_mut(&name) {
            Some(existing) => {
                debug!(profile = %name, "merging repeated profile declaration");
                let base = std::mem::take(existing);
                *existing = merge_mappings_into(base, values);
            }
            None => {
                self.profiles.insert(name, values);
            }
        }
        Ok(())
    }

    /// Store a fully built profile, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, values: Mapping) {
        self.profiles.insert(name.into(), values);
    }

    pub fn get(&self, name: &str) -> Option<&Mapping> {
        self.profiles.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Profile names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Names that are regular expression patterns (`/.../`).
    pub fn generic_names(&self) -> impl Iterator<Item = &str> {
        self.names().filter(|name| is_generic_name(name))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Whether a profile name is a delimited pattern rather than a literal name.
pub fn is_generic_name(name: &str) -> bool {
    name.len() >= 2 && name.starts_with('/') && name.ends_with('/')
}
