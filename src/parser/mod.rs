//! Document parsing
//!
//! Turns raw document text into (profile name, profile value) pairs. Pairs
//! are returned in document order and duplicates are kept, so the reader
//! can merge repeated declarations.

mod toml_doc;
mod yaml;

pub use toml_doc::{parse_toml, toml_to_value};
pub use yaml::{parse_yaml, yaml_to_value};

use std::path::Path;
use strata_value::Value;

use crate::config::ConfigError;

/// Syntax of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Yaml,
    Toml,
}

impl DocumentFormat {
    /// Guess the format from a file name. Anything but `.toml` is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => DocumentFormat::Toml,
            _ => DocumentFormat::Yaml,
        }
    }

    /// Parse `content` into profile pairs.
    pub fn parse(self, content: &str) -> Result<Vec<(String, Value)>, ConfigError> {
        match self {
            DocumentFormat::Yaml => parse_yaml(content),
            DocumentFormat::Toml => parse_toml(content),
        }
    }
}
