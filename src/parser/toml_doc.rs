//! TOML documents
//!
//! Top-level tables are profiles. TOML has no null or set types, and a
//! table can only be declared once, so these documents only ever contribute
//! plain mappings.

use strata_value::{Mapping, Value};

use crate::config::ConfigError;

/// Parse a TOML document into (profile name, profile value) pairs.
pub fn parse_toml(content: &str) -> Result<Vec<(String, Value)>, ConfigError> {
    let table: toml::Table = toml::from_str(content)
        .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

    Ok(table
        .into_iter()
        .map(|(name, value)| (name, toml_to_value(value)))
        .collect())
}

/// Convert a TOML value into a configuration value.
pub fn toml_to_value(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Integer(i),
        toml::Value::Float(f) => Value::Float(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Sequence(arr.into_iter().map(toml_to_value).collect()),
        toml::Value::Table(table) => {
            let map: Mapping = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_value(v)))
                .collect();
            Value::Mapping(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_profiles() {
        let pairs = parse_toml(
            "[base]\nport = 80\n\n[debug]\nextends = \"base\"\nflags = [\"-g\"]\n\n[debug.servers]\nlocal = \"http://localhost\"\n",
        )
        .unwrap();

        assert_eq!(pairs.len(), 2);
        let (name, debug) = &pairs[1];
        assert_eq!(name, "debug");
        assert_eq!(debug.get("extends"), Some(&Value::from("base")));
        assert_eq!(
            debug.get("servers").and_then(|s| s.get("local")),
            Some(&Value::from("http://localhost"))
        );
    }

    #[test]
    fn test_declaration_order_kept() {
        let pairs = parse_toml("[foo]\nzeta = 1\nalpha = 2\n[bar]\nx = 1\n").unwrap();
        let names: Vec<&str> = pairs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["foo", "bar"]);

        let keys: Vec<&str> = pairs[0]
            .1
            .as_mapping()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_datetime_becomes_string() {
        let pairs = parse_toml("[foo]\nat = 1979-05-27T07:32:00Z\n").unwrap();
        assert_eq!(
            pairs[0].1.get("at"),
            Some(&Value::from("1979-05-27T07:32:00Z"))
        );
    }

    #[test]
    fn test_parse_error() {
        let err = parse_toml("[foo\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
