//! Configuration reader
//!
//! Folds every profile declaration of every document into one table,
//! resolves the requested profiles between the implicit `^base` and `^top`
//! profiles, then evaluates embedded expressions.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use strata_value::Value;
use tracing::debug;

use super::effective::{ConfigSource, Configuration};
use super::error::ConfigError;
use super::resolver::ProfileResolver;
use super::table::ProfileTable;
use super::{
    BASE_PROFILE_NAME, CONFIGURATION_FILES, DEFAULT_PROFILE_NAME, PROFILE_KEY, TOP_PROFILE_NAME,
};
use crate::eval::{evaluate_profile_with, BuiltinEngine, ExpressionEngine};
use crate::parser::DocumentFormat;

/// One configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSource {
    pub name: String,
    pub path: Option<PathBuf>,
    pub format: DocumentFormat,
    pub content: String,
}

impl DocumentSource {
    /// In-memory YAML document.
    pub fn yaml(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            format: DocumentFormat::Yaml,
            content: content.into(),
        }
    }

    /// In-memory TOML document.
    pub fn toml(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            format: DocumentFormat::Toml,
            content: content.into(),
        }
    }

    /// Read a document from disk, picking the format from its extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
        let content = String::from_utf8(bytes).map_err(|e| {
            ConfigError::ParseError(format!("{}: invalid UTF-8: {}", path.display(), e))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            path: Some(path.to_path_buf()),
            format: DocumentFormat::from_path(path),
            content,
        })
    }

    /// SHA-256 digest of the document text, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Parse the document into (profile name, profile value) pairs.
    pub fn profiles(&self) -> Result<Vec<(String, Value)>, ConfigError> {
        self.format.parse(&self.content).map_err(|e| match e {
            ConfigError::ParseError(msg) => ConfigError::ParseError(format!("{}: {}", self.name, msg)),
            ConfigError::MalformedStructure(msg) => {
                ConfigError::MalformedStructure(format!("{}: {}", self.name, msg))
            }
            other => other,
        })
    }

    fn to_config_source(&self) -> ConfigSource {
        ConfigSource {
            name: self.name.clone(),
            path: self.path.as_ref().map(|p| p.to_string_lossy().to_string()),
            digest: self.digest(),
        }
    }
}

/// Reads a configuration out of an ordered list of documents.
///
/// Later documents override earlier ones.
pub struct ConfigurationReader {
    sources: Vec<DocumentSource>,
    engine: Box<dyn ExpressionEngine>,
}

impl ConfigurationReader {
    pub fn new(sources: Vec<DocumentSource>) -> Self {
        Self {
            sources,
            engine: Box::new(BuiltinEngine),
        }
    }

    /// Use a different expression engine for embedded expressions.
    pub fn with_engine(mut self, engine: impl ExpressionEngine + 'static) -> Self {
        self.engine = Box::new(engine);
        self
    }

    pub fn sources(&self) -> &[DocumentSource] {
        &self.sources
    }

    /// Parse every document and merge all declarations into one table.
    pub fn profile_table(&self) -> Result<ProfileTable, ConfigError> {
        let mut table = ProfileTable::new();
        for source in &self.sources {
            let pairs = source.profiles()?;
            debug!(source = %source.name, profiles = pairs.len(), "read document");
            for (name, value) in pairs {
                table.declare(name, value)?;
            }
        }
        Ok(table)
    }

    /// Resolve and evaluate the requested profiles.
    ///
    /// An empty request reads the `default` profile.
    pub fn read<S: AsRef<str>>(&self, profile: &[S]) -> Result<Configuration, ConfigError> {
        let requested: Vec<String> = if profile.is_empty() {
            vec![DEFAULT_PROFILE_NAME.to_string()]
        } else {
            profile.iter().map(|p| p.as_ref().to_string()).collect()
        };

        let mut table = self.profile_table()?;

        // Add implicit profiles
        let mut wrapped = Vec::with_capacity(requested.len() + 2);
        wrapped.push(BASE_PROFILE_NAME.to_string());
        wrapped.extend(requested.iter().cloned());
        wrapped.push(TOP_PROFILE_NAME.to_string());

        let mut resolved = ProfileResolver::new(&mut table).resolve(&wrapped)?;
        resolved.insert(
            PROFILE_KEY.to_string(),
            Value::Sequence(requested.iter().cloned().map(Value::String).collect()),
        );
        debug!(profile = ?requested, fields = resolved.len(), "resolved profile");

        let fields = evaluate_profile_with(&resolved, self.engine.as_ref());

        Ok(Configuration {
            profile: requested,
            created_at: Utc::now(),
            fields,
            sources: self.sources.iter().map(DocumentSource::to_config_source).collect(),
        })
    }
}

/// Resolve `profile` out of `sources`.
pub fn read_configuration<S: AsRef<str>>(
    sources: Vec<DocumentSource>,
    profile: &[S],
) -> Result<Configuration, ConfigError> {
    ConfigurationReader::new(sources).read(profile)
}

/// Read the configuration files that exist under `dir` and resolve
/// `profile`. Missing files are skipped.
pub fn load<S: AsRef<str>>(
    profile: &[S],
    files: &[&str],
    dir: Option<&Path>,
) -> Result<Configuration, ConfigError> {
    read_configuration(existing_sources(files, dir)?, profile)
}

/// Like [`load`] with the standard file names.
pub fn load_default<S: AsRef<str>>(
    profile: &[S],
    dir: Option<&Path>,
) -> Result<Configuration, ConfigError> {
    load(profile, CONFIGURATION_FILES, dir)
}

/// Documents for the files that exist, in the given order.
pub fn existing_sources(
    files: &[&str],
    dir: Option<&Path>,
) -> Result<Vec<DocumentSource>, ConfigError> {
    files
        .iter()
        .map(|f| match dir {
            Some(dir) => dir.join(f),
            None => PathBuf::from(f),
        })
        .filter(|path| path.exists())
        .map(|path| DocumentSource::from_file(&path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(profile: &[&str], docs: &[&str]) -> Result<Configuration, ConfigError> {
        let sources = docs
            .iter()
            .enumerate()
            .map(|(i, doc)| DocumentSource::yaml(format!("doc{}", i), *doc))
            .collect();
        read_configuration(sources, profile)
    }

    #[test]
    fn test_default_profile_always_exists() {
        let config = read(&["default"], &[]).unwrap();
        assert_eq!(config.profile, vec!["default".to_string()]);
    }

    #[test]
    fn test_empty_request_reads_default() {
        let config = read(&[], &["default:\n  foo: 2\n"]).unwrap();
        assert_eq!(config.profile, vec!["default".to_string()]);
        assert_eq!(config.get_i64("foo"), Some(2));
    }

    #[test]
    fn test_profile_field() {
        let config = read(&["foo"], &["foo:\n  x: 2\n"]).unwrap();
        assert_eq!(config.get("profile"), Some(&Value::Sequence(vec![Value::from("foo")])));
    }

    #[test]
    fn test_implicit_profiles_wrap_request() {
        let doc = "^base:\n  a: base\n  b: base\n  c: base\nfoo:\n  b: foo\n  c: foo\n^top:\n  c: top\n";
        let config = read(&["foo"], &[doc]).unwrap();
        assert_eq!(config.get_str("a"), Some("base"));
        assert_eq!(config.get_str("b"), Some("foo"));
        assert_eq!(config.get_str("c"), Some("top"));
        assert_eq!(config.profile, vec!["foo".to_string()]);
    }

    #[test]
    fn test_sources_tracked() {
        let config = read(&["foo"], &["foo:\n  a: 1\n", "foo:\n  b: 2\n"]).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].name, "doc0");
        assert_eq!(config.sources[0].digest.len(), 64);
        assert_ne!(config.sources[0].digest, config.sources[1].digest);
    }

    #[test]
    fn test_malformed_document_names_source() {
        let err = read(&["foo"], &["- a\n"]).unwrap_err();
        match err {
            ConfigError::MalformedStructure(msg) => assert!(msg.starts_with("doc0:")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_custom_engine() {
        struct Shouting;

        impl ExpressionEngine for Shouting {
            fn evaluate(
                &self,
                expression: &str,
                _context: &mut dyn crate::eval::EvaluationContext,
            ) -> Result<Value, crate::eval::ExpressionError> {
                Ok(Value::String(expression.trim().to_uppercase()))
            }
        }

        let reader = ConfigurationReader::new(vec![DocumentSource::yaml(
            "inline",
            "foo:\n  v: 'say #{hello}'\n",
        )])
        .with_engine(Shouting);
        let config = reader.read(&["foo"]).unwrap();
        assert_eq!(config.get_str("v"), Some("say HELLO"));
    }

    #[test]
    fn test_mixed_formats() {
        let sources = vec![
            DocumentSource::toml("main.toml", "[foo]\na = 1\nb = 2\n"),
            DocumentSource::yaml("user.yml", "foo:\n  b: 3\n"),
        ];
        let config = read_configuration(sources, &["foo"]).unwrap();
        assert_eq!(config.get_i64("a"), Some(1));
        assert_eq!(config.get_i64("b"), Some(3));
    }
}
