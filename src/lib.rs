//! Strata - layered profile configuration
//!
//! Configuration documents declare named profiles. Profiles extend each
//! other, can be generated from regular-expression patterns, and are merged
//! over the implicit `^base` profile and under the implicit `^top` profile.
//! String values may embed `#{...}` expressions that reference other fields
//! of the resolved configuration.

pub mod config;
pub mod eval;
pub mod parser;
pub mod versions;

pub use config::{
    is_generic_name, load, load_default, read_configuration, ConfigError, Configuration,
    ConfigurationReader, DocumentSource, ProfileTable,
};
pub use eval::{BuiltinEngine, EvaluationContext, ExpressionEngine, ExpressionError};
pub use strata_value::{merge, Mapping, Value, ValueSet};
