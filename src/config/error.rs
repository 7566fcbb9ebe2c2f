//! Configuration errors

/// Errors raised while building or resolving a configuration.
///
/// Every variant is fatal: a read either produces a complete configuration
/// or fails with one of these.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("No such profile {0}")]
    ProfileNotFound(String),

    #[error("Cyclic dependency found {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("Malformed structure: {0}")]
    MalformedStructure(String),

    #[error("`{0}` is not allowed here")]
    ReservedNameCollision(String),

    #[error("Invalid generic profile pattern {name}: {message}")]
    InvalidPattern { name: String, message: String },

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}
