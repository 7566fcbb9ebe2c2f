//! Profile configuration
//!
//! Documents declare named profiles. A read resolves the requested profiles
//! in order, each one layered over the ones before it:
//! 1. `^base` (always first)
//! 2. The requested profiles, with their `extends` parents
//! 3. `^top` (always last)

mod effective;
mod error;
mod reader;
mod resolver;
mod table;

pub use effective::{ConfigSource, Configuration};
pub use error::ConfigError;
pub use reader::{
    existing_sources, load, load_default, read_configuration, ConfigurationReader, DocumentSource,
};
pub use resolver::{resolve_profile, ProfileResolver, CAPTURES_KEY, NAMED_CAPTURES_KEY};
pub use table::{is_generic_name, ProfileTable};

/// Profile merged over every resolution.
pub const TOP_PROFILE_NAME: &str = "^top";

/// Profile every resolution starts from.
pub const BASE_PROFILE_NAME: &str = "^base";

/// Profile read when nothing is requested.
pub const DEFAULT_PROFILE_NAME: &str = "default";

/// Profiles every table contains, even when no document declares them.
pub const BASIC_PROFILES: [&str; 3] = [TOP_PROFILE_NAME, BASE_PROFILE_NAME, DEFAULT_PROFILE_NAME];

/// Field naming the parents of a profile.
pub const EXTENDS_KEY: &str = "extends";

/// Field holding the requested profile names in a read configuration.
pub const PROFILE_KEY: &str = "profile";

/// Files read by [`load_default`], lowest precedence first.
pub const CONFIGURATION_FILES: &[&str] = &["strata.yml", "strata.user.yml", "strata.override.yml"];
