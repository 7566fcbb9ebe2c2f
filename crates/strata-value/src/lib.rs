//! Structured configuration values for strata.
//!
//! Provides the value tree every parsed document is converted into, and the
//! deep-merge rules used when profiles are combined.

mod merge;
mod value;

pub use merge::{merge, merge_into, merge_mappings, merge_mappings_into};
pub use value::{Mapping, Value, ValueSet};
