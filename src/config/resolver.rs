//! Profile resolution
//!
//! Expands the `extends` graph of the requested profiles into a single
//! flattened mapping. Parents are merged before children, siblings left to
//! right, and a profile's own fields always win over anything inherited.

use regex_lite::Regex;
use strata_value::{merge_mappings_into, Mapping, Value};
use tracing::debug;

use super::error::ConfigError;
use super::table::ProfileTable;
use super::{BASE_PROFILE_NAME, EXTENDS_KEY, TOP_PROFILE_NAME};

/// Field injected into generated profiles with positional captures.
pub const CAPTURES_KEY: &str = "captures";

/// Field injected into generated profiles with named captures.
pub const NAMED_CAPTURES_KEY: &str = "named_captures";

/// A profile declared under a `/regex/` name.
struct GenericProfile {
    name: String,
    pattern: Regex,
}

/// Resolves profiles against a table.
///
/// Generated profiles are written back into the table, so a name matched
/// by a pattern is only materialized once per table.
pub struct ProfileResolver<'t> {
    table: &'t mut ProfileTable,
    generics: Option<Vec<GenericProfile>>,
}

impl<'t> ProfileResolver<'t> {
    pub fn new(table: &'t mut ProfileTable) -> Self {
        Self {
            table,
            generics: None,
        }
    }

    /// Resolve an ordered list of profile names into one mapping.
    pub fn resolve(&mut self, profiles: &[String]) -> Result<Mapping, ConfigError> {
        self.resolve_chain(profiles, &[])
    }

    fn resolve_chain(
        &mut self,
        profiles: &[String],
        resolved: &[String],
    ) -> Result<Mapping, ConfigError> {
        let mut acc = Mapping::new();
        for name in profiles {
            if resolved.contains(name) {
                let mut chain = resolved.to_vec();
                chain.push(name.clone());
                return Err(ConfigError::CyclicDependency(chain));
            }

            let values = self.find_profile(name)?;
            let parents = parent_profiles(&values)?;

            let mut chain = resolved.to_vec();
            chain.push(name.clone());
            debug!(profile = %name, parents = ?parents, "resolving profile");

            // Inherited values go first
            let inherited = self.resolve_chain(&parents, &chain)?;
            let inherited = merge_mappings_into(acc, inherited);
            acc = merge_mappings_into(inherited, values);
        }
        Ok(acc)
    }

    /// Look up a profile by literal name, falling back to generic profiles.
    fn find_profile(&mut self, name: &str) -> Result<Mapping, ConfigError> {
        if let Some(values) = self.table.get(name) {
            return Ok(values.clone());
        }
        match self.generate_profile(name)? {
            Some(values) => Ok(values),
            None => Err(ConfigError::ProfileNotFound(name.to_string())),
        }
    }

    /// Materialize a profile from the first generic profile matching `name`.
    ///
    /// If several patterns match, which one is used is unspecified.
    fn generate_profile(&mut self, name: &str) -> Result<Option<Mapping>, ConfigError> {
        self.compile_generic_profiles()?;
        let generics = self.generics.as_deref().unwrap_or_default();
        let Some((generic, captures)) = generics
            .iter()
            .find_map(|g| g.pattern.captures(name).map(|caps| (g, caps)))
        else {
            return Ok(None);
        };

        let mut generated = Mapping::new();
        let positional: Vec<Value> = (1..captures.len())
            .map(|i| capture_value(captures.get(i)))
            .collect();
        generated.insert(CAPTURES_KEY.to_string(), Value::Sequence(positional));

        let named: Mapping = generic
            .pattern
            .capture_names()
            .flatten()
            .map(|group| (group.to_string(), capture_value(captures.name(group))))
            .collect();
        if !named.is_empty() {
            generated.insert(NAMED_CAPTURES_KEY.to_string(), Value::Mapping(named));
        }

        let declared = self.table.get(&generic.name).cloned().unwrap_or_default();
        debug!(profile = %name, pattern = %generic.name, "materialized generic profile");
        let generated = merge_mappings_into(generated, declared);

        self.table.insert(name, generated.clone());
        Ok(Some(generated))
    }

    /// Compile the generic profile patterns once, in table order.
    fn compile_generic_profiles(&mut self) -> Result<(), ConfigError> {
        if self.generics.is_none() {
            let compiled = self
                .table
                .generic_names()
                .map(|name| {
                    let source = &name[1..name.len() - 1];
                    Regex::new(source)
                        .map(|pattern| GenericProfile {
                            name: name.to_string(),
                            pattern,
                        })
                        .map_err(|e| ConfigError::InvalidPattern {
                            name: name.to_string(),
                            message: e.to_string(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            self.generics = Some(compiled);
        }
        Ok(())
    }
}

fn capture_value(capture: Option<regex_lite::Match<'_>>) -> Value {
    capture
        .map(|m| Value::String(m.as_str().to_string()))
        .unwrap_or(Value::Null)
}

/// List of parent profiles named by the `extends` field.
fn parent_profiles(values: &Mapping) -> Result<Vec<String>, ConfigError> {
    let parents = match values.get(EXTENDS_KEY) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(name)) => vec![name.clone()],
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(name) => Ok(name.clone()),
                other => Err(ConfigError::MalformedStructure(format!(
                    "`{}` entries must be profile names, got {}",
                    EXTENDS_KEY,
                    other.type_name()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => {
            return Err(ConfigError::MalformedStructure(format!(
                "`{}` must be a profile name or a list of names, got {}",
                EXTENDS_KEY,
                other.type_name()
            )))
        }
    };

    for implicit in [TOP_PROFILE_NAME, BASE_PROFILE_NAME] {
        if parents.iter().any(|p| p == implicit) {
            return Err(ConfigError::ReservedNameCollision(implicit.to_string()));
        }
    }
    Ok(parents)
}

/// Resolve `profiles` against `table`.
pub fn resolve_profile(
    table: &mut ProfileTable,
    profiles: &[String],
) -> Result<Mapping, ConfigError> {
    ProfileResolver::new(table).resolve(profiles)
}
