//! YAML documents
//!
//! A YAML stream may hold several documents. Each document is read entry by
//! entry instead of as one mapping, so a profile declared twice in the same
//! document reaches the table twice and gets merged rather than rejected.

use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_yaml::Value as YamlValue;
use std::borrow::Cow;
use std::fmt;
use strata_value::{Mapping, Value, ValueSet};

use crate::config::ConfigError;

/// Tag that turns a YAML mapping into a set of its keys.
const LOCAL_SET_TAG: &str = "!set";

/// Spellings of the core `tag:yaml.org,2002:set` tag.
const CORE_SET_TAGS: &[&str] = &["!!set", "!<tag:yaml.org,2002:set>"];

/// Parse a YAML stream into (profile name, profile value) pairs.
pub fn parse_yaml(content: &str) -> Result<Vec<(String, Value)>, ConfigError> {
    let content = localize_set_tags(content);
    let mut pairs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&content) {
        let entries = match DocumentEntries::deserialize(document) {
            Ok(DocumentEntries::Profiles(entries)) => entries,
            Ok(DocumentEntries::Empty) => continue,
            Ok(DocumentEntries::Other(kind)) => {
                return Err(ConfigError::MalformedStructure(format!(
                    "Mapping expected, document is a {}",
                    kind
                )))
            }
            Err(e) => return Err(ConfigError::ParseError(format!("YAML parse error: {}", e))),
        };

        for (key, value) in entries {
            pairs.push((profile_name(&key)?, yaml_to_value(value)?));
        }
    }
    Ok(pairs)
}

/// Top level of one document, keeping duplicate keys.
enum DocumentEntries {
    Profiles(Vec<(YamlValue, YamlValue)>),
    Empty,
    Other(&'static str),
}

impl<'de> Deserialize<'de> for DocumentEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DocumentVisitor)
    }
}

struct DocumentVisitor;

impl<'de> Visitor<'de> for DocumentVisitor {
    type Value = DocumentEntries;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping of profile names to profiles")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::new();
        while let Some((key, value)) = map.next_entry::<YamlValue, YamlValue>()? {
            entries.push((key, value));
        }
        Ok(DocumentEntries::Profiles(entries))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(DocumentEntries::Empty)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(DocumentEntries::Empty)
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        Ok(DocumentEntries::Other("bool"))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        Ok(DocumentEntries::Other("number"))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        Ok(DocumentEntries::Other("number"))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        Ok(DocumentEntries::Other("number"))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
        Ok(DocumentEntries::Other("string"))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(DocumentEntries::Other("sequence"))
    }
}

fn profile_name(key: &YamlValue) -> Result<String, ConfigError> {
    scalar_key(key).ok_or_else(|| {
        ConfigError::MalformedStructure("profile names must be scalars".to_string())
    })
}

fn scalar_key(key: &YamlValue) -> Option<String> {
    match key {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        YamlValue::Null => Some(String::new()),
        _ => None,
    }
}

fn is_set_tag(tag: &serde_yaml::value::Tag) -> bool {
    tag.to_string().trim_start_matches('!') == LOCAL_SET_TAG.trim_start_matches('!')
}

/// Rewrite core set tags as the local `!set` tag.
///
/// serde_yaml resolves core `!!` tags itself and drops them, so a `!!set`
/// mapping would reach [`yaml_to_value`] untagged. Quoted scalars, comments
/// and block scalars are copied unchanged.
fn localize_set_tags(content: &str) -> Cow<'_, str> {
    if !CORE_SET_TAGS.iter().any(|tag| content.contains(tag)) {
        return Cow::Borrowed(content);
    }

    let mut out = String::with_capacity(content.len());
    let mut quote = None;
    // Indentation of the line that opened a block scalar
    let mut block_parent: Option<usize> = None;
    for line in content.split_inclusive('\n') {
        let indent = line.len() - line.trim_start_matches(' ').len();
        if let Some(parent) = block_parent {
            if line.trim().is_empty() || indent > parent {
                out.push_str(line);
                continue;
            }
            block_parent = None;
        }
        if localize_line(line, &mut quote, &mut out) {
            block_parent = Some(indent);
        }
    }
    Cow::Owned(out)
}

/// Copy one line into `out`, rewriting core set tags. Returns whether the
/// line opens a block scalar.
fn localize_line(line: &str, quote: &mut Option<u8>, out: &mut String) -> bool {
    let bytes = line.as_bytes();
    let mut copied = 0;
    let mut code_end = line.len();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = *quote {
            match b {
                b'\\' if q == b'"' => i += 1,
                b'\'' if q == b'\'' && bytes.get(i + 1) == Some(&b'\'') => i += 1,
                _ if b == q => *quote = None,
                _ => {}
            }
            i += 1;
            continue;
        }

        let token_start = i == 0 || matches!(bytes[i - 1], b' ' | b'\t' | b'[' | b'{' | b',');
        match b {
            b'#' if i == 0 || bytes[i - 1].is_ascii_whitespace() => {
                code_end = i;
                break;
            }
            b'\'' | b'"' if token_start => *quote = Some(b),
            b'!' if token_start => {
                let tail = &line[i..];
                let core = CORE_SET_TAGS
                    .iter()
                    .find(|tag| tail.starts_with(*tag) && ends_token(&tail[tag.len()..]));
                if let Some(tag) = core {
                    out.push_str(&line[copied..i]);
                    out.push_str(LOCAL_SET_TAG);
                    i += tag.len();
                    copied = i;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    out.push_str(&line[copied..]);

    quote.is_none() && opens_block_scalar(&line[..code_end])
}

fn ends_token(rest: &str) -> bool {
    rest.bytes()
        .next()
        .map_or(true, |b| b.is_ascii_whitespace() || matches!(b, b'{' | b'[' | b',' | b']' | b'}'))
}

/// `key: |`, `- >-`, `key: |2+` and the like.
fn opens_block_scalar(code: &str) -> bool {
    let code = code.trim_end();
    let indicator = code.rsplit([' ', '\t']).next().unwrap_or(code);
    let mut chars = indicator.chars();
    matches!(chars.next(), Some('|' | '>'))
        && chars.all(|c| c == '-' || c == '+' || c.is_ascii_digit())
}

/// Convert a YAML value into a configuration value.
pub fn yaml_to_value(yaml: YamlValue) -> Result<Value, ConfigError> {
    let value = match yaml {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => Value::Bool(b),
        YamlValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        YamlValue::String(s) => Value::String(s),
        YamlValue::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(yaml_to_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        YamlValue::Mapping(map) => {
            let mut out = Mapping::new();
            for (key, value) in map {
                let key = scalar_key(&key).ok_or_else(|| {
                    ConfigError::MalformedStructure(
                        "mapping keys must be scalars outside of sets".to_string(),
                    )
                })?;
                out.insert(key, yaml_to_value(value)?);
            }
            Value::Mapping(out)
        }
        YamlValue::Tagged(tagged) if is_set_tag(&tagged.tag) => {
            let mut set = ValueSet::new();
            match tagged.value {
                YamlValue::Mapping(map) => {
                    for (key, _) in map {
                        set.insert(yaml_to_value(key)?);
                    }
                }
                YamlValue::Sequence(items) => {
                    for item in items {
                        set.insert(yaml_to_value(item)?);
                    }
                }
                YamlValue::Null => {}
                other => {
                    set.insert(yaml_to_value(other)?);
                }
            }
            Value::Set(set)
        }
        // Unknown tags keep their inner value
        YamlValue::Tagged(tagged) => yaml_to_value(tagged.value)?,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> Value {
        Value::Set(items.iter().map(|s| Value::from(*s)).collect())
    }

    #[test]
    fn test_simple_profiles() {
        let pairs = parse_yaml("foo:\n  bar: 42\nqoo:\n  bar: 32\n").unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, "foo");
        assert_eq!(pairs[0].1.get("bar"), Some(&Value::Integer(42)));
        assert_eq!(pairs[1].0, "qoo");
    }

    #[test]
    fn test_scalar_types() {
        let pairs = parse_yaml("foo:\n  i: 42\n  f: 1.5\n  s: \"str\"\n  b: true\n  n: ~\n").unwrap();
        let foo = &pairs[0].1;
        assert_eq!(foo.get("i"), Some(&Value::Integer(42)));
        assert_eq!(foo.get("f"), Some(&Value::Float(1.5)));
        assert_eq!(foo.get("s"), Some(&Value::from("str")));
        assert_eq!(foo.get("b"), Some(&Value::Bool(true)));
        assert_eq!(foo.get("n"), Some(&Value::Null));
    }

    #[test]
    fn test_duplicate_profiles_are_kept() {
        let pairs = parse_yaml("foo:\n  a: 2\nfoo:\n  b: 3\n").unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].1.get("a"), Some(&Value::Integer(2)));
        assert_eq!(pairs[1].1.get("b"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_multiple_documents() {
        let pairs = parse_yaml("foo:\n  a: 1\n---\nbar:\n  b: 2\n").unwrap();
        let names: Vec<&str> = pairs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["foo", "bar"]);
    }

    #[test]
    fn test_empty_stream() {
        assert!(parse_yaml("").unwrap().is_empty());
    }

    #[test]
    fn test_set_tag_block() {
        let pairs = parse_yaml("foo: !set\n  ? a\n  ? b\n  ? c\n").unwrap();
        assert_eq!(pairs[0].1, set(&["a", "b", "c"]));
    }

    #[test]
    fn test_set_tag_flow() {
        let pairs = parse_yaml("foo:\n  flags: !set {-foo, -bar}\n").unwrap();
        assert_eq!(pairs[0].1.get("flags"), Some(&set(&["-foo", "-bar"])));
    }

    #[test]
    fn test_core_set_tag() {
        let pairs = parse_yaml("foo:\n  flags: !!set\n    ? x\n").unwrap();
        assert_eq!(pairs[0].1.get("flags"), Some(&set(&["x"])));
    }

    #[test]
    fn test_verbatim_core_set_tag() {
        let pairs = parse_yaml("foo:\n  flags: !<tag:yaml.org,2002:set> {a, b}\n").unwrap();
        assert_eq!(pairs[0].1.get("flags"), Some(&set(&["a", "b"])));
    }

    #[test]
    fn test_core_set_tag_in_flow_and_sequence() {
        let pairs = parse_yaml("foo:\n  flags: [!!set {a}, !!set {b}]\n").unwrap();
        assert_eq!(
            pairs[0].1.get("flags"),
            Some(&Value::Sequence(vec![set(&["a"]), set(&["b"])]))
        );
    }

    #[test]
    fn test_set_tag_text_in_scalars_untouched() {
        let doc = "foo:\n  single: ' !!set x'\n  double: \" !!set {y}\"\n  plain: a!!set\n  note: |\n    !!set kept\n  flags: !!set {z} # !!set comment\n";
        let pairs = parse_yaml(doc).unwrap();
        let foo = &pairs[0].1;
        assert_eq!(foo.get("single"), Some(&Value::from(" !!set x")));
        assert_eq!(foo.get("double"), Some(&Value::from(" !!set {y}")));
        assert_eq!(foo.get("plain"), Some(&Value::from("a!!set")));
        assert_eq!(foo.get("note"), Some(&Value::from("!!set kept\n")));
        assert_eq!(foo.get("flags"), Some(&set(&["z"])));
    }

    #[test]
    fn test_localize_without_core_tags_borrows() {
        assert!(matches!(localize_set_tags("foo: !set {a}\n"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_non_mapping_document() {
        let err = parse_yaml("- a\n- b\n").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedStructure(_)));

        let err = parse_yaml("just text\n").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedStructure(_)));
    }

    #[test]
    fn test_syntax_error() {
        let err = parse_yaml("foo: [unclosed\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_regex_profile_name() {
        let pairs = parse_yaml("/final-(.+?)-([0-9]+)/:\n  server: x\n").unwrap();
        assert_eq!(pairs[0].0, "/final-(.+?)-([0-9]+)/");
    }
}
