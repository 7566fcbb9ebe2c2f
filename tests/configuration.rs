//! End-to-end configuration reading tests
//!
//! Each test feeds one or more YAML documents to the reader and checks the
//! evaluated fields of the resolved profile.

use strata::{read_configuration, ConfigError, Configuration, DocumentSource, Value, ValueSet};

// Helper to read a profile list out of inline YAML documents
fn read(profile: &[&str], docs: &[&str]) -> Result<Configuration, ConfigError> {
    let sources = docs
        .iter()
        .enumerate()
        .map(|(i, doc)| DocumentSource::yaml(format!("stream{}", i), *doc))
        .collect();
    read_configuration(sources, profile)
}

fn strings(items: &[&str]) -> Value {
    Value::Sequence(items.iter().map(|s| Value::from(*s)).collect())
}

fn set(items: &[&str]) -> Value {
    Value::Set(items.iter().map(|s| Value::from(*s)).collect::<ValueSet>())
}

const SIMPLE: &str = "foo:\n  bar: 42";

// =============================================================================
// Values
// =============================================================================

#[test]
fn test_reads_simple_values() {
    let config = read(&["foo"], &["foo:\n  bar: 42\n  qoo: \"str\"\n  boo: true\n  soo: :sym"]).unwrap();
    assert_eq!(config.get_i64("bar"), Some(42));
    assert_eq!(config.get_str("qoo"), Some("str"));
    assert_eq!(config.get_bool("boo"), Some(true));
    assert_eq!(config.get_str("soo"), Some(":sym"));
}

#[test]
fn test_yaml_1_1_booleans_are_strings() {
    let config = read(&["foo"], &["foo:\n  boo: on\n  yes_flag: yes\n  off_flag: off"]).unwrap();
    assert_eq!(config.get_str("boo"), Some("on"));
    assert_eq!(config.get_str("yes_flag"), Some("yes"));
    assert_eq!(config.get_str("off_flag"), Some("off"));
    assert_eq!(config.get_bool("boo"), None);
}

#[test]
fn test_reads_complex_values() {
    let config = read(&["foo"], &["foo:\n  bar: [1, 2, 3]\n  qoo:\n    foo: 42"]).unwrap();
    assert_eq!(
        config.get("bar"),
        Some(&Value::Sequence(vec![Value::from(1), Value::from(2), Value::from(3)]))
    );
    assert_eq!(config.get_i64("qoo.foo"), Some(42));
}

#[test]
fn test_evaluates_expressions() {
    let config = read(&["foo"], &["foo:\n  v: '#{2 + 2}'"]).unwrap();
    assert_eq!(config.get_str("v"), Some("4"));
}

#[test]
fn test_refers_to_profile_values() {
    let config = read(&["foo"], &["foo:\n  a: 1\n  b: '#{c.a}'"]).unwrap();
    assert_eq!(config.get_str("b"), Some("1"));
}

#[test]
fn test_evaluates_nested_values() {
    let config = read(&["foo"], &["foo:\n  a: [ '#{2 + 2}' ]"]).unwrap();
    assert_eq!(config.get("a"), Some(&strings(&["4"])));

    let config = read(&["foo"], &["foo:\n a:\n    b: '#{2 + 2}'"]).unwrap();
    assert_eq!(config.get_str("a.b"), Some("4"));
}

// =============================================================================
// Profiles
// =============================================================================

#[test]
fn test_default_profile_always_exists() {
    assert!(read(&["default"], &[]).is_ok());
}

#[test]
fn test_profile_field() {
    let config = read(&["foo"], &["foo:\n  x: 2"]).unwrap();
    assert_eq!(config.get("profile"), Some(&strings(&["foo"])));
}

#[test]
fn test_no_profile_requested_reads_default() {
    let config = read(&[], &["default:\n  foo: 2"]).unwrap();
    assert_eq!(config.get("profile"), Some(&strings(&["default"])));
    assert_eq!(config.get_i64("foo"), Some(2));
}

#[test]
fn test_missing_profile() {
    assert!(read(&["foo"], &[SIMPLE]).is_ok());
    assert_eq!(
        read(&["bar"], &[SIMPLE]).unwrap_err(),
        ConfigError::ProfileNotFound("bar".to_string())
    );
}

#[test]
fn test_later_profiles_win() {
    let doc = "a:\n  x: a\n  y: a\nb:\n  y: b\n";
    let config = read(&["a", "b"], &[doc]).unwrap();
    assert_eq!(config.get_str("x"), Some("a"));
    assert_eq!(config.get_str("y"), Some("b"));

    let config = read(&["b", "a"], &[doc]).unwrap();
    assert_eq!(config.get_str("y"), Some("a"));
}

#[test]
fn test_repeated_profile_definitions_merge() {
    let config = read(&["foo"], &["foo:\n  a: 2\nfoo:\n  b: 3\n"]).unwrap();
    assert_eq!(config.get_i64("a"), Some(2));
    assert_eq!(config.get_i64("b"), Some(3));
}

#[test]
fn test_generic_profile_captures() {
    let doc = "/final-(.+?)-([0-9]+)/:\n  server: 'zf-#{c.captures[0]}-#{c.captures[1]}'\n";
    let config = read(&["final-vk-1"], &[doc]).unwrap();
    assert_eq!(config.get_str("server"), Some("zf-vk-1"));
    assert_eq!(config.get("captures"), Some(&strings(&["vk", "1"])));
}

#[test]
fn test_generic_profile_named_captures() {
    let doc = "/final-(?P<network>.+)-(?P<server>[0-9]+)/:\n  server: \"zf-#{c.named_captures['network']}-#{c.named_captures['server']}\"\n";
    let config = read(&["final-vk-1"], &[doc]).unwrap();
    assert_eq!(config.get_str("server"), Some("zf-vk-1"));
}

#[test]
fn test_generic_profile_no_match() {
    let doc = "/final-(.+)/:\n  a: 1\n";
    assert!(matches!(
        read(&["release"], &[doc]),
        Err(ConfigError::ProfileNotFound(_))
    ));
}

// =============================================================================
// extends
// =============================================================================

#[test]
fn test_extends_merges_parents() {
    let config = read(&["a"], &["a:\n  extends: [b, c]\nb:\n  a: 1\nc:\n  b: 2"]).unwrap();
    assert_eq!(config.get("extends"), Some(&strings(&["b", "c"])));
    assert_eq!(config.get_i64("a"), Some(1));
    assert_eq!(config.get_i64("b"), Some(2));
}

#[test]
fn test_extends_missing_profile() {
    assert_eq!(
        read(&["a"], &["a:\n extends: [ b ]"]).unwrap_err(),
        ConfigError::ProfileNotFound("b".to_string())
    );
}

#[test]
fn test_extends_cycle() {
    let doc = "a:\n extends: [ b ]\nb:\n  extends: [ c ]\nc:\n  extends: [ a ]";
    match read(&["a"], &[doc]).unwrap_err() {
        ConfigError::CyclicDependency(chain) => {
            assert_eq!(chain.first().map(String::as_str), Some("a"));
            assert_eq!(chain.last().map(String::as_str), Some("a"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_extends_single_value() {
    let config = read(&["a"], &["a:\n  extends: b\nb:\n  a: 1"]).unwrap();
    assert_eq!(config.get_i64("a"), Some(1));
}

#[test]
fn test_extends_reserved_name() {
    assert_eq!(
        read(&["a"], &["a:\n  extends: ^top\n"]).unwrap_err(),
        ConfigError::ReservedNameCollision("^top".to_string())
    );
}

// =============================================================================
// Streams and merge strategies
// =============================================================================

#[test]
fn test_multiple_streams() {
    let config = read(&["foo"], &["foo:\n  a: 1\n  b: 2", "foo:\n  b: 3\n  c: 4"]).unwrap();
    assert_eq!(config.get_i64("a"), Some(1));
    assert_eq!(config.get_i64("b"), Some(3));
    assert_eq!(config.get_i64("c"), Some(4));
}

#[test]
fn test_sequential_definitions_merge_deeply() {
    let doc = "foo:\n  bar:\n    qoo: 1\nfoo:\n  bar:\n    jar: 2\n";
    let config = read(&["foo"], &[doc]).unwrap();
    assert_eq!(config.get_i64("bar.qoo"), Some(1));
    assert_eq!(config.get_i64("bar.jar"), Some(2));
}

#[test]
fn test_inherited_values_merge_deeply() {
    let doc = "debug:\n  extends: base\n  servers:\n    debug: https://debug.com\nbase:\n  servers:\n    release: https://release.com\n";
    let config = read(&["debug"], &[doc]).unwrap();
    assert_eq!(config.get_str("servers.release"), Some("https://release.com"));
    assert_eq!(config.get_str("servers.debug"), Some("https://debug.com"));
}

#[test]
fn test_sets_join() {
    let doc = "foo:\n  flags: !set\n    ? -foo\n    ? -bar\nfoo:\n  flags: !set\n    ? -foo\n    ? -qoo\n";
    let config = read(&["foo"], &[doc]).unwrap();
    assert_eq!(config.get("flags"), Some(&set(&["-foo", "-bar", "-qoo"])));
}

#[test]
fn test_set_merges_with_sequence() {
    let doc = "foo:\n  flags: !set {-foo, -bar}\nfoo:\n  flags:\n    - -qoo\n    - -bar\n";
    let config = read(&["foo"], &[doc]).unwrap();
    assert_eq!(config.get("flags"), Some(&set(&["-foo", "-bar", "-qoo"])));
}

#[test]
fn test_core_set_tag_joins() {
    let doc = "foo:\n  flags: !!set\n    ? -foo\n    ? -bar\nfoo:\n  flags: !!set {-foo, -qoo}\n";
    let config = read(&["foo"], &[doc]).unwrap();
    assert_eq!(config.get("flags"), Some(&set(&["-foo", "-bar", "-qoo"])));
}

#[test]
fn test_implicit_profiles() {
    let doc = "^base:\n  level: base\n  only_base: 1\nrelease:\n  level: release\n^top:\n  forced: yes\n";
    let config = read(&["release"], &[doc]).unwrap();
    assert_eq!(config.get_str("level"), Some("release"));
    assert_eq!(config.get_i64("only_base"), Some(1));
    assert_eq!(config.get_str("forced"), Some("yes"));
}

// =============================================================================
// load
// =============================================================================

#[test]
fn test_load_reads_standard_files() {
    let dir = tempfile::tempdir().unwrap();
    let docs = ["foo:\n  bar: 1\n", "foo:\n  baz: 2\n", "foo:\n  qoo: 3\n"];
    for (name, content) in strata::config::CONFIGURATION_FILES.iter().zip(docs) {
        std::fs::write(dir.path().join(name), content).unwrap();
    }

    let config = strata::load_default(&["foo"], Some(dir.path())).unwrap();
    assert_eq!(config.get_i64("bar"), Some(1));
    assert_eq!(config.get_i64("baz"), Some(2));
    assert_eq!(config.get_i64("qoo"), Some(3));
    assert_eq!(config.sources.len(), 3);
}

#[test]
fn test_load_skips_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("strata.yml"), "foo:\n  bar: 1\n").unwrap();

    let config = strata::load(&["foo"], &["strata.yml", "absent.yml"], Some(dir.path())).unwrap();
    assert_eq!(config.get_i64("bar"), Some(1));
    assert_eq!(config.sources.len(), 1);
    assert!(config.sources[0].path.is_some());
}

// =============================================================================
// TOML documents
// =============================================================================

#[test]
fn test_toml_field_order() {
    let sources = vec![DocumentSource::toml("strata.toml", "[foo]\nzeta = 1\nalpha = 2\n")];
    let config = read_configuration(sources, &["foo"]).unwrap();
    let names: Vec<&str> = config.field_names().collect();
    assert_eq!(names, vec!["zeta", "alpha", "profile"]);
}

#[test]
fn test_toml_first_declared_pattern_wins() {
    let doc = "[\"/z-(.+)/\"]\nwho = \"first\"\n\n[\"/(.+)-a/\"]\nwho = \"second\"\n";
    let sources = vec![DocumentSource::toml("strata.toml", doc)];
    let config = read_configuration(sources, &["z-a"]).unwrap();
    assert_eq!(config.get_str("who"), Some("first"));
}
