//! Deep merge of configuration values
//!
//! Merge semantics for an overlapping key:
//! - Mappings: deep-merge by key (recursive)
//! - Null and Null: Null
//! - Set with Set, Sequence or Null: union of elements (always a new set)
//! - Anything else, including arrays: second wins entirely

use crate::value::{Mapping, Value, ValueSet};

/// Merge `other` over `base` without touching either argument.
pub fn merge(base: &Value, other: &Value) -> Value {
    merge_into(base.clone(), other.clone())
}

/// Merge `other` over `base`, reusing the storage of `base`.
pub fn merge_into(base: Value, other: Value) -> Value {
    match (base, other) {
        // Both mappings: deep merge
        (Value::Mapping(base_map), Value::Mapping(other_map)) => {
            Value::Mapping(merge_mappings_into(base_map, other_map))
        }

        (Value::Null, Value::Null) => Value::Null,

        // Sets absorb anything set-like on the other side
        (base, other) if is_set_union(&base, &other) => {
            let mut set = ValueSet::new();
            set.extend(elements(base));
            set.extend(elements(other));
            Value::Set(set)
        }

        // Arrays, scalars and any other case: other wins
        (_, other) => other,
    }
}

/// Merge two mappings without touching either argument.
pub fn merge_mappings(base: &Mapping, other: &Mapping) -> Mapping {
    merge_mappings_into(base.clone(), other.clone())
}

/// Merge `other` over `base` key by key.
///
/// Keys already in `base` keep their position; keys only in `other` are
/// appended in `other`'s order.
pub fn merge_mappings_into(mut base: Mapping, other: Mapping) -> Mapping {
    for (key, other_value) in other {
        match base.get_mut(&key) {
            Some(slot) => {
                let base_value = std::mem::take(slot);
                *slot = merge_into(base_value, other_value);
            }
            None => {
                base.insert(key, other_value);
            }
        }
    }
    base
}

fn is_set_union(base: &Value, other: &Value) -> bool {
    (matches!(base, Value::Set(_)) && is_set_like(other))
        || (matches!(other, Value::Set(_)) && is_set_like(base))
}

fn is_set_like(value: &Value) -> bool {
    matches!(value, Value::Set(_) | Value::Sequence(_) | Value::Null)
}

fn elements(value: Value) -> Vec<Value> {
    match value {
        Value::Set(set) => set.into_iter().collect(),
        Value::Sequence(items) => items,
        _ => Vec::new(),
    }
}
