//! Version rule matching
//!
//! A rule is an operator followed by a version: `=1.0.2`, `>=1.0.0` or
//! `<=2.0`. Versions are compared part by part on `.`; numeric parts compare
//! as numbers, anything else as text.

use std::cmp::Ordering;

/// Malformed version rule.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Version format does not match: {0}")]
pub struct VersionError(pub String);

/// Return `version` if it satisfies `rule`, `None` if it does not.
pub fn matches<'v>(version: &'v str, rule: &str) -> Result<Option<&'v str>, VersionError> {
    let (op, target) = if let Some(v) = rule.strip_prefix(">=") {
        (Op::AtLeast, v)
    } else if let Some(v) = rule.strip_prefix("<=") {
        (Op::AtMost, v)
    } else if let Some(v) = rule.strip_prefix('=') {
        (Op::Exactly, v)
    } else {
        return Err(VersionError(rule.to_string()));
    };

    if target.is_empty() {
        return Err(VersionError(rule.to_string()));
    }

    let ordering = compare(version, target);
    let accepted = match op {
        Op::AtLeast => ordering != Ordering::Less,
        Op::AtMost => ordering != Ordering::Greater,
        Op::Exactly => ordering == Ordering::Equal,
    };
    Ok(accepted.then_some(version))
}

enum Op {
    AtLeast,
    AtMost,
    Exactly,
}

/// Compare two dotted versions. Missing trailing parts count as zero.
pub fn compare(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        let ordering = match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(l), None) => compare_part(l, "0"),
            (None, Some(r)) => compare_part("0", r),
            (Some(l), Some(r)) => compare_part(l, r),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

fn compare_part(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}
