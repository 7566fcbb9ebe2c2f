//! Evaluation of embedded expressions in a resolved profile
//!
//! Fields are evaluated lazily and memoized: a field referenced from an
//! expression is evaluated on demand (so forward references work), and no
//! field is evaluated twice. Nested mappings and sequences each get their
//! own context while their children are evaluated, so `self` and bare names
//! refer to the nearest enclosing object while `c` always refers to the
//! profile root.

mod engine;
pub mod expr;

pub use engine::{
    evaluate_in, has_expression, interpolate, BuiltinEngine, ExpressionEngine, ExpressionError,
};

use std::collections::{HashMap, HashSet};
use strata_value::{Mapping, Value};
use tracing::warn;

/// Field lookup interface offered to expression engines.
///
/// Missing fields are `None`; engines render them as null.
pub trait EvaluationContext {
    /// Field of the current context (the nearest enclosing object).
    fn get(&mut self, name: &str) -> Option<Value>;

    /// Element of the current context by position. Negative positions count
    /// from the end.
    fn index(&mut self, index: i64) -> Option<Value>;

    /// Field of the profile root, whatever the current context is.
    fn root(&mut self, name: &str) -> Option<Value>;
}

/// Nested value whose children are being evaluated.
#[derive(Clone, Copy)]
enum Target<'a> {
    Mapping(&'a Mapping),
    Sequence(&'a [Value]),
}

impl<'a> Target<'a> {
    fn lookup(self, slot: &Slot) -> Option<&'a Value> {
        match (self, slot) {
            (Target::Mapping(map), Slot::Key(key)) => map.get(key),
            (Target::Sequence(items), Slot::Index(i)) => items.get(*i),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Slot {
    Key(String),
    Index(usize),
}

/// Context of one nested object, with its own memo.
struct Frame<'a> {
    target: Target<'a>,
    memo: HashMap<Slot, Value>,
    pending: HashSet<Slot>,
}

impl<'a> Frame<'a> {
    fn new(target: Target<'a>) -> Self {
        Self {
            target,
            memo: HashMap::new(),
            pending: HashSet::new(),
        }
    }
}

/// Evaluates every string of a resolved profile.
pub struct ConfigurationEvaluator<'a> {
    source: &'a Mapping,
    engine: &'a dyn ExpressionEngine,
    evaluated: HashMap<String, Value>,
    pending: HashSet<String>,
    // Empty while evaluating at the profile root
    frames: Vec<Frame<'a>>,
}

impl<'a> ConfigurationEvaluator<'a> {
    pub fn new(source: &'a Mapping, engine: &'a dyn ExpressionEngine) -> Self {
        Self {
            source,
            engine,
            evaluated: HashMap::new(),
            pending: HashSet::new(),
            frames: Vec::new(),
        }
    }

    /// Evaluate one top-level field, reusing an earlier result.
    pub fn evaluate(&mut self, key: &str) -> Option<Value> {
        if let Some(value) = self.evaluated.get(key) {
            return Some(value.clone());
        }

        let source = self.source;
        let Some(raw) = source.get(key) else {
            self.evaluated.insert(key.to_string(), Value::Null);
            return None;
        };

        if !self.pending.insert(key.to_string()) {
            warn!(field = %key, "reference cycle between fields, using null");
            return None;
        }

        // Root fields are always evaluated with the root as context
        let saved = std::mem::take(&mut self.frames);
        let value = self.evaluate_deep(raw);
        self.frames = saved;

        self.pending.remove(key);
        self.evaluated.insert(key.to_string(), value.clone());
        Some(value)
    }

    /// Evaluate every field and return them in source order.
    pub fn evaluate_values(mut self) -> Mapping {
        let source = self.source;
        for key in source.keys() {
            self.evaluate(key);
        }
        // Lookups of missing fields leave entries behind; only real fields
        // are returned.
        source
            .keys()
            .map(|key| {
                let value = self.evaluated.remove(key).unwrap_or_default();
                (key.clone(), value)
            })
            .collect()
    }

    fn evaluate_deep(&mut self, raw: &'a Value) -> Value {
        match raw {
            Value::String(text) => self.evaluate_string(text),
            Value::Sequence(items) => {
                self.frames.push(Frame::new(Target::Sequence(items)));
                let out = (0..items.len())
                    .map(|i| self.evaluate_slot(Slot::Index(i)).unwrap_or_default())
                    .collect();
                self.frames.pop();
                Value::Sequence(out)
            }
            Value::Mapping(map) => {
                self.frames.push(Frame::new(Target::Mapping(map)));
                let out = map
                    .keys()
                    .map(|key| {
                        let value = self.evaluate_slot(Slot::Key(key.clone())).unwrap_or_default();
                        (key.clone(), value)
                    })
                    .collect();
                self.frames.pop();
                Value::Mapping(out)
            }
            other => other.clone(),
        }
    }

    /// Evaluate a child of the innermost frame, reusing an earlier result.
    fn evaluate_slot(&mut self, slot: Slot) -> Option<Value> {
        let frame = self.frames.last_mut()?;
        if let Some(value) = frame.memo.get(&slot) {
            return Some(value.clone());
        }
        let raw = frame.target.lookup(&slot)?;
        if !frame.pending.insert(slot.clone()) {
            warn!(slot = ?slot, "reference cycle inside nested value, using null");
            return None;
        }

        let value = self.evaluate_deep(raw);

        if let Some(frame) = self.frames.last_mut() {
            frame.pending.remove(&slot);
            frame.memo.insert(slot, value.clone());
        }
        Some(value)
    }

    fn evaluate_string(&mut self, text: &str) -> Value {
        if !has_expression(text) {
            return Value::String(text.to_string());
        }
        let engine = self.engine;
        match interpolate(text, engine, self) {
            Ok(rendered) => Value::String(rendered),
            Err(e) => {
                warn!(error = %e, text = %text, "failed to evaluate expression, keeping text");
                Value::String(text.to_string())
            }
        }
    }
}

impl EvaluationContext for ConfigurationEvaluator<'_> {
    fn get(&mut self, name: &str) -> Option<Value> {
        if self.frames.is_empty() {
            self.evaluate(name)
        } else {
            self.evaluate_slot(Slot::Key(name.to_string()))
        }
    }

    fn index(&mut self, index: i64) -> Option<Value> {
        let Some(frame) = self.frames.last() else {
            return self.evaluate(&index.to_string());
        };
        let target = frame.target;
        match target {
            Target::Sequence(items) => {
                let i = engine::position(index, items.len())?;
                self.evaluate_slot(Slot::Index(i))
            }
            Target::Mapping(_) => self.evaluate_slot(Slot::Key(index.to_string())),
        }
    }

    fn root(&mut self, name: &str) -> Option<Value> {
        self.evaluate(name)
    }
}

/// Evaluate a resolved profile with the builtin expression engine.
pub fn evaluate_profile(resolved: &Mapping) -> Mapping {
    evaluate_profile_with(resolved, &BuiltinEngine)
}

/// Evaluate a resolved profile with the given expression engine.
pub fn evaluate_profile_with(resolved: &Mapping, engine: &dyn ExpressionEngine) -> Mapping {
    ConfigurationEvaluator::new(resolved, engine).evaluate_values()
}
