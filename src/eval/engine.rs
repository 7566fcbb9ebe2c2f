//! Expression engines
//!
//! An engine turns the text between `#{` and `}` into a value, reading
//! configuration fields through an [`EvaluationContext`]. The builtin engine
//! only understands the closed grammar in [`super::expr`]: it can read
//! fields, do arithmetic and call a handful of accessors, and nothing else.

use strata_value::{Mapping, Value};

use super::expr::{self, BinaryOp, Expr};
use super::EvaluationContext;
use crate::versions;

/// Errors raised while evaluating one embedded expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Unknown function `{0}`")]
    UnknownFunction(String),

    #[error("Unknown method `{method}` for {type_name}")]
    UnknownMethod { method: String, type_name: String },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Arithmetic error: {0}")]
    Arithmetic(String),
}

/// Evaluates embedded expressions.
///
/// Implement this to plug a different expression language into the reader.
pub trait ExpressionEngine {
    fn evaluate(
        &self,
        expression: &str,
        context: &mut dyn EvaluationContext,
    ) -> Result<Value, ExpressionError>;
}

/// The closed expression language shipped with the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEngine;

impl ExpressionEngine for BuiltinEngine {
    fn evaluate(
        &self,
        expression: &str,
        context: &mut dyn EvaluationContext,
    ) -> Result<Value, ExpressionError> {
        let expr = expr::parse(expression)?;
        match eval(&expr, context)? {
            Operand::Value(value) => Ok(value),
            Operand::Root | Operand::Current => Err(ExpressionError::Type(
                "a context handle cannot be rendered, access one of its fields".to_string(),
            )),
        }
    }
}

/// Intermediate result: either a value or a handle to a context whose
/// fields are only evaluated when accessed.
enum Operand {
    Value(Value),
    Root,
    Current,
}

fn eval(expr: &Expr, ctx: &mut dyn EvaluationContext) -> Result<Operand, ExpressionError> {
    let value = match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Root => return Ok(Operand::Root),
        Expr::Current => return Ok(Operand::Current),
        Expr::Name(name) => ctx.get(name).unwrap_or_default(),
        Expr::Call { name, args } => {
            let args = eval_args(args, ctx)?;
            call_function(name, args)?
        }
        Expr::Member { target, name, args } => {
            let target = eval(target, ctx)?;
            let args = match args {
                Some(args) => Some(eval_args(args, ctx)?),
                None => None,
            };
            match (target, args) {
                (Operand::Root, None) => ctx.root(name).unwrap_or_default(),
                (Operand::Current, None) => ctx.get(name).unwrap_or_default(),
                (Operand::Value(Value::Mapping(map)), None) if map.contains_key(name) => {
                    map.get(name).cloned().unwrap_or_default()
                }
                (Operand::Value(value), args) => {
                    let field_access =
                        args.is_none() && matches!(value, Value::Mapping(_) | Value::Null);
                    match call_method(value, name, args.unwrap_or_default()) {
                        // Absent fields read as null
                        Err(ExpressionError::UnknownMethod { .. }) if field_access => Value::Null,
                        result => result?,
                    }
                }
                (_, Some(_)) => {
                    return Err(ExpressionError::Type(format!(
                        "`{}` is a field, not a method",
                        name
                    )))
                }
            }
        }
        Expr::Index { target, index } => {
            let target = eval(target, ctx)?;
            let index = value_of(eval(index, ctx)?)?;
            match (target, index) {
                (Operand::Root, Value::String(name)) => ctx.root(&name).unwrap_or_default(),
                (Operand::Root, Value::Integer(i)) => ctx.root(&i.to_string()).unwrap_or_default(),
                (Operand::Current, Value::String(name)) => ctx.get(&name).unwrap_or_default(),
                (Operand::Current, Value::Integer(i)) => ctx.index(i).unwrap_or_default(),
                (Operand::Value(value), index) => index_value(&value, &index),
                (_, other) => {
                    return Err(ExpressionError::Type(format!(
                        "cannot index a context with {}",
                        other.type_name()
                    )))
                }
            }
        }
        Expr::Neg(inner) => match value_of(eval(inner, ctx)?)? {
            Value::Integer(i) => Value::Integer(
                i.checked_neg()
                    .ok_or_else(|| ExpressionError::Arithmetic("integer overflow".to_string()))?,
            ),
            Value::Float(f) => Value::Float(-f),
            other => {
                return Err(ExpressionError::Type(format!(
                    "cannot negate {}",
                    other.type_name()
                )))
            }
        },
        Expr::Binary { op, lhs, rhs } => {
            let lhs = value_of(eval(lhs, ctx)?)?;
            let rhs = value_of(eval(rhs, ctx)?)?;
            binary(*op, lhs, rhs)?
        }
    };
    Ok(Operand::Value(value))
}

fn value_of(operand: Operand) -> Result<Value, ExpressionError> {
    match operand {
        Operand::Value(value) => Ok(value),
        Operand::Root | Operand::Current => Err(ExpressionError::Type(
            "a context handle cannot be used as a value".to_string(),
        )),
    }
}

fn eval_args(args: &[Expr], ctx: &mut dyn EvaluationContext) -> Result<Vec<Value>, ExpressionError> {
    args.iter().map(|arg| value_of(eval(arg, ctx)?)).collect()
}

/// Index into a value. Out of range and missing keys are null.
fn index_value(value: &Value, index: &Value) -> Value {
    match (value, index) {
        (Value::Sequence(items), Value::Integer(i)) => position(*i, items.len())
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or_default(),
        (Value::Mapping(map), Value::String(key)) => map.get(key).cloned().unwrap_or_default(),
        (Value::Mapping(map), Value::Integer(i)) => {
            map.get(&i.to_string()).cloned().unwrap_or_default()
        }
        (Value::String(s), Value::Integer(i)) => {
            let chars: Vec<char> = s.chars().collect();
            position(*i, chars.len())
                .map(|i| Value::String(chars[i].to_string()))
                .unwrap_or_default()
        }
        _ => Value::Null,
    }
}

/// Resolve a possibly negative index against a length.
pub(crate) fn position(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { len + index } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

fn call_function(name: &str, args: Vec<Value>) -> Result<Value, ExpressionError> {
    match (name, args.as_slice()) {
        ("env", [Value::String(var)]) => {
            Ok(std::env::var(var).map(Value::String).unwrap_or_default())
        }
        ("env", [Value::String(var), default]) => {
            Ok(std::env::var(var).map(Value::String).unwrap_or_else(|_| default.clone()))
        }
        ("version_match", [Value::String(version), Value::String(rule)]) => {
            match versions::matches(version, rule) {
                Ok(Some(matched)) => Ok(Value::String(matched.to_string())),
                Ok(None) => Ok(Value::Null),
                Err(e) => Err(ExpressionError::Type(e.to_string())),
            }
        }
        ("env" | "version_match", _) => Err(ExpressionError::Type(format!(
            "invalid arguments for `{}`",
            name
        ))),
        _ => Err(ExpressionError::UnknownFunction(name.to_string())),
    }
}

fn call_method(value: Value, method: &str, args: Vec<Value>) -> Result<Value, ExpressionError> {
    let result = match (method, &value, args.as_slice()) {
        ("to_s", _, []) => Value::String(value.to_string()),
        ("upcase", Value::String(s), []) => Value::String(s.to_uppercase()),
        ("downcase", Value::String(s), []) => Value::String(s.to_lowercase()),
        ("strip", Value::String(s), []) => Value::String(s.trim().to_string()),
        ("to_i", Value::String(s), []) => Value::Integer(leading_integer(s)),
        ("to_i", Value::Integer(i), []) => Value::Integer(*i),
        ("to_i", Value::Float(f), []) => Value::Integer(f.trunc() as i64),
        ("length" | "size", _, []) => match length(&value) {
            Some(len) => Value::Integer(len),
            None => return Err(unknown_method(method, &value)),
        },
        ("empty?", _, []) => match length(&value) {
            Some(len) => Value::Bool(len == 0),
            None => return Err(unknown_method(method, &value)),
        },
        ("first", Value::Sequence(items), []) => items.first().cloned().unwrap_or_default(),
        ("last", Value::Sequence(items), []) => items.last().cloned().unwrap_or_default(),
        ("keys", Value::Mapping(map), []) => {
            Value::Sequence(map.keys().cloned().map(Value::String).collect())
        }
        ("join", Value::Sequence(items), args) => join(items.iter(), args)?,
        ("join", Value::Set(set), args) => join(set.iter(), args)?,
        _ => return Err(unknown_method(method, &value)),
    };
    Ok(result)
}

fn unknown_method(method: &str, value: &Value) -> ExpressionError {
    ExpressionError::UnknownMethod {
        method: method.to_string(),
        type_name: value.type_name().to_string(),
    }
}

fn length(value: &Value) -> Option<i64> {
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::Sequence(items) => items.len(),
        Value::Mapping(map) => map.len(),
        Value::Set(set) => set.len(),
        _ => return None,
    };
    i64::try_from(len).ok()
}

fn join<'v>(items: impl Iterator<Item = &'v Value>, args: &[Value]) -> Result<Value, ExpressionError> {
    let separator = match args {
        [] => String::new(),
        [sep] => sep.to_string(),
        _ => return Err(ExpressionError::Type("join takes at most one separator".to_string())),
    };
    let parts: Vec<String> = items.map(Value::to_string).collect();
    Ok(Value::String(parts.join(&separator)))
}

/// Integer prefix of a string, zero when there is none.
fn leading_integer(s: &str) -> i64 {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    s[..end].parse().unwrap_or(0)
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, ExpressionError> {
    let overflow = || ExpressionError::Arithmetic("integer overflow".to_string());
    let result = match (op, lhs, rhs) {
        (BinaryOp::Add, Value::Integer(a), Value::Integer(b)) => {
            Value::Integer(a.checked_add(b).ok_or_else(overflow)?)
        }
        (BinaryOp::Sub, Value::Integer(a), Value::Integer(b)) => {
            Value::Integer(a.checked_sub(b).ok_or_else(overflow)?)
        }
        (BinaryOp::Mul, Value::Integer(a), Value::Integer(b)) => {
            Value::Integer(a.checked_mul(b).ok_or_else(overflow)?)
        }
        (BinaryOp::Div | BinaryOp::Rem, Value::Integer(_), Value::Integer(0)) => {
            return Err(ExpressionError::Arithmetic("division by zero".to_string()))
        }
        (BinaryOp::Div, Value::Integer(a), Value::Integer(b)) => {
            Value::Integer(a.checked_div(b).ok_or_else(overflow)?)
        }
        (BinaryOp::Rem, Value::Integer(a), Value::Integer(b)) => {
            Value::Integer(a.checked_rem(b).ok_or_else(overflow)?)
        }
        (BinaryOp::Add, Value::Sequence(mut a), Value::Sequence(b)) => {
            a.extend(b);
            Value::Sequence(a)
        }
        (BinaryOp::Add, lhs @ Value::String(_), rhs) | (BinaryOp::Add, lhs, rhs @ Value::String(_)) => {
            Value::String(format!("{}{}", lhs, rhs))
        }
        (BinaryOp::Mul, Value::String(s), Value::Integer(n)) => {
            let n = usize::try_from(n)
                .map_err(|_| ExpressionError::Arithmetic("negative repeat count".to_string()))?;
            Value::String(s.repeat(n))
        }
        (op, lhs, rhs) => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
            }),
            _ => {
                return Err(ExpressionError::Type(format!(
                    "unsupported operands {} and {} for {:?}",
                    lhs.type_name(),
                    rhs.type_name(),
                    op
                )))
            }
        },
    };
    Ok(result)
}

/// Whether `text` contains an embedded expression: `#{`, at least one
/// character, then `}`.
pub fn has_expression(text: &str) -> bool {
    let mut rest = text;
    while let Some(start) = rest.find("#{") {
        let after = &rest[start + 2..];
        if after.find('}').is_some_and(|end| end > 0) {
            return true;
        }
        rest = after;
    }
    false
}

/// Replace every `#{...}` in `template` with the rendered result of its
/// expression. `\#{` stays a literal `#{`.
pub fn interpolate(
    template: &str,
    engine: &dyn ExpressionEngine,
    context: &mut dyn EvaluationContext,
) -> Result<String, ExpressionError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("#{") {
        if rest[..start].ends_with('\\') {
            out.push_str(&rest[..start - 1]);
            out.push_str("#{");
            rest = &rest[start + 2..];
            continue;
        }
        out.push_str(&rest[..start]);
        let body = &rest[start + 2..];
        let end = closing_brace(body).ok_or_else(|| {
            ExpressionError::Syntax(format!("unterminated expression in `{}`", template))
        })?;
        let source = &body[..end];
        if !source.trim().is_empty() {
            let value = engine.evaluate(source, context)?;
            out.push_str(&value.to_string());
        }
        rest = &body[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Byte offset of the `}` closing an expression body, skipping nested
/// braces and quoted strings.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Evaluate `expression` against a mapping whose values are already final.
pub fn evaluate_in(
    engine: &dyn ExpressionEngine,
    expression: &str,
    values: &Mapping,
) -> Result<Value, ExpressionError> {
    let mut context = StaticContext { values };
    engine.evaluate(expression, &mut context)
}

/// Context over a mapping whose values are already final.
struct StaticContext<'m> {
    values: &'m Mapping,
}

impl EvaluationContext for StaticContext<'_> {
    fn get(&mut self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    fn index(&mut self, index: i64) -> Option<Value> {
        self.values.get(&index.to_string()).cloned()
    }

    fn root(&mut self, name: &str) -> Option<Value> {
        self.get(name)
    }
}
