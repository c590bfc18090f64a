//! Shape matcher and the structured errors validators produce
//!
//! Every generated field routine bottoms out here: `check_single` for fields
//! with one alternative, `check_alternatives` for unions, and
//! `check_record_precondition` for the record-level predicate.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::predicate::PredicateTable;
use super::value::Value;
use crate::backend::ValidatorSet;
use crate::types::{Precondition, ResolvedShape, Shape};

/// Everything a validator needs at check time
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub predicates: &'a PredicateTable,
    /// Validators used when a shape delegates to another record
    pub validators: &'a ValidatorSet,
}

impl<'a> ValidationContext<'a> {
    pub fn new(predicates: &'a PredicateTable, validators: &'a ValidatorSet) -> Self {
        Self {
            predicates,
            validators,
        }
    }
}

/// A failed field or record check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// None for the record-level precondition
    pub field: Option<String>,
    pub value: Value,
    /// Description of every shape that was tried
    pub expected: Vec<String>,
    pub messages: Vec<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "{}: ", field)?;
        }
        write!(f, "expected {}, got {}", self.expected.join(" | "), self.value)?;
        if !self.messages.is_empty() {
            write!(f, " ({})", self.messages.join("; "))?;
        }
        Ok(())
    }
}

/// Why a value did not match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// Structural mismatch
    Shape(String),
    /// Structure matched, the predicate rejected it
    Precondition(String),
}

impl Mismatch {
    fn shape(shape: &Shape, value: &Value) -> Self {
        Self::Shape(format!("{} is not {}", value, shape))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Shape(m) | Self::Precondition(m) => m,
        }
    }
}

/// Check `value` against one alternative and its precondition
pub fn match_resolved(resolved: &ResolvedShape, value: &Value, ctx: &ValidationContext<'_>) -> Result<(), Mismatch> {
    match_shape(&resolved.shape, value, ctx)?;
    match &resolved.precondition {
        Some(pre) => ctx.predicates.evaluate(pre, value).map_err(Mismatch::Precondition),
        None => Ok(()),
    }
}

/// Structural match of `value` against `shape`
pub fn match_shape(shape: &Shape, value: &Value, ctx: &ValidationContext<'_>) -> Result<(), Mismatch> {
    let ok = match (shape, value) {
        (Shape::Any, _) => true,
        (Shape::Atom(name), Value::Atom(actual)) => name == actual,
        (Shape::AnyAtom, Value::Atom(_)) => true,
        (Shape::Integer(n), Value::Integer(actual)) => n == actual,
        (Shape::IntRange(lo, hi), Value::Integer(n)) => lo <= n && n <= hi,
        (Shape::AnyInteger, Value::Integer(_)) => true,
        (Shape::PosInteger, Value::Integer(n)) => *n > 0,
        (Shape::NonNegInteger, Value::Integer(n)) => *n >= 0,
        (Shape::NegInteger, Value::Integer(n)) => *n < 0,
        (Shape::Float, Value::Float(_)) => true,
        (Shape::Bitstring { size, unit }, Value::Binary(bytes)) => bit_length_matches(bytes.len(), *size, *unit),
        (Shape::Pid, Value::Pid(_)) | (Shape::Port, Value::Port(_)) | (Shape::Reference, Value::Reference(_)) => true,
        (Shape::EmptyList, Value::List(items)) => items.is_empty(),
        (Shape::List { elem, non_empty }, Value::List(items)) => {
            if *non_empty && items.is_empty() {
                return Err(Mismatch::Shape(format!("{} is empty, expected {}", value, shape)));
            }
            for (i, item) in items.iter().enumerate() {
                match_shape(elem, item, ctx).map_err(|m| nested(m, &format!("element {}", i)))?;
            }
            true
        }
        (Shape::EmptyMap, Value::Map(entries)) => entries.is_empty(),
        (Shape::Map { key, value: value_shape }, Value::Map(entries)) => {
            for (k, v) in entries {
                match_shape(key, k, ctx).map_err(|m| nested(m, &format!("key {}", k)))?;
                match_shape(value_shape, v, ctx).map_err(|m| nested(m, &format!("value at {}", k)))?;
            }
            true
        }
        (Shape::MapFields(fields), Value::Map(entries)) => {
            if entries.len() != fields.len() {
                return Err(Mismatch::shape(shape, value));
            }
            for (name, field_shape) in fields {
                let key = Value::atom(name);
                let found = entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v);
                match found {
                    Some(v) => match_shape(field_shape, v, ctx).map_err(|m| nested(m, &format!("key {}", name)))?,
                    None => return Err(Mismatch::Shape(format!("{} is missing key {}", value, name))),
                }
            }
            true
        }
        (Shape::EmptyTuple, Value::Tuple(items)) => items.is_empty(),
        (Shape::AnyTuple, Value::Tuple(_)) => true,
        (Shape::Tuple(shapes), Value::Tuple(items)) => {
            if shapes.len() != items.len() {
                return Err(Mismatch::shape(shape, value));
            }
            for (i, (elem, item)) in shapes.iter().zip(items).enumerate() {
                match_shape(elem, item, ctx).map_err(|m| nested(m, &format!("element {}", i)))?;
            }
            true
        }
        (Shape::Function { arity }, Value::Function { arity: actual }) => arity.map_or(true, |n| n == *actual),
        (Shape::Record(module), Value::Record { module: actual, .. }) => {
            if module != actual {
                return Err(Mismatch::shape(shape, value));
            }
            // Records outside this validator set are checked by module only
            if let Some(unit) = ctx.validators.get(module) {
                unit.validate_record(value, ctx).map_err(|errors| {
                    let joined: Vec<String> = errors.iter().map(ToString::to_string).collect();
                    Mismatch::Shape(format!("%{}{{}} is invalid: {}", module, joined.join("; ")))
                })?;
            }
            true
        }
        (Shape::Guarded { shape, precondition }, _) => {
            match_shape(shape, value, ctx)?;
            ctx.predicates.evaluate(precondition, value).map_err(Mismatch::Precondition)?;
            true
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Mismatch::shape(shape, value))
    }
}

fn nested(mismatch: Mismatch, at: &str) -> Mismatch {
    match mismatch {
        Mismatch::Shape(m) => Mismatch::Shape(format!("{}: {}", at, m)),
        Mismatch::Precondition(m) => Mismatch::Precondition(format!("{}: {}", at, m)),
    }
}

/// Byte-aligned binaries only: bit length is `bytes * 8`
fn bit_length_matches(bytes: usize, size: u32, unit: u32) -> bool {
    let bits = bytes as u64 * 8;
    let size = u64::from(size);
    if unit == 0 {
        bits == size
    } else {
        bits >= size && (bits - size) % u64::from(unit) == 0
    }
}

/// Routine for a field with exactly one alternative
pub fn check_single(
    field: &str,
    value: &Value,
    resolved: &ResolvedShape,
    ctx: &ValidationContext<'_>,
) -> Result<(), ValidationError> {
    match match_resolved(resolved, value, ctx) {
        Ok(()) => Ok(()),
        Err(mismatch) => {
            let messages = match mismatch {
                Mismatch::Precondition(message) => vec![message],
                Mismatch::Shape(_) => Vec::new(),
            };
            Err(ValidationError {
                field: Some(field.to_string()),
                value: value.clone(),
                expected: vec![resolved.to_string()],
                messages,
            })
        }
    }
}

/// Routine for a union: succeeds on the first matching alternative,
/// otherwise reports one message per alternative tried
pub fn check_alternatives(
    field: &str,
    value: &Value,
    alternatives: &[ResolvedShape],
    ctx: &ValidationContext<'_>,
) -> Result<(), ValidationError> {
    let mut messages = Vec::with_capacity(alternatives.len());
    for alternative in alternatives {
        match match_resolved(alternative, value, ctx) {
            Ok(()) => return Ok(()),
            Err(mismatch) => messages.push(mismatch.message().to_string()),
        }
    }
    Err(ValidationError {
        field: Some(field.to_string()),
        value: value.clone(),
        expected: alternatives.iter().map(ToString::to_string).collect(),
        messages,
    })
}

/// Run the record-level precondition over the whole record value
pub fn check_record_precondition(
    value: &Value,
    precondition: &Precondition,
    ctx: &ValidationContext<'_>,
) -> Result<(), ValidationError> {
    ctx.predicates
        .evaluate(precondition, value)
        .map_err(|message| ValidationError {
            field: None,
            value: value.clone(),
            expected: vec![precondition.description.clone()],
            messages: vec![message],
        })
}
