//! Resolved shapes: the primitive, directly matchable alternatives a declared
//! type expands to.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::precondition::Precondition;

/// A primitive, matchable shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    Any,
    Atom(String),
    AnyAtom,
    Integer(i64),
    IntRange(i64, i64),
    AnyInteger,
    PosInteger,
    NonNegInteger,
    NegInteger,
    Float,
    /// Matches bit lengths `size + k * unit` (`unit == 0` means exactly `size`)
    Bitstring { size: u32, unit: u32 },
    Pid,
    Port,
    Reference,
    EmptyList,
    List { elem: Box<Shape>, non_empty: bool },
    EmptyMap,
    Map { key: Box<Shape>, value: Box<Shape> },
    MapFields(Vec<(String, Shape)>),
    EmptyTuple,
    AnyTuple,
    Tuple(Vec<Shape>),
    Function { arity: Option<usize> },
    /// Delegate to the validator generated for that record module
    Record(String),
    /// A nested shape that carries its own precondition, e.g. the element of
    /// `list(name())` when `name()` owns one
    Guarded {
        shape: Box<Shape>,
        precondition: Precondition,
    },
}

impl Shape {
    pub const BINARY: Shape = Shape::Bitstring { size: 0, unit: 8 };

    pub fn atom(name: &str) -> Self {
        Self::Atom(name.to_string())
    }

    pub fn list(elem: Shape) -> Self {
        Self::List {
            elem: Box::new(elem),
            non_empty: false,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// The shape admits `nil`
    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Any | Self::AnyAtom => true,
            Self::Atom(name) => name == "nil",
            _ => false,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any()"),
            Self::Atom(name) => write!(f, ":{}", name),
            Self::AnyAtom => write!(f, "atom()"),
            Self::Integer(n) => write!(f, "{}", n),
            Self::IntRange(lo, hi) => write!(f, "{}..{}", lo, hi),
            Self::AnyInteger => write!(f, "integer()"),
            Self::PosInteger => write!(f, "pos_integer()"),
            Self::NonNegInteger => write!(f, "non_neg_integer()"),
            Self::NegInteger => write!(f, "neg_integer()"),
            Self::Float => write!(f, "float()"),
            Self::Bitstring { size, unit } => match (size, unit) {
                (0, 0) => write!(f, "<<>>"),
                (0, unit) => write!(f, "<<_::_*{}>>", unit),
                (size, 0) => write!(f, "<<_::{}>>", size),
                (size, unit) => write!(f, "<<_::{}, _::_*{}>>", size, unit),
            },
            Self::Pid => write!(f, "pid()"),
            Self::Port => write!(f, "port()"),
            Self::Reference => write!(f, "reference()"),
            Self::EmptyList => write!(f, "[]"),
            Self::List { elem, non_empty: false } => write!(f, "list({})", elem),
            Self::List { elem, non_empty: true } => write!(f, "nonempty_list({})", elem),
            Self::EmptyMap => write!(f, "%{{}}"),
            Self::Map { key, value } => write!(f, "%{{optional({}) => {}}}", key, value),
            Self::MapFields(fields) => {
                write!(f, "%{{")?;
                for (i, (name, shape)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, shape)?;
                }
                write!(f, "}}")
            }
            Self::EmptyTuple => write!(f, "{{}}"),
            Self::AnyTuple => write!(f, "tuple()"),
            Self::Tuple(elems) => {
                write!(f, "{{")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, "}}")
            }
            Self::Function { arity: None } => write!(f, "function()"),
            Self::Function { arity: Some(n) } => write!(f, "function/{}", n),
            Self::Record(module) => write!(f, "%{}{{}}", module),
            Self::Guarded { shape, precondition } => {
                write!(f, "{} when {}", shape, precondition.description)
            }
        }
    }
}

/// One concrete alternative plus its optional precondition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedShape {
    pub shape: Shape,
    pub precondition: Option<Precondition>,
}

impl ResolvedShape {
    pub fn plain(shape: Shape) -> Self {
        Self {
            shape,
            precondition: None,
        }
    }

    pub fn with(shape: Shape, precondition: Option<Precondition>) -> Self {
        Self { shape, precondition }
    }

    /// Unconstrained `any()`: the field always validates
    pub fn is_open(&self) -> bool {
        self.shape.is_any() && self.precondition.is_none()
    }
}

impl fmt::Display for ResolvedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.precondition {
            Some(pre) => write!(f, "{} when {}", self.shape, pre.description),
            None => write!(f, "{}", self.shape),
        }
    }
}

/// Resolved field types of one record module
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name to its ordered, deduplicated alternatives
    pub fields: IndexMap<String, Vec<ResolvedShape>>,
    /// Record-level precondition, checked after every field passed
    pub precondition: Option<Precondition>,
    /// Source file of the record declaration, when known
    pub file: Option<String>,
}

impl FieldSpec {
    pub fn shapes(&self, field: &str) -> Option<&[ResolvedShape]> {
        self.fields.get(field).map(|s| s.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_descriptions() {
        assert_eq!(Shape::BINARY.to_string(), "<<_::_*8>>");
        assert_eq!(Shape::list(Shape::AnyInteger).to_string(), "list(integer())");
        assert_eq!(
            Shape::Tuple(vec![Shape::atom("ok"), Shape::Float]).to_string(),
            "{:ok, float()}"
        );
        assert_eq!(Shape::Function { arity: Some(2) }.to_string(), "function/2");
    }

    #[test]
    fn test_nullable() {
        assert!(Shape::atom("nil").is_nullable());
        assert!(Shape::Any.is_nullable());
        assert!(!Shape::AnyInteger.is_nullable());
    }
}
