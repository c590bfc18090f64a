//! Type expressions as declared by record modules
//!
//! A `TypeExpr` is the tree produced by the extraction step for every declared
//! field type and named type. The resolver only ever reads these trees.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal values usable directly as types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Literal {
    Atom(String),
    Integer(i64),
    EmptyList,
    EmptyMap,
    EmptyTuple,
}

/// Named built-in types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Builtin {
    Any,
    Term,
    Atom,
    Boolean,
    Integer,
    PosInteger,
    NonNegInteger,
    NegInteger,
    Float,
    Number,
    Binary,
    Bitstring,
    String,
    Pid,
    Port,
    Reference,
    Identifier,
    Map,
    Tuple,
    List,
    Keyword,
    Function,
    Module,
    Node,
    Byte,
    Char,
    Arity,
    Timeout,
    Mfa,
}

impl Builtin {
    const ALL: [Builtin; 29] = [
        Self::Any, Self::Term, Self::Atom, Self::Boolean, Self::Integer,
        Self::PosInteger, Self::NonNegInteger, Self::NegInteger, Self::Float,
        Self::Number, Self::Binary, Self::Bitstring, Self::String, Self::Pid,
        Self::Port, Self::Reference, Self::Identifier, Self::Map, Self::Tuple,
        Self::List, Self::Keyword, Self::Function, Self::Module, Self::Node,
        Self::Byte, Self::Char, Self::Arity, Self::Timeout, Self::Mfa,
    ];

    /// Source name of the built-in
    pub fn name(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Term => "term",
            Self::Atom => "atom",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::PosInteger => "pos_integer",
            Self::NonNegInteger => "non_neg_integer",
            Self::NegInteger => "neg_integer",
            Self::Float => "float",
            Self::Number => "number",
            Self::Binary => "binary",
            Self::Bitstring => "bitstring",
            Self::String => "string",
            Self::Pid => "pid",
            Self::Port => "port",
            Self::Reference => "reference",
            Self::Identifier => "identifier",
            Self::Map => "map",
            Self::Tuple => "tuple",
            Self::List => "list",
            Self::Keyword => "keyword",
            Self::Function => "function",
            Self::Module => "module",
            Self::Node => "node",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Arity => "arity",
            Self::Timeout => "timeout",
            Self::Mfa => "mfa",
        }
    }

    /// Look a built-in up by its source name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|b| b.name() == name)
    }
}

/// Container kinds. Type arguments live in `TypeExpr::Container`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    /// `list(T)`
    List,
    /// `nonempty_list(T)`
    NonEmptyList,
    /// `keyword(V)`: a list of `{atom, V}` pairs
    Keyword,
    /// `%{optional(K) => V}`, args are `[K, V]`
    Map,
    /// `%{a: A, b: B}`, args are the value types in key order
    MapFields(Vec<String>),
    /// `{T1, T2, ...}`
    Tuple,
    /// `(T1, T2 -> any())`, args are the parameter types
    Function,
    /// `<<_::size, _::_*unit>>`, no args
    Bitstring { size: u32, unit: u32 },
}

/// A declared structural type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeExpr {
    Literal(Literal),
    Builtin(Builtin),
    Range { lo: i64, hi: i64 },
    Union(Box<TypeExpr>, Box<TypeExpr>),
    Container(ContainerKind, Vec<TypeExpr>),
    /// A type declared in the same module
    UserRef { name: String, args: Vec<TypeExpr> },
    /// A type declared in another module
    RemoteRef {
        module: String,
        name: String,
        args: Vec<TypeExpr>,
    },
    /// A record-shaped value of the given module
    RecordRef(String),
    Any,
}

impl TypeExpr {
    pub fn atom(name: &str) -> Self {
        Self::Literal(Literal::Atom(name.to_string()))
    }

    pub fn integer(value: i64) -> Self {
        Self::Literal(Literal::Integer(value))
    }

    pub fn builtin(b: Builtin) -> Self {
        Self::Builtin(b)
    }

    pub fn union(left: TypeExpr, right: TypeExpr) -> Self {
        Self::Union(Box::new(left), Box::new(right))
    }

    /// Right-nested union of all arms, `a | (b | c)`
    pub fn union_of(arms: Vec<TypeExpr>) -> Self {
        let mut arms = arms.into_iter().rev();
        let last = arms.next().unwrap_or(Self::Any);
        arms.fold(last, |acc, arm| Self::union(arm, acc))
    }

    pub fn list(elem: TypeExpr) -> Self {
        Self::Container(ContainerKind::List, vec![elem])
    }

    pub fn tuple(elems: Vec<TypeExpr>) -> Self {
        Self::Container(ContainerKind::Tuple, elems)
    }

    pub fn map(key: TypeExpr, value: TypeExpr) -> Self {
        Self::Container(ContainerKind::Map, vec![key, value])
    }

    pub fn map_fields(fields: Vec<(&str, TypeExpr)>) -> Self {
        let (names, values): (Vec<_>, Vec<_>) = fields
            .into_iter()
            .map(|(name, ty)| (name.to_string(), ty))
            .unzip();
        Self::Container(ContainerKind::MapFields(names), values)
    }

    pub fn binary() -> Self {
        Self::Container(ContainerKind::Bitstring { size: 0, unit: 8 }, vec![])
    }

    pub fn user(name: &str) -> Self {
        Self::UserRef {
            name: name.to_string(),
            args: vec![],
        }
    }

    pub fn remote(module: &str, name: &str) -> Self {
        Self::RemoteRef {
            module: module.to_string(),
            name: name.to_string(),
            args: vec![],
        }
    }

    pub fn record(module: &str) -> Self {
        Self::RecordRef(module.to_string())
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[TypeExpr]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", arg)?;
    }
    Ok(())
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom(name) => write!(f, ":{}", name),
            Self::Integer(n) => write!(f, "{}", n),
            Self::EmptyList => write!(f, "[]"),
            Self::EmptyMap => write!(f, "%{{}}"),
            Self::EmptyTuple => write!(f, "{{}}"),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(lit) => write!(f, "{}", lit),
            Self::Builtin(b) => write!(f, "{}()", b.name()),
            Self::Range { lo, hi } => write!(f, "{}..{}", lo, hi),
            Self::Union(left, right) => write!(f, "{} | {}", left, right),
            Self::Container(kind, args) => match kind {
                ContainerKind::List => {
                    write!(f, "list(")?;
                    write_args(f, args)?;
                    write!(f, ")")
                }
                ContainerKind::NonEmptyList => {
                    write!(f, "nonempty_list(")?;
                    write_args(f, args)?;
                    write!(f, ")")
                }
                ContainerKind::Keyword => {
                    write!(f, "keyword(")?;
                    write_args(f, args)?;
                    write!(f, ")")
                }
                ContainerKind::Map => match args.as_slice() {
                    [key, value] => write!(f, "%{{optional({}) => {}}}", key, value),
                    _ => write!(f, "map()"),
                },
                ContainerKind::MapFields(names) => {
                    write!(f, "%{{")?;
                    for (i, (name, ty)) in names.iter().zip(args).enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}: {}", name, ty)?;
                    }
                    write!(f, "}}")
                }
                ContainerKind::Tuple => {
                    write!(f, "{{")?;
                    write_args(f, args)?;
                    write!(f, "}}")
                }
                ContainerKind::Function => {
                    write!(f, "(")?;
                    write_args(f, args)?;
                    write!(f, " -> any())")
                }
                ContainerKind::Bitstring { size, unit } => match (size, unit) {
                    (0, 0) => write!(f, "<<>>"),
                    (0, unit) => write!(f, "<<_::_*{}>>", unit),
                    (size, 0) => write!(f, "<<_::{}>>", size),
                    (size, unit) => write!(f, "<<_::{}, _::_*{}>>", size, unit),
                },
            },
            Self::UserRef { name, args } => {
                write!(f, "{}(", name)?;
                write_args(f, args)?;
                write!(f, ")")
            }
            Self::RemoteRef { module, name, args } => {
                write!(f, "{}.{}(", module, name)?;
                write_args(f, args)?;
                write!(f, ")")
            }
            Self::RecordRef(module) => write!(f, "%{}{{}}", module),
            Self::Any => write!(f, "any()"),
        }
    }
}
