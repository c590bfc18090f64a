//! Runtime values checked by generated validators

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamically typed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Atom(String),
    Integer(i64),
    Float(f64),
    Binary(Vec<u8>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Pid(u64),
    Port(u64),
    Reference(u64),
    Function { arity: usize },
    Record {
        module: String,
        fields: IndexMap<String, Value>,
    },
}

impl Value {
    pub fn atom(name: &str) -> Self {
        Self::Atom(name.to_string())
    }

    pub fn nil() -> Self {
        Self::atom("nil")
    }

    pub fn string(s: &str) -> Self {
        Self::Binary(s.as_bytes().to_vec())
    }

    pub fn record(module: &str, fields: Vec<(&str, Value)>) -> Self {
        Self::Record {
            module: module.to_string(),
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    /// The binary as UTF-8 text, if it is valid
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Binary(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom(name) if name == "nil" || name == "true" || name == "false" => {
                write!(f, "{}", name)
            }
            Self::Atom(name) => write!(f, ":{}", name),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(x) => write!(f, "{:?}", x),
            Self::Binary(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => write!(f, "{:?}", text),
                Err(_) => {
                    write!(f, "<<")?;
                    for (i, byte) in bytes.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", byte)?;
                    }
                    write!(f, ">>")
                }
            },
            Self::List(items) => {
                write!(f, "[")?;
                write_seq(f, items)?;
                write!(f, "]")
            }
            Self::Tuple(items) => {
                write!(f, "{{")?;
                write_seq(f, items)?;
                write!(f, "}}")
            }
            Self::Map(entries) => {
                write!(f, "%{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} => {}", key, value)?;
                }
                write!(f, "}}")
            }
            Self::Pid(id) => write!(f, "#PID<0.{}.0>", id),
            Self::Port(id) => write!(f, "#Port<0.{}>", id),
            Self::Reference(id) => write!(f, "#Reference<0.{}>", id),
            Self::Function { arity } => write!(f, "#Function<{}>", arity),
            Self::Record { module, fields } => {
                write!(f, "%{}{{", module)?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}
