//! Built-in Types Registry
//!
//! Maps every named built-in type to the primitive shapes it expands to.

use std::collections::HashMap;

use crate::types::{Builtin, Shape};

/// A built-in type and its expansion
#[derive(Debug, Clone)]
pub struct BuiltinType {
    pub builtin: Builtin,
    /// Primitive shapes, in matching order
    pub shapes: Vec<Shape>,
}

impl BuiltinType {
    /// Whether a precondition on this type has an unambiguous meaning.
    /// Only single-shape built-ins qualify.
    pub fn accepts_precondition(&self) -> bool {
        self.shapes.len() == 1
    }
}

/// Registry of all built-in types
pub struct BuiltinRegistry {
    types: HashMap<Builtin, BuiltinType>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            types: HashMap::new(),
        };
        registry.register_all();
        registry
    }

    fn register_all(&mut self) {
        // Top
        self.register(Builtin::Any, vec![Shape::Any]);
        self.register(Builtin::Term, vec![Shape::Any]);

        // Atoms
        self.register(Builtin::Atom, vec![Shape::AnyAtom]);
        self.register(Builtin::Module, vec![Shape::AnyAtom]);
        self.register(Builtin::Node, vec![Shape::AnyAtom]);
        self.register(Builtin::Boolean, vec![Shape::atom("true"), Shape::atom("false")]);

        // Numbers
        self.register(Builtin::Integer, vec![Shape::AnyInteger]);
        self.register(Builtin::PosInteger, vec![Shape::PosInteger]);
        self.register(Builtin::NonNegInteger, vec![Shape::NonNegInteger]);
        self.register(Builtin::NegInteger, vec![Shape::NegInteger]);
        self.register(Builtin::Float, vec![Shape::Float]);
        self.register(Builtin::Number, vec![Shape::Float, Shape::AnyInteger]);
        self.register(Builtin::Byte, vec![Shape::IntRange(0, 255)]);
        self.register(Builtin::Char, vec![Shape::IntRange(0, 0x10FFFF)]);
        self.register(Builtin::Arity, vec![Shape::IntRange(0, 255)]);
        self.register(Builtin::Timeout, vec![Shape::NonNegInteger, Shape::atom("infinity")]);

        // Binaries
        self.register(Builtin::Binary, vec![Shape::BINARY]);
        self.register(Builtin::String, vec![Shape::BINARY]);
        self.register(Builtin::Bitstring, vec![Shape::Bitstring { size: 0, unit: 1 }]);

        // Identifiers
        self.register(Builtin::Pid, vec![Shape::Pid]);
        self.register(Builtin::Port, vec![Shape::Port]);
        self.register(Builtin::Reference, vec![Shape::Reference]);
        self.register(Builtin::Identifier, vec![Shape::Pid, Shape::Port, Shape::Reference]);

        // Aggregates
        self.register(
            Builtin::Map,
            vec![Shape::Map {
                key: Box::new(Shape::Any),
                value: Box::new(Shape::Any),
            }],
        );
        self.register(Builtin::Tuple, vec![Shape::AnyTuple]);
        self.register(Builtin::List, vec![Shape::list(Shape::Any)]);
        self.register(
            Builtin::Keyword,
            vec![Shape::list(Shape::Tuple(vec![Shape::AnyAtom, Shape::Any]))],
        );
        self.register(Builtin::Function, vec![Shape::Function { arity: None }]);
        self.register(
            Builtin::Mfa,
            vec![Shape::Tuple(vec![Shape::AnyAtom, Shape::AnyAtom, Shape::IntRange(0, 255)])],
        );
    }

    fn register(&mut self, builtin: Builtin, shapes: Vec<Shape>) {
        self.types.insert(builtin, BuiltinType { builtin, shapes });
    }

    /// Get the expansion of a built-in
    pub fn get(&self, builtin: Builtin) -> Option<&BuiltinType> {
        self.types.get(&builtin)
    }

    /// Get all registered built-ins
    pub fn all(&self) -> impl Iterator<Item = &BuiltinType> {
        self.types.values()
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}
