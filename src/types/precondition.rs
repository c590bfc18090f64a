//! Preconditions: user-supplied value predicates attached to named types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a predicate. The resolver never invokes it; the runtime
/// looks it up in a `PredicateTable`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PredicateRef(pub String);

impl PredicateRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for PredicateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A predicate attached to exactly one type declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Precondition {
    pub owner_module: String,
    pub type_name: String,
    /// Human-readable predicate source, also the default failure message
    pub description: String,
    pub predicate: PredicateRef,
}

impl Precondition {
    pub fn new(owner_module: &str, type_name: &str, description: &str, predicate: PredicateRef) -> Self {
        Self {
            owner_module: owner_module.to_string(),
            type_name: type_name.to_string(),
            description: description.to_string(),
            predicate,
        }
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} ({})", self.owner_module, self.type_name, self.description)
    }
}

/// A precondition as registered by its owning module, before it is keyed
/// into the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreconditionDescriptor {
    pub type_name: String,
    pub description: String,
    pub predicate: PredicateRef,
}

impl PreconditionDescriptor {
    pub fn new(type_name: &str, description: &str, predicate: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            description: description.to_string(),
            predicate: PredicateRef::new(predicate),
        }
    }

    /// Bind the descriptor to its owning module
    pub fn into_precondition(self, owner_module: &str) -> Precondition {
        Precondition {
            owner_module: owner_module.to_string(),
            type_name: self.type_name,
            description: self.description,
            predicate: self.predicate,
        }
    }
}
