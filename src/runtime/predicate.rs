//! Predicate table: resolves opaque predicate handles to callables

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::value::Value;
use crate::types::{Precondition, PredicateRef};

/// What a predicate said about a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateOutcome {
    Pass,
    /// Failed; report the precondition's description
    Fail,
    /// Failed with an explicit message
    FailWith(String),
}

impl From<bool> for PredicateOutcome {
    fn from(ok: bool) -> Self {
        if ok {
            Self::Pass
        } else {
            Self::Fail
        }
    }
}

pub type PredicateFn = Arc<dyn Fn(&Value) -> PredicateOutcome + Send + Sync>;

/// Registered predicates by handle
#[derive(Clone, Default)]
pub struct PredicateTable {
    predicates: HashMap<PredicateRef, PredicateFn>,
}

impl PredicateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, predicate: F)
    where
        F: Fn(&Value) -> PredicateOutcome + Send + Sync + 'static,
    {
        self.predicates.insert(PredicateRef::new(name), Arc::new(predicate));
    }

    pub fn with<F>(mut self, name: &str, predicate: F) -> Self
    where
        F: Fn(&Value) -> PredicateOutcome + Send + Sync + 'static,
    {
        self.register(name, predicate);
        self
    }

    pub fn get(&self, handle: &PredicateRef) -> Option<&PredicateFn> {
        self.predicates.get(handle)
    }

    /// Run the precondition's predicate on `value`, returning the failure
    /// message if it does not hold
    pub fn evaluate(&self, precondition: &Precondition, value: &Value) -> Result<(), String> {
        let predicate = self.get(&precondition.predicate).ok_or_else(|| {
            format!(
                "no predicate registered for {} ({}.{})",
                precondition.predicate, precondition.owner_module, precondition.type_name
            )
        })?;
        match predicate(value) {
            PredicateOutcome::Pass => Ok(()),
            PredicateOutcome::Fail => Err(precondition.description.clone()),
            PredicateOutcome::FailWith(message) => Err(message),
        }
    }
}

impl fmt::Debug for PredicateTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.predicates.keys().map(|k| k.0.as_str()).collect();
        names.sort_unstable();
        f.debug_struct("PredicateTable").field("predicates", &names).finish()
    }
}
