//! Precondition Registry
//!
//! Preconditions keyed by owner module and type name.

use indexmap::IndexMap;

use crate::types::{Precondition, PreconditionDescriptor};

/// Name of the type whose precondition applies to the whole record
pub const RECORD_TYPE_NAME: &str = "t";

#[derive(Debug, Clone, Default)]
pub struct PreconditionRegistry {
    by_module: IndexMap<String, IndexMap<String, Precondition>>,
}

impl PreconditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the descriptors declared by `module`. A later descriptor for
    /// the same type name replaces the earlier one.
    pub fn extend_module(&mut self, module: &str, descriptors: &[PreconditionDescriptor]) {
        let entry = self.by_module.entry(module.to_string()).or_default();
        for descriptor in descriptors {
            entry.insert(
                descriptor.type_name.clone(),
                descriptor.clone().into_precondition(module),
            );
        }
    }

    /// Whether `module` registered any descriptors, even an empty list
    pub fn has_module(&self, module: &str) -> bool {
        self.by_module.contains_key(module)
    }

    /// Precondition attached to `module`'s type `type_name`
    pub fn get(&self, module: &str, type_name: &str) -> Option<&Precondition> {
        self.by_module.get(module).and_then(|types| types.get(type_name))
    }

    /// Owner module to type name to description, the persisted form
    pub fn descriptions(&self) -> IndexMap<String, IndexMap<String, String>> {
        self.by_module
            .iter()
            .map(|(module, types)| {
                let described = types
                    .iter()
                    .map(|(name, pre)| (name.clone(), pre.description.clone()))
                    .collect();
                (module.clone(), described)
            })
            .collect()
    }
}
