//! Module Type Tables
//!
//! Read-only lookup of the named types each module declares. The tables are
//! produced by the extraction step; the resolver only consumes them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::types::{PreconditionDescriptor, TypeExpr};
use crate::utils::{Error, Result, SourceLocation};

/// A named type declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    /// Type parameters; any non-empty list is rejected at resolution time
    #[serde(default)]
    pub params: Vec<String>,
    pub body: TypeExpr,
    #[serde(default)]
    pub location: Option<SourceLocation>,
}

impl TypeDecl {
    pub fn new(name: &str, body: TypeExpr) -> Self {
        Self {
            name: name.to_string(),
            params: vec![],
            body,
            location: None,
        }
    }
}

/// Everything known about one module's declared types
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleTypes {
    pub module: String,
    #[serde(default)]
    pub file: Option<String>,
    /// Declared named types, in declaration order
    #[serde(default)]
    pub types: IndexMap<String, TypeDecl>,
    /// Preconditions attached to the declared types
    #[serde(default)]
    pub preconditions: Vec<PreconditionDescriptor>,
    /// The module already carries a generated validator
    #[serde(default)]
    pub equipped: bool,
}

impl ModuleTypes {
    pub fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, decl: TypeDecl) -> Self {
        self.types.insert(decl.name.clone(), decl);
        self
    }

    pub fn with_precondition(mut self, descriptor: PreconditionDescriptor) -> Self {
        self.preconditions.push(descriptor);
        self
    }

    pub fn equipped(mut self) -> Self {
        self.equipped = true;
        self
    }

    /// Find a declared type by name
    pub fn find_type(&self, name: &str) -> Option<&TypeDecl> {
        self.types.get(name)
    }
}

/// Lookup of declared types by module
pub trait ModuleTable: Send + Sync {
    /// Types declared by `module`, or `None` if the module cannot be inspected
    fn lookup(&self, module: &str) -> Option<&ModuleTypes>;

    /// Precondition descriptors attached to `module`'s types
    fn preconditions(&self, module: &str) -> &[PreconditionDescriptor] {
        self.lookup(module).map(|m| m.preconditions.as_slice()).unwrap_or(&[])
    }

    /// Whether `module` already has a generated validator
    fn is_equipped(&self, module: &str) -> bool {
        self.lookup(module).map(|m| m.equipped).unwrap_or(false)
    }
}

/// In-memory module table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticModuleTable {
    modules: IndexMap<String, ModuleTypes>,
}

impl StaticModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, types: ModuleTypes) {
        self.modules.insert(types.module.clone(), types);
    }

    pub fn with(mut self, types: ModuleTypes) -> Self {
        self.insert(types);
        self
    }

    /// Load a table from a JSON file holding a list of `ModuleTypes`
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let modules: Vec<ModuleTypes> =
            serde_json::from_str(&source).map_err(|e| Error::malformed(path, e))?;
        let mut table = Self::new();
        for module in modules {
            table.insert(module);
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleTable for StaticModuleTable {
    fn lookup(&self, module: &str) -> Option<&ModuleTypes> {
        self.modules.get(module)
    }
}
