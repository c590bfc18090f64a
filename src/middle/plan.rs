//! Build plan: everything registered during the first pass of a build,
//! waiting for the single resolution pass.
//!
//! Merge rules, shared by live registration and by merging a persisted plan:
//! - field types, environments and precondition lists overwrite per key
//! - struct checks and default checks append in arrival order
//! - "treat as any" overrides are unioned per module

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::frontend::{PreconditionRegistry, TypeDecl};
use crate::runtime::Value;
use crate::types::{PreconditionDescriptor, TypeExpr};
use crate::utils::SourceLocation;

/// A declared field type and where it was declared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub ty: TypeExpr,
    pub location: Option<SourceLocation>,
}

impl FieldDecl {
    pub fn new(ty: TypeExpr) -> Self {
        Self { ty, location: None }
    }

    pub fn at(ty: TypeExpr, location: SourceLocation) -> Self {
        Self {
            ty,
            location: Some(location),
        }
    }
}

/// Declaration context of a module compiled during this build
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeclContext {
    pub file: Option<String>,
    /// Named types declared by the module
    pub types: IndexMap<String, TypeDecl>,
}

impl DeclContext {
    pub fn new(file: Option<&str>) -> Self {
        Self {
            file: file.map(str::to_string),
            types: IndexMap::new(),
        }
    }

    pub fn with_type(mut self, decl: TypeDecl) -> Self {
        self.types.insert(decl.name.clone(), decl);
        self
    }
}

/// A record construction whose field values must be checked once the
/// validators exist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsureRequest {
    pub module: String,
    pub fields: IndexMap<String, Value>,
    pub location: SourceLocation,
}

impl EnsureRequest {
    pub fn new(module: &str, fields: Vec<(&str, Value)>, location: SourceLocation) -> Self {
        Self {
            module: module.to_string(),
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            location,
        }
    }
}

/// Who a "treat as any" override applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AsAnyScope {
    Global,
    /// Only references made from this consuming module
    Module(String),
}

/// Remote types to resolve as `any()` without dereferencing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteAsAny {
    global: IndexMap<String, IndexSet<String>>,
    per_module: IndexMap<String, IndexMap<String, IndexSet<String>>>,
}

impl RemoteAsAny {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add overrides for `module`'s types `names`, set-union with existing ones
    pub fn add<I, S>(&mut self, scope: &AsAnyScope, module: &str, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let target = match scope {
            AsAnyScope::Global => &mut self.global,
            AsAnyScope::Module(consumer) => self.per_module.entry(consumer.clone()).or_default(),
        };
        target
            .entry(module.to_string())
            .or_default()
            .extend(names.into_iter().map(Into::into));
    }

    /// Whether a reference from `consumer` to `module.name` resolves as `any()`
    pub fn matches(&self, consumer: &str, module: &str, name: &str) -> bool {
        let hit = |table: &IndexMap<String, IndexSet<String>>| {
            table.get(module).map(|names| names.contains(name)).unwrap_or(false)
        };
        hit(&self.global) || self.per_module.get(consumer).map(hit).unwrap_or(false)
    }

    pub fn merge(&mut self, other: &RemoteAsAny) {
        for (module, names) in &other.global {
            self.add(&AsAnyScope::Global, module, names.iter().cloned());
        }
        for (consumer, modules) in &other.per_module {
            let scope = AsAnyScope::Module(consumer.clone());
            for (module, names) in modules {
                self.add(&scope, module, names.iter().cloned());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.per_module.is_empty()
    }
}

/// The accumulated, mergeable state of one build
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Plan {
    /// module -> field -> declared type
    pub pending_field_types: IndexMap<String, IndexMap<String, FieldDecl>>,
    /// module -> declaration context
    pub environments: IndexMap<String, DeclContext>,
    /// module -> precondition descriptors declared by it
    pub preconditions: IndexMap<String, Vec<PreconditionDescriptor>>,
    /// Literal constructions checked after resolution
    pub structs_to_ensure: Vec<EnsureRequest>,
    /// Field default values checked after resolution
    pub struct_defaults_to_ensure: Vec<EnsureRequest>,
    pub remote_as_any: RemoteAsAny,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_field(&mut self, module: &str, field: &str, decl: FieldDecl) {
        self.pending_field_types
            .entry(module.to_string())
            .or_default()
            .insert(field.to_string(), decl);
    }

    pub fn register_environment(&mut self, module: &str, context: DeclContext) {
        self.environments.insert(module.to_string(), context);
    }

    pub fn register_preconditions(&mut self, module: &str, descriptors: Vec<PreconditionDescriptor>) {
        self.preconditions.insert(module.to_string(), descriptors);
    }

    pub fn register_struct_check(&mut self, request: EnsureRequest) {
        self.structs_to_ensure.push(request);
    }

    pub fn register_default_check(&mut self, request: EnsureRequest) {
        self.struct_defaults_to_ensure.push(request);
    }

    pub fn register_remote_as_any(&mut self, scope: &AsAnyScope, module: &str, names: Vec<String>) {
        self.remote_as_any.add(scope, module, names);
    }

    /// Apply every registration of `other` on top of this plan
    pub fn merge(&mut self, other: Plan) {
        for (module, fields) in other.pending_field_types {
            for (field, decl) in fields {
                self.register_field(&module, &field, decl);
            }
        }
        for (module, context) in other.environments {
            self.register_environment(&module, context);
        }
        for (module, descriptors) in other.preconditions {
            self.register_preconditions(&module, descriptors);
        }
        self.structs_to_ensure.extend(other.structs_to_ensure);
        self.struct_defaults_to_ensure.extend(other.struct_defaults_to_ensure);
        self.remote_as_any.merge(&other.remote_as_any);
    }

    /// Build a precondition registry from the registered descriptors
    pub fn precondition_registry(&self) -> PreconditionRegistry {
        let mut registry = PreconditionRegistry::new();
        for (module, descriptors) in &self.preconditions {
            registry.extend_module(module, descriptors);
        }
        registry
    }

    /// Record modules with pending field types, in registration order
    pub fn record_modules(&self) -> impl Iterator<Item = &String> {
        self.pending_field_types.keys()
    }

    pub fn file_of(&self, module: &str) -> Option<&str> {
        self.environments.get(module).and_then(|ctx| ctx.file.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.pending_field_types.is_empty()
            && self.environments.is_empty()
            && self.preconditions.is_empty()
            && self.structs_to_ensure.is_empty()
            && self.struct_defaults_to_ensure.is_empty()
            && self.remote_as_any.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Builtin;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_field_registration_overwrites() {
        let mut plan = Plan::new();
        plan.register_field("A", "x", FieldDecl::new(TypeExpr::builtin(Builtin::Integer)));
        plan.register_field("A", "y", FieldDecl::new(TypeExpr::atom("ok")));
        plan.register_field("A", "x", FieldDecl::new(TypeExpr::builtin(Builtin::Float)));

        let fields = &plan.pending_field_types["A"];
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["x"].ty, TypeExpr::builtin(Builtin::Float));
        let order: Vec<_> = fields.keys().collect();
        assert_eq!(order, vec!["x", "y"]);
    }

    #[test]
    fn test_struct_checks_append() {
        let mut plan = Plan::new();
        plan.register_struct_check(EnsureRequest::new(
            "A",
            vec![("x", Value::Integer(1))],
            SourceLocation::new("a.ex", 1),
        ));
        plan.register_struct_check(EnsureRequest::new(
            "A",
            vec![("x", Value::Integer(2))],
            SourceLocation::new("a.ex", 2),
        ));
        assert_eq!(plan.structs_to_ensure.len(), 2);
        assert_eq!(plan.structs_to_ensure[1].location.line, 2);
    }

    #[test]
    fn test_remote_as_any_scopes() {
        let mut overrides = RemoteAsAny::new();
        overrides.add(&AsAnyScope::Global, "Ecto.Schema", vec!["t"]);
        overrides.add(&AsAnyScope::Module("Shop.Order".to_string()), "Decimal", vec!["t"]);

        assert!(overrides.matches("Anyone", "Ecto.Schema", "t"));
        assert!(overrides.matches("Shop.Order", "Decimal", "t"));
        assert!(!overrides.matches("Shop.Item", "Decimal", "t"));
        assert!(!overrides.matches("Shop.Order", "Decimal", "other"));
    }

    #[test]
    fn test_merge_applies_rules() {
        let mut base = Plan::new();
        base.register_field("A", "x", FieldDecl::new(TypeExpr::builtin(Builtin::Integer)));
        base.register_default_check(EnsureRequest::new("A", vec![], SourceLocation::dummy()));
        base.register_remote_as_any(&AsAnyScope::Global, "M", vec!["a".to_string()]);

        let mut newer = Plan::new();
        newer.register_field("A", "x", FieldDecl::new(TypeExpr::atom("ok")));
        newer.register_default_check(EnsureRequest::new("B", vec![], SourceLocation::dummy()));
        newer.register_remote_as_any(&AsAnyScope::Global, "M", vec!["b".to_string(), "a".to_string()]);

        base.merge(newer);
        assert_eq!(base.pending_field_types["A"]["x"].ty, TypeExpr::atom("ok"));
        assert_eq!(base.struct_defaults_to_ensure.len(), 2);
        assert!(base.remote_as_any.matches("X", "M", "a"));
        assert!(base.remote_as_any.matches("X", "M", "b"));
    }

    #[test]
    fn test_precondition_registry_from_plan() {
        let mut plan = Plan::new();
        plan.register_preconditions(
            "Shop.Name",
            vec![PreconditionDescriptor::new("t", "short", "name_len")],
        );
        let registry = plan.precondition_registry();
        assert_eq!(registry.get("Shop.Name", "t").unwrap().description, "short");
    }
}
