//! Resolver
//!
//! Rewrites every pending field type of a plan into an ordered, deduplicated
//! list of resolved shapes. Performs:
//! - remote/user type dereferencing with cycle detection
//! - precondition propagation along reference chains, with conflict detection
//! - cartesian expansion of container arguments, capped
//! - "treat as any" overrides
//!
//! Errors are collected for the whole plan rather than returned on the first
//! bad field.

use indexmap::{IndexMap, IndexSet};
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::plan::{Plan, RemoteAsAny};
use crate::frontend::{ModuleTable, PreconditionRegistry, TypeDecl, RECORD_TYPE_NAME};
use crate::stdlib::BuiltinRegistry;
use crate::types::*;
use crate::utils::{Error, Origin};

/// Default cap on the number of combinations a single container may expand to
pub const DEFAULT_COMBINATION_LIMIT: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    pub combination_limit: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            combination_limit: DEFAULT_COMBINATION_LIMIT,
        }
    }
}

/// Output of one resolution pass
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resolution {
    /// Record module to its resolved fields
    pub specs: IndexMap<String, FieldSpec>,
    /// Every error found, in discovery order
    pub errors: Vec<Error>,
    /// Record module to the modules its field types dereference
    pub deps: IndexMap<String, IndexSet<String>>,
}

impl Resolution {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Result of resolving one record module
#[derive(Debug, Clone)]
struct RecordOutcome {
    module: String,
    spec: FieldSpec,
    errors: Vec<Error>,
    deps: IndexSet<String>,
}

/// Per-field resolution state
struct Walk<'w> {
    consumer: &'w str,
    origin: Origin,
    errors: Vec<Error>,
    deps: IndexSet<String>,
    /// `(module, type)` pairs currently being expanded
    stack: Vec<(String, String)>,
}

impl<'w> Walk<'w> {
    fn new(consumer: &'w str, origin: Origin) -> Self {
        Self {
            consumer,
            origin,
            errors: Vec::new(),
            deps: IndexSet::new(),
            stack: Vec::new(),
        }
    }
}

enum Lookup<'a> {
    Found(&'a TypeDecl),
    TypeMissing,
    ModuleMissing,
}

/// Resolver over one plan and its read-only lookup tables
pub struct Resolver<'a> {
    config: ResolverConfig,
    builtins: BuiltinRegistry,
    plan: &'a Plan,
    table: &'a dyn ModuleTable,
    preconditions: &'a PreconditionRegistry,
    remote_as_any: &'a RemoteAsAny,
    resolvable_records: &'a IndexSet<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        config: ResolverConfig,
        plan: &'a Plan,
        table: &'a dyn ModuleTable,
        preconditions: &'a PreconditionRegistry,
        remote_as_any: &'a RemoteAsAny,
        resolvable_records: &'a IndexSet<String>,
    ) -> Self {
        Self {
            config,
            builtins: BuiltinRegistry::new(),
            plan,
            table,
            preconditions,
            remote_as_any,
            resolvable_records,
        }
    }

    /// Resolve every record module of the plan.
    ///
    /// Records are resolved in parallel; specs, errors and dependency edges
    /// come back in plan registration order.
    pub fn resolve(&self) -> Resolution {
        let modules: Vec<&String> = self.plan.record_modules().collect();
        let outcomes: Vec<RecordOutcome> = modules
            .par_iter()
            .map(|module| self.resolve_record(module))
            .collect();

        let mut resolution = Resolution::default();
        for outcome in outcomes {
            resolution.errors.extend(outcome.errors);
            if !outcome.deps.is_empty() {
                resolution.deps.insert(outcome.module.clone(), outcome.deps);
            }
            resolution.specs.insert(outcome.module, outcome.spec);
        }
        info!(
            "resolved {} record(s) with {} error(s)",
            resolution.specs.len(),
            resolution.errors.len()
        );
        resolution
    }

    fn resolve_record(&self, module: &str) -> RecordOutcome {
        let file = self.plan.file_of(module).map(str::to_string);
        let mut spec = FieldSpec {
            fields: IndexMap::new(),
            precondition: self.precondition_of(module, RECORD_TYPE_NAME),
            file: file.clone(),
        };
        let mut errors = Vec::new();
        let mut deps = IndexSet::new();

        if let Some(fields) = self.plan.pending_field_types.get(module) {
            for (field, decl) in fields {
                let origin = Origin::new(module).with_file(file.clone()).with_field(field);
                let mut walk = Walk::new(module, origin);
                let shapes = self.expand(&mut walk, module, &decl.ty, None);
                debug!("{}.{} :: {} -> {} shape(s)", module, field, decl.ty, shapes.len());
                errors.extend(walk.errors);
                deps.extend(walk.deps);
                spec.fields.insert(field.clone(), dedup(shapes));
            }
        }

        RecordOutcome {
            module: module.to_string(),
            spec,
            errors,
            deps,
        }
    }

    /// Resolve a single type expression as if declared in `module`
    pub fn resolve_expr(&self, module: &str, ty: &TypeExpr) -> Result<Vec<ResolvedShape>, Vec<Error>> {
        let origin = Origin::new(module).with_file(self.plan.file_of(module).map(str::to_string));
        let mut walk = Walk::new(module, origin);
        let shapes = self.expand(&mut walk, module, ty, None);
        if walk.errors.is_empty() {
            Ok(dedup(shapes))
        } else {
            Err(walk.errors)
        }
    }

    /// Expand `ty` in the scope of `scope` (the module user references
    /// resolve against), carrying at most one precondition.
    fn expand(
        &self,
        walk: &mut Walk,
        scope: &str,
        ty: &TypeExpr,
        pre: Option<Precondition>,
    ) -> Vec<ResolvedShape> {
        match ty {
            TypeExpr::Any => vec![ResolvedShape::with(Shape::Any, pre)],

            TypeExpr::Builtin(builtin) => match self.builtins.get(*builtin) {
                Some(entry) => {
                    if pre.is_some() && !entry.accepts_precondition() {
                        self.unsupported(walk, pre, ty);
                        return vec![];
                    }
                    entry
                        .shapes
                        .iter()
                        .map(|shape| ResolvedShape::with(shape.clone(), pre.clone()))
                        .collect()
                }
                None => {
                    walk.errors.push(Error::TypeNotFound {
                        reference: ty.to_string(),
                        origin: walk.origin.clone(),
                    });
                    vec![]
                }
            },

            TypeExpr::Range { lo, hi } => vec![ResolvedShape::with(Shape::IntRange(*lo, *hi), pre)],

            TypeExpr::Literal(literal) => {
                if pre.is_some() {
                    self.unsupported(walk, pre, ty);
                    return vec![];
                }
                let shape = match literal {
                    Literal::Atom(name) => Shape::Atom(name.clone()),
                    Literal::Integer(n) => Shape::Integer(*n),
                    Literal::EmptyList => Shape::EmptyList,
                    Literal::EmptyMap => Shape::EmptyMap,
                    Literal::EmptyTuple => Shape::EmptyTuple,
                };
                vec![ResolvedShape::plain(shape)]
            }

            TypeExpr::Union(left, right) => {
                if pre.is_some() {
                    self.unsupported(walk, pre, ty);
                    return vec![];
                }
                let mut shapes = self.expand(walk, scope, left, None);
                shapes.extend(self.expand(walk, scope, right, None));
                shapes
            }

            TypeExpr::Container(ContainerKind::Bitstring { size, unit }, _) => vec![ResolvedShape::with(
                Shape::Bitstring {
                    size: *size,
                    unit: *unit,
                },
                pre,
            )],

            TypeExpr::Container(kind, args) => {
                if pre.is_some() {
                    self.unsupported(walk, pre, ty);
                    return vec![];
                }
                self.expand_container(walk, scope, ty, kind, args)
            }

            TypeExpr::RecordRef(module) => {
                let equipped = self.resolvable_records.contains(module)
                    || self.plan.pending_field_types.contains_key(module)
                    || self.table.is_equipped(module);
                if !equipped {
                    walk.errors.push(Error::UnresolvableRecordReference {
                        module: module.clone(),
                        origin: walk.origin.clone(),
                    });
                    return vec![];
                }
                if module != walk.consumer {
                    walk.deps.insert(module.clone());
                }
                vec![ResolvedShape::with(Shape::Record(module.clone()), pre)]
            }

            TypeExpr::UserRef { name, args } => self.dereference(walk, scope, name, args, ty, pre),

            TypeExpr::RemoteRef { module, name, args } => {
                self.dereference(walk, module, name, args, ty, pre)
            }
        }
    }

    fn expand_container(
        &self,
        walk: &mut Walk,
        scope: &str,
        ty: &TypeExpr,
        kind: &ContainerKind,
        args: &[TypeExpr],
    ) -> Vec<ResolvedShape> {
        let mut alternatives = Vec::with_capacity(args.len());
        let mut failed = false;
        for arg in args {
            let resolved = dedup(self.expand(walk, scope, arg, None));
            failed |= resolved.is_empty();
            alternatives.push(resolved);
        }
        if failed {
            return vec![];
        }

        let count = alternatives
            .iter()
            .fold(1usize, |acc, alts| acc.saturating_mul(alts.len()));
        if count > self.config.combination_limit {
            walk.errors.push(Error::CombinationLimitExceeded {
                reference: ty.to_string(),
                count,
                limit: self.config.combination_limit,
                origin: walk.origin.clone(),
            });
            return vec![];
        }

        cartesian(&alternatives)
            .into_iter()
            .map(|combo| ResolvedShape::plain(construct(kind, combo)))
            .collect()
    }

    /// Follow a user or remote reference into its declared body
    fn dereference(
        &self,
        walk: &mut Walk,
        module: &str,
        name: &str,
        args: &[TypeExpr],
        reference: &TypeExpr,
        pre: Option<Precondition>,
    ) -> Vec<ResolvedShape> {
        if self.remote_as_any.matches(walk.consumer, module, name) {
            return vec![ResolvedShape::with(Shape::Any, pre)];
        }

        let key = (module.to_string(), name.to_string());
        if walk.stack.contains(&key) {
            let mut chain: Vec<String> = walk
                .stack
                .iter()
                .map(|(m, n)| format!("{}.{}", m, n))
                .collect();
            chain.push(format!("{}.{}", module, name));
            walk.errors.push(Error::RecursiveType {
                reference: reference.to_string(),
                chain,
                origin: walk.origin.clone(),
            });
            return vec![];
        }

        let decl = match self.find_decl(module, name) {
            Lookup::Found(decl) => decl,
            Lookup::TypeMissing => {
                walk.errors.push(Error::TypeNotFound {
                    reference: reference.to_string(),
                    origin: walk.origin.clone(),
                });
                return vec![];
            }
            Lookup::ModuleMissing => {
                walk.errors.push(Error::ModuleUnavailable {
                    module: module.to_string(),
                    reference: reference.to_string(),
                    origin: walk.origin.clone(),
                });
                return vec![];
            }
        };

        if !args.is_empty() || !decl.params.is_empty() {
            walk.errors.push(Error::ParametricType {
                reference: reference.to_string(),
                origin: walk.origin.clone(),
            });
            return vec![];
        }

        let carried = match (pre, self.precondition_of(module, name)) {
            (Some(first), Some(second)) => {
                walk.errors.push(Error::PreconditionConflict {
                    reference: reference.to_string(),
                    first: first.to_string(),
                    second: second.to_string(),
                    origin: walk.origin.clone(),
                });
                return vec![];
            }
            (Some(first), None) => Some(first),
            (None, own) => own,
        };

        if module != walk.consumer {
            walk.deps.insert(module.to_string());
        }

        walk.stack.push(key);
        let shapes = self.expand(walk, module, &decl.body, carried);
        walk.stack.pop();
        shapes
    }

    /// A module that registered preconditions in this plan replaces the
    /// table's descriptors for that module wholesale
    fn precondition_of(&self, module: &str, name: &str) -> Option<Precondition> {
        if self.preconditions.has_module(module) {
            return self.preconditions.get(module, name).cloned();
        }
        self.table
            .preconditions(module)
            .iter()
            .rev()
            .find(|d| d.type_name == name)
            .map(|d| d.clone().into_precondition(module))
    }

    /// Declared types of the build's own modules win over the external table
    fn find_decl(&self, module: &str, name: &str) -> Lookup<'a> {
        let env = self.plan.environments.get(module);
        if let Some(decl) = env.and_then(|ctx| ctx.types.get(name)) {
            return Lookup::Found(decl);
        }
        match self.table.lookup(module) {
            Some(types) => match types.find_type(name) {
                Some(decl) => Lookup::Found(decl),
                None => Lookup::TypeMissing,
            },
            None if env.is_some() => Lookup::TypeMissing,
            None => Lookup::ModuleMissing,
        }
    }

    fn unsupported(&self, walk: &mut Walk, pre: Option<Precondition>, ty: &TypeExpr) {
        walk.errors.push(Error::PreconditionOnUnsupportedShape {
            precondition: pre.map(|p| p.to_string()).unwrap_or_default(),
            shape: ty.to_string(),
            origin: walk.origin.clone(),
        });
    }
}

/// Resolve a whole plan in one pass
pub fn resolve(
    config: ResolverConfig,
    plan: &Plan,
    table: &dyn ModuleTable,
    preconditions: &PreconditionRegistry,
    remote_as_any: &RemoteAsAny,
    resolvable_records: &IndexSet<String>,
) -> Resolution {
    Resolver::new(config, plan, table, preconditions, remote_as_any, resolvable_records).resolve()
}

/// Drop structural duplicates, keeping first-seen order
fn dedup(shapes: Vec<ResolvedShape>) -> Vec<ResolvedShape> {
    shapes.into_iter().collect::<IndexSet<_>>().into_iter().collect()
}

/// Every combination picking one alternative per argument, first argument
/// varying slowest
fn cartesian(alternatives: &[Vec<ResolvedShape>]) -> Vec<Vec<Shape>> {
    alternatives.iter().fold(vec![vec![]], |combos, alts| {
        combos
            .iter()
            .flat_map(|prefix| {
                alts.iter().map(move |alt| {
                    let mut combo = prefix.clone();
                    combo.push(nested(alt));
                    combo
                })
            })
            .collect()
    })
}

/// A resolved argument as a nested shape, keeping its precondition
fn nested(resolved: &ResolvedShape) -> Shape {
    match &resolved.precondition {
        Some(pre) => Shape::Guarded {
            shape: Box::new(resolved.shape.clone()),
            precondition: pre.clone(),
        },
        None => resolved.shape.clone(),
    }
}

/// Build the container shape for one combination of argument shapes
fn construct(kind: &ContainerKind, combo: Vec<Shape>) -> Shape {
    let arity = combo.len();
    let mut args = combo.into_iter();
    let mut next = move || args.next().unwrap_or(Shape::Any);
    match kind {
        ContainerKind::List => Shape::List {
            elem: Box::new(next()),
            non_empty: false,
        },
        ContainerKind::NonEmptyList => Shape::List {
            elem: Box::new(next()),
            non_empty: true,
        },
        ContainerKind::Keyword => Shape::list(Shape::Tuple(vec![Shape::AnyAtom, next()])),
        ContainerKind::Map => {
            let key = next();
            let value = next();
            Shape::Map {
                key: Box::new(key),
                value: Box::new(value),
            }
        }
        ContainerKind::MapFields(names) => {
            Shape::MapFields(names.iter().map(|name| (name.clone(), next())).collect())
        }
        ContainerKind::Tuple if arity == 0 => Shape::EmptyTuple,
        ContainerKind::Tuple => Shape::Tuple((0..arity).map(|_| next()).collect()),
        ContainerKind::Function => Shape::Function { arity: Some(arity) },
        ContainerKind::Bitstring { size, unit } => Shape::Bitstring {
            size: *size,
            unit: *unit,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{ModuleTypes, StaticModuleTable};
    use crate::middle::plan::{AsAnyScope, DeclContext, FieldDecl};
    use pretty_assertions::assert_eq;

    struct Fixture {
        plan: Plan,
        table: StaticModuleTable,
        resolvable: IndexSet<String>,
        config: ResolverConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                plan: Plan::new(),
                table: StaticModuleTable::new(),
                resolvable: IndexSet::new(),
                config: ResolverConfig::default(),
            }
        }

        fn field(mut self, module: &str, field: &str, ty: TypeExpr) -> Self {
            self.plan.register_field(module, field, FieldDecl::new(ty));
            self
        }

        fn types(mut self, module: &str, decls: Vec<(&str, TypeExpr)>) -> Self {
            let mut ctx = self.plan.environments.get(module).cloned().unwrap_or_default();
            for (name, body) in decls {
                ctx = ctx.with_type(TypeDecl::new(name, body));
            }
            self.plan.register_environment(module, ctx);
            self
        }

        fn precondition(mut self, module: &str, type_name: &str, description: &str) -> Self {
            let mut descriptors = self.plan.preconditions.get(module).cloned().unwrap_or_default();
            descriptors.push(PreconditionDescriptor::new(type_name, description, description));
            self.plan.register_preconditions(module, descriptors);
            self
        }

        fn run(&self) -> Resolution {
            let preconditions = self.plan.precondition_registry();
            resolve(
                self.config,
                &self.plan,
                &self.table,
                &preconditions,
                &self.plan.remote_as_any,
                &self.resolvable,
            )
        }
    }

    fn int() -> TypeExpr {
        TypeExpr::builtin(Builtin::Integer)
    }

    fn float() -> TypeExpr {
        TypeExpr::builtin(Builtin::Float)
    }

    fn kinds(resolution: &Resolution) -> Vec<&'static str> {
        resolution.errors.iter().map(|e| e.kind()).collect()
    }

    fn field_shapes(resolution: &Resolution, module: &str, field: &str) -> Vec<Shape> {
        resolution.specs[module].fields[field]
            .iter()
            .map(|r| r.shape.clone())
            .collect()
    }

    #[test]
    fn test_union_of_scalar_and_literal() {
        let fx = Fixture::new().field("A", "x", TypeExpr::union(int(), TypeExpr::atom("ok")));
        let resolution = fx.run();
        assert!(resolution.is_ok());
        assert_eq!(
            field_shapes(&resolution, "A", "x"),
            vec![Shape::AnyInteger, Shape::atom("ok")]
        );
    }

    #[test]
    fn test_combination_limit() {
        let ty = TypeExpr::list(TypeExpr::union(int(), float()));
        let mut fx = Fixture::new().field("A", "xs", ty);

        fx.config.combination_limit = 1;
        let resolution = fx.run();
        assert_eq!(kinds(&resolution), vec!["combination_limit_exceeded"]);
        assert!(resolution.specs["A"].fields["xs"].is_empty());

        fx.config.combination_limit = 2;
        let resolution = fx.run();
        assert!(resolution.is_ok());
        assert_eq!(
            field_shapes(&resolution, "A", "xs"),
            vec![Shape::list(Shape::AnyInteger), Shape::list(Shape::Float)]
        );
    }

    #[test]
    fn test_tuple_product_order() {
        let ty = TypeExpr::tuple(vec![
            TypeExpr::union(TypeExpr::atom("a"), TypeExpr::atom("b")),
            TypeExpr::union(int(), float()),
        ]);
        let resolution = Fixture::new().field("A", "t", ty).run();
        assert_eq!(
            field_shapes(&resolution, "A", "t"),
            vec![
                Shape::Tuple(vec![Shape::atom("a"), Shape::AnyInteger]),
                Shape::Tuple(vec![Shape::atom("a"), Shape::Float]),
                Shape::Tuple(vec![Shape::atom("b"), Shape::AnyInteger]),
                Shape::Tuple(vec![Shape::atom("b"), Shape::Float]),
            ]
        );
    }

    #[test]
    fn test_dedup_keeps_first_seen() {
        let ty = TypeExpr::union_of(vec![int(), TypeExpr::builtin(Builtin::Number), int()]);
        let resolution = Fixture::new().field("A", "n", ty).run();
        assert_eq!(
            field_shapes(&resolution, "A", "n"),
            vec![Shape::AnyInteger, Shape::Float]
        );
    }

    #[test]
    fn test_precondition_on_union_rejected() {
        let fx = Fixture::new()
            .types("A", vec![("status", TypeExpr::union(TypeExpr::atom("on"), TypeExpr::atom("off")))])
            .precondition("A", "status", "valid_status")
            .field("A", "s", TypeExpr::user("status"));
        let resolution = fx.run();
        assert_eq!(kinds(&resolution), vec!["precondition_on_unsupported_shape"]);
    }

    #[test]
    fn test_precondition_on_boolean_rejected() {
        let fx = Fixture::new()
            .types("A", vec![("flag", TypeExpr::builtin(Builtin::Boolean))])
            .precondition("A", "flag", "is_true")
            .field("A", "f", TypeExpr::user("flag"));
        assert_eq!(kinds(&fx.run()), vec!["precondition_on_unsupported_shape"]);
    }

    #[test]
    fn test_precondition_on_container_rejected() {
        let fx = Fixture::new()
            .types("A", vec![("names", TypeExpr::list(TypeExpr::binary()))])
            .precondition("A", "names", "non_empty")
            .field("A", "n", TypeExpr::user("names"));
        assert_eq!(kinds(&fx.run()), vec!["precondition_on_unsupported_shape"]);
    }

    #[test]
    fn test_single_precondition_carried_through_chain() {
        let fx = Fixture::new()
            .types("Shop.Name", vec![("t", TypeExpr::binary())])
            .precondition("Shop.Name", "t", "String.length(&1) < 256")
            .types("Shop.Alias", vec![("name", TypeExpr::remote("Shop.Name", "t"))])
            .field("Shop.Order", "name", TypeExpr::remote("Shop.Alias", "name"));
        let resolution = fx.run();
        assert!(resolution.is_ok(), "{:?}", resolution.errors);
        let shapes = &resolution.specs["Shop.Order"].fields["name"];
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].shape, Shape::BINARY);
        let pre = shapes[0].precondition.as_ref().unwrap();
        assert_eq!(pre.owner_module, "Shop.Name");
        assert_eq!(pre.description, "String.length(&1) < 256");
    }

    #[test]
    fn test_two_preconditions_in_chain_conflict() {
        let fx = Fixture::new()
            .types("B", vec![("t", int())])
            .precondition("B", "t", "positive")
            .types("A", vec![("t", TypeExpr::remote("B", "t"))])
            .precondition("A", "t", "even")
            .field("R", "x", TypeExpr::remote("A", "t"));
        let resolution = fx.run();
        assert_eq!(kinds(&resolution), vec!["precondition_conflict"]);
        let message = resolution.errors[0].to_string();
        assert!(message.contains("even"));
        assert!(message.contains("positive"));
    }

    #[test]
    fn test_nested_precondition_guards_element() {
        let fx = Fixture::new()
            .types("A", vec![("small", int())])
            .precondition("A", "small", "&1 < 10")
            .field("A", "xs", TypeExpr::list(TypeExpr::user("small")));
        let resolution = fx.run();
        let shapes = field_shapes(&resolution, "A", "xs");
        match &shapes[0] {
            Shape::List { elem, .. } => match elem.as_ref() {
                Shape::Guarded { shape, precondition } => {
                    assert_eq!(shape.as_ref(), &Shape::AnyInteger);
                    assert_eq!(precondition.description, "&1 < 10");
                }
                other => panic!("expected guarded element, got {:?}", other),
            },
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_remote_as_any_short_circuits() {
        let mut fx = Fixture::new().field("A", "d", TypeExpr::remote("Decimal", "t"));
        fx.plan
            .register_remote_as_any(&AsAnyScope::Module("A".to_string()), "Decimal", vec!["t".to_string()]);
        let resolution = fx.run();
        assert!(resolution.is_ok());
        assert_eq!(field_shapes(&resolution, "A", "d"), vec![Shape::Any]);
        assert!(resolution.deps.get("A").is_none());
    }

    #[test]
    fn test_missing_module_and_type() {
        let fx = Fixture::new()
            .types("B", vec![("t", int())])
            .field("A", "x", TypeExpr::remote("Ghost", "t"))
            .field("A", "y", TypeExpr::remote("B", "missing"));
        let resolution = fx.run();
        assert_eq!(kinds(&resolution), vec!["module_unavailable", "type_not_found"]);
        assert!(resolution.errors[0].to_string().contains("Ghost.t()"));
        assert!(resolution.errors[1].to_string().contains("B.missing()"));
        assert_eq!(resolution.errors[1].origin().unwrap().field.as_deref(), Some("y"));
    }

    #[test]
    fn test_external_table_lookup_and_deps() {
        let mut fx = Fixture::new().field("A", "m", TypeExpr::remote("Money", "t"));
        fx.table.insert(ModuleTypes::new("Money").with_type(TypeDecl::new("t", int())));
        let resolution = fx.run();
        assert!(resolution.is_ok());
        assert_eq!(field_shapes(&resolution, "A", "m"), vec![Shape::AnyInteger]);
        assert!(resolution.deps["A"].contains("Money"));
    }

    #[test]
    fn test_table_precondition_used_when_plan_has_none() {
        let mut fx = Fixture::new().field("Shop.Order", "name", TypeExpr::remote("Shop.Name", "t"));
        fx.table.insert(
            ModuleTypes::new("Shop.Name")
                .with_type(TypeDecl::new("t", TypeExpr::binary()))
                .with_precondition(PreconditionDescriptor::new("t", "String.length(&1) < 256", "name_len")),
        );
        let resolution = fx.run();
        assert!(resolution.is_ok(), "{:?}", resolution.errors);
        let pre = resolution.specs["Shop.Order"].fields["name"][0].precondition.as_ref().unwrap();
        assert_eq!(pre.owner_module, "Shop.Name");
        assert_eq!(pre.predicate.0, "name_len");

        // Descriptors registered in the plan replace the table's
        let fx = fx.precondition("Shop.Name", "other", "unrelated");
        let resolution = fx.run();
        assert!(resolution.specs["Shop.Order"].fields["name"][0].precondition.is_none());
    }

    #[test]
    fn test_record_reference() {
        let fx = Fixture::new().field("A", "item", TypeExpr::record("Shop.Item"));
        let resolution = fx.run();
        assert_eq!(kinds(&resolution), vec!["unresolvable_record_reference"]);
        assert!(resolution.errors[0].to_string().contains("Shop.Item"));

        let mut fx = Fixture::new().field("A", "item", TypeExpr::record("Shop.Item"));
        fx.resolvable.insert("Shop.Item".to_string());
        let resolution = fx.run();
        assert!(resolution.is_ok());
        assert_eq!(
            field_shapes(&resolution, "A", "item"),
            vec![Shape::Record("Shop.Item".to_string())]
        );
    }

    #[test]
    fn test_record_in_same_build_is_resolvable() {
        let fx = Fixture::new()
            .field("Shop.Item", "qty", int())
            .field("Shop.Order", "item", TypeExpr::record("Shop.Item"));
        assert!(fx.run().is_ok());
    }

    #[test]
    fn test_recursive_type_rejected() {
        let fx = Fixture::new()
            .types(
                "A",
                vec![(
                    "tree",
                    TypeExpr::union(
                        TypeExpr::atom("leaf"),
                        TypeExpr::tuple(vec![TypeExpr::user("tree"), TypeExpr::user("tree")]),
                    ),
                )],
            )
            .field("A", "root", TypeExpr::user("tree"));
        let resolution = fx.run();
        assert!(kinds(&resolution).iter().all(|k| *k == "recursive_type"));
        assert!(!resolution.errors.is_empty());
    }

    #[test]
    fn test_parametric_type_rejected() {
        let mut fx = Fixture::new().field("A", "x", TypeExpr::user("box"));
        let mut decl = TypeDecl::new("box", TypeExpr::Any);
        decl.params = vec!["t".to_string()];
        fx.plan
            .register_environment("A", DeclContext::new(Some("lib/a.ex")).with_type(decl));
        let resolution = fx.run();
        assert_eq!(kinds(&resolution), vec!["parametric_type"]);
        assert_eq!(resolution.errors[0].origin().unwrap().file.as_deref(), Some("lib/a.ex"));
    }

    #[test]
    fn test_errors_collected_across_records() {
        let fx = Fixture::new()
            .field("A", "x", TypeExpr::remote("Ghost", "t"))
            .field("B", "y", TypeExpr::record("Nowhere"))
            .field("C", "z", int());
        let resolution = fx.run();
        assert_eq!(kinds(&resolution), vec!["module_unavailable", "unresolvable_record_reference"]);
        assert_eq!(resolution.specs.keys().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let ty = TypeExpr::map(
            TypeExpr::union(TypeExpr::atom("a"), TypeExpr::builtin(Builtin::Binary)),
            TypeExpr::builtin(Builtin::Number),
        );
        let fx = Fixture::new().field("A", "m", ty.clone());
        let preconditions = fx.plan.precondition_registry();
        let resolver = Resolver::new(
            fx.config,
            &fx.plan,
            &fx.table,
            &preconditions,
            &fx.plan.remote_as_any,
            &fx.resolvable,
        );
        let first = resolver.resolve_expr("A", &ty).unwrap();
        let second = resolver.resolve_expr("A", &ty).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert_eq!(fx.run(), fx.run());
    }

    #[test]
    fn test_record_level_precondition() {
        let fx = Fixture::new()
            .field("Range", "lo", int())
            .field("Range", "hi", int())
            .precondition("Range", "t", "lo <= hi");
        let resolution = fx.run();
        let pre = resolution.specs["Range"].precondition.as_ref().unwrap();
        assert_eq!(pre.description, "lo <= hi");
    }
}
