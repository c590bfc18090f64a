//! Validator units: the in-memory form of a generated record validator

use indexmap::IndexMap;

use crate::runtime::{check_alternatives, check_record_precondition, check_single, ValidationContext, ValidationError, Value};
use crate::types::{Precondition, ResolvedShape, Shape};

/// Named field classification queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldBucket {
    All,
    /// Excluding meta-named fields
    NonMeta,
    /// Excluding fields typed as open `any()`
    Typed,
    TypedNonMeta,
    /// Neither nullable nor open
    Required,
    RequiredNonMeta,
}

impl FieldBucket {
    pub const ALL: [FieldBucket; 6] = [
        FieldBucket::All,
        FieldBucket::NonMeta,
        FieldBucket::Typed,
        FieldBucket::TypedNonMeta,
        FieldBucket::Required,
        FieldBucket::RequiredNonMeta,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::NonMeta => "non_meta",
            Self::Typed => "typed",
            Self::TypedNonMeta => "typed_non_meta",
            Self::Required => "required",
            Self::RequiredNonMeta => "required_non_meta",
        }
    }

    fn excludes_meta(self) -> bool {
        matches!(self, Self::NonMeta | Self::TypedNonMeta | Self::RequiredNonMeta)
    }
}

/// The check generated for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRoutine {
    /// Open `any()`: always succeeds
    Skip,
    Single(ResolvedShape),
    /// Tried in resolved order, first match wins
    Alternatives(Vec<ResolvedShape>),
}

impl FieldRoutine {
    pub fn for_shapes(shapes: &[ResolvedShape]) -> Self {
        // An open alternative accepts every value, so the rest are never tried
        if shapes.is_empty() || shapes.iter().any(ResolvedShape::is_open) {
            return Self::Skip;
        }
        match shapes {
            [single] => Self::Single(single.clone()),
            _ => Self::Alternatives(shapes.to_vec()),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Skip)
    }

    /// Some alternative admits `nil`
    pub fn is_nullable(&self) -> bool {
        let nullable = |resolved: &ResolvedShape| match &resolved.shape {
            Shape::Guarded { shape, .. } => shape.is_nullable(),
            shape => shape.is_nullable(),
        };
        match self {
            Self::Skip => true,
            Self::Single(resolved) => nullable(resolved),
            Self::Alternatives(alternatives) => alternatives.iter().any(nullable),
        }
    }

    pub fn check(&self, field: &str, value: &Value, ctx: &ValidationContext<'_>) -> Result<(), ValidationError> {
        match self {
            Self::Skip => Ok(()),
            Self::Single(resolved) => check_single(field, value, resolved, ctx),
            Self::Alternatives(alternatives) => check_alternatives(field, value, alternatives, ctx),
        }
    }
}

/// Generated validator for one record module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorUnit {
    pub module: String,
    pub file: Option<String>,
    pub(crate) meta_prefix: String,
    pub(crate) routines: IndexMap<String, FieldRoutine>,
    pub(crate) precondition: Option<Precondition>,
}

impl ValidatorUnit {
    pub fn routine(&self, field: &str) -> Option<&FieldRoutine> {
        self.routines.get(field)
    }

    pub fn routines(&self) -> impl Iterator<Item = (&String, &FieldRoutine)> {
        self.routines.iter()
    }

    pub fn precondition(&self) -> Option<&Precondition> {
        self.precondition.as_ref()
    }

    pub fn is_meta(&self, field: &str) -> bool {
        !self.meta_prefix.is_empty() && field.starts_with(&self.meta_prefix)
    }

    /// Field names in a bucket, declaration order
    pub fn fields(&self, bucket: FieldBucket) -> Vec<&str> {
        self.routines
            .iter()
            .filter(|(name, routine)| {
                if bucket.excludes_meta() && self.is_meta(name) {
                    return false;
                }
                match bucket {
                    FieldBucket::All | FieldBucket::NonMeta => true,
                    FieldBucket::Typed | FieldBucket::TypedNonMeta => !routine.is_open(),
                    FieldBucket::Required | FieldBucket::RequiredNonMeta => {
                        !routine.is_open() && !routine.is_nullable()
                    }
                }
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn validate_field(&self, field: &str, value: &Value, ctx: &ValidationContext<'_>) -> Result<(), ValidationError> {
        match self.routines.get(field) {
            Some(routine) => routine.check(field, value, ctx),
            None => Err(ValidationError {
                field: Some(field.to_string()),
                value: value.clone(),
                expected: Vec::new(),
                messages: vec![format!("unknown field {} for {}", field, self.module)],
            }),
        }
    }

    /// The record-level precondition routine
    pub fn validate_precondition(&self, record: &Value, ctx: &ValidationContext<'_>) -> Result<(), ValidationError> {
        match &self.precondition {
            Some(precondition) => check_record_precondition(record, precondition, ctx),
            None => Ok(()),
        }
    }

    /// Check every given field; the record precondition runs only once all pass
    pub fn validate_fields(
        &self,
        fields: &IndexMap<String, Value>,
        ctx: &ValidationContext<'_>,
    ) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = fields
            .iter()
            .filter_map(|(name, value)| self.validate_field(name, value, ctx).err())
            .collect();
        if !errors.is_empty() {
            return Err(errors);
        }
        if self.precondition.is_some() {
            let record = Value::Record {
                module: self.module.clone(),
                fields: fields.clone(),
            };
            self.validate_precondition(&record, ctx).map_err(|e| vec![e])?;
        }
        Ok(())
    }

    pub fn validate_record(&self, value: &Value, ctx: &ValidationContext<'_>) -> Result<(), Vec<ValidationError>> {
        match value {
            Value::Record { module, fields } if *module == self.module => {
                let errors: Vec<ValidationError> = fields
                    .iter()
                    .filter_map(|(name, value)| self.validate_field(name, value, ctx).err())
                    .collect();
                if !errors.is_empty() {
                    return Err(errors);
                }
                self.validate_precondition(value, ctx).map_err(|e| vec![e])
            }
            _ => Err(vec![ValidationError {
                field: None,
                value: value.clone(),
                expected: vec![Shape::Record(self.module.clone()).to_string()],
                messages: Vec::new(),
            }]),
        }
    }
}

/// Every unit generated in one build, by module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorSet {
    units: IndexMap<String, ValidatorUnit>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: ValidatorUnit) {
        self.units.insert(unit.module.clone(), unit);
    }

    pub fn get(&self, module: &str) -> Option<&ValidatorUnit> {
        self.units.get(module)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidatorUnit> {
        self.units.values()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{PredicateOutcome, PredicateTable};
    use crate::types::PredicateRef;
    use pretty_assertions::assert_eq;

    fn plain(shapes: Vec<Shape>) -> Vec<ResolvedShape> {
        shapes.into_iter().map(ResolvedShape::plain).collect()
    }

    fn unit(precondition: Option<Precondition>) -> ValidatorUnit {
        let mut routines = IndexMap::new();
        routines.insert("id".to_string(), FieldRoutine::for_shapes(&plain(vec![Shape::PosInteger])));
        routines.insert(
            "note".to_string(),
            FieldRoutine::for_shapes(&plain(vec![Shape::BINARY, Shape::atom("nil")])),
        );
        routines.insert("extra".to_string(), FieldRoutine::for_shapes(&plain(vec![Shape::Any])));
        routines.insert("__meta__".to_string(), FieldRoutine::for_shapes(&plain(vec![Shape::AnyAtom])));
        routines.insert("__tag".to_string(), FieldRoutine::for_shapes(&plain(vec![Shape::AnyInteger])));
        ValidatorUnit {
            module: "Shop.Order".to_string(),
            file: None,
            meta_prefix: "__".to_string(),
            routines,
            precondition,
        }
    }

    #[test]
    fn test_routine_kinds() {
        assert_eq!(FieldRoutine::for_shapes(&[]), FieldRoutine::Skip);
        assert_eq!(
            FieldRoutine::for_shapes(&plain(vec![Shape::AnyInteger, Shape::Any])),
            FieldRoutine::Skip
        );
        assert!(matches!(
            FieldRoutine::for_shapes(&plain(vec![Shape::Float])),
            FieldRoutine::Single(_)
        ));
        let guarded = ResolvedShape::with(
            Shape::Any,
            Some(Precondition::new("A", "t", "x", PredicateRef::new("p"))),
        );
        assert!(matches!(
            FieldRoutine::for_shapes(&[guarded]),
            FieldRoutine::Single(_)
        ));
    }

    #[test]
    fn test_buckets() {
        let unit = unit(None);
        assert_eq!(unit.fields(FieldBucket::All), vec!["id", "note", "extra", "__meta__", "__tag"]);
        assert_eq!(unit.fields(FieldBucket::NonMeta), vec!["id", "note", "extra"]);
        assert_eq!(unit.fields(FieldBucket::Typed), vec!["id", "note", "__meta__", "__tag"]);
        assert_eq!(unit.fields(FieldBucket::TypedNonMeta), vec!["id", "note"]);
        assert_eq!(unit.fields(FieldBucket::Required), vec!["id", "__tag"]);
        assert_eq!(unit.fields(FieldBucket::RequiredNonMeta), vec!["id"]);
    }

    #[test]
    fn test_precondition_runs_after_fields() {
        let pre = Precondition::new("Shop.Order", "t", "id below 100", PredicateRef::new("small_id"));
        let unit = unit(Some(pre));
        let predicates = PredicateTable::new().with("small_id", |record| match record {
            Value::Record { fields, .. } => matches!(fields.get("id"), Some(Value::Integer(n)) if *n < 100).into(),
            _ => PredicateOutcome::Fail,
        });
        let validators = ValidatorSet::new();
        let ctx = ValidationContext::new(&predicates, &validators);

        let ok = Value::record("Shop.Order", vec![("id", Value::Integer(7)), ("note", Value::nil())]);
        assert!(unit.validate_record(&ok, &ctx).is_ok());

        let big = Value::record("Shop.Order", vec![("id", Value::Integer(700))]);
        let errors = unit.validate_record(&big, &ctx).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, None);
        assert_eq!(errors[0].messages, vec!["id below 100".to_string()]);

        // Field errors short-circuit the record precondition
        let bad = Value::record("Shop.Order", vec![("id", Value::Integer(-1)), ("note", Value::Integer(1))]);
        let errors = unit.validate_record(&bad, &ctx).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_deref()).collect();
        assert_eq!(fields, vec![Some("id"), Some("note")]);
    }

    #[test]
    fn test_wrong_record_and_unknown_field() {
        let unit = unit(None);
        let predicates = PredicateTable::new();
        let validators = ValidatorSet::new();
        let ctx = ValidationContext::new(&predicates, &validators);

        let errors = unit.validate_record(&Value::record("Shop.Item", vec![]), &ctx).unwrap_err();
        assert_eq!(errors[0].expected, vec!["%Shop.Order{}".to_string()]);

        let err = unit.validate_field("ghost", &Value::Integer(1), &ctx).unwrap_err();
        assert_eq!(err.messages, vec!["unknown field ghost for Shop.Order".to_string()]);
    }

    #[test]
    fn test_nested_record_delegation() {
        let mut set = ValidatorSet::new();
        set.insert(unit(None));
        let mut routines = IndexMap::new();
        routines.insert(
            "order".to_string(),
            FieldRoutine::for_shapes(&plain(vec![Shape::Record("Shop.Order".to_string())])),
        );
        let parent = ValidatorUnit {
            module: "Shop.Invoice".to_string(),
            file: None,
            meta_prefix: "__".to_string(),
            routines,
            precondition: None,
        };
        let predicates = PredicateTable::new();
        let ctx = ValidationContext::new(&predicates, &set);

        let good = Value::record("Shop.Order", vec![("id", Value::Integer(1))]);
        assert!(parent.validate_field("order", &good, &ctx).is_ok());
        let bad = Value::record("Shop.Order", vec![("id", Value::Integer(0))]);
        assert!(parent.validate_field("order", &bad, &ctx).is_err());
    }
}
