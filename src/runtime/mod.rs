//! Runtime side of generated validators: values, predicates, matching

mod check;
mod ensure;
mod predicate;
mod value;

pub use check::{
    check_alternatives, check_record_precondition, check_single, match_resolved, match_shape, Mismatch,
    ValidationContext, ValidationError,
};
pub use ensure::{ensure_defaults, ensure_record, run_request, CheckMode};
pub use predicate::{PredicateFn, PredicateOutcome, PredicateTable};
pub use value::Value;
