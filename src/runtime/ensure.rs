//! Construction-time checks of record literals and field defaults
//!
//! During a build the validators do not exist yet, so checks are deferred
//! into the plan and run by the pipeline after generation. Outside a build
//! they run immediately against an existing validator set.

use indexmap::IndexMap;

use super::check::{ValidationContext, ValidationError};
use super::value::Value;
use crate::middle::{EnsureRequest, PlanHandle};
use crate::utils::SourceLocation;

/// When a construction check runs
#[derive(Debug, Clone, Copy)]
pub enum CheckMode<'a> {
    /// Record it in the live plan
    Defer(&'a PlanHandle),
    Immediate(&'a ValidationContext<'a>),
}

/// Check the field values of a record literal
pub fn ensure_record(
    mode: CheckMode<'_>,
    module: &str,
    fields: IndexMap<String, Value>,
    location: SourceLocation,
) -> Result<(), Vec<ValidationError>> {
    match mode {
        CheckMode::Defer(handle) => {
            handle.register_struct_check(EnsureRequest {
                module: module.to_string(),
                fields,
                location,
            });
            Ok(())
        }
        CheckMode::Immediate(ctx) => check_now(ctx, module, &fields),
    }
}

/// Check the declared default values of a record's fields
pub fn ensure_defaults(
    mode: CheckMode<'_>,
    module: &str,
    defaults: IndexMap<String, Value>,
    location: SourceLocation,
) -> Result<(), Vec<ValidationError>> {
    match mode {
        CheckMode::Defer(handle) => {
            handle.register_default_check(EnsureRequest {
                module: module.to_string(),
                fields: defaults,
                location,
            });
            Ok(())
        }
        CheckMode::Immediate(ctx) => check_now(ctx, module, &defaults),
    }
}

/// Run a deferred request against generated validators
pub fn run_request(ctx: &ValidationContext<'_>, request: &EnsureRequest) -> Result<(), Vec<ValidationError>> {
    check_now(ctx, &request.module, &request.fields)
}

fn check_now(
    ctx: &ValidationContext<'_>,
    module: &str,
    fields: &IndexMap<String, Value>,
) -> Result<(), Vec<ValidationError>> {
    match ctx.validators.get(module) {
        Some(unit) => unit.validate_fields(fields, ctx),
        None => Err(vec![ValidationError {
            field: None,
            value: Value::atom(module),
            expected: vec![format!("a validator for {}", module)],
            messages: vec![format!("no validator generated for {}", module)],
        }]),
    }
}
