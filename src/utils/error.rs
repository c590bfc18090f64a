//! Error handling for shapecheck

use crate::utils::Origin;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Resolution, storage and generation errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    // ==================== Resolution Errors ====================

    #[error("{origin}: unknown type {reference}")]
    TypeNotFound { reference: String, origin: Origin },

    #[error("{origin}: module {module} is not available for inspection (referenced as {reference})")]
    ModuleUnavailable {
        module: String,
        reference: String,
        origin: Origin,
    },

    #[error("{origin}: type {reference} carries two preconditions along its reference chain: {first} and {second}")]
    PreconditionConflict {
        reference: String,
        first: String,
        second: String,
        origin: Origin,
    },

    #[error("{origin}: precondition {precondition} cannot be attached to {shape}; only references and scalar types may own a precondition")]
    PreconditionOnUnsupportedShape {
        precondition: String,
        shape: String,
        origin: Origin,
    },

    #[error("{origin}: {reference} expands to {count} combinations, over the limit of {limit}")]
    CombinationLimitExceeded {
        reference: String,
        count: usize,
        limit: usize,
        origin: Origin,
    },

    #[error("{origin}: record {module} has no validator; equip {module} with validation or reference it through a user type with a precondition")]
    UnresolvableRecordReference { module: String, origin: Origin },

    #[error("{origin}: type {reference} is recursive ({})", .chain.join(" -> "))]
    RecursiveType {
        reference: String,
        chain: Vec<String>,
        origin: Origin,
    },

    #[error("{origin}: parametric type {reference} is not supported")]
    ParametricType { reference: String, origin: Origin },

    // ==================== Storage & Generation Errors ====================

    #[error("Malformed persisted state in {path}: {reason}")]
    MalformedPersistedState { path: String, reason: String },

    #[error("IO error at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Plan accumulator for {plan} is not running")]
    AccumulatorStopped { plan: String },
}

impl Error {
    /// Snake-case name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TypeNotFound { .. } => "type_not_found",
            Self::ModuleUnavailable { .. } => "module_unavailable",
            Self::PreconditionConflict { .. } => "precondition_conflict",
            Self::PreconditionOnUnsupportedShape { .. } => "precondition_on_unsupported_shape",
            Self::CombinationLimitExceeded { .. } => "combination_limit_exceeded",
            Self::UnresolvableRecordReference { .. } => "unresolvable_record_reference",
            Self::RecursiveType { .. } => "recursive_type",
            Self::ParametricType { .. } => "parametric_type",
            Self::MalformedPersistedState { .. } => "malformed_persisted_state",
            Self::Io { .. } => "io_failure",
            Self::AccumulatorStopped { .. } => "accumulator_stopped",
        }
    }

    /// Get the origin associated with this error
    pub fn origin(&self) -> Option<&Origin> {
        match self {
            Self::TypeNotFound { origin, .. }
            | Self::ModuleUnavailable { origin, .. }
            | Self::PreconditionConflict { origin, .. }
            | Self::PreconditionOnUnsupportedShape { origin, .. }
            | Self::CombinationLimitExceeded { origin, .. }
            | Self::UnresolvableRecordReference { origin, .. }
            | Self::RecursiveType { origin, .. }
            | Self::ParametricType { origin, .. } => Some(origin),
            Self::MalformedPersistedState { .. } | Self::Io { .. } | Self::AccumulatorStopped { .. } => None,
        }
    }

    pub(crate) fn io(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn malformed(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::MalformedPersistedState {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}
