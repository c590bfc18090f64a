//! Structured Feedback Module
//!
//! Machine-readable build output:
//! - JSON error reports with fix suggestions
//! - Build statistics

use serde::{Deserialize, Serialize};

use crate::runtime::ValidationError;
use crate::utils::{Error, SourceLocation};

// ==================== Structured Error Report ====================

/// A structured error report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error code (e.g., "E0101")
    pub code: String,

    /// Taxonomy name, e.g. "type_not_found"
    pub kind: String,

    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    pub location: Option<Location>,

    /// Suggested fixes
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: Option<String>,
    pub module: Option<String>,
    pub field: Option<String>,
    pub line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Description of the fix
    pub message: String,

    /// Confidence in this suggestion (0.0 - 1.0)
    pub confidence: f64,
}

impl Suggestion {
    fn new(message: impl Into<String>, confidence: f64) -> Self {
        Self {
            message: message.into(),
            confidence,
        }
    }
}

// ==================== Error Conversion ====================

impl ErrorReport {
    /// Create an error report from a build error
    pub fn from_error(error: &Error) -> Self {
        let location = error.origin().map(|origin| Location {
            file: origin.file.clone(),
            module: Some(origin.module.clone()),
            field: origin.field.clone(),
            line: None,
        });
        let location = location.or_else(|| match error {
            Error::MalformedPersistedState { path, .. } | Error::Io { path, .. } => Some(Location {
                file: Some(path.clone()),
                module: None,
                field: None,
                line: None,
            }),
            _ => None,
        });

        Self {
            code: error_code(error).to_string(),
            kind: error.kind().to_string(),
            severity: Severity::Error,
            message: error.to_string(),
            location,
            suggestions: suggestions_for(error),
        }
    }

    /// Report a failed deferred construction check
    pub fn from_validation(module: &str, error: &ValidationError, at: &SourceLocation) -> Self {
        Self {
            code: "E0301".to_string(),
            kind: "invalid_value".to_string(),
            severity: Severity::Error,
            message: format!("%{}{{}}: {}", module, error),
            location: Some(Location {
                file: Some(at.file.clone()),
                module: Some(module.to_string()),
                field: error.field.clone(),
                line: (at.line > 0).then_some(at.line),
            }),
            suggestions: vec![],
        }
    }

    pub fn warning(code: &str, message: &str, location: Option<Location>) -> Self {
        Self {
            code: code.to_string(),
            kind: "warning".to_string(),
            severity: Severity::Warning,
            message: message.to_string(),
            location,
            suggestions: vec![],
        }
    }
}

fn error_code(error: &Error) -> &'static str {
    match error {
        Error::TypeNotFound { .. } => "E0101",
        Error::ModuleUnavailable { .. } => "E0102",
        Error::PreconditionConflict { .. } => "E0103",
        Error::PreconditionOnUnsupportedShape { .. } => "E0104",
        Error::CombinationLimitExceeded { .. } => "E0105",
        Error::UnresolvableRecordReference { .. } => "E0106",
        Error::RecursiveType { .. } => "E0107",
        Error::ParametricType { .. } => "E0108",
        Error::MalformedPersistedState { .. } => "E0201",
        Error::Io { .. } => "E0202",
        Error::AccumulatorStopped { .. } => "E0203",
    }
}

fn suggestions_for(error: &Error) -> Vec<Suggestion> {
    match error {
        Error::TypeNotFound { reference, .. } => vec![
            Suggestion::new(format!("Declare {} with @type in the referenced module", reference), 0.8),
            Suggestion::new("Check the spelling and arity of the type name", 0.6),
        ],
        Error::ModuleUnavailable { module, .. } => vec![
            Suggestion::new(format!("Make sure {} is compiled and its types are exported", module), 0.7),
            Suggestion::new(format!("Add {} to remote_as_any to skip checking it", module), 0.5),
        ],
        Error::PreconditionConflict { reference, .. } => vec![Suggestion::new(
            format!("Keep a single precondition along the chain of {}", reference),
            0.8,
        )],
        Error::PreconditionOnUnsupportedShape { shape, .. } => vec![Suggestion::new(
            format!("Move the precondition onto a named type that wraps {}", shape),
            0.7,
        )],
        Error::CombinationLimitExceeded { limit, .. } => vec![
            Suggestion::new("Split the union into a named type with its own precondition", 0.6),
            Suggestion::new(format!("Raise combination_limit above {}", limit), 0.4),
        ],
        Error::UnresolvableRecordReference { module, .. } => vec![
            Suggestion::new(format!("Equip {} with validation", module), 0.8),
            Suggestion::new("Wrap the reference in a user type that carries a precondition", 0.6),
        ],
        Error::RecursiveType { .. } => vec![Suggestion::new(
            "Break the cycle with a record reference or a remote_as_any override",
            0.6,
        )],
        Error::ParametricType { .. } => vec![Suggestion::new(
            "Declare a concrete, non-parametric type for the field",
            0.7,
        )],
        Error::MalformedPersistedState { .. } => vec![Suggestion::new(
            "Delete the plan directory and rebuild from scratch",
            0.9,
        )],
        Error::Io { .. } => vec![Suggestion::new("Check that the path exists and is writable", 0.5)],
        Error::AccumulatorStopped { .. } => vec![Suggestion::new(
            "Start the plan accumulator before registering or flushing",
            0.8,
        )],
    }
}

// ==================== Build Feedback ====================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    pub records: usize,
    pub fields: usize,
    pub units_written: usize,
    pub deferred_checks: usize,
    pub total_time_ms: u64,
}

/// Complete feedback of one resolve run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildFeedback {
    pub success: bool,
    /// Plan directory the run consumed
    pub plan: String,
    pub diagnostics: Vec<ErrorReport>,
    pub stats: BuildStats,
}

impl BuildFeedback {
    pub fn new(plan: &str) -> Self {
        Self {
            success: true,
            plan: plan.to_string(),
            diagnostics: vec![],
            stats: BuildStats::default(),
        }
    }

    pub fn push(&mut self, report: ErrorReport) {
        if report.severity == Severity::Error {
            self.success = false;
        }
        self.diagnostics.push(report);
    }

    pub fn push_error(&mut self, error: &Error) {
        self.push(ErrorReport::from_error(error));
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Output as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
