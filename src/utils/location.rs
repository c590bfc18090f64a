//! Source location tracking

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in a user source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Source file path, as reported by the extraction step
    pub file: String,
    /// 1-based line number (0 when unknown)
    pub line: u32,
}

impl SourceLocation {
    /// Create a new location
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self { file: file.into(), line }
    }

    /// Create a dummy location (for testing)
    pub fn dummy() -> Self {
        Self { file: String::from("nofile"), line: 0 }
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::dummy()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.file)
        } else {
            write!(f, "{}:{}", self.file, self.line)
        }
    }
}

/// Where a resolution error originates: the record module, its source file
/// and the field being resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Origin {
    pub module: String,
    pub file: Option<String>,
    pub field: Option<String>,
}

impl Origin {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            file: None,
            field: None,
        }
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}: ", file)?;
        }
        write!(f, "{}", self.module)?;
        if let Some(field) = &self.field {
            write!(f, ".{}", field)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_display() {
        let origin = Origin::new("Shop.Order")
            .with_file(Some("lib/shop/order.ex".to_string()))
            .with_field("total");
        assert_eq!(origin.to_string(), "lib/shop/order.ex: Shop.Order.total");
        assert_eq!(Origin::new("Shop.Order").to_string(), "Shop.Order");
    }

    #[test]
    fn test_location_display() {
        assert_eq!(SourceLocation::new("lib/a.ex", 12).to_string(), "lib/a.ex:12");
        assert_eq!(SourceLocation::new("lib/a.ex", 0).to_string(), "lib/a.ex");
    }
}
