//! Utility module

mod error;
mod location;

pub use error::{Error, Result};
pub use location::{Origin, SourceLocation};
