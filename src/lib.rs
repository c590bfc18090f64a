//! shapecheck
//!
//! Build-time type resolution and validator generation for record types.
//! A build registers field types into a plan accumulator, resolves them once
//! into primitive shapes, and generates one validator per record.

pub mod backend;
pub mod config;
pub mod feedback;
pub mod frontend;
pub mod middle;
pub mod pipeline;
pub mod runtime;
pub mod stdlib;
pub mod types;
pub mod utils;

pub use backend::{Generator, ValidatorSet, ValidatorUnit};
pub use config::Config;
pub use middle::{Plan, PlanHandle, PlanRegistry, Resolution};
pub use pipeline::{BuildOutput, Pipeline};
pub use utils::{Error, Result};
