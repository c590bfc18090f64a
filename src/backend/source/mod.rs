//! Source backend - readable Rust listing of each validator unit
//!
//! The listing calls into `shapecheck::runtime`, so a host crate can include
//! it and validate without the in-memory units.

mod source_gen;

pub use source_gen::{unit_file_stem, SourceEmitter};
