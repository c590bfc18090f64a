//! Backend module - validator generation

pub mod codegen;
pub mod generator;
pub mod source;
pub mod validator;

pub use codegen::UnitEmitter;
pub use generator::{write_units, Generator, DEFAULT_META_PREFIX};
pub use source::SourceEmitter;
pub use validator::{FieldBucket, FieldRoutine, ValidatorSet, ValidatorUnit};
