//! Frontend module - declared types and preconditions handed over by the
//! extraction step

pub mod module;
pub mod precondition;

pub use module::{ModuleTable, ModuleTypes, StaticModuleTable, TypeDecl};
pub use precondition::{PreconditionRegistry, RECORD_TYPE_NAME};
