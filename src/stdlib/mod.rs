//! Built-in type definitions

pub mod builtins;

pub use builtins::BuiltinRegistry;
