//! Type model shared by the resolver, the plan and the generator

pub mod precondition;
pub mod shape;
pub mod type_expr;

pub use precondition::{Precondition, PreconditionDescriptor, PredicateRef};
pub use shape::{FieldSpec, ResolvedShape, Shape};
pub use type_expr::{Builtin, ContainerKind, Literal, TypeExpr};
