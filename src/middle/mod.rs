//! Middle-end - build plan accumulation, storage and type resolution

pub mod accumulator;
pub mod plan;
pub mod resolver;
pub mod store;

pub use accumulator::{PlanHandle, PlanRegistry};
pub use plan::{AsAnyScope, DeclContext, EnsureRequest, FieldDecl, Plan, RemoteAsAny};
pub use resolver::{resolve, Resolution, Resolver, ResolverConfig, DEFAULT_COMBINATION_LIMIT};
pub use store::{PlanStore, PreconditionDescriptions};
