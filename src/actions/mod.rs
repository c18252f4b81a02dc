//! Named test actions and their parameter contracts

pub mod builtin;
pub mod params;
pub mod registry;

pub use params::{coerce, ParamSpec, ParamType, Params};
pub use registry::{ActionContext, ActionDefinition, ActionInfo, ActionOutcome, ActionRegistry};
