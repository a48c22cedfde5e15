// flow/src/lib.rs

//! Asynchronous step pipelines.
//!
//! A [`Pipeline`] is an ordered list of named steps over a shared, lockable
//! context ([`ContextData`]). Each step carries `before`, `on` and `after`
//! handlers, may be optional, and may be skipped by a predicate. A step can
//! also be turned into a routed branch that dispatches to one of several
//! sub-pipelines operating on their own context type.
//!
//! Pipelines are registered in a [`Registry`] keyed by their context type, so
//! call sites only need to build a context and call `registry.run(ctx)`.

pub mod branch;
pub mod context;
pub mod control;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod step;

pub use crate::branch::BranchBuilder;
pub use crate::context::ContextData;
pub use crate::control::{PipelineControl, PipelineResult};
pub use crate::error::{FlowError, FlowResult};
pub use crate::pipeline::{Handler, Pipeline};
pub use crate::registry::Registry;
pub use crate::step::{SkipCondition, StepDef};
