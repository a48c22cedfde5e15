// flow/src/pipeline/definition.rs

use crate::branch::BranchBuilder;
use crate::context::ContextData;
use crate::control::PipelineControl;
use crate::error::FlowError;
use crate::step::{SkipCondition, StepDef};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// A boxed step handler over `ContextData<T>`.
pub type Handler<T, E> = Box<
  dyn Fn(ContextData<T>) -> Pin<Box<dyn Future<Output = Result<PipelineControl, E>> + Send>> + Send + Sync,
>;

/// An ordered set of named steps over the context type `T`.
///
/// Handlers return `Result<PipelineControl, E>`. Framework failures such as a
/// missing handler are converted into `E` through `From<FlowError>`.
pub struct Pipeline<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<T>>,
  pub(crate) before: HashMap<String, Vec<Handler<T, E>>>,
  pub(crate) on: HashMap<String, Vec<Handler<T, E>>>,
  pub(crate) after: HashMap<String, Vec<Handler<T, E>>>,
}

impl<T, E> Pipeline<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Declares the steps as `(name, optional, skip_if)` tuples, in execution order.
  pub fn new(step_defs: &[(&str, bool, Option<SkipCondition<T>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(name, optional, skip_if)| StepDef {
        name: (*name).to_string(),
        optional: *optional,
        skip_if: skip_if.clone(),
      })
      .collect();

    Self {
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    }
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  /// Panics on an unknown step name. Step names are fixed at set-up time, so
  /// a miss is a wiring bug rather than a runtime condition.
  pub(crate) fn ensure_step_exists(&self, step_name: &str) {
    if !self.steps.iter().any(|s| s.name == step_name) {
      panic!("pipeline setup error: step '{}' is not declared", step_name);
    }
  }

  /// Turns `step_name` into a routed branch. See [`BranchBuilder`].
  pub fn branch_for_step(&mut self, step_name: &str) -> BranchBuilder<'_, T, E> {
    self.ensure_step_exists(step_name);
    BranchBuilder::new(self, step_name.to_string())
  }
}
