// flow/src/step.rs

use crate::context::ContextData;
use std::sync::Arc;

/// Evaluated before a step runs. Returning `true` skips the step.
pub type SkipCondition<T> = Arc<dyn Fn(ContextData<T>) -> bool + Send + Sync + 'static>;

#[derive(Clone)]
pub struct StepDef<T: 'static + Send + Sync> {
  pub name: String,
  /// Optional steps may have no handlers, and their failures are logged and swallowed.
  pub optional: bool,
  pub skip_if: Option<SkipCondition<T>>,
}

impl<T: 'static + Send + Sync> std::fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("optional", &self.optional)
      .field("skip_if_present", &self.skip_if.is_some())
      .finish()
  }
}
