// flow/src/branch.rs

//! Routed steps: a step whose single `on` handler picks one of several
//! sub-pipelines by condition and runs it on an extracted sub-context.

use crate::context::ContextData;
use crate::control::PipelineControl;
use crate::error::FlowError;
use crate::pipeline::Pipeline;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

type Condition<T> = Arc<dyn Fn(ContextData<T>) -> bool + Send + Sync + 'static>;
type Extractor<T, S> = Arc<dyn Fn(ContextData<T>) -> Result<ContextData<S>, FlowError> + Send + Sync + 'static>;
type BranchFuture<E> = Pin<Box<dyn Future<Output = Result<PipelineControl, E>> + Send>>;

trait BranchArm<T, E>: Send + Sync
where
  T: 'static + Send + Sync,
{
  fn label(&self) -> &str;
  fn matches(&self, ctx_data: ContextData<T>) -> bool;
  fn execute(&self, ctx_data: ContextData<T>) -> BranchFuture<E>;
}

struct Arm<T, S, E>
where
  T: 'static + Send + Sync,
  S: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  label: String,
  condition: Condition<T>,
  pipeline: Arc<Pipeline<S, E>>,
  extractor: Extractor<T, S>,
}

impl<T, S, E> BranchArm<T, E> for Arm<T, S, E>
where
  T: 'static + Send + Sync,
  S: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn label(&self) -> &str {
    &self.label
  }

  fn matches(&self, ctx_data: ContextData<T>) -> bool {
    (self.condition)(ctx_data)
  }

  fn execute(&self, ctx_data: ContextData<T>) -> BranchFuture<E> {
    let pipeline = self.pipeline.clone();
    let extracted = (self.extractor)(ctx_data);
    Box::pin(async move {
      let sub_ctx = extracted.map_err(E::from)?;
      let result = pipeline.run(sub_ctx).await?;
      Ok(PipelineControl::from(result))
    })
  }
}

/// Builder returned by [`Pipeline::branch_for_step`].
///
/// Arms are tried in registration order and the first matching condition
/// wins. When nothing matches, the step returns the no-match control
/// (`Continue` unless changed).
pub struct BranchBuilder<'p, T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pipeline: &'p mut Pipeline<T, E>,
  step_name: String,
  arms: Vec<Arc<dyn BranchArm<T, E>>>,
  on_no_match: PipelineControl,
}

impl<'p, T, E> BranchBuilder<'p, T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) fn new(pipeline: &'p mut Pipeline<T, E>, step_name: String) -> Self {
    Self {
      pipeline,
      step_name,
      arms: Vec::new(),
      on_no_match: PipelineControl::Continue,
    }
  }

  pub fn when<S>(
    mut self,
    label: &str,
    condition: impl Fn(ContextData<T>) -> bool + Send + Sync + 'static,
    pipeline: Arc<Pipeline<S, E>>,
    extractor: impl Fn(ContextData<T>) -> Result<ContextData<S>, FlowError> + Send + Sync + 'static,
  ) -> Self
  where
    S: 'static + Send + Sync,
  {
    self.arms.push(Arc::new(Arm {
      label: label.to_string(),
      condition: Arc::new(condition),
      pipeline,
      extractor: Arc::new(extractor),
    }));
    self
  }

  pub fn if_no_branch_matches(mut self, control: PipelineControl) -> Self {
    self.on_no_match = control;
    self
  }

  /// Installs the routing handler on the step.
  pub fn finalize(self) {
    let arms = Arc::new(self.arms);
    let on_no_match = self.on_no_match;
    let step_name = self.step_name.clone();

    self.pipeline.on_root(&self.step_name, move |ctx_data: ContextData<T>| {
      let arms = arms.clone();
      let step_name = step_name.clone();
      async move {
        let matched = arms.iter().find(|arm| arm.matches(ctx_data.clone())).cloned();
        match matched {
          Some(arm) => {
            debug!(step_name = %step_name, branch = arm.label(), "Branch matched.");
            arm.execute(ctx_data).await
          }
          None => {
            debug!(step_name = %step_name, "No branch matched.");
            Ok::<_, E>(on_no_match)
          }
        }
      }
    });
  }
}
