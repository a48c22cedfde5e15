// flow/src/registry.rs

//! Type-keyed pipeline registry. Each context type has at most one pipeline.

use crate::context::ContextData;
use crate::control::PipelineResult;
use crate::error::FlowError;
use crate::pipeline::Pipeline;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

#[async_trait]
trait ErasedPipeline<E>: Send + Sync
where
  E: std::error::Error + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<PipelineResult, E>;
}

struct TypedPipeline<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pipeline: Pipeline<T, E>,
}

#[async_trait]
impl<T, E> ErasedPipeline<E> for TypedPipeline<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<PipelineResult, E> {
    let ctx_data = match ctx_obj.downcast::<ContextData<T>>() {
      Ok(boxed) => *boxed,
      Err(_) => {
        let expected_type = std::any::type_name::<ContextData<T>>().to_string();
        error!(%expected_type, "Context object type mismatch.");
        return Err(E::from(FlowError::TypeMismatch { expected_type }));
      }
    };
    self.pipeline.run(ctx_data).await
  }
}

pub struct Registry<E>
where
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pipelines: RwLock<HashMap<TypeId, Arc<dyn ErasedPipeline<E>>>>,
}

impl<E> Registry<E>
where
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      pipelines: RwLock::new(HashMap::new()),
    }
  }

  /// Registers `pipeline` for its context type, replacing any earlier one.
  pub fn register_pipeline<T>(&self, pipeline: Pipeline<T, E>)
  where
    T: 'static + Send + Sync,
  {
    debug!(context_type = %std::any::type_name::<T>(), steps = ?pipeline.step_names(), "Registering pipeline.");
    self
      .pipelines
      .write()
      .insert(TypeId::of::<T>(), Arc::new(TypedPipeline { pipeline }));
  }

  pub fn is_registered<T: 'static>(&self) -> bool {
    self.pipelines.read().contains_key(&TypeId::of::<T>())
  }

  /// Runs the pipeline registered for `T`.
  pub async fn run<T>(&self, ctx_data: ContextData<T>) -> Result<PipelineResult, E>
  where
    T: 'static + Send + Sync,
  {
    let runner = self.pipelines.read().get(&TypeId::of::<T>()).cloned();
    let runner = runner.ok_or_else(|| {
      let type_name = std::any::type_name::<T>().to_string();
      error!(%type_name, "No pipeline registered.");
      E::from(FlowError::NotRegistered { type_name })
    })?;
    runner.run_erased(Box::new(ctx_data)).await
  }
}

impl<E> Default for Registry<E>
where
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}
