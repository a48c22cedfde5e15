// flow/src/pipeline/hooks.rs

use super::definition::{Handler, Pipeline};
use crate::context::ContextData;
use crate::control::PipelineControl;
use crate::error::FlowError;
use std::future::Future;
use std::pin::Pin;

type HandlerFuture<E> = Pin<Box<dyn Future<Output = Result<PipelineControl, E>> + Send>>;

impl<T, E> Pipeline<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn before_root<F, UserErr>(&mut self, step_name: &str, handler_fn: impl Fn(ContextData<T>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<PipelineControl, UserErr>> + Send + 'static,
    UserErr: Into<E> + Send + 'static,
  {
    self.ensure_step_exists(step_name);
    let handler = wrap_handler(handler_fn);
    self.before.entry(step_name.to_string()).or_default().push(handler);
  }

  pub fn on_root<F, UserErr>(&mut self, step_name: &str, handler_fn: impl Fn(ContextData<T>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<PipelineControl, UserErr>> + Send + 'static,
    UserErr: Into<E> + Send + 'static,
  {
    self.ensure_step_exists(step_name);
    let handler = wrap_handler(handler_fn);
    self.on.entry(step_name.to_string()).or_default().push(handler);
  }

  pub fn after_root<F, UserErr>(&mut self, step_name: &str, handler_fn: impl Fn(ContextData<T>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<PipelineControl, UserErr>> + Send + 'static,
    UserErr: Into<E> + Send + 'static,
  {
    self.ensure_step_exists(step_name);
    let handler = wrap_handler(handler_fn);
    self.after.entry(step_name.to_string()).or_default().push(handler);
  }
}

fn wrap_handler<T, E, F, UserErr>(handler_fn: impl Fn(ContextData<T>) -> F + Send + Sync + 'static) -> Handler<T, E>
where
  T: 'static + Send + Sync,
  E: Send + 'static,
  F: Future<Output = Result<PipelineControl, UserErr>> + Send + 'static,
  UserErr: Into<E> + Send + 'static,
{
  Box::new(move |ctx_data: ContextData<T>| -> HandlerFuture<E> {
    let fut = handler_fn(ctx_data);
    Box::pin(async move { fut.await.map_err(Into::into) })
  })
}
