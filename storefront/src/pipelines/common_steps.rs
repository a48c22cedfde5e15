// storefront/src/pipelines/common_steps.rs
use crate::errors::AppError;
use crate::pipelines::contexts::HasAppState;
use storefront_flow::{ContextData, PipelineControl};
use tracing::debug;

/// Nudges the notification dispatcher so freshly enqueued mail goes out
/// without waiting for the next poll.
pub async fn wake_dispatcher<T>(ctx_data: ContextData<T>) -> Result<PipelineControl, AppError>
where
  T: HasAppState + Send + Sync + 'static,
{
  let signal = ctx_data.read().app_state().dispatcher_wakeup.clone();
  signal.notify_one();
  debug!("Notification dispatcher signalled.");
  Ok(PipelineControl::Continue)
}
