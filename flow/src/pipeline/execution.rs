// flow/src/pipeline/execution.rs

use super::definition::Pipeline;
use crate::context::ContextData;
use crate::control::{PipelineControl, PipelineResult};
use crate::error::FlowError;
use crate::step::StepDef;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

impl<T, E> Pipeline<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step in order against `ctx_data`.
  ///
  /// A failing optional step is logged and the run continues with the next
  /// step. A failing required step aborts the run with its error.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(context_type = %std::any::type_name::<T>(), num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<T>) -> Result<PipelineResult, E> {
    debug!("Pipeline execution starting.");

    for (step_index, step) in self.steps.iter().enumerate() {
      let span = info_span!(
        "pipeline_step",
        step_name = %step.name,
        step_index,
        optional = step.optional
      );

      match self.run_step(step, ctx_data.clone()).instrument(span).await {
        Ok(PipelineControl::Continue) => {}
        Ok(PipelineControl::Stop) => {
          info!(step_name = %step.name, "Pipeline stopped.");
          return Ok(PipelineResult::Stopped);
        }
        Err(e) if step.optional => {
          warn!(step_name = %step.name, error = %e, "Optional step failed, continuing.");
        }
        Err(e) => {
          error!(step_name = %step.name, error = %e, "Step failed.");
          return Err(e);
        }
      }
    }

    debug!("Pipeline execution completed.");
    Ok(PipelineResult::Completed)
  }

  async fn run_step(&self, step: &StepDef<T>, ctx_data: ContextData<T>) -> Result<PipelineControl, E> {
    if let Some(skip_if) = &step.skip_if {
      if skip_if(ctx_data.clone()) {
        debug!("Step skipped by condition.");
        return Ok(PipelineControl::Continue);
      }
    }

    let phases = [
      ("before", self.before.get(&step.name)),
      ("on", self.on.get(&step.name)),
      ("after", self.after.get(&step.name)),
    ];

    if phases.iter().all(|(_, handlers)| handlers.map_or(true, |h| h.is_empty())) {
      if step.optional {
        debug!("Optional step has no handlers, skipping.");
        return Ok(PipelineControl::Continue);
      }
      return Err(E::from(FlowError::HandlerMissing {
        step_name: step.name.clone(),
      }));
    }

    for (phase, handlers) in phases {
      for handler in handlers.into_iter().flatten() {
        if handler(ctx_data.clone()).await? == PipelineControl::Stop {
          debug!(phase, "Handler requested stop.");
          return Ok(PipelineControl::Stop);
        }
      }
    }

    Ok(PipelineControl::Continue)
  }
}
