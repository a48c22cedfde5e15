// flow/src/control.rs

/// Returned by every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineControl {
  Continue,
  /// Halt the pipeline. No further handlers run, in this step or later ones.
  Stop,
}

/// Outcome of a full run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
  Completed,
  Stopped,
}

impl From<PipelineResult> for PipelineControl {
  fn from(result: PipelineResult) -> Self {
    match result {
      PipelineResult::Completed => PipelineControl::Continue,
      PipelineResult::Stopped => PipelineControl::Stop,
    }
  }
}
