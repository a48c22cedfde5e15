// flow/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("No pipeline registered for context type {type_name}")]
  NotRegistered { type_name: String },

  #[error("Context type mismatch (expected {expected_type})")]
  TypeMismatch { expected_type: String },

  #[error("Extractor failed for step '{step_name}': {source}")]
  ExtractorFailure {
    step_name: String,
    #[source]
    source: AnyhowError,
  },

  #[error("Handler failed: {source}")]
  Handler {
    #[source]
    source: AnyhowError,
  },
}

impl From<AnyhowError> for FlowError {
  fn from(err: AnyhowError) -> Self {
    match err.downcast::<FlowError>() {
      Ok(flow_err) => flow_err,
      Err(source) => FlowError::Handler { source },
    }
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
