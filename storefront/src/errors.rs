// storefront/src/errors.rs

use crate::models::coupon::CouponRejection;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use storefront_flow::FlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Coupon Rejected: {0}")]
  CouponRejected(CouponRejection),

  #[error("Payment Gateway Error: {0}")]
  Gateway(String),

  #[error("Mail Relay Error: {0}")]
  Mail(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),

  // A pipeline stopped early where the handler expected it to run to completion.
  #[error("Pipeline execution was halted by a handler.")]
  PipelineHaltedByHandler,
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    let err = match err.downcast::<AppError>() {
      Ok(app_err) => return app_err,
      Err(err) => err,
    };
    match err.downcast::<sqlx::Error>() {
      Ok(db_err) => AppError::Sqlx(db_err),
      Err(err) => AppError::Internal(err.to_string()),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) => StatusCode::FORBIDDEN,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Conflict(_) | AppError::PipelineHaltedByHandler => StatusCode::CONFLICT,
      AppError::CouponRejected(CouponRejection::NotFound { .. }) => StatusCode::NOT_FOUND,
      AppError::CouponRejected(_) => StatusCode::BAD_REQUEST,
      AppError::Gateway(_)
      | AppError::Mail(_)
      | AppError::Config(_)
      | AppError::Sqlx(_)
      | AppError::Workflow { .. }
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, status = status.as_u16(), "Rejecting request");
    }

    let body = match self {
      AppError::Validation(m)
      | AppError::Auth(m)
      | AppError::Forbidden(m)
      | AppError::NotFound(m)
      | AppError::Conflict(m) => json!({ "error": m }),
      AppError::CouponRejected(reason) => json!({ "error": reason.to_string() }),
      AppError::Gateway(m) => json!({ "error": "Payment provider error", "detail": m }),
      AppError::Mail(_) => json!({ "error": "Email service error" }),
      AppError::Config(_) => json!({ "error": "Configuration issue" }),
      AppError::Sqlx(_) => json!({ "error": "Database operation failed" }),
      AppError::Workflow { source } => {
        tracing::error!(flow_error_source = ?source, "Workflow error details");
        json!({ "error": "Workflow processing error" })
      }
      AppError::Internal(_) => json!({ "error": "An internal error occurred" }),
      AppError::PipelineHaltedByHandler => json!({ "error": "Process halted before completion." }),
    };
    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
