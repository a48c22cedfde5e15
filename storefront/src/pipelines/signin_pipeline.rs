// storefront/src/pipelines/signin_pipeline.rs
use crate::errors::AppError;
use crate::models::user::normalize_email;
use crate::models::UserRole;
use crate::pipelines::contexts::{SigninAudience, SigninCtxData};
use crate::services::auth_service;
use crate::state::AppState;
use chrono::Utc;
use std::sync::Arc;
use storefront_flow::{ContextData, Pipeline, PipelineControl, Registry, SkipCondition};
use tracing::{info, instrument, warn};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// One pipeline serves both login forms. The role check only runs for the
/// back office.
pub fn register_signin_pipeline(registry: &Registry<AppError>, _app_state: &AppState) {
  let customer_login: SkipCondition<SigninCtxData> = Arc::new(|ctx_data: ContextData<SigninCtxData>| {
    let audience = ctx_data.read().audience;
    audience == SigninAudience::Customer
  });

  let mut p = Pipeline::<SigninCtxData, AppError>::new(&[
    ("validate_signin_input", false, None),
    ("fetch_user_by_email", false, None),
    ("verify_user_password", false, None),
    ("require_admin_role", false, Some(customer_login)),
    ("issue_session_token", false, None),
  ]);

  p.on_root("validate_signin_input", validate_signin_input);
  p.on_root("fetch_user_by_email", fetch_user_by_email);
  p.on_root("verify_user_password", verify_user_password);
  p.on_root("require_admin_role", require_admin_role);
  p.on_root("issue_session_token", issue_session_token);

  registry.register_pipeline(p);
  tracing::info!("Sign-in pipeline registered.");
}

async fn validate_signin_input(ctx_data: ContextData<SigninCtxData>) -> Result<PipelineControl, AppError> {
  let mut guard = ctx_data.write();
  let email = normalize_email(&guard.email);
  if email.is_empty() || guard.password.is_empty() {
    return Err(AppError::Validation("Email and password are required".to_string()));
  }
  guard.email = email;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "signin_step::fetch_user_by_email", skip(ctx_data), err(Display))]
async fn fetch_user_by_email(ctx_data: ContextData<SigninCtxData>) -> Result<PipelineControl, AppError> {
  let (store, email) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.email.clone())
  };

  match store.find_user_by_email(&email).await? {
    Some(user) => {
      ctx_data.write().user = Some(user);
      Ok(PipelineControl::Continue)
    }
    None => {
      warn!(%email, "Sign-in for an unknown email.");
      Err(AppError::Auth(INVALID_CREDENTIALS.to_string()))
    }
  }
}

#[instrument(name = "signin_step::verify_user_password", skip(ctx_data), err(Display))]
async fn verify_user_password(ctx_data: ContextData<SigninCtxData>) -> Result<PipelineControl, AppError> {
  let (stored_hash, password, user_id) = {
    let mut guard = ctx_data.write();
    let password = std::mem::take(&mut guard.password);
    let user = guard
      .user
      .as_ref()
      .ok_or_else(|| AppError::Internal("Account not loaded before password check".to_string()))?;
    (user.password_hash.clone(), password, user.id)
  };

  let matches = tokio::task::spawn_blocking(move || auth_service::verify_password(&stored_hash, &password))
    .await
    .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))??;
  if !matches {
    warn!(%user_id, "Password mismatch on sign-in.");
    return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
  }
  Ok(PipelineControl::Continue)
}

async fn require_admin_role(ctx_data: ContextData<SigninCtxData>) -> Result<PipelineControl, AppError> {
  let account = ctx_data.read().user.as_ref().map(|user| (user.id, user.role));
  match account {
    Some((_, UserRole::Admin)) => Ok(PipelineControl::Continue),
    Some((user_id, _)) => {
      warn!(%user_id, "Non-admin account used on the back-office login.");
      Err(AppError::Forbidden("Admin access required".to_string()))
    }
    None => Err(AppError::Internal("Account not loaded before role check".to_string())),
  }
}

async fn issue_session_token(ctx_data: ContextData<SigninCtxData>) -> Result<PipelineControl, AppError> {
  let mut guard = ctx_data.write();
  let user = guard
    .user
    .as_ref()
    .ok_or_else(|| AppError::Internal("Account not loaded before issuing a session".to_string()))?;
  let token = auth_service::issue_session_token(&guard.app_state.config.jwt_secret, user, Utc::now())?;
  info!(user_id = %user.id, role = user.role.as_str(), "Session issued.");
  guard.session_token = Some(token);
  Ok(PipelineControl::Continue)
}
