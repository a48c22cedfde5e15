// storefront/src/pipelines/signup_pipeline.rs
use crate::errors::AppError;
use crate::models::user::{normalize_email, MIN_PASSWORD_LEN};
use crate::models::{User, UserRole};
use crate::pipelines::contexts::SignupCtxData;
use crate::services::auth_service;
use crate::state::AppState;
use chrono::Utc;
use storefront_flow::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub fn register_signup_pipeline(registry: &Registry<AppError>, _app_state: &AppState) {
  let mut p = Pipeline::<SignupCtxData, AppError>::new(&[
    ("validate_signup_input", false, None),
    ("check_existing_user", false, None),
    ("create_user", false, None),
    ("issue_session_token", false, None),
  ]);

  p.on_root("validate_signup_input", validate_signup_input);
  p.on_root("check_existing_user", check_existing_user);
  p.on_root("create_user", create_user);
  p.on_root("issue_session_token", issue_session_token);

  registry.register_pipeline(p);
  tracing::info!("Sign-up pipeline registered.");
}

async fn validate_signup_input(ctx_data: ContextData<SignupCtxData>) -> Result<PipelineControl, AppError> {
  let mut guard = ctx_data.write();
  let email = normalize_email(&guard.email);
  if email.is_empty() || !email.contains('@') {
    warn!("Invalid email format provided for signup.");
    return Err(AppError::Validation("Valid email is required".to_string()));
  }
  if guard.password.chars().count() < MIN_PASSWORD_LEN {
    return Err(AppError::Validation(format!(
      "Password must be at least {} characters long",
      MIN_PASSWORD_LEN
    )));
  }
  guard.email = email;
  guard.name = guard
    .name
    .as_deref()
    .map(str::trim)
    .filter(|n| !n.is_empty())
    .map(str::to_string);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "signup_step::check_existing_user", skip(ctx_data), err(Display))]
async fn check_existing_user(ctx_data: ContextData<SignupCtxData>) -> Result<PipelineControl, AppError> {
  let (store, email) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.email.clone())
  };

  if store.find_user_by_email(&email).await?.is_some() {
    warn!(%email, "Signup attempted with a registered email.");
    return Err(AppError::Conflict("An account with this email already exists".to_string()));
  }
  debug!(%email, "Email is available for signup.");
  Ok(PipelineControl::Continue)
}

/// Hashes the password off the async workers and writes the account. The
/// store's unique email still decides a race between two signups.
#[instrument(name = "signup_step::create_user", skip(ctx_data), err(Display))]
async fn create_user(ctx_data: ContextData<SignupCtxData>) -> Result<PipelineControl, AppError> {
  let (store, name, email, password) = {
    let guard = ctx_data.read();
    (
      guard.app_state.store.clone(),
      guard.name.clone(),
      guard.email.clone(),
      guard.password.clone(),
    )
  };

  let password_hash = tokio::task::spawn_blocking(move || auth_service::hash_password(&password))
    .await
    .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))??;

  let now = Utc::now();
  let user = User {
    id: Uuid::new_v4(),
    name,
    email,
    password_hash,
    role: UserRole::User,
    created_at: now,
    updated_at: now,
  };
  store.insert_user(&user).await?;
  info!(user_id = %user.id, email = %user.email, "User created.");

  let mut guard = ctx_data.write();
  guard.password.clear();
  guard.user = Some(user);
  Ok(PipelineControl::Continue)
}

async fn issue_session_token(ctx_data: ContextData<SignupCtxData>) -> Result<PipelineControl, AppError> {
  let mut guard = ctx_data.write();
  let user = guard
    .user
    .as_ref()
    .ok_or_else(|| AppError::Internal("Account not created before issuing a session".to_string()))?;
  let token = auth_service::issue_session_token(&guard.app_state.config.jwt_secret, user, Utc::now())?;
  guard.session_token = Some(token);
  Ok(PipelineControl::Continue)
}
