// storefront/src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::models::User;
use crate::pipelines::contexts::{SigninAudience, SigninCtxData, SignupCtxData};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;
use storefront_flow::{ContextData, PipelineResult};

#[derive(Deserialize, Debug)]
pub struct SignupRequestPayload {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct SigninRequestPayload {
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub password: String,
}

fn session_of(user: Option<User>, token: Option<String>) -> Result<(User, String), AppError> {
  match (user, token) {
    (Some(user), Some(token)) => Ok((user, token)),
    _ => {
      warn!("Account pipeline completed without a session.");
      Err(AppError::Internal("Session was not issued".to_string()))
    }
  }
}

#[instrument(name = "handler::signup", skip(app_state, req_payload), fields(req_email = %req_payload.email))]
pub async fn signup_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<SignupRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let req_payload = req_payload.into_inner();
  let ctx_data = ContextData::new(SignupCtxData::new(
    app_state.get_ref().clone(),
    req_payload.name,
    req_payload.email,
    req_payload.password,
  ));

  match app_state.flows.run(ctx_data.clone()).await? {
    PipelineResult::Completed => {
      let (user, token) = {
        let mut guard = ctx_data.write();
        (guard.user.take(), guard.session_token.take())
      };
      let (user, token) = session_of(user, token)?;
      info!(user_id = %user.id, "Signup successful.");
      Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "user": user,
        "token": token,
      })))
    }
    PipelineResult::Stopped => Err(AppError::PipelineHaltedByHandler),
  }
}

async fn sign_in(
  app_state: &AppState,
  audience: SigninAudience,
  req_payload: SigninRequestPayload,
) -> Result<(User, String), AppError> {
  let ctx_data = ContextData::new(SigninCtxData::new(
    app_state.clone(),
    audience,
    req_payload.email,
    req_payload.password,
  ));
  match app_state.flows.run(ctx_data.clone()).await? {
    PipelineResult::Completed => {
      let (user, token) = {
        let mut guard = ctx_data.write();
        (guard.user.take(), guard.session_token.take())
      };
      session_of(user, token)
    }
    PipelineResult::Stopped => Err(AppError::PipelineHaltedByHandler),
  }
}

#[instrument(name = "handler::login", skip(app_state, req_payload), fields(req_email = %req_payload.email))]
pub async fn login_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<SigninRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let (user, token) = sign_in(&app_state, SigninAudience::Customer, req_payload.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({
    "message": "Login successful",
    "user": user,
    "token": token,
  })))
}

#[instrument(name = "handler::admin::login", skip(app_state, req_payload), fields(req_email = %req_payload.email))]
pub async fn admin_login_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<SigninRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let (user, token) = sign_in(&app_state, SigninAudience::BackOffice, req_payload.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "message": "Login successful",
    "role": user.role,
    "name": user.name.as_deref().unwrap_or("Admin"),
    "token": token,
  })))
}

/// The account behind the bearer token.
#[instrument(name = "handler::me", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn me_handler(app_state: web::Data<AppState>, auth_user: AuthenticatedUser) -> Result<HttpResponse, AppError> {
  let user = app_state
    .store
    .find_user(auth_user.user_id)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
  Ok(HttpResponse::Ok().json(json!({ "user": user })))
}
