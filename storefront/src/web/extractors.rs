// storefront/src/web/extractors.rs

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::auth_service::{decode_token, Claims};
use crate::state::AppState;

/// Caller identity taken from a verified `Authorization: Bearer` token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
  pub email: Option<String>,
  pub role: Option<String>,
  claims: Claims,
}

impl AuthenticatedUser {
  pub fn is_admin(&self) -> bool {
    self.claims.is_admin()
  }
}

impl From<Claims> for AuthenticatedUser {
  fn from(claims: Claims) -> Self {
    Self {
      user_id: claims.id,
      email: claims.email.clone(),
      role: claims.role.clone(),
      claims,
    }
  }
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
  let app_state = req
    .app_data::<web::Data<AppState>>()
    .ok_or_else(|| AppError::Internal("Application state is not configured".to_string()))?;

  let header = req
    .headers()
    .get(AUTHORIZATION)
    .and_then(|value| value.to_str().ok())
    .ok_or_else(|| AppError::Auth("No token provided in Authorization header".to_string()))?;
  let token = header
    .strip_prefix("Bearer ")
    .map(str::trim)
    .filter(|token| !token.is_empty())
    .ok_or_else(|| AppError::Auth("Authorization header must carry a Bearer token".to_string()))?;

  let claims = decode_token(&app_state.config.jwt_secret, token)?;
  Ok(AuthenticatedUser::from(claims))
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    ready(authenticate(req))
  }
}

/// An authenticated caller whose token carries the `admin` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

impl FromRequest for AdminUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let outcome = authenticate(req).and_then(|user| {
      if user.is_admin() {
        Ok(AdminUser(user))
      } else {
        warn!(user_id = %user.user_id, path = %req.path(), "Non-admin token used on an admin route.");
        Err(AppError::Forbidden("Admin access required".to_string()))
      }
    });
    ready(outcome)
  }
}
