// storefront/src/services/auth_service.rs

//! Password hashing and bearer tokens. Sessions are issued by the sign-in
//! pipelines and verified on every authenticated request.

use crate::errors::{AppError, Result as AppResult};
use crate::models::user::normalize_email;
use crate::models::{User, UserRole};
use crate::store::UserStore;
use argon2::{
  password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

pub const ADMIN_ROLE: &str = "admin";

/// Lifetime of a shopper session, in days.
pub const CUSTOMER_TOKEN_DAYS: i64 = 7;
/// Back-office sessions are shorter lived.
pub const ADMIN_TOKEN_DAYS: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  pub id: Uuid,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub role: Option<String>,
  pub exp: i64,
}

impl Claims {
  pub fn is_admin(&self) -> bool {
    self.role.as_deref() == Some(ADMIN_ROLE)
  }
}

/// Hashes a plain-text password with Argon2 and a fresh random salt.
#[instrument(name = "auth_service::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> AppResult<String> {
  if password.is_empty() {
    return Err(AppError::Validation("Password cannot be empty".to_string()));
  }
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| {
      error!(error = %e, "Argon2 password hashing failed.");
      AppError::Internal(format!("Password hashing failed: {}", e))
    })
}

/// `Ok(false)` on a wrong password. A stored hash that does not parse is an
/// internal error, not a failed login.
#[instrument(name = "auth_service::verify_password", skip_all, err(Display))]
pub fn verify_password(stored_hash: &str, provided_password: &str) -> AppResult<bool> {
  if provided_password.is_empty() {
    return Ok(false);
  }
  let parsed = PasswordHash::new(stored_hash).map_err(|e| {
    error!(error = %e, "Stored password hash does not parse.");
    AppError::Internal(format!("Invalid stored password hash: {}", e))
  })?;
  match Argon2::default().verify_password(provided_password.as_bytes(), &parsed) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => {
      debug!("Password mismatch.");
      Ok(false)
    }
    Err(e) => Err(AppError::Internal(format!("Password verification failed: {}", e))),
  }
}

/// Creates an admin account for `email` unless one is registered. Returns
/// whether an account was created. An existing account is left untouched.
#[instrument(name = "auth_service::ensure_admin_account", skip(store, password), err(Display))]
pub async fn ensure_admin_account<S>(store: &S, email: &str, password: &str) -> AppResult<bool>
where
  S: UserStore + ?Sized,
{
  let email = normalize_email(email);
  if let Some(existing) = store.find_user_by_email(&email).await? {
    if existing.role != UserRole::Admin {
      tracing::warn!(user_id = %existing.id, "Bootstrap admin email belongs to a customer account.");
    }
    return Ok(false);
  }
  let password = password.to_string();
  let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
    .await
    .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))??;
  let now = Utc::now();
  let admin = User {
    id: Uuid::new_v4(),
    name: Some("Admin".to_string()),
    email,
    password_hash,
    role: UserRole::Admin,
    created_at: now,
    updated_at: now,
  };
  store.insert_user(&admin).await?;
  info!(user_id = %admin.id, email = %admin.email, "Bootstrap admin account created.");
  Ok(true)
}

#[instrument(name = "auth_service::decode_token", skip_all, err(Display))]
pub fn decode_token(secret: &str, token: &str) -> AppResult<Claims> {
  let validation = Validation::new(Algorithm::HS256);
  let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation).map_err(|e| {
    debug!(error = %e, "Token rejected.");
    AppError::Auth("Invalid or expired token".to_string())
  })?;
  Ok(data.claims)
}

/// Signs a customer-lifetime token with the shared secret.
pub fn issue_token(
  secret: &str,
  user_id: Uuid,
  email: Option<&str>,
  role: Option<&str>,
  now: DateTime<Utc>,
) -> AppResult<String> {
  sign(secret, user_id, email, role, now + Duration::days(CUSTOMER_TOKEN_DAYS))
}

/// Session token for a signed-in account. Admin sessions last `ADMIN_TOKEN_DAYS`.
pub fn issue_session_token(secret: &str, user: &User, now: DateTime<Utc>) -> AppResult<String> {
  let days = match user.role {
    UserRole::Admin => ADMIN_TOKEN_DAYS,
    UserRole::User => CUSTOMER_TOKEN_DAYS,
  };
  sign(secret, user.id, Some(&user.email), Some(user.role.as_str()), now + Duration::days(days))
}

fn sign(
  secret: &str,
  user_id: Uuid,
  email: Option<&str>,
  role: Option<&str>,
  expires_at: DateTime<Utc>,
) -> AppResult<String> {
  let claims = Claims {
    id: user_id,
    email: email.map(str::to_string),
    role: role.map(str::to_string),
    exp: expires_at.timestamp(),
  };
  encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
    .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
}
