// storefront/src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
  User,
  Admin,
}

impl UserRole {
  pub fn as_str(self) -> &'static str {
    match self {
      UserRole::User => "user",
      UserRole::Admin => "admin",
    }
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: Uuid,
  pub name: Option<String>,
  pub email: String,
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub role: UserRole,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

pub const MIN_PASSWORD_LEN: usize = 8;

/// Emails are matched case-insensitively and stored trimmed, lower-case.
pub fn normalize_email(email: &str) -> String {
  email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn password_hash_is_never_serialized() {
    let now = Utc::now();
    let user = User {
      id: Uuid::new_v4(),
      name: Some("Ada".into()),
      email: "ada@example.com".into(),
      password_hash: "$argon2id$v=19$secret".into(),
      role: UserRole::Admin,
      created_at: now,
      updated_at: now,
    };
    let json = serde_json::to_value(&user).unwrap();
    assert!(json.get("passwordHash").is_none());
    assert_eq!(json["role"], "admin");
    assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
  }
}
