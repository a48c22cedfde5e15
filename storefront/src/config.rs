// storefront/src/config.rs

use crate::errors::{AppError, Result};
use crate::models::user::MIN_PASSWORD_LEN;
use crate::pricing::ShippingPolicy;
use crate::services::notifications::RetryPolicy;
use dotenvy::dotenv;
use rust_decimal::Decimal;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
  Postgres,
  Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
  Stripe,
  Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailProvider {
  Brevo,
  Log,
}

#[derive(Clone)]
pub struct PaymentConfig {
  pub gateway: GatewayKind,
  pub stripe_secret_key: Option<String>,
  pub stripe_api_base: String,
  pub webhook_secret: String,
  pub webhook_tolerance: Duration,
  pub currency: String,
}

#[derive(Clone)]
pub struct MailConfig {
  pub provider: MailProvider,
  pub brevo_api_key: Option<String>,
  pub brevo_api_base: String,
  pub sender_email: String,
  pub sender_name: String,
  pub admin_email: String,
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
  pub retry: RetryPolicy,
  pub poll_interval: Duration,
  pub batch_size: usize,
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub log_format: LogFormat,

  pub store_backend: StoreBackend,
  pub database_url: Option<String>,
  pub database_max_connections: u32,
  pub run_migrations: bool,

  pub jwt_secret: String,
  /// Seeds a back-office account for `mail.admin_email` at start-up when set.
  pub admin_password: Option<String>,
  pub payment: PaymentConfig,
  pub mail: MailConfig,
  pub shipping: ShippingPolicy,
  pub dispatcher: DispatcherConfig,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  /// Builds the configuration from an arbitrary variable source.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let vars = Vars { lookup: &lookup };

    let server_host = vars.or("SERVER_HOST", "127.0.0.1");
    let server_port: u16 = vars.parse_or("SERVER_PORT", 8080)?;
    let log_format = match vars.or("LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
      "pretty" | "text" => LogFormat::Pretty,
      "json" => LogFormat::Json,
      other => return Err(invalid("LOG_FORMAT", other)),
    };

    let store_backend = match vars.or("STORE_BACKEND", "postgres").to_ascii_lowercase().as_str() {
      "postgres" | "postgresql" => StoreBackend::Postgres,
      "memory" => StoreBackend::Memory,
      other => return Err(invalid("STORE_BACKEND", other)),
    };
    let database_url = vars.get("DATABASE_URL");
    if store_backend == StoreBackend::Postgres && database_url.is_none() {
      return Err(missing("DATABASE_URL"));
    }
    let database_max_connections = vars.parse_or("DATABASE_MAX_CONNECTIONS", 10)?;
    let run_migrations = vars.parse_or("RUN_MIGRATIONS", false)?;

    let jwt_secret = vars.required("JWT_SECRET")?;
    let admin_password = vars.get("ADMIN_PASSWORD");
    if admin_password.as_ref().is_some_and(|p| p.chars().count() < MIN_PASSWORD_LEN) {
      return Err(AppError::Config(format!(
        "ADMIN_PASSWORD must be at least {} characters",
        MIN_PASSWORD_LEN
      )));
    }

    let gateway = match vars.or("PAYMENT_GATEWAY", "stripe").to_ascii_lowercase().as_str() {
      "stripe" => GatewayKind::Stripe,
      "mock" => GatewayKind::Mock,
      other => return Err(invalid("PAYMENT_GATEWAY", other)),
    };
    let stripe_secret_key = vars.get("STRIPE_SECRET_KEY");
    if gateway == GatewayKind::Stripe && stripe_secret_key.is_none() {
      return Err(missing("STRIPE_SECRET_KEY"));
    }
    let payment = PaymentConfig {
      gateway,
      stripe_secret_key,
      stripe_api_base: trim_base(vars.or("STRIPE_API_BASE", "https://api.stripe.com")),
      webhook_secret: vars.required("WEBHOOK_SECRET")?,
      webhook_tolerance: Duration::from_secs(vars.parse_or("WEBHOOK_TOLERANCE_SECS", 300)?),
      currency: vars.or("STORE_CURRENCY", "aud").to_ascii_lowercase(),
    };

    let provider = match vars.or("MAIL_PROVIDER", "log").to_ascii_lowercase().as_str() {
      "brevo" => MailProvider::Brevo,
      "log" => MailProvider::Log,
      other => return Err(invalid("MAIL_PROVIDER", other)),
    };
    let brevo_api_key = vars.get("BREVO_API_KEY");
    if provider == MailProvider::Brevo && brevo_api_key.is_none() {
      return Err(missing("BREVO_API_KEY"));
    }
    let mail = MailConfig {
      provider,
      brevo_api_key,
      brevo_api_base: trim_base(vars.or("BREVO_API_BASE", "https://api.brevo.com")),
      sender_email: vars.or("MAIL_SENDER", "noreply@example.com"),
      sender_name: vars.or("MAIL_SENDER_NAME", "Storefront"),
      admin_email: vars.required("ADMIN_EMAIL")?,
    };

    let defaults = ShippingPolicy::default();
    let shipping = ShippingPolicy {
      free_threshold: vars.parse_or::<Decimal>("FREE_SHIPPING_THRESHOLD", defaults.free_threshold)?,
      domestic_fee: vars.parse_or::<Decimal>("DOMESTIC_SHIPPING_FEE", defaults.domestic_fee)?,
      international_fee: vars.parse_or::<Decimal>("INTERNATIONAL_SHIPPING_FEE", defaults.international_fee)?,
      domestic_countries: match vars.get("DOMESTIC_COUNTRIES") {
        Some(raw) => raw
          .split(',')
          .map(str::trim)
          .filter(|c| !c.is_empty())
          .map(str::to_string)
          .collect(),
        None => defaults.domestic_countries,
      },
    };

    let max_attempts: i32 = vars.parse_or("NOTIFY_MAX_ATTEMPTS", 5)?;
    if max_attempts < 1 {
      return Err(invalid("NOTIFY_MAX_ATTEMPTS", &max_attempts.to_string()));
    }
    let batch_size: usize = vars.parse_or("NOTIFY_BATCH_SIZE", 20)?;
    if batch_size == 0 {
      return Err(invalid("NOTIFY_BATCH_SIZE", "0"));
    }
    let dispatcher = DispatcherConfig {
      retry: RetryPolicy {
        max_attempts,
        base_backoff: Duration::from_secs(vars.parse_or("NOTIFY_BASE_BACKOFF_SECS", 30)?),
        max_backoff: Duration::from_secs(vars.parse_or("NOTIFY_MAX_BACKOFF_SECS", 3600)?),
      },
      poll_interval: Duration::from_secs(vars.parse_or("NOTIFY_POLL_SECS", 15)?),
      batch_size,
    };

    tracing::info!(
      server_host = %server_host,
      server_port,
      store_backend = ?store_backend,
      gateway = ?payment.gateway,
      mail_provider = ?mail.provider,
      currency = %payment.currency,
      "Application configuration loaded successfully."
    );

    Ok(Self {
      server_host,
      server_port,
      log_format,
      store_backend,
      database_url,
      database_max_connections,
      run_migrations,
      jwt_secret,
      admin_password,
      payment,
      mail,
      shipping,
      dispatcher,
    })
  }
}

struct Vars<'a> {
  lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Vars<'_> {
  fn get(&self, name: &str) -> Option<String> {
    (self.lookup)(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
  }

  fn or(&self, name: &str, default: &str) -> String {
    self.get(name).unwrap_or_else(|| default.to_string())
  }

  fn required(&self, name: &str) -> Result<String> {
    self.get(name).ok_or_else(|| missing(name))
  }

  fn parse_or<T>(&self, name: &str, default: T) -> Result<T>
  where
    T: FromStr,
    T::Err: Display,
  {
    match self.get(name) {
      Some(raw) => raw
        .parse::<T>()
        .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", name, raw, e))),
      None => Ok(default),
    }
  }
}

fn missing(name: &str) -> AppError {
  AppError::Config(format!("Missing environment variable '{}'", name))
}

fn invalid(name: &str, value: &str) -> AppError {
  AppError::Config(format!("Invalid {} value '{}'", name, value))
}

fn trim_base(url: String) -> String {
  url.trim_end_matches('/').to_string()
}
