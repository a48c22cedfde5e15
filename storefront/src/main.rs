// storefront/src/main.rs

use std::sync::Arc;

use actix_web::{web as actix_data, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use storefront::config::{AppConfig, GatewayKind, LogFormat, MailProvider, StoreBackend};
use storefront::errors::AppError;
use storefront::pipelines;
use storefront::services::auth_service;
use storefront::services::notifications::MailSender;
use storefront::services::{
  BrevoMailer, LogMailer, Mailer, MockGateway, NotificationDispatcher, PaymentGateway, StripeGateway,
};
use storefront::state::AppState;
use storefront::store::{MemoryStore, PgStore, Store};
use storefront::web::{configure_app_routes, json_config, path_config, query_config};

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

fn missing_secret(name: &str) -> AppError {
  AppError::Config(format!("{} is required for the configured provider", name))
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
  match config.store_backend {
    StoreBackend::Memory => {
      tracing::warn!("Using the in-memory store; data is lost on restart.");
      Ok(Arc::new(MemoryStore::new()))
    }
    StoreBackend::Postgres => {
      let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| missing_secret("DATABASE_URL"))?;
      let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(url)
        .await?;
      tracing::info!(max_connections = config.database_max_connections, "Connected to the database.");

      if config.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied.");
      }
      Ok(Arc::new(PgStore::new(pool)))
    }
  }
}

fn build_gateway(config: &AppConfig) -> anyhow::Result<Arc<dyn PaymentGateway>> {
  let gateway: Arc<dyn PaymentGateway> = match config.payment.gateway {
    GatewayKind::Stripe => {
      let key = config
        .payment
        .stripe_secret_key
        .as_deref()
        .ok_or_else(|| missing_secret("STRIPE_SECRET_KEY"))?;
      Arc::new(StripeGateway::new(config.payment.stripe_api_base.as_str(), key)?)
    }
    GatewayKind::Mock => {
      tracing::warn!("Using the mock payment gateway; no real charges are made.");
      Arc::new(MockGateway::new())
    }
  };
  Ok(gateway)
}

fn build_mailer(config: &AppConfig) -> anyhow::Result<Arc<dyn Mailer>> {
  let mailer: Arc<dyn Mailer> = match config.mail.provider {
    MailProvider::Brevo => {
      let key = config
        .mail
        .brevo_api_key
        .as_deref()
        .ok_or_else(|| missing_secret("BREVO_API_KEY"))?;
      Arc::new(BrevoMailer::new(config.mail.brevo_api_base.as_str(), key)?)
    }
    MailProvider::Log => Arc::new(LogMailer::new()),
  };
  Ok(mailer)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  let app_config = Arc::new(AppConfig::from_env()?);
  init_tracing(app_config.log_format);

  tracing::info!("Starting storefront server...");

  let store = build_store(&app_config).await?;
  let gateway = build_gateway(&app_config)?;
  let mailer = build_mailer(&app_config)?;

  if let Some(password) = app_config.admin_password.as_deref() {
    auth_service::ensure_admin_account(store.as_ref(), &app_config.mail.admin_email, password).await?;
  }

  let app_state = AppState::new(app_config.clone(), store.clone(), gateway, mailer.clone());
  pipelines::register_all_pipelines(&app_state.flows, &app_state);

  let dispatcher = NotificationDispatcher::new(
    store,
    mailer,
    MailSender {
      email: app_config.mail.sender_email.clone(),
      name: app_config.mail.sender_name.clone(),
    },
    app_config.dispatcher.retry.clone(),
    app_config.dispatcher.batch_size,
  );
  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let dispatcher_task = actix_rt::spawn(dispatcher.run(
    app_state.dispatcher_wakeup.clone(),
    shutdown_rx,
    app_config.dispatcher.poll_interval,
  ));

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Binding server to {}...", server_address);

  let server_state = app_state.clone();
  let served = HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(server_state.clone()))
      .app_data(json_config())
      .app_data(query_config())
      .app_data(path_config())
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await;

  tracing::info!("Server stopped; shutting down notification dispatcher.");
  // Receiver may already be gone if the dispatcher exited on its own.
  let _ = shutdown_tx.send(true);
  if let Err(e) = dispatcher_task.await {
    tracing::error!(error = %e, "Notification dispatcher task ended abnormally.");
  }

  served?;
  Ok(())
}
