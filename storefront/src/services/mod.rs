// storefront/src/services/mod.rs

pub mod auth_service;
pub mod email_mock;
pub mod mailer;
pub mod notifications;
pub mod payment_gateway;
pub mod payment_mock;
pub mod webhook_signature;

pub use email_mock::LogMailer;
pub use mailer::{BrevoMailer, Mailer, OutboundEmail};
pub use notifications::{NotificationDispatcher, RetryPolicy};
pub use payment_gateway::{IntentStatus, PaymentGateway, PaymentIntent, StripeGateway};
pub use payment_mock::MockGateway;
