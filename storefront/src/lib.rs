// storefront/src/lib.rs

//! Storefront backend: accounts, catalog, coupons, checkout, payment
//! reconciliation, order notifications and dashboard reports, served over
//! actix-web.

pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod pricing;
pub mod reports;
pub mod services;
pub mod slug;
pub mod state;
pub mod store;
pub mod web;
