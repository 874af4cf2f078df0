//! # signet-server
//!
//! Standalone OAuth 2.0 / OpenID Connect authorization server.
//!
//! Wires the endpoint handlers from `signet-auth` to the in-memory
//! backend from `signet-auth-memory`, adds the HTTP middleware stack,
//! and manages startup, background cleanup, and graceful shutdown.
//!
//! ## Modules
//!
//! - [`config`] - File plus environment configuration loading
//! - [`bootstrap`] - Storage, service, and state assembly
//! - [`server`] - Listener lifecycle and background tasks
//! - [`telemetry`] - Tracing initialization

pub mod bootstrap;
pub mod config;
pub mod server;
pub mod telemetry;

pub use bootstrap::{App, build_app, seed_demo_data};
pub use config::{AppConfig, AppConfigError, HttpConfig, SeedConfig, load_config};
pub use server::{Server, ServerError, apply_middleware};
pub use telemetry::init_tracing;
