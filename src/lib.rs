//! Per-client admission control and graceful shutdown for an HTTP service.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GatekeeperConfig;
pub use http::HttpServer;
pub use lifecycle::LifecycleCoordinator;
