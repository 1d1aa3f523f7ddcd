//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, graceful shutdown)
//!     → request.rs (request ID)
//!     → security::rate_limit (admission control)
//!     → handlers.rs (healthcheck, fallbacks)
//!     → response.rs (JSON error envelopes)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, ServeHandle};
