//! Boundary between the lifecycle coordinator and the request-serving loop.

use std::future::Future;

use thiserror::Error;

/// The serving loop failed while running or draining.
#[derive(Debug, Error)]
pub enum DrainError {
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server task ended abnormally: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A request-serving loop the coordinator can stop and wait on.
pub trait ServerRuntime: Send {
    /// Stop admitting new connections. Requests already in flight continue.
    fn stop_accepting(&mut self);

    /// Resolves when the serving loop has exited: after draining once
    /// [`stop_accepting`](Self::stop_accepting) was called, or on its own
    /// if it failed.
    ///
    /// Not polled again after it has resolved.
    fn finished(&mut self) -> impl Future<Output = Result<(), DrainError>> + Send + '_;
}
