//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT) before serving starts
//! - Forward every signal to the shutdown trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Exits once the coordinator stops reading triggers, i.e. when draining
//!   begins. Tokio keeps a handler installed for the life of the process
//!   once registered, so later signals are ignored rather than falling
//!   through to the default action

use std::io;

use crate::lifecycle::shutdown::{ShutdownCause, ShutdownTrigger, Signal};

/// Installed termination signal handlers.
///
/// Both handlers are registered by [`install`](Self::install); a signal that
/// arrives before [`forward`](Self::forward) is polled is buffered, not lost.
pub struct TerminationSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl TerminationSignals {
    /// Register SIGINT and SIGTERM handlers. Must be called inside a runtime.
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Forward termination signals to `trigger` until the coordinator stops
    /// accepting them.
    pub async fn forward(mut self, trigger: ShutdownTrigger) -> io::Result<()> {
        loop {
            tokio::select! {
                signal = self.recv() => {
                    let signal = signal?;
                    let delivered = trigger.fire(ShutdownCause::Signal(signal));
                    tracing::info!(?signal, delivered, "Termination signal received");
                }
                _ = trigger.closed() => {
                    return Ok(());
                }
            }
        }
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> io::Result<Signal> {
        let (received, signal) = tokio::select! {
            received = self.interrupt.recv() => (received, Signal::Interrupt),
            received = self.terminate.recv() => (received, Signal::Terminate),
        };
        received
            .map(|()| signal)
            .ok_or_else(|| io::Error::other(format!("{:?} stream closed", signal)))
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> io::Result<Signal> {
        tokio::signal::ctrl_c().await.map(|()| Signal::Interrupt)
    }
}
