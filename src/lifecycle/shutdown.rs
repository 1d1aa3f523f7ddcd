//! Shutdown coordination for the server.
//!
//! The coordinator owns the lifecycle state machine:
//!
//! ```text
//! Running ──signal──▶ Draining ──drained within grace──▶ Stopped
//!                         └──────grace period elapsed───▶ Aborted
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant};

use crate::lifecycle::runtime::{DrainError, ServerRuntime};
use crate::observability::metrics;

/// Where the server is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    Draining,
    Stopped,
    Aborted,
}

impl LifecycleState {
    pub fn is_running(&self) -> bool {
        matches!(self, LifecycleState::Running)
    }

    /// `Stopped` or `Aborted`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Aborted)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Running => "running",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// OS termination signals the server reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

/// Why shutdown began.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    Signal(Signal),
    /// Requested from inside the process, or every trigger was dropped.
    Requested,
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownCause::Signal(Signal::Interrupt) => f.write_str("SIGINT"),
            ShutdownCause::Signal(Signal::Terminate) => f.write_str("SIGTERM"),
            ShutdownCause::Requested => f.write_str("requested"),
        }
    }
}

/// Shutdown did not end in a clean stop.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("in-flight requests did not finish within the {0:?} grace period")]
    DrainTimeout(Duration),

    #[error("server failed while draining: {0}")]
    DrainFailure(#[source] DrainError),

    #[error("server stopped before shutdown was requested: {0}")]
    ServeFailure(#[source] DrainError),

    #[error("lifecycle coordinator exited without reporting a result")]
    CoordinatorLost,
}

/// A clean stop.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub cause: ShutdownCause,
    /// Time between stopping the accept loop and the last request finishing.
    pub drain_time: Duration,
}

/// Cloneable handle used to request shutdown.
///
/// Firing is non-blocking. Only the first cause is acted on; later ones are
/// dropped. Clones share one fired flag.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: mpsc::Sender<ShutdownCause>,
    fired: Arc<AtomicBool>,
}

impl ShutdownTrigger {
    /// Returns `true` for exactly one call across all clones: the one that
    /// delivered the shutdown request.
    pub fn fire(&self, cause: ShutdownCause) -> bool {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.tx.try_send(cause).is_ok()
    }

    /// `true` once the coordinator has finished.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the coordinator has finished.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Coordinator for graceful shutdown.
///
/// Exactly one per server process. It is the only writer of
/// [`LifecycleState`]; everything else observes it through
/// [`subscribe`](Self::subscribe).
pub struct LifecycleCoordinator {
    state: watch::Sender<LifecycleState>,
    triggers: mpsc::Receiver<ShutdownCause>,
    grace_period: Duration,
}

impl LifecycleCoordinator {
    /// Create a coordinator in the `Running` state and its trigger.
    pub fn new(grace_period: Duration) -> (Self, ShutdownTrigger) {
        let (state, _) = watch::channel(LifecycleState::Running);
        let (tx, triggers) = mpsc::channel(1);

        let coordinator = Self {
            state,
            triggers,
            grace_period,
        };
        let trigger = ShutdownTrigger {
            tx,
            fired: Arc::new(AtomicBool::new(false)),
        };
        (coordinator, trigger)
    }

    /// Observe lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!(from = %from, to = %to, "Lifecycle transition");
        }
        changed
    }

    /// Wait for a shutdown request, then drain `runtime` within the grace period.
    pub async fn run<R: ServerRuntime>(mut self, mut runtime: R) -> Result<ShutdownReport, LifecycleError> {
        let cause = tokio::select! {
            cause = self.triggers.recv() => cause.unwrap_or(ShutdownCause::Requested),
            result = runtime.finished() => {
                let err = match result {
                    Ok(()) => DrainError::Io(std::io::Error::other(
                        "serve loop exited without a shutdown request",
                    )),
                    Err(e) => e,
                };
                self.transition(LifecycleState::Running, LifecycleState::Aborted);
                tracing::error!(error = %err, "Server stopped unexpectedly");
                metrics::record_shutdown("serve_failure");
                return Err(LifecycleError::ServeFailure(err));
            }
        };
        // Later causes are not read again.
        self.triggers.close();

        self.transition(LifecycleState::Running, LifecycleState::Draining);
        tracing::info!(
            cause = %cause,
            grace_period_secs = self.grace_period.as_secs_f64(),
            "Shutting down server"
        );

        let started = Instant::now();
        runtime.stop_accepting();

        match time::timeout(self.grace_period, runtime.finished()).await {
            Ok(Ok(())) => {
                let drain_time = started.elapsed();
                self.transition(LifecycleState::Draining, LifecycleState::Stopped);
                tracing::info!(drain_ms = drain_time.as_millis() as u64, "Stopped server successfully");
                metrics::record_shutdown("stopped");
                Ok(ShutdownReport { cause, drain_time })
            }
            Ok(Err(e)) => {
                self.transition(LifecycleState::Draining, LifecycleState::Aborted);
                tracing::error!(error = %e, "Server drain failed");
                metrics::record_shutdown("drain_failure");
                Err(LifecycleError::DrainFailure(e))
            }
            Err(_) => {
                // In-flight work is left running detached; only the wait ends here.
                self.transition(LifecycleState::Draining, LifecycleState::Aborted);
                tracing::error!(
                    grace_period_secs = self.grace_period.as_secs_f64(),
                    "Grace period elapsed before in-flight requests finished"
                );
                metrics::record_shutdown("timeout");
                Err(LifecycleError::DrainTimeout(self.grace_period))
            }
        }
    }

    /// Run on a dedicated task; the result arrives once through the handle.
    pub fn spawn<R>(self, runtime: R) -> ShutdownHandle
    where
        R: ServerRuntime + 'static,
    {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = self.run(runtime).await;
            let _ = tx.send(result);
        });
        ShutdownHandle { rx }
    }
}

/// Receives the coordinator's single result.
#[derive(Debug)]
pub struct ShutdownHandle {
    rx: oneshot::Receiver<Result<ShutdownReport, LifecycleError>>,
}

impl ShutdownHandle {
    pub async fn wait(self) -> Result<ShutdownReport, LifecycleError> {
        self.rx
            .await
            .unwrap_or(Err(LifecycleError::CoordinatorLost))
    }
}
