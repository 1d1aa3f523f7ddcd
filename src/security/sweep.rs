//! Periodic eviction of idle clients.
//!
//! # Responsibilities
//! - Re-arm every `interval` and sweep the registry
//! - Isolate each pass so one fault does not end the loop
//! - Stop once the lifecycle reaches a terminal state

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::LifecycleConfig;
use crate::lifecycle::supervise::panic_message;
use crate::lifecycle::LifecycleState;
use crate::observability::metrics;
use crate::security::registry::ClientRegistry;

/// Shortest sweep period; `tokio::time::interval_at` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub struct RegistrySweeper {
    registry: Arc<ClientRegistry>,
    interval: Duration,
    idle_threshold: Duration,
}

impl RegistrySweeper {
    /// An `interval` below one millisecond is raised to one millisecond.
    pub fn new(registry: Arc<ClientRegistry>, interval: Duration, idle_threshold: Duration) -> Self {
        Self {
            registry,
            interval: interval.max(MIN_INTERVAL),
            idle_threshold,
        }
    }

    pub fn from_config(registry: Arc<ClientRegistry>, config: &LifecycleConfig) -> Self {
        Self::new(registry, config.sweep_interval(), config.idle_threshold())
    }

    /// Run until `lifecycle` reports `Stopped` or `Aborted`.
    pub async fn run(self, mut lifecycle: watch::Receiver<LifecycleState>) {
        tracing::info!(
            interval_secs = self.interval.as_secs_f64(),
            idle_threshold_secs = self.idle_threshold.as_secs_f64(),
            "Registry sweeper starting"
        );

        // First pass one full interval after start.
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                _ = lifecycle.wait_for(LifecycleState::is_terminal) => {
                    tracing::info!("Registry sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One isolated sweep pass. Returns the number of evicted clients.
    pub fn sweep_once(&self) -> Option<usize> {
        let registry = &self.registry;
        let idle = self.idle_threshold;

        match catch_unwind(AssertUnwindSafe(|| registry.sweep(idle))) {
            Ok(evicted) => {
                let remaining = registry.len();
                if evicted > 0 {
                    tracing::info!(evicted, remaining, "Evicted idle clients");
                } else {
                    tracing::debug!(remaining, "Sweep found no idle clients");
                }
                metrics::record_sweep(evicted, remaining);
                Some(evicted)
            }
            Err(panic) => {
                tracing::error!(
                    error = panic_message(panic.as_ref()),
                    "Registry sweep panicked; will retry next interval"
                );
                None
            }
        }
    }
}
