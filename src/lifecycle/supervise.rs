//! Fault boundaries for background tasks.

use std::future::Future;

use tokio::task::JoinHandle;

/// Outcome a supervised task can report.
pub trait TaskOutcome {
    fn failure(&self) -> Option<String>;
}

impl TaskOutcome for () {
    fn failure(&self) -> Option<String> {
        None
    }
}

impl<E: std::fmt::Display> TaskOutcome for Result<(), E> {
    fn failure(&self) -> Option<String> {
        self.as_ref().err().map(ToString::to_string)
    }
}

/// Spawn `future` on its own task and log how it ends.
///
/// A panic or error is logged with the task's name instead of vanishing with
/// the task. Returns whether the task completed cleanly.
pub fn spawn_supervised<F>(name: &'static str, future: F) -> JoinHandle<bool>
where
    F: Future + Send + 'static,
    F::Output: TaskOutcome + Send + 'static,
{
    let inner = tokio::spawn(future);

    tokio::spawn(async move {
        match inner.await {
            Ok(output) => match output.failure() {
                None => {
                    tracing::debug!(task = name, "Background task finished");
                    true
                }
                Some(error) => {
                    tracing::error!(task = name, error = %error, "Background task failed");
                    false
                }
            },
            Err(e) if e.is_panic() => {
                let payload = e.into_panic();
                tracing::error!(
                    task = name,
                    panic = panic_message(payload.as_ref()),
                    "Background task panicked"
                );
                false
            }
            Err(e) => {
                tracing::warn!(task = name, error = %e, "Background task cancelled");
                false
            }
        }
    })
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
