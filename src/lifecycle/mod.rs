//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT handlers installed at startup → ShutdownTrigger
//!
//! Shutdown (shutdown.rs):
//!     Trigger fired → Draining → stop accepting → bounded drain → Stopped | Aborted
//!     Result delivered once to the main task through ShutdownHandle
//!
//! Runtime (runtime.rs):
//!     ServerRuntime trait: the serving loop the coordinator stops and waits on
//!
//! Supervision (supervise.rs):
//!     Background tasks run inside a fault boundary that logs panics
//! ```
//!
//! # Design Decisions
//! - Shutdown starts exactly once no matter how many signals arrive
//! - The grace period bounds the wait, not the work: requests still running
//!   at the deadline are left detached
//! - Only the coordinator writes lifecycle state; others subscribe

pub mod runtime;
pub mod shutdown;
pub mod signals;
pub mod supervise;

pub use runtime::{DrainError, ServerRuntime};
pub use shutdown::{
    LifecycleCoordinator, LifecycleError, LifecycleState, ShutdownCause, ShutdownHandle,
    ShutdownReport, ShutdownTrigger, Signal,
};
pub use signals::TerminationSignals;
pub use supervise::spawn_supervised;
