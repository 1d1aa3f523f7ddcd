//! Security subsystem: per-client admission control.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → identity.rs (peer address → client identity)
//!     → rate_limit.rs (AdmissionController: allow / deny)
//!     → registry.rs (get-or-create bucket, refresh last seen)
//!     → bucket.rs (continuous token bucket)
//!     → Pass to handler, or 429 / 500
//!
//! Background:
//!     sweep.rs → registry.rs (evict idle clients every interval)
//! ```
//!
//! # Design Decisions
//! - One mutex guards every bucket; no bucket state escapes it
//! - A denied request is a normal outcome, not an error
//! - Entries are only ever removed by the sweeper

pub mod bucket;
pub mod identity;
pub mod rate_limit;
pub mod registry;
pub mod sweep;

pub use bucket::{BucketLimits, TokenBucket};
pub use identity::{ClientIdentity, IdentityError};
pub use rate_limit::{rate_limit_middleware, AdmissionController, Decision};
pub use registry::{ClientRegistry, ClientSnapshot};
pub use sweep::RegistrySweeper;
