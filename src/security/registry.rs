//! Concurrent store of per-client buckets.
//!
//! All reads and writes of bucket state happen under one mutex. Critical
//! sections only touch the map: no I/O, no awaits, no logging.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::security::bucket::{BucketLimits, TokenBucket};
use crate::security::identity::ClientIdentity;

#[derive(Debug)]
struct RegistryEntry {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Point-in-time copy of one client's state.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    pub bucket: TokenBucket,
    pub last_seen: Instant,
}

/// Map of client identity to bucket state.
///
/// Entries are created lazily by the request path and removed only by
/// [`ClientRegistry::sweep`].
#[derive(Debug, Default)]
pub struct ClientRegistry {
    entries: Mutex<HashMap<ClientIdentity, RegistryEntry>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation leaves entries consistent, so a panic elsewhere while
    // the lock was held does not invalidate the map.
    fn lock(&self) -> MutexGuard<'_, HashMap<ClientIdentity, RegistryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the client's state, creating a full bucket if it is unknown.
    pub fn get_or_create(&self, identity: &ClientIdentity, limits: BucketLimits) -> ClientSnapshot {
        let now = Instant::now();
        let mut entries = self.lock();
        let entry = entries
            .entry(identity.clone())
            .or_insert_with(|| RegistryEntry {
                bucket: TokenBucket::new(limits, now),
                last_seen: now,
            });
        ClientSnapshot {
            bucket: entry.bucket.clone(),
            last_seen: entry.last_seen,
        }
    }

    /// Request path: get-or-create, refresh `last_seen`, take a token.
    ///
    /// Returns whether the request may proceed.
    pub fn admit(&self, identity: &ClientIdentity, limits: BucketLimits) -> bool {
        let mut entries = self.lock();
        // Read the clock under the lock so timestamps are ordered with sweeps.
        let now = Instant::now();
        let entry = entries
            .entry(identity.clone())
            .or_insert_with(|| RegistryEntry {
                bucket: TokenBucket::new(limits, now),
                last_seen: now,
            });
        entry.last_seen = entry.last_seen.max(now);
        entry.bucket.allow_at(now)
    }

    /// Remove every client idle for longer than `idle_threshold`.
    ///
    /// The cutoff is computed after the lock is taken, so a refresh that won
    /// the race for the lock is always seen. Returns the number removed.
    pub fn sweep(&self, idle_threshold: Duration) -> usize {
        let mut entries = self.lock();
        let now = Instant::now();
        let Some(cutoff) = now.checked_sub(idle_threshold) else {
            return 0;
        };

        let before = entries.len();
        entries.retain(|_, entry| entry.last_seen >= cutoff);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, identity: &ClientIdentity) -> bool {
        self.lock().contains_key(identity)
    }

    pub fn snapshot(&self, identity: &ClientIdentity) -> Option<ClientSnapshot> {
        self.lock().get(identity).map(|entry| ClientSnapshot {
            bucket: entry.bucket.clone(),
            last_seen: entry.last_seen,
        })
    }
}
