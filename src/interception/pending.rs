//! Requests waiting for their response.
//!
//! # Responsibilities
//! - Store raw request bytes under the host's correlation key
//! - Hand each stored request out exactly once
//! - Optionally drop requests whose response never came
//!
//! # Design Decisions
//! - `DashMap::remove` is atomic per key, so two responses racing for one
//!   key cannot both receive the request
//! - Without a TTL nothing is ever evicted; an unanswered request stays
//!   until the process exits

use std::fmt;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::http::HttpService;
use crate::observability::metrics;

/// Opaque identifier linking a request event to its response event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationKey(pub u64);

impl From<u64> for CorrelationKey {
    fn from(key: u64) -> Self {
        Self(key)
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request seen on the request phase.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub raw: Vec<u8>,
    pub service: HttpService,
    pub received_at: Instant,
}

/// Guarded map from correlation key to pending request.
#[derive(Debug, Default)]
pub struct PendingRequestStore {
    inner: DashMap<CorrelationKey, PendingRequest>,
    ttl: Option<Duration>,
}

impl PendingRequestStore {
    /// Create a store. With `ttl` set, each insert first drops older entries.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            inner: DashMap::new(),
            ttl,
        }
    }

    /// Store a request, returning any request previously held under `key`.
    pub fn insert(
        &self,
        key: CorrelationKey,
        raw: Vec<u8>,
        service: HttpService,
    ) -> Option<PendingRequest> {
        if let Some(ttl) = self.ttl {
            self.evict_older_than(ttl);
        }
        let previous = self.inner.insert(
            key,
            PendingRequest {
                raw,
                service,
                received_at: Instant::now(),
            },
        );
        metrics::record_pending_count(self.inner.len());
        previous
    }

    /// Remove and return the request stored under `key`.
    pub fn take(&self, key: CorrelationKey) -> Option<PendingRequest> {
        let taken = self.inner.remove(&key).map(|(_, request)| request);
        if taken.is_some() {
            metrics::record_pending_count(self.inner.len());
        }
        taken
    }

    /// Drop every request older than `age`. Returns how many were dropped.
    pub fn evict_older_than(&self, age: Duration) -> usize {
        let before = self.inner.len();
        let now = Instant::now();
        self.inner
            .retain(|_, request| now.saturating_duration_since(request.received_at) < age);
        let evicted = before.saturating_sub(self.inner.len());
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted stale pending requests");
        }
        evicted
    }

    pub fn contains(&self, key: CorrelationKey) -> bool {
        self.inner.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
