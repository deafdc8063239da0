//! Idempotency cache for duplicate alert deliveries
//!
//! Entries expire lazily: every delivery prunes entries older than the TTL
//! before looking up its own id. There is no background sweeper.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use spikehound_model::{Clock, InvestigationReport};
use std::sync::Arc;
use std::time::Duration;

/// A cached report and when it was stored
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub cached_at: DateTime<Utc>,
    pub report: Arc<InvestigationReport>,
}

/// TTL-bounded report cache keyed by investigation id
#[derive(Debug)]
pub struct IdempotencyCache {
    entries: DashMap<String, CacheEntry>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl IdempotencyCache {
    /// Create new cache
    #[must_use]
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.cached_at) <= self.ttl
    }

    /// Drop every expired entry, returning how many were removed
    pub fn prune_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| self.is_fresh(entry, now));
        before.saturating_sub(self.entries.len())
    }

    /// Fresh report for `investigation_id`, if any
    #[must_use]
    pub fn get(&self, investigation_id: &str) -> Option<Arc<InvestigationReport>> {
        let now = self.clock.now();
        let hit = self
            .entries
            .get(investigation_id)
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| entry.report.clone());

        if hit.is_none() {
            self.entries
                .remove_if(investigation_id, |_, entry| !self.is_fresh(entry, now));
        }
        hit
    }

    /// Store a report, replacing any previous entry
    pub fn insert(&self, investigation_id: impl Into<String>, report: Arc<InvestigationReport>) {
        let entry = CacheEntry {
            cached_at: self.clock.now(),
            report,
        };
        self.entries.insert(investigation_id.into(), entry);
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
