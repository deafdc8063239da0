//! Execution claim store
//!
//! The only mutual-exclusion primitive in the saga. A claim is inserted with
//! an atomic insert-if-absent; the placeholder is replaced by the scheduler
//! handle on success or removed on a failed handoff.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use spikehound_model::ScheduleHandle;

/// State of a claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimState {
    /// Claimed, handoff in progress
    Pending,
    /// Handed to a scheduler
    Scheduled(ScheduleHandle),
}

/// Result of a claim attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimAttempt {
    /// This caller now owns the claim
    Acquired,
    /// Someone else holds it
    Held(ClaimState),
}

/// Per-investigation execution claims
#[derive(Debug, Default)]
pub struct ExecutionClaims {
    claims: DashMap<String, ClaimState>,
}

impl ExecutionClaims {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pending claim, returning a guard that rolls it back on drop
    ///
    /// `None` when someone else holds the claim; see [`Self::get`] for its state.
    #[must_use]
    pub fn claim_pending<'a>(&'a self, investigation_id: &'a str) -> Option<PendingClaim<'a>> {
        match self.try_claim(investigation_id) {
            ClaimAttempt::Acquired => Some(PendingClaim {
                claims: self,
                investigation_id,
                armed: true,
            }),
            ClaimAttempt::Held(_) => None,
        }
    }

    /// Insert a pending claim if none exists
    pub fn try_claim(&self, investigation_id: &str) -> ClaimAttempt {
        match self.claims.entry(investigation_id.to_string()) {
            Entry::Occupied(existing) => ClaimAttempt::Held(existing.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(ClaimState::Pending);
                ClaimAttempt::Acquired
            }
        }
    }

    /// Replace the placeholder with the scheduler's handle
    pub fn complete(&self, investigation_id: &str, handle: ScheduleHandle) {
        if let Some(mut state) = self.claims.get_mut(investigation_id) {
            *state = ClaimState::Scheduled(handle);
        }
    }

    /// Roll back a pending claim; scheduled claims are kept
    pub fn release(&self, investigation_id: &str) -> bool {
        self.claims
            .remove_if(investigation_id, |_, state| *state == ClaimState::Pending)
            .is_some()
    }

    /// Current state for an id
    #[must_use]
    pub fn get(&self, investigation_id: &str) -> Option<ClaimState> {
        self.claims.get(investigation_id).map(|s| s.clone())
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, investigation_id: &str) -> bool {
        self.claims.contains_key(investigation_id)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

/// A pending claim owned by one handoff
///
/// Dropping it without [`PendingClaim::complete`] releases the claim, so a
/// handoff that fails or is abandoned mid-await leaves the id free to retry.
#[derive(Debug)]
#[must_use = "dropping the guard releases the claim"]
pub struct PendingClaim<'a> {
    claims: &'a ExecutionClaims,
    investigation_id: &'a str,
    armed: bool,
}

impl PendingClaim<'_> {
    /// Record the scheduler handle and keep the claim
    pub fn complete(mut self, handle: ScheduleHandle) {
        self.claims.complete(self.investigation_id, handle);
        self.armed = false;
    }
}

impl Drop for PendingClaim<'_> {
    fn drop(&mut self) {
        if self.armed && self.claims.release(self.investigation_id) {
            tracing::debug!(investigation_id = self.investigation_id, "execution_claim_released");
        }
    }
}
