//! Human approval decisions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Decision a human took on a remediation plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// Execute the plan
    Approve,
    /// Do not execute
    Reject,
    /// Ask for more investigation before deciding
    Investigate,
}

impl ApprovalDecision {
    /// Lowercase name used in replies and logs
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ApprovalDecision::Approve => "approve",
            ApprovalDecision::Reject => "reject",
            ApprovalDecision::Investigate => "investigate",
        }
    }

    /// Map an interactive action id to a decision
    #[must_use]
    pub fn from_action_id(action_id: &str) -> Option<Self> {
        match action_id {
            "approve_remediation" => Some(ApprovalDecision::Approve),
            "reject_remediation" => Some(ApprovalDecision::Reject),
            "investigate_more" => Some(ApprovalDecision::Investigate),
            _ => None,
        }
    }
}

impl Display for ApprovalDecision {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded human interaction
///
/// The latest record for an investigation id supersedes earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub investigation_id: String,
    pub decision: ApprovalDecision,
    pub decided_by: String,
    pub decided_at: DateTime<Utc>,
    pub reason: Option<String>,
}

impl ApprovalRecord {
    /// Create new approval record
    #[must_use]
    pub fn new(
        investigation_id: impl Into<String>,
        decision: ApprovalDecision,
        decided_by: impl Into<String>,
        decided_at: DateTime<Utc>,
    ) -> Self {
        let reason = (decision == ApprovalDecision::Investigate)
            .then(|| "Requested additional investigation".to_string());
        Self {
            investigation_id: investigation_id.into(),
            decision,
            decided_by: decided_by.into(),
            decided_at,
            reason,
        }
    }

    /// Replace the reason
    #[inline]
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Check for an approve decision
    #[inline]
    #[must_use]
    pub fn is_approve(&self) -> bool {
        self.decision == ApprovalDecision::Approve
    }
}
