//! Remediation execution records
//!
//! - [`ActionReport`]: what an action executor hands back
//! - [`ExecutionOutcome`]: the recorded result of one action in one attempt
//! - [`ExecutionRequest`]: the unit handed to an execution scheduler
//! - [`QueueOutcome`]: result of trying to queue an approved execution

use crate::approval::ApprovalRecord;
use crate::remediation::{RemediationAction, RemediationActionType, RemediationPlan};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Status of one executed action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Ok,
    Skipped,
    Degraded,
    Error,
}

impl ExecutionStatus {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Ok => "ok",
            ExecutionStatus::Skipped => "skipped",
            ExecutionStatus::Degraded => "degraded",
            ExecutionStatus::Error => "error",
        }
    }
}

impl Display for ExecutionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Executor-reported result; timing is optional and backfilled by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReport {
    pub status: ExecutionStatus,
    pub message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ActionReport {
    /// Create new report without timing
    #[inline]
    #[must_use]
    pub fn new(status: ExecutionStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            started_at: None,
            finished_at: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(ExecutionStatus::Ok, message)
    }

    #[inline]
    #[must_use]
    pub fn skipped(message: impl Into<String>) -> Self {
        Self::new(ExecutionStatus::Skipped, message)
    }

    #[inline]
    #[must_use]
    pub fn degraded(message: impl Into<String>) -> Self {
        Self::new(ExecutionStatus::Degraded, message)
    }

    #[inline]
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ExecutionStatus::Error, message)
    }

    /// Attach timing
    #[inline]
    #[must_use]
    pub fn with_timing(mut self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self.finished_at = Some(finished_at);
        self
    }
}

/// Recorded result of one action in one execution attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub action_type: RemediationActionType,
    pub target_resource_id: String,
    pub status: ExecutionStatus,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionOutcome {
    /// Outcome for `action`, identity fields always taken from the action
    #[must_use]
    pub fn for_action(
        action: &RemediationAction,
        report: ActionReport,
        started_fallback: DateTime<Utc>,
        finished_fallback: DateTime<Utc>,
    ) -> Self {
        Self {
            action_type: action.action_type,
            target_resource_id: action.target_resource_id.clone(),
            status: report.status,
            message: report.message,
            started_at: report.started_at.unwrap_or(started_fallback),
            finished_at: report.finished_at.unwrap_or(finished_fallback),
        }
    }

    /// Skipped outcome stamped at `at`
    #[must_use]
    pub fn skipped(action: &RemediationAction, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::for_action(action, ActionReport::skipped(message), at, at)
    }
}

/// Per-status outcome counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub ok_count: usize,
    pub skipped_count: usize,
    pub degraded_count: usize,
    pub error_count: usize,
}

impl ExecutionSummary {
    /// Count outcomes by status
    #[must_use]
    pub fn from_outcomes(outcomes: &[ExecutionOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut acc, outcome| {
            match outcome.status {
                ExecutionStatus::Ok => acc.ok_count += 1,
                ExecutionStatus::Skipped => acc.skipped_count += 1,
                ExecutionStatus::Degraded => acc.degraded_count += 1,
                ExecutionStatus::Error => acc.error_count += 1,
            }
            acc
        })
    }

    /// Total outcomes counted
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.ok_count + self.skipped_count + self.degraded_count + self.error_count
    }
}

/// Request handed to an execution scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub investigation_id: String,
    pub plan: RemediationPlan,
    pub approval_record: ApprovalRecord,
    /// Channel the approval came from (`slack`, `discord`, ...)
    pub source: String,
    pub execution_enabled: bool,
}

/// Opaque handle returned by an execution scheduler
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleHandle(pub String);

impl ScheduleHandle {
    /// Create new handle
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ScheduleHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of queueing an approved execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOutcome {
    /// Scheduled with execution enabled
    Queued,
    /// Scheduled, but execution is disabled by configuration
    Disabled,
    /// Another approval already claimed this investigation
    AlreadyQueued,
    /// No plan, or a plan without actions
    NoPlan,
    /// Decision was not an approval
    Ignored,
    /// Scheduler handoff failed; claim rolled back
    QueueFailed,
}

impl QueueOutcome {
    /// Sentence appended to a chat reply, if any
    #[must_use]
    pub const fn user_text(&self) -> Option<&'static str> {
        match self {
            QueueOutcome::Queued => Some("Remediation execution has been queued."),
            QueueOutcome::Disabled => Some("Execution is currently disabled by configuration."),
            QueueOutcome::AlreadyQueued => Some("Remediation execution has already been queued."),
            QueueOutcome::NoPlan => Some("No remediation plan was available to execute."),
            QueueOutcome::QueueFailed => Some("Failed to queue remediation execution."),
            QueueOutcome::Ignored => None,
        }
    }

    /// Whether this call performed the one scheduling attempt
    #[inline]
    #[must_use]
    pub const fn claimed(&self) -> bool {
        matches!(
            self,
            QueueOutcome::Queued | QueueOutcome::Disabled | QueueOutcome::QueueFailed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remediation::RiskLevel;
    use chrono::Duration;

    #[test]
    fn outcome_backfills_missing_times() {
        let action = RemediationAction::new(RemediationActionType::StopVm, "/vm1", RiskLevel::High);
        let start = Utc::now();
        let end = start + Duration::seconds(2);

        let outcome = ExecutionOutcome::for_action(&action, ActionReport::ok("stopped"), start, end);
        assert_eq!(outcome.started_at, start);
        assert_eq!(outcome.finished_at, end);
        assert_eq!(outcome.target_resource_id, "/vm1");
    }

    #[test]
    fn summary_counts_by_status() {
        let action = RemediationAction::new(RemediationActionType::NotifyOwner, "/r", RiskLevel::Low);
        let now = Utc::now();
        let outcomes = vec![
            ExecutionOutcome::for_action(&action, ActionReport::ok("a"), now, now),
            ExecutionOutcome::skipped(&action, "b", now),
            ExecutionOutcome::skipped(&action, "c", now),
            ExecutionOutcome::for_action(&action, ActionReport::error("d"), now, now),
        ];

        let summary = ExecutionSummary::from_outcomes(&outcomes);
        assert_eq!(summary.ok_count, 1);
        assert_eq!(summary.skipped_count, 2);
        assert_eq!(summary.degraded_count, 0);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn ignored_has_no_user_text() {
        assert!(QueueOutcome::Ignored.user_text().is_none());
        assert_eq!(
            QueueOutcome::AlreadyQueued.user_text(),
            Some("Remediation execution has already been queued.")
        );
    }
}
