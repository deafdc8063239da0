//! Approval-gated remediation saga
//!
//! Two halves:
//! - [`RemediationWorkflow::queue_approved_execution`] turns an approval into
//!   at most one scheduled execution per investigation, guarded by the
//!   claim store
//! - [`RemediationWorkflow::execute_request`] is what the scheduler runs: it
//!   executes (or skips) the plan, records outcomes and posts a follow-up

use crate::engine::ExecutionEngine;
use crate::error::SpikehoundError;
use crate::executor::ActionExecutor;
use crate::notify::{NoopNotificationSink, NotificationSink};
use crate::scheduler::ExecutionScheduler;
use crate::state::IncidentState;
use spikehound_model::{
    ApprovalRecord, Clock, ExecutionOutcome, ExecutionRequest, ExecutionSummary, QueueOutcome,
};
use std::fmt::Write as _;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Queueing and execution of approved remediation plans
pub struct RemediationWorkflow {
    state: Arc<IncidentState>,
    engine: ExecutionEngine,
    executor: Arc<dyn ActionExecutor>,
    notifier: Arc<dyn NotificationSink>,
    execution_enabled: bool,
}

impl RemediationWorkflow {
    /// Create new workflow; execution starts disabled
    #[must_use]
    pub fn new(
        state: Arc<IncidentState>,
        executor: Arc<dyn ActionExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state,
            engine: ExecutionEngine::new(clock),
            executor,
            notifier: Arc::new(NoopNotificationSink),
            execution_enabled: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Global execution switch
    #[inline]
    #[must_use]
    pub fn with_execution_enabled(mut self, enabled: bool) -> Self {
        self.execution_enabled = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn execution_enabled(&self) -> bool {
        self.execution_enabled
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &Arc<IncidentState> {
        &self.state
    }

    /// Hand an approved plan to `scheduler`, at most once per investigation
    ///
    /// A failed or abandoned handoff releases the claim so a later approval
    /// can retry.
    pub async fn queue_approved_execution(
        &self,
        investigation_id: &str,
        record: &ApprovalRecord,
        source: &str,
        scheduler: &dyn ExecutionScheduler,
    ) -> QueueOutcome {
        if !record.is_approve() {
            return QueueOutcome::Ignored;
        }

        let Some(plan) = self
            .state
            .latest_plan(investigation_id)
            .filter(|plan| !plan.is_empty())
        else {
            info!(investigation_id, source, reason = "no_plan", "remediation_execution_skipped");
            return QueueOutcome::NoPlan;
        };

        let execution_enabled = self.execution_enabled;
        let Some(claim) = self.state.claims.claim_pending(investigation_id) else {
            let existing = self.state.claims.get(investigation_id);
            info!(investigation_id, source, existing = ?existing, "remediation_execution_already_queued");
            return QueueOutcome::AlreadyQueued;
        };

        let request = ExecutionRequest {
            investigation_id: investigation_id.to_string(),
            plan,
            approval_record: record.clone(),
            source: source.to_string(),
            execution_enabled,
        };

        // Dropping this future mid-handoff drops `claim`, which releases it.
        match scheduler.schedule(request).await {
            Ok(handle) => {
                info!(
                    investigation_id,
                    source,
                    handle = %handle,
                    execution_enabled,
                    "remediation_execution_queued"
                );
                claim.complete(handle);
                if execution_enabled {
                    QueueOutcome::Queued
                } else {
                    QueueOutcome::Disabled
                }
            }
            Err(err) => {
                drop(claim);
                error!(investigation_id, source, error = %err, "remediation_execution_queue_failed");
                QueueOutcome::QueueFailed
            }
        }
    }

    /// Run a scheduled request to completion
    pub async fn execute_request(
        &self,
        request: ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionSummary, SpikehoundError> {
        let id = request.investigation_id.as_str();
        info!(
            investigation_id = id,
            source = %request.source,
            actions = request.plan.actions.len(),
            "remediation_execution_started"
        );

        let outcomes = if request.execution_enabled {
            match self
                .engine
                .execute(&request.plan, &request.approval_record, self.executor.as_ref(), cancel)
                .await
            {
                Ok(outcomes) => outcomes,
                Err(err) => {
                    error!(investigation_id = id, error = %err, "remediation_execution_failed");
                    return Err(err);
                }
            }
        } else {
            info!(investigation_id = id, "remediation_execution_disabled");
            self.engine.disabled_outcomes(&request.plan)
        };

        let summary = ExecutionSummary::from_outcomes(&outcomes);
        let message = followup_message(
            id,
            &request.source,
            &request.approval_record.decided_by,
            &outcomes,
        );
        self.state.record_outcomes(id, outcomes);

        info!(
            investigation_id = id,
            ok = summary.ok_count,
            skipped = summary.skipped_count,
            degraded = summary.degraded_count,
            error = summary.error_count,
            "remediation_execution_completed"
        );

        if let Err(err) = self.notifier.notify_followup(&message).await {
            warn!(investigation_id = id, error = %err, "remediation_followup_failed");
        }

        Ok(summary)
    }
}

impl std::fmt::Debug for RemediationWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemediationWorkflow")
            .field("execution_enabled", &self.execution_enabled)
            .finish_non_exhaustive()
    }
}

/// Human-readable summary of an execution, one line per outcome
#[must_use]
pub fn followup_message(
    investigation_id: &str,
    source: &str,
    decided_by: &str,
    outcomes: &[ExecutionOutcome],
) -> String {
    let mut message = format!(
        "Remediation follow-up for `{investigation_id}` ({source} approval by `{decided_by}`):"
    );
    for outcome in outcomes {
        let _ = write!(
            message,
            "\n- {}: {} ({})",
            outcome.action_type, outcome.status, outcome.message
        );
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScheduleError;
    use crate::executor::DryRunActionExecutor;
    use chrono::Utc;
    use parking_lot::Mutex;
    use spikehound_model::{
        ApprovalDecision, ManualClock, RemediationAction, RemediationActionType, RemediationPlan,
        RiskLevel, ScheduleHandle,
    };
    use std::time::Duration;

    #[derive(Default)]
    struct Capture {
        requests: Mutex<Vec<ExecutionRequest>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ExecutionScheduler for Capture {
        async fn schedule(&self, request: ExecutionRequest) -> Result<ScheduleHandle, ScheduleError> {
            if self.fail {
                return Err(ScheduleError::Handoff("queue offline".into()));
            }
            self.requests.lock().push(request);
            Ok(ScheduleHandle::new("exec-test"))
        }
    }

    fn workflow() -> RemediationWorkflow {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let state = Arc::new(IncidentState::new(Duration::from_secs(600), clock.clone()));
        RemediationWorkflow::new(state, Arc::new(DryRunActionExecutor), clock)
    }

    fn plan() -> RemediationPlan {
        RemediationPlan::new(
            "notify",
            vec![RemediationAction::new(RemediationActionType::NotifyOwner, "/vm", RiskLevel::Low)],
        )
    }

    fn approve() -> ApprovalRecord {
        ApprovalRecord::new("a1", ApprovalDecision::Approve, "alice", Utc::now())
    }

    #[tokio::test]
    async fn reject_is_ignored_without_side_effects() {
        let wf = workflow();
        wf.state().set_plan("a1", plan());
        let scheduler = Capture::default();
        let record = ApprovalRecord::new("a1", ApprovalDecision::Reject, "bob", Utc::now());

        let outcome = wf.queue_approved_execution("a1", &record, "slack", &scheduler).await;
        assert_eq!(outcome, QueueOutcome::Ignored);
        assert!(wf.state().claims.is_empty());
        assert!(scheduler.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn empty_plan_is_no_plan() {
        let wf = workflow();
        wf.state().set_plan("a1", RemediationPlan::new("nothing", Vec::new()));
        let outcome = wf
            .queue_approved_execution("a1", &approve(), "slack", &Capture::default())
            .await;
        assert_eq!(outcome, QueueOutcome::NoPlan);
        assert!(wf.state().claims.is_empty());
    }

    #[tokio::test]
    async fn disabled_still_schedules_once() {
        let wf = workflow();
        wf.state().set_plan("a1", plan());
        let scheduler = Capture::default();

        let first = wf.queue_approved_execution("a1", &approve(), "slack", &scheduler).await;
        let second = wf.queue_approved_execution("a1", &approve(), "discord", &scheduler).await;

        assert_eq!(first, QueueOutcome::Disabled);
        assert_eq!(second, QueueOutcome::AlreadyQueued);
        let requests = scheduler.requests.lock();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].execution_enabled);
        assert_eq!(requests[0].source, "slack");
    }

    #[tokio::test]
    async fn failed_handoff_releases_claim() {
        let wf = workflow().with_execution_enabled(true);
        wf.state().set_plan("a1", plan());

        let failing = Capture {
            fail: true,
            ..Capture::default()
        };
        let outcome = wf.queue_approved_execution("a1", &approve(), "slack", &failing).await;
        assert_eq!(outcome, QueueOutcome::QueueFailed);
        assert!(!wf.state().claims.contains("a1"));

        let outcome = wf
            .queue_approved_execution("a1", &approve(), "slack", &Capture::default())
            .await;
        assert_eq!(outcome, QueueOutcome::Queued);
    }

    #[tokio::test]
    async fn disabled_request_records_skipped_outcomes() {
        let wf = workflow();
        let request = ExecutionRequest {
            investigation_id: "a1".into(),
            plan: plan(),
            approval_record: approve(),
            source: "slack".into(),
            execution_enabled: false,
        };

        let summary = wf.execute_request(request, &CancellationToken::new()).await.unwrap();
        assert_eq!(summary.skipped_count, 1);
        assert_eq!(summary.total(), 1);
        assert_eq!(wf.state().latest_outcomes("a1").unwrap().len(), 1);
    }

    #[test]
    fn followup_lists_each_outcome() {
        let action = RemediationAction::new(RemediationActionType::StopVm, "/vm", RiskLevel::High);
        let outcome = ExecutionOutcome::skipped(&action, "manual", Utc::now());

        let text = followup_message("a1", "discord", "alice", &[outcome]);
        assert_eq!(
            text,
            "Remediation follow-up for `a1` (discord approval by `alice`):\n- stop_vm: skipped (manual)"
        );
    }
}
