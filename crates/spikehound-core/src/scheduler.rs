//! Schedulers for background work
//!
//! The saga only needs a handoff that returns a handle or fails. The
//! in-process schedulers here spawn on the current tokio runtime and track
//! their tasks so a caller can drain or shut them down:
//! - [`InProcessExecutionScheduler`] runs approved remediation requests
//! - [`InProcessInvestigationScheduler`] runs the pipeline for durable mode

use crate::error::ScheduleError;
use crate::pipeline::CoordinatorPipeline;
use crate::state::IncidentState;
use crate::workflow::RemediationWorkflow;
use dashmap::DashMap;
use serde_json::Value;
use spikehound_model::{ExecutionRequest, ExecutionSummary, ScheduleHandle};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Handoff target for approved executions
#[async_trait::async_trait]
pub trait ExecutionScheduler: Send + Sync {
    /// Accept `request`, returning a handle or failing the handoff
    async fn schedule(&self, request: ExecutionRequest) -> Result<ScheduleHandle, ScheduleError>;
}

/// Handoff target for background investigations
#[async_trait::async_trait]
pub trait InvestigationScheduler: Send + Sync {
    /// Accept an alert for background investigation
    async fn schedule_investigation(
        &self,
        investigation_id: &str,
        alert: Value,
    ) -> Result<ScheduleHandle, ScheduleError>;
}

#[derive(Debug, Clone, Default)]
struct BackgroundTasks {
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl BackgroundTasks {
    fn spawn<F, Fut>(&self, prefix: &str, task: F) -> Result<ScheduleHandle, ScheduleError>
    where
        F: FnOnce(ScheduleHandle, CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(ScheduleError::Unavailable);
        }
        let handle = ScheduleHandle::new(format!("{prefix}-{}", uuid::Uuid::new_v4()));
        self.tracker.spawn(task(handle.clone(), self.cancel.child_token()));
        Ok(handle)
    }

    async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// Runs remediation requests as tokio tasks
#[derive(Debug, Clone)]
pub struct InProcessExecutionScheduler {
    workflow: Arc<RemediationWorkflow>,
    tasks: BackgroundTasks,
    completed: Arc<DashMap<ScheduleHandle, ExecutionSummary>>,
}

impl InProcessExecutionScheduler {
    /// Create new scheduler
    #[must_use]
    pub fn new(workflow: Arc<RemediationWorkflow>) -> Self {
        Self {
            workflow,
            tasks: BackgroundTasks::default(),
            completed: Arc::new(DashMap::new()),
        }
    }

    /// Summary of a finished execution
    #[must_use]
    pub fn summary(&self, handle: &ScheduleHandle) -> Option<ExecutionSummary> {
        self.completed.get(handle).map(|s| *s)
    }

    /// Wait for every task spawned so far
    pub async fn wait_idle(&self) {
        self.tasks.wait_idle().await;
    }

    /// Cancel running tasks and refuse new ones
    pub async fn shutdown(&self) {
        self.tasks.shutdown().await;
    }
}

#[async_trait::async_trait]
impl ExecutionScheduler for InProcessExecutionScheduler {
    async fn schedule(&self, request: ExecutionRequest) -> Result<ScheduleHandle, ScheduleError> {
        let workflow = self.workflow.clone();
        let completed = self.completed.clone();
        self.tasks.spawn("exec", move |handle, cancel| async move {
            match workflow.execute_request(request, &cancel).await {
                Ok(summary) => {
                    completed.insert(handle, summary);
                }
                Err(err) => warn!(handle = %handle, error = %err, "scheduled_execution_aborted"),
            }
        })
    }
}

/// Runs investigations in the background and stores their reports
#[derive(Debug, Clone)]
pub struct InProcessInvestigationScheduler {
    pipeline: Arc<CoordinatorPipeline>,
    state: Arc<IncidentState>,
    tasks: BackgroundTasks,
}

impl InProcessInvestigationScheduler {
    /// Create new scheduler
    #[must_use]
    pub fn new(pipeline: Arc<CoordinatorPipeline>, state: Arc<IncidentState>) -> Self {
        Self {
            pipeline,
            state,
            tasks: BackgroundTasks::default(),
        }
    }

    /// Wait for every task spawned so far
    pub async fn wait_idle(&self) {
        self.tasks.wait_idle().await;
    }

    /// Cancel running tasks and refuse new ones
    pub async fn shutdown(&self) {
        self.tasks.shutdown().await;
    }
}

#[async_trait::async_trait]
impl InvestigationScheduler for InProcessInvestigationScheduler {
    async fn schedule_investigation(
        &self,
        investigation_id: &str,
        alert: Value,
    ) -> Result<ScheduleHandle, ScheduleError> {
        let pipeline = self.pipeline.clone();
        let state = self.state.clone();
        let investigation_id = investigation_id.to_string();
        self.tasks.spawn("investigation", move |handle, cancel| async move {
            match pipeline.handle_alert(&alert, &cancel).await {
                Ok(report) => {
                    state.store_report(Arc::new(report));
                    info!(investigation_id = %investigation_id, handle = %handle, "background_investigation_completed");
                }
                Err(err) => warn!(
                    investigation_id = %investigation_id,
                    handle = %handle,
                    error = %err,
                    "background_investigation_aborted"
                ),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::DryRunActionExecutor;
    use crate::procedure::ProcedureSet;
    use chrono::Utc;
    use serde_json::json;
    use spikehound_model::{
        ApprovalDecision, ApprovalRecord, Clock, QueueOutcome, RemediationAction,
        RemediationActionType, RemediationPlan, RiskLevel, SystemClock,
    };
    use std::time::Duration;

    fn state(clock: Arc<dyn Clock>) -> Arc<IncidentState> {
        Arc::new(IncidentState::new(Duration::from_secs(600), clock))
    }

    #[tokio::test]
    async fn execution_runs_in_background() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let state = state(clock.clone());
        state.set_plan(
            "a1",
            RemediationPlan::new(
                "notify",
                vec![RemediationAction::new(RemediationActionType::NotifyOwner, "/vm", RiskLevel::Low)],
            ),
        );
        let workflow = Arc::new(
            RemediationWorkflow::new(state.clone(), Arc::new(DryRunActionExecutor), clock)
                .with_execution_enabled(true),
        );
        let scheduler = InProcessExecutionScheduler::new(workflow.clone());
        let record = ApprovalRecord::new("a1", ApprovalDecision::Approve, "alice", Utc::now());

        let outcome = workflow
            .queue_approved_execution("a1", &record, "slack", &scheduler)
            .await;
        assert_eq!(outcome, QueueOutcome::Queued);

        scheduler.wait_idle().await;
        assert_eq!(state.latest_outcomes("a1").unwrap().len(), 1);
        let Some(crate::claims::ClaimState::Scheduled(handle)) = state.claims.get("a1") else {
            panic!("claim should hold the schedule handle");
        };
        assert!(handle.as_str().starts_with("exec-"));
        assert_eq!(scheduler.summary(&handle).unwrap().skipped_count, 1);
    }

    #[tokio::test]
    async fn shut_down_scheduler_refuses_work() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let pipeline = Arc::new(CoordinatorPipeline::new(ProcedureSet::fallback(clock.clone()), clock.clone()));
        let scheduler = InProcessInvestigationScheduler::new(pipeline, state(clock));
        scheduler.shutdown().await;

        let err = scheduler
            .schedule_investigation("a1", json!({ "alert_id": "a1" }))
            .await
            .unwrap_err();
        assert_eq!(err, ScheduleError::Unavailable);
    }

    #[tokio::test]
    async fn background_investigation_stores_report() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let state = state(clock.clone());
        let pipeline = Arc::new(CoordinatorPipeline::new(ProcedureSet::fallback(clock.clone()), clock));
        let scheduler = InProcessInvestigationScheduler::new(pipeline, state.clone());

        let handle = scheduler
            .schedule_investigation("a1", json!({ "alert_id": "a1" }))
            .await
            .unwrap();
        assert!(handle.as_str().starts_with("investigation-"));

        scheduler.wait_idle().await;
        assert!(state.reports.get("a1").is_some());
        assert!(state.latest_plan("a1").is_some());
    }
}
