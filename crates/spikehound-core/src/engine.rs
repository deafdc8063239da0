//! Sequential remediation execution engine
//!
//! Runs the actions of an approved plan one after another. Every action
//! gets exactly one outcome; a failing or panicking executor is recorded and
//! the batch moves on. Only the caller's cancellation aborts the batch.

use crate::config::env;
use crate::error::{ExecutorError, SpikehoundError};
use crate::executor::ActionExecutor;
use crate::isolation::panic_message;
use futures::FutureExt;
use spikehound_model::{
    ActionReport, ApprovalRecord, Clock, ExecutionOutcome, ExecutionStatus, RemediationPlan,
};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Executes remediation plans action by action
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    clock: Arc<dyn Clock>,
}

impl ExecutionEngine {
    /// Create new engine
    #[inline]
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Execute `plan` under `approval`
    ///
    /// A non-approve decision yields one `Skipped` outcome per action and
    /// never touches the executor.
    pub async fn execute(
        &self,
        plan: &RemediationPlan,
        approval: &ApprovalRecord,
        executor: &dyn ActionExecutor,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExecutionOutcome>, SpikehoundError> {
        if !approval.is_approve() {
            let now = self.clock.now();
            let message = format!(
                "Execution skipped because approval decision was {}.",
                approval.decision
            );
            return Ok(plan
                .actions
                .iter()
                .map(|action| ExecutionOutcome::skipped(action, message.clone(), now))
                .collect());
        }

        let mut outcomes = Vec::with_capacity(plan.actions.len());
        for action in &plan.actions {
            if cancel.is_cancelled() {
                return Err(SpikehoundError::Cancelled);
            }

            let started_at = self.clock.now();
            let guarded =
                AssertUnwindSafe(executor.execute(action, cancel.child_token())).catch_unwind();
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SpikehoundError::Cancelled),
                result = guarded => result,
            };
            let finished_at = self.clock.now();

            let report = match result {
                Ok(Ok(report)) => report,
                Ok(Err(ExecutorError::Cancelled)) if cancel.is_cancelled() => {
                    return Err(SpikehoundError::Cancelled);
                }
                Ok(Err(err)) => ActionReport::error(err.to_string()),
                Err(panic) => ActionReport::error(format!(
                    "executor panicked: {}",
                    panic_message(panic.as_ref())
                )),
            };

            let outcome = ExecutionOutcome::for_action(action, report, started_at, finished_at);
            if outcome.status == ExecutionStatus::Error {
                warn!(
                    action = %outcome.action_type,
                    target = %outcome.target_resource_id,
                    error = %outcome.message,
                    "remediation_action_failed"
                );
            } else {
                debug!(
                    action = %outcome.action_type,
                    status = %outcome.status,
                    "remediation_action_completed"
                );
            }
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// Uniform `Skipped` outcomes for a plan when execution is switched off
    #[must_use]
    pub fn disabled_outcomes(&self, plan: &RemediationPlan) -> Vec<ExecutionOutcome> {
        let now = self.clock.now();
        let message = format!(
            "Execution disabled. Set {}=true to execute approved actions.",
            env::ENABLE_REMEDIATION_EXECUTION
        );
        plan.actions
            .iter()
            .map(|action| ExecutionOutcome::skipped(action, message.clone(), now))
            .collect()
    }
}
