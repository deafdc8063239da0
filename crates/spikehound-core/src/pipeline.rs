//! Coordinator pipeline
//!
//! One alert in, one [`InvestigationReport`] out:
//! 1. Normalize the alert and build its summary
//! 2. Run cost, resource and history concurrently, each isolated
//! 3. Merge into unified findings once all three have settled
//! 4. Diagnose, then plan (planning tolerates a missing diagnosis)
//! 5. Notify, best-effort, on a tracked background task
//!
//! Partial failure lives in the report. Only the caller's cancellation
//! surfaces as an error. The report is returned without waiting for the
//! notifier; [`CoordinatorPipeline::wait_notifications`] drains pending sends.

use crate::error::SpikehoundError;
use crate::isolation::run_isolated;
use crate::merge::merge_findings;
use crate::notify::{NoopNotificationSink, NotificationSink};
use crate::procedure::{InvestigationInput, PlanningInput, ProcedureSet};
use serde_json::Value;
use spikehound_model::{AlertNormalizer, Clock, InvestigationReport, ProcedureId};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Default per-procedure timeout
pub const DEFAULT_PROCEDURE_TIMEOUT: Duration = Duration::from_secs(20);

/// Default bound on one report notification
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Fan-out/fan-in investigation pipeline
pub struct CoordinatorPipeline {
    procedures: ProcedureSet,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    notify_timeout: Duration,
    notifications: TaskTracker,
}

impl CoordinatorPipeline {
    /// Create new pipeline with no notifications and the default timeout
    #[must_use]
    pub fn new(procedures: ProcedureSet, clock: Arc<dyn Clock>) -> Self {
        Self {
            procedures,
            notifier: Arc::new(NoopNotificationSink),
            clock,
            timeout: DEFAULT_PROCEDURE_TIMEOUT,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
            notifications: TaskTracker::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Per-procedure timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bound on one background report notification
    #[inline]
    #[must_use]
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for every report notification started so far
    pub async fn wait_notifications(&self) {
        self.notifications.close();
        self.notifications.wait().await;
        self.notifications.reopen();
    }

    /// Investigate one alert
    pub async fn handle_alert(
        &self,
        raw: &Value,
        cancel: &CancellationToken,
    ) -> Result<InvestigationReport, SpikehoundError> {
        let received_at = self.clock.now();
        let alert = AlertNormalizer::normalize(raw, received_at);
        let summary = alert.summary_map(raw, received_at);
        info!(
            investigation_id = %alert.alert_id,
            severity = %alert.severity,
            "investigation_started"
        );

        let input = InvestigationInput {
            raw: raw.clone(),
            alert,
            summary: summary.clone(),
            received_at,
        };
        let clock = self.clock.as_ref();

        let (cost, resource, history) = tokio::join!(
            run_isolated(ProcedureId::Cost, self.procedures.cost.as_ref(), &input, self.timeout, cancel, clock),
            run_isolated(ProcedureId::Resource, self.procedures.resource.as_ref(), &input, self.timeout, cancel, clock),
            run_isolated(ProcedureId::History, self.procedures.history.as_ref(), &input, self.timeout, cancel, clock),
        );
        let findings = merge_findings(summary, vec![cost?, resource?, history?]);

        let diagnosis_result = run_isolated(
            ProcedureId::Diagnosis,
            self.procedures.diagnosis.as_ref(),
            &findings,
            self.timeout,
            cancel,
            clock,
        )
        .await?;

        let planning = PlanningInput {
            findings,
            diagnosis: diagnosis_result.data.clone(),
        };
        let remediation_result = run_isolated(
            ProcedureId::Remediation,
            self.procedures.remediation.as_ref(),
            &planning,
            self.timeout,
            cancel,
            clock,
        )
        .await?;

        let report = InvestigationReport {
            unified_findings: planning.findings,
            diagnosis_result,
            remediation_result,
        };

        info!(
            investigation_id = %report.investigation_id(),
            diagnosis = ?report.diagnosis_result.status,
            remediation = ?report.remediation_result.status,
            actions = report.plan().map_or(0, |p| p.actions.len()),
            "investigation_completed"
        );

        self.spawn_notification(&report);
        Ok(report)
    }

    fn spawn_notification(&self, report: &InvestigationReport) {
        let notifier = self.notifier.clone();
        let report = report.clone();
        let timeout = self.notify_timeout;
        self.notifications.spawn(async move {
            let investigation_id = report.investigation_id();
            match tokio::time::timeout(timeout, notifier.notify_report(&report)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(
                    investigation_id = %investigation_id,
                    error = %err,
                    "report_notification_failed"
                ),
                Err(_) => warn!(
                    investigation_id = %investigation_id,
                    timeout = ?timeout,
                    "report_notification_timed_out"
                ),
            }
        });
    }
}

impl std::fmt::Debug for CoordinatorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorPipeline")
            .field("timeout", &self.timeout)
            .field("notify_timeout", &self.notify_timeout)
            .field("pending_notifications", &self.notifications.len())
            .finish_non_exhaustive()
    }
}
