//! Alert webhook intake
//!
//! Collapses duplicate deliveries through the idempotency cache, then either
//! investigates inline or hands the alert to a background scheduler.

use crate::error::{IngestError, SpikehoundError};
use crate::pipeline::CoordinatorPipeline;
use crate::scheduler::InvestigationScheduler;
use crate::state::IncidentState;
use serde_json::{json, Value};
use spikehound_model::{AlertNormalizer, Clock, InvestigationReport, ScheduleHandle};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Result of one alert delivery
#[derive(Debug, Clone)]
pub enum AlertResponse {
    /// Investigation report, fresh or from the idempotency cache
    Report {
        report: Arc<InvestigationReport>,
        cached: bool,
    },
    /// Accepted for background investigation
    Accepted {
        investigation_id: String,
        handle: ScheduleHandle,
    },
}

impl AlertResponse {
    /// Response body
    pub fn body(&self) -> Result<Value, serde_json::Error> {
        match self {
            AlertResponse::Report { report, .. } => serde_json::to_value(report.as_ref()),
            AlertResponse::Accepted {
                investigation_id,
                handle,
            } => Ok(json!({
                "mode": "durable",
                "accepted": true,
                "investigation_id": investigation_id,
                "instance_id": handle,
            })),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_cached(&self) -> bool {
        matches!(self, AlertResponse::Report { cached: true, .. })
    }
}

/// Entry point for monitoring alerts
pub struct AlertIntake {
    pipeline: Arc<CoordinatorPipeline>,
    state: Arc<IncidentState>,
    clock: Arc<dyn Clock>,
    durable: Option<Arc<dyn InvestigationScheduler>>,
}

impl AlertIntake {
    /// Create new intake that investigates inline
    #[must_use]
    pub fn new(pipeline: Arc<CoordinatorPipeline>, state: Arc<IncidentState>, clock: Arc<dyn Clock>) -> Self {
        Self {
            pipeline,
            state,
            clock,
            durable: None,
        }
    }

    /// Investigate in the background through `scheduler`
    #[inline]
    #[must_use]
    pub fn with_durable(mut self, scheduler: Arc<dyn InvestigationScheduler>) -> Self {
        self.durable = Some(scheduler);
        self
    }

    #[inline]
    #[must_use]
    pub fn is_durable(&self) -> bool {
        self.durable.is_some()
    }

    /// Handle a raw request body
    pub async fn receive_body(
        &self,
        body: &[u8],
        cancel: &CancellationToken,
    ) -> Result<AlertResponse, SpikehoundError> {
        let raw: Value = serde_json::from_slice(body)
            .map_err(|_| IngestError::Malformed("invalid json".into()))?;
        self.receive(&raw, cancel).await
    }

    /// Handle one alert delivery
    pub async fn receive(
        &self,
        raw: &Value,
        cancel: &CancellationToken,
    ) -> Result<AlertResponse, SpikehoundError> {
        let pruned = self.state.reports.prune_expired();
        if pruned > 0 {
            debug!(pruned, "idempotency_cache_pruned");
        }

        let investigation_id = AlertNormalizer::normalize(raw, self.clock.now()).alert_id;

        if let Some(report) = self.state.reports.get(&investigation_id) {
            info!(investigation_id = %investigation_id, "webhook_duplicate_returning_cached_report");
            return Ok(AlertResponse::Report {
                report,
                cached: true,
            });
        }

        if let Some(scheduler) = &self.durable {
            let handle = scheduler
                .schedule_investigation(&investigation_id, raw.clone())
                .await?;
            info!(
                investigation_id = %investigation_id,
                handle = %handle,
                "durable_investigation_scheduled"
            );
            return Ok(AlertResponse::Accepted {
                investigation_id,
                handle,
            });
        }

        let report = Arc::new(self.pipeline.handle_alert(raw, cancel).await?);
        self.state.store_report(report.clone());
        Ok(AlertResponse::Report {
            report,
            cached: false,
        })
    }
}

impl std::fmt::Debug for AlertIntake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertIntake")
            .field("durable", &self.is_durable())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::ProcedureSet;
    use crate::scheduler::InProcessInvestigationScheduler;
    use spikehound_model::ManualClock;
    use std::time::Duration;

    fn parts() -> (Arc<CoordinatorPipeline>, Arc<IncidentState>, Arc<dyn Clock>) {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let state = Arc::new(IncidentState::new(Duration::from_secs(600), clock.clone()));
        let pipeline = Arc::new(CoordinatorPipeline::new(ProcedureSet::fallback(clock.clone()), clock.clone()));
        (pipeline, state, clock)
    }

    #[tokio::test]
    async fn second_delivery_is_cached() {
        let (pipeline, state, clock) = parts();
        let intake = AlertIntake::new(pipeline, state, clock);
        let alert = json!({ "alert_id": "a1" });
        let cancel = CancellationToken::new();

        let first = intake.receive(&alert, &cancel).await.unwrap();
        let second = intake.receive(&alert, &cancel).await.unwrap();
        assert!(!first.is_cached());
        assert!(second.is_cached());
        assert_eq!(first.body().unwrap(), second.body().unwrap());
    }

    #[tokio::test]
    async fn invalid_json_is_malformed() {
        let (pipeline, state, clock) = parts();
        let err = AlertIntake::new(pipeline, state, clock)
            .receive_body(b"{not json", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SpikehoundError::Ingest(IngestError::Malformed(ref m)) if m == "invalid json"
        ));
    }

    #[tokio::test]
    async fn durable_mode_accepts_then_caches() {
        let (pipeline, state, clock) = parts();
        let scheduler = Arc::new(InProcessInvestigationScheduler::new(pipeline.clone(), state.clone()));
        let intake = AlertIntake::new(pipeline, state, clock).with_durable(scheduler.clone());
        let alert = json!({ "alert_id": "a1" });
        let cancel = CancellationToken::new();

        let accepted = intake.receive(&alert, &cancel).await.unwrap();
        let AlertResponse::Accepted { investigation_id, .. } = &accepted else {
            panic!("expected acceptance");
        };
        assert_eq!(investigation_id, "a1");
        assert_eq!(accepted.body().unwrap()["accepted"], json!(true));

        scheduler.wait_idle().await;
        assert!(intake.receive(&alert, &cancel).await.unwrap().is_cached());
    }
}
