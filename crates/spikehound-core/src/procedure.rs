//! Pluggable pipeline procedures
//!
//! A procedure may be rule-based, model-based or call live cloud APIs; the
//! pipeline only relies on the contract here:
//! - It tags its result with its own [`ProcedureId`]
//! - It may fail with a [`ProcedureError`] or panic; both become `Error` results
//! - It should observe the cancellation token it is given

use crate::error::ProcedureError;
use crate::procedures::{
    FallbackCostProcedure, FallbackDiagnosisProcedure, FallbackHistoryProcedure,
    FallbackRemediationProcedure, FallbackResourceProcedure,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use spikehound_model::{
    AlertSummary, Clock, Diagnosis, NormalizedAlert, ProcedureId, ProcedureOutput, ProcedureResult,
    RemediationPlan, UnifiedFindings,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A pluggable unit of investigation, diagnosis or planning
#[async_trait::async_trait]
pub trait Procedure<I, O>: Send + Sync
where
    I: Sync + ?Sized,
    O: Send,
{
    /// Run against `input`
    async fn run(
        &self,
        input: &I,
        cancel: CancellationToken,
    ) -> Result<ProcedureResult<O>, ProcedureError>;
}

/// Input shared by the three stage-1 investigators
#[derive(Debug, Clone)]
pub struct InvestigationInput {
    /// Payload as delivered
    pub raw: Value,
    pub alert: NormalizedAlert,
    pub summary: AlertSummary,
    pub received_at: DateTime<Utc>,
}

/// Input to remediation planning; diagnosis may be absent
#[derive(Debug, Clone)]
pub struct PlanningInput {
    pub findings: UnifiedFindings,
    pub diagnosis: Option<Diagnosis>,
}

pub type InvestigatorRef = Arc<dyn Procedure<InvestigationInput, ProcedureOutput>>;
pub type DiagnosisRef = Arc<dyn Procedure<UnifiedFindings, Diagnosis>>;
pub type PlannerRef = Arc<dyn Procedure<PlanningInput, RemediationPlan>>;

/// The five procedures a pipeline runs
#[derive(Clone)]
pub struct ProcedureSet {
    pub cost: InvestigatorRef,
    pub resource: InvestigatorRef,
    pub history: InvestigatorRef,
    pub diagnosis: DiagnosisRef,
    pub remediation: PlannerRef,
}

impl ProcedureSet {
    /// Deterministic procedures that never call out
    #[must_use]
    pub fn fallback(clock: Arc<dyn Clock>) -> Self {
        Self {
            cost: Arc::new(FallbackCostProcedure::new(clock.clone())),
            resource: Arc::new(FallbackResourceProcedure::new(clock.clone())),
            history: Arc::new(FallbackHistoryProcedure::new(clock.clone())),
            diagnosis: Arc::new(FallbackDiagnosisProcedure::new(clock.clone())),
            remediation: Arc::new(FallbackRemediationProcedure::new(clock)),
        }
    }

    /// Procedure set for the configured cloud mode
    ///
    /// No live cloud integration ships in this crate; with `cloud_enabled`
    /// the fallback set is still used and the gap is logged once.
    #[must_use]
    pub fn for_cloud_mode(cloud_enabled: bool, clock: Arc<dyn Clock>) -> Self {
        if cloud_enabled {
            tracing::warn!("cloud_integration_unavailable_using_fallback_procedures");
        }
        Self::fallback(clock)
    }

    /// Investigator for a stage-1 slot
    #[must_use]
    pub fn investigator(&self, id: ProcedureId) -> Option<&InvestigatorRef> {
        match id {
            ProcedureId::Cost => Some(&self.cost),
            ProcedureId::Resource => Some(&self.resource),
            ProcedureId::History => Some(&self.history),
            ProcedureId::Diagnosis | ProcedureId::Remediation => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_cost(mut self, procedure: InvestigatorRef) -> Self {
        self.cost = procedure;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_resource(mut self, procedure: InvestigatorRef) -> Self {
        self.resource = procedure;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_history(mut self, procedure: InvestigatorRef) -> Self {
        self.history = procedure;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_diagnosis(mut self, procedure: DiagnosisRef) -> Self {
        self.diagnosis = procedure;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_remediation(mut self, procedure: PlannerRef) -> Self {
        self.remediation = procedure;
        self
    }
}

impl std::fmt::Debug for ProcedureSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcedureSet").finish_non_exhaustive()
    }
}
