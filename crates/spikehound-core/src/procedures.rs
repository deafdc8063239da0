//! Deterministic fallback procedures
//!
//! Used whenever no live cloud integration is wired in. Outputs are fixed
//! apart from the identifiers taken from the alert, which keeps end-to-end
//! runs reproducible.

use crate::error::ProcedureError;
use crate::procedure::{InvestigationInput, PlanningInput, Procedure};
use chrono::Duration;
use spikehound_model::{
    Clock, CostFinding, Diagnosis, HistoryFindings, InvestigationFindings, ProcedureId,
    ProcedureOutput, ProcedureResult, RemediationAction, RemediationActionType, RemediationPlan,
    ResourceFindings, RiskLevel, RootCauseHypothesis, UnifiedFindings,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const UNKNOWN_RESOURCE: &str = "unknown-resource";
const VM_SEGMENT: &str = "/virtualmachines/";

fn ensure_live(cancel: &CancellationToken) -> Result<(), ProcedureError> {
    if cancel.is_cancelled() {
        Err(ProcedureError::Cancelled)
    } else {
        Ok(())
    }
}

macro_rules! fallback_procedure {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            clock: Arc<dyn Clock>,
        }

        impl $name {
            /// Create new procedure
            #[inline]
            #[must_use]
            pub fn new(clock: Arc<dyn Clock>) -> Self {
                Self { clock }
            }
        }
    };
}

fallback_procedure!(
    /// Reports a fixed daily spend for the alerted resource
    FallbackCostProcedure
);
fallback_procedure!(
    /// Describes the alerted resource as an idle VM
    FallbackResourceProcedure
);
fallback_procedure!(
    /// Reports no prior incidents
    FallbackHistoryProcedure
);
fallback_procedure!(
    /// Diagnoses an orphaned VM
    FallbackDiagnosisProcedure
);
fallback_procedure!(
    /// Plans a VM stop (when the target is a VM) and an owner notification
    FallbackRemediationProcedure
);

#[async_trait::async_trait]
impl Procedure<InvestigationInput, ProcedureOutput> for FallbackCostProcedure {
    async fn run(
        &self,
        input: &InvestigationInput,
        cancel: CancellationToken,
    ) -> Result<ProcedureResult<ProcedureOutput>, ProcedureError> {
        ensure_live(&cancel)?;
        let now = self.clock.now();
        let resource_id = input.alert.resource_id.as_deref().unwrap_or(UNKNOWN_RESOURCE);

        let findings = InvestigationFindings {
            alert_id: input.alert.alert_id.clone(),
            received_at: input.received_at,
            cost_findings: vec![CostFinding::new(resource_id, 450.00, "USD/day")],
            notes: Some(
                "Baseline spend: $12.50/day. Current spend: $450.00/day (36x anomaly factor). \
                 Spike began 72 hours ago."
                    .to_string(),
            ),
        };

        Ok(ProcedureResult::ok(
            ProcedureId::Cost,
            now,
            now + Duration::milliseconds(180),
            ProcedureOutput::Cost(findings),
        ))
    }
}

#[async_trait::async_trait]
impl Procedure<InvestigationInput, ProcedureOutput> for FallbackResourceProcedure {
    async fn run(
        &self,
        input: &InvestigationInput,
        cancel: CancellationToken,
    ) -> Result<ProcedureResult<ProcedureOutput>, ProcedureError> {
        ensure_live(&cancel)?;
        let now = self.clock.now();

        let findings = ResourceFindings::new(input.alert.resource_id.clone())
            .with_attribute("resource_type", "Microsoft.Compute/virtualMachines")
            .with_attribute("vm_size", "Standard_D2s_v3")
            .with_attribute("location", "polandcentral")
            .with_attribute("power_state", "VM running")
            .with_attribute("uptime_hours", 72)
            .with_attribute("tags", "environment=dev, owner=ml-team, project=training-pipeline")
            .with_attribute(
                "notes",
                "VM has been running for 72 hours with no active compute jobs. \
                 Last SSH session ended 71 hours ago.",
            );

        Ok(ProcedureResult::ok(
            ProcedureId::Resource,
            now,
            now + Duration::milliseconds(210),
            ProcedureOutput::Resource(findings),
        ))
    }
}

#[async_trait::async_trait]
impl Procedure<InvestigationInput, ProcedureOutput> for FallbackHistoryProcedure {
    async fn run(
        &self,
        input: &InvestigationInput,
        cancel: CancellationToken,
    ) -> Result<ProcedureResult<ProcedureOutput>, ProcedureError> {
        ensure_live(&cancel)?;
        let now = self.clock.now();

        let mut findings = HistoryFindings::new(0)
            .with_attribute(
                "resource_history",
                "VM created 5 days ago for ML training batch. Training job completed 72 hours ago. \
                 No scheduled deallocate policy found.",
            )
            .with_attribute(
                "notes",
                "No prior cost anomaly alerts for this resource. First occurrence.",
            );
        if let Some(alert_id) = input.summary.get("alert_id") {
            findings.attributes.insert("alert_id".to_string(), alert_id.clone());
        }

        Ok(ProcedureResult::ok(
            ProcedureId::History,
            now,
            now + Duration::milliseconds(150),
            ProcedureOutput::History(findings),
        ))
    }
}

#[async_trait::async_trait]
impl Procedure<UnifiedFindings, Diagnosis> for FallbackDiagnosisProcedure {
    async fn run(
        &self,
        _input: &UnifiedFindings,
        cancel: CancellationToken,
    ) -> Result<ProcedureResult<Diagnosis>, ProcedureError> {
        ensure_live(&cancel)?;
        let now = self.clock.now();

        let hypothesis = RootCauseHypothesis {
            title: "Orphaned GPU VM after training job completion".to_string(),
            explanation: "GPU VM left running after ML training job completed 72 hours ago. \
                          No auto-shutdown policy configured. Estimated waste: $450/day \
                          ($13,500/month projected)."
                .to_string(),
            evidence: vec![
                "VM uptime: 72 hours with no active compute jobs".to_string(),
                "Last SSH session ended 71 hours ago".to_string(),
                "No auto-shutdown policy or deallocate schedule found".to_string(),
                "Cost anomaly factor: 36x baseline ($12.50/day to $450/day)".to_string(),
            ],
        };

        let diagnosis = Diagnosis::new(hypothesis, 85)
            .with_alternatives(vec![
                "Intentional long-running job not yet reflected in scheduler \
                 (unlikely, no active processes found)"
                    .to_string(),
            ])
            .with_risks(vec![
                "If VM is deallocated, any unsaved state on ephemeral disks will be lost."
                    .to_string(),
            ]);

        Ok(ProcedureResult::ok(
            ProcedureId::Diagnosis,
            now,
            now + Duration::milliseconds(320),
            diagnosis,
        ))
    }
}

#[async_trait::async_trait]
impl Procedure<PlanningInput, RemediationPlan> for FallbackRemediationProcedure {
    async fn run(
        &self,
        input: &PlanningInput,
        cancel: CancellationToken,
    ) -> Result<ProcedureResult<RemediationPlan>, ProcedureError> {
        ensure_live(&cancel)?;
        let now = self.clock.now();

        let resource_id = input
            .findings
            .resource_findings
            .as_ref()
            .and_then(|r| r.resource_id.clone())
            .or_else(|| input.findings.resource_id().map(str::to_string))
            .filter(|id| !id.trim().is_empty());

        let mut actions = Vec::with_capacity(2);
        if let Some(id) = resource_id
            .as_deref()
            .filter(|id| id.to_ascii_lowercase().contains(VM_SEGMENT))
        {
            actions.push(RemediationAction::new(
                RemediationActionType::StopVm,
                id,
                RiskLevel::High,
            ));
        }
        actions.push(RemediationAction::new(
            RemediationActionType::NotifyOwner,
            resource_id.as_deref().unwrap_or(UNKNOWN_RESOURCE),
            RiskLevel::Low,
        ));

        let plan = RemediationPlan::new(
            "Deallocate orphaned VM and notify resource owner. Estimated savings: $450/day.",
            actions,
        )
        .with_rollback_notes(
            "To restore: az vm start --name spikehound-gpu-vm --resource-group spikehound-demo-rg",
        );

        Ok(ProcedureResult::ok(
            ProcedureId::Remediation,
            now,
            now + Duration::milliseconds(90),
            plan,
        ))
    }
}
