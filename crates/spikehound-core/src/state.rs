//! Process-lifetime incident state
//!
//! Everything here is memory-resident and shared between concurrent
//! handlers. No lock is held across an await.

use crate::cache::IdempotencyCache;
use crate::claims::ExecutionClaims;
use crate::tokens::InvestigationTokens;
use dashmap::DashMap;
use spikehound_model::{
    ApprovalRecord, Clock, ExecutionOutcome, InvestigationReport, RemediationPlan,
};
use std::sync::Arc;
use std::time::Duration;

/// Shared state for one service instance
#[derive(Debug)]
pub struct IncidentState {
    pub reports: IdempotencyCache,
    pub claims: ExecutionClaims,
    pub tokens: InvestigationTokens,
    latest_plans: DashMap<String, RemediationPlan>,
    approvals: DashMap<String, ApprovalRecord>,
    outcomes: DashMap<String, Vec<ExecutionOutcome>>,
}

impl IncidentState {
    /// Create new state
    #[must_use]
    pub fn new(idempotency_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            reports: IdempotencyCache::new(idempotency_ttl, clock),
            claims: ExecutionClaims::new(),
            tokens: InvestigationTokens::default(),
            latest_plans: DashMap::new(),
            approvals: DashMap::new(),
            outcomes: DashMap::new(),
        }
    }

    /// Share an existing token table
    #[inline]
    #[must_use]
    pub fn with_tokens(mut self, tokens: InvestigationTokens) -> Self {
        self.tokens = tokens;
        self
    }

    /// Cache a fresh report and track its plan
    ///
    /// A report without plan data clears any earlier plan for the same id.
    pub fn store_report(&self, report: Arc<InvestigationReport>) {
        let id = report.investigation_id().to_string();
        match report.plan() {
            Some(plan) => {
                self.latest_plans.insert(id.clone(), plan.clone());
            }
            None => {
                self.latest_plans.remove(&id);
            }
        }
        self.reports.insert(id, report);
    }

    /// Latest plan for an investigation
    #[must_use]
    pub fn latest_plan(&self, investigation_id: &str) -> Option<RemediationPlan> {
        self.latest_plans.get(investigation_id).map(|p| p.clone())
    }

    /// Set the latest plan directly
    pub fn set_plan(&self, investigation_id: impl Into<String>, plan: RemediationPlan) {
        self.latest_plans.insert(investigation_id.into(), plan);
    }

    /// Record an approval; supersedes any earlier record for the id
    pub fn record_approval(&self, record: ApprovalRecord) {
        self.approvals.insert(record.investigation_id.clone(), record);
    }

    /// Latest approval record
    #[must_use]
    pub fn latest_approval(&self, investigation_id: &str) -> Option<ApprovalRecord> {
        self.approvals.get(investigation_id).map(|r| r.clone())
    }

    /// Replace the recorded outcomes of the latest execution
    pub fn record_outcomes(&self, investigation_id: impl Into<String>, outcomes: Vec<ExecutionOutcome>) {
        self.outcomes.insert(investigation_id.into(), outcomes);
    }

    /// Outcomes of the latest execution
    #[must_use]
    pub fn latest_outcomes(&self, investigation_id: &str) -> Option<Vec<ExecutionOutcome>> {
        self.outcomes.get(investigation_id).map(|o| o.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use spikehound_model::{
        AlertSummary, ApprovalDecision, ManualClock, ProcedureId, ProcedureResult,
        RemediationAction, RemediationActionType, RiskLevel, UnifiedFindings,
    };
    use std::collections::BTreeMap;

    fn report(plan: Option<RemediationPlan>) -> Arc<InvestigationReport> {
        let now = Utc::now();
        let remediation_result = match plan {
            Some(plan) => ProcedureResult::ok(ProcedureId::Remediation, now, now, plan),
            None => ProcedureResult::error(ProcedureId::Remediation, now, now, "timed out"),
        };
        Arc::new(InvestigationReport {
            unified_findings: UnifiedFindings {
                alert_summary: AlertSummary::new(),
                results: BTreeMap::new(),
                alert_id: "a1".into(),
                received_at: now,
                cost_findings: Vec::new(),
                resource_findings: None,
                history_findings: None,
                notes: None,
            },
            diagnosis_result: ProcedureResult::error(ProcedureId::Diagnosis, now, now, "n/a"),
            remediation_result,
        })
    }

    #[test]
    fn report_without_plan_clears_previous_plan() {
        let state = IncidentState::new(Duration::from_secs(600), Arc::new(ManualClock::default()));
        let plan = RemediationPlan::new(
            "stop",
            vec![RemediationAction::new(RemediationActionType::StopVm, "/vm", RiskLevel::High)],
        );

        state.store_report(report(Some(plan.clone())));
        assert_eq!(state.latest_plan("a1"), Some(plan));

        state.store_report(report(None));
        assert!(state.latest_plan("a1").is_none());
        assert!(state.reports.get("a1").is_some());
    }

    #[test]
    fn latest_approval_supersedes() {
        let state = IncidentState::new(Duration::from_secs(600), Arc::new(ManualClock::default()));
        let now = Utc::now();
        state.record_approval(ApprovalRecord::new("a1", ApprovalDecision::Reject, "bob", now));
        state.record_approval(ApprovalRecord::new("a1", ApprovalDecision::Approve, "alice", now));

        let latest = state.latest_approval("a1").unwrap();
        assert_eq!(latest.decision, ApprovalDecision::Approve);
        assert_eq!(latest.decided_by, "alice");
    }
}
