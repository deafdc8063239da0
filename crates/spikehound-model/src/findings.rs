//! Investigation findings
//!
//! Investigator procedures return a [`ProcedureOutput`], a closed set of
//! tagged variants with an `Extension` escape hatch for plugins whose output
//! shape is not known here. The merge step folds those outputs into one
//! [`UnifiedFindings`].

use crate::alert::AlertSummary;
use crate::diagnosis::Diagnosis;
use crate::procedure::{ProcedureId, ProcedureResult};
use crate::remediation::RemediationPlan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A cost observation for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostFinding {
    pub resource_id: String,
    pub amount: f64,
    /// Unit of `amount`, e.g. `USD/day`
    pub unit: String,
}

impl CostFinding {
    #[inline]
    #[must_use]
    pub fn new(resource_id: impl Into<String>, amount: f64, unit: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            amount,
            unit: unit.into(),
        }
    }
}

/// Output of the cost investigator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationFindings {
    pub alert_id: String,
    pub received_at: DateTime<Utc>,
    pub cost_findings: Vec<CostFinding>,
    pub notes: Option<String>,
}

/// Output of the resource investigator
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceFindings {
    pub resource_id: Option<String>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl ResourceFindings {
    #[inline]
    #[must_use]
    pub fn new(resource_id: Option<String>) -> Self {
        Self {
            resource_id,
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute
    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Output of the history investigator
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryFindings {
    pub prior_incidents: u32,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl HistoryFindings {
    #[inline]
    #[must_use]
    pub fn new(prior_incidents: u32) -> Self {
        Self {
            prior_incidents,
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute
    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Output of any pipeline procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ProcedureOutput {
    Cost(InvestigationFindings),
    Resource(ResourceFindings),
    History(HistoryFindings),
    Diagnosis(Diagnosis),
    Remediation(RemediationPlan),
    /// Output of a plugin with an unknown shape
    Extension(Value),
}

/// Deterministic merge of all investigator results for one alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedFindings {
    pub alert_summary: AlertSummary,
    /// Exactly one entry per investigator per run
    pub results: BTreeMap<ProcedureId, ProcedureResult<ProcedureOutput>>,
    pub alert_id: String,
    pub received_at: DateTime<Utc>,
    pub cost_findings: Vec<CostFinding>,
    /// Absent when the resource investigator produced no data
    pub resource_findings: Option<ResourceFindings>,
    /// Absent when the history investigator produced no data
    pub history_findings: Option<HistoryFindings>,
    pub notes: Option<String>,
}

impl UnifiedFindings {
    /// Result recorded for a procedure
    #[inline]
    #[must_use]
    pub fn result(&self, procedure: ProcedureId) -> Option<&ProcedureResult<ProcedureOutput>> {
        self.results.get(&procedure)
    }

    /// Resource id from the summary, if the alert carried one
    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        self.alert_summary
            .get("resource_id")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Everything the pipeline produced for one alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationReport {
    pub unified_findings: UnifiedFindings,
    pub diagnosis_result: ProcedureResult<Diagnosis>,
    pub remediation_result: ProcedureResult<RemediationPlan>,
}

impl InvestigationReport {
    /// Investigation id (the normalized alert id)
    #[inline]
    #[must_use]
    pub fn investigation_id(&self) -> &str {
        &self.unified_findings.alert_id
    }

    /// Proposed plan, if planning produced one
    #[inline]
    #[must_use]
    pub fn plan(&self) -> Option<&RemediationPlan> {
        self.remediation_result.data()
    }
}
