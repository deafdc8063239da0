//! Findings merge
//!
//! Folds investigator results into [`UnifiedFindings`]. Results are ordered
//! by procedure name, then finish time, then start time before folding, so
//! the output does not depend on the order the results arrived in.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use spikehound_model::{
    AlertSummary, HistoryFindings, InvestigationFindings, ProcedureId, ProcedureOutput,
    ProcedureResult, ResourceFindings, UnifiedFindings, UNKNOWN_ALERT_ID,
};
use std::collections::BTreeMap;

/// Merge investigator results and the alert summary
#[must_use]
pub fn merge_findings(
    alert_summary: AlertSummary,
    mut results: Vec<ProcedureResult<ProcedureOutput>>,
) -> UnifiedFindings {
    results.sort_by(|a, b| {
        a.procedure
            .as_str()
            .cmp(b.procedure.as_str())
            .then(a.finished_at.cmp(&b.finished_at))
            .then(a.started_at.cmp(&b.started_at))
    });

    let results: BTreeMap<ProcedureId, ProcedureResult<ProcedureOutput>> = results
        .into_iter()
        .map(|result| (result.procedure, result))
        .collect();

    let cost: Option<InvestigationFindings> = extract(&results, ProcedureId::Cost, |output| match output {
        ProcedureOutput::Cost(findings) => Some(findings.clone()),
        _ => None,
    });
    let resource_findings: Option<ResourceFindings> =
        extract(&results, ProcedureId::Resource, |output| match output {
            ProcedureOutput::Resource(findings) => Some(findings.clone()),
            _ => None,
        });
    let history_findings: Option<HistoryFindings> =
        extract(&results, ProcedureId::History, |output| match output {
            ProcedureOutput::History(findings) => Some(findings.clone()),
            _ => None,
        });

    let summary_alert_id = alert_summary
        .get("alert_id")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);
    let summary_received_at = alert_summary
        .get("received_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let (alert_id, received_at, cost_findings, notes) = match cost {
        Some(cost) => (cost.alert_id, cost.received_at, cost.cost_findings, cost.notes),
        None => (
            summary_alert_id.unwrap_or_else(|| UNKNOWN_ALERT_ID.to_string()),
            summary_received_at.unwrap_or(DateTime::UNIX_EPOCH),
            Vec::new(),
            None,
        ),
    };

    UnifiedFindings {
        alert_summary,
        results,
        alert_id,
        received_at,
        cost_findings,
        resource_findings,
        history_findings,
        notes,
    }
}

// Typed variant first; an extension payload is accepted when it has the
// expected shape.
fn extract<T: DeserializeOwned>(
    results: &BTreeMap<ProcedureId, ProcedureResult<ProcedureOutput>>,
    procedure: ProcedureId,
    typed: impl Fn(&ProcedureOutput) -> Option<T>,
) -> Option<T> {
    let output = results.get(&procedure)?.data()?;
    match output {
        ProcedureOutput::Extension(value) => serde_json::from_value(value.clone()).ok(),
        other => typed(other),
    }
}
