//! Alert normalization
//!
//! Turns an arbitrary monitoring payload into a [`NormalizedAlert`]. Field
//! priority:
//! 1. Direct top-level fields (`alert_id`, `resource_id`, ...)
//! 2. Azure Monitor common-schema paths under `data.essentials` and
//!    `data.alertContext`
//! 3. A recursive scan for anything that looks like a resource identifier
//!
//! Normalization never fails; missing fields are defaulted.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Alert id used when the payload carries none
pub const UNKNOWN_ALERT_ID: &str = "unknown-alert";

/// Alert summary handed to procedures and kept in the unified findings
pub type AlertSummary = BTreeMap<String, Value>;

/// Top-level payload fields copied into the summary verbatim
const PRESERVED_FIELDS: [&str; 4] = ["title", "anomaly_type", "resource_name", "resource_type"];

/// Normalized view of an inbound alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedAlert {
    /// Correlation key for caching, approvals and execution claims
    pub alert_id: String,
    /// Alert rule name
    pub rule_name: String,
    /// Provider severity string
    pub severity: String,
    /// When the alert fired (provider format, RFC 3339 when defaulted)
    pub fired_at: String,
    /// Human summary
    pub summary: String,
    /// Affected resource, if one could be found
    pub resource_id: Option<String>,
}

impl NormalizedAlert {
    /// Build the alert summary map for this alert
    #[must_use]
    pub fn summary_map(&self, raw: &Value, received_at: DateTime<Utc>) -> AlertSummary {
        let mut summary = AlertSummary::new();
        summary.insert("alert_id".into(), Value::String(self.alert_id.clone()));
        summary.insert(
            "received_at".into(),
            Value::String(received_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        summary.insert("rule_name".into(), Value::String(self.rule_name.clone()));
        summary.insert("severity".into(), Value::String(self.severity.clone()));
        summary.insert("fired_date_time".into(), Value::String(self.fired_at.clone()));
        summary.insert("summary".into(), Value::String(self.summary.clone()));

        if let Some(resource_id) = self.resource_id.as_deref().filter(|r| !r.trim().is_empty()) {
            summary.insert("resource_id".into(), Value::String(resource_id.to_string()));
        }

        if let Value::Object(map) = raw {
            for key in PRESERVED_FIELDS {
                match map.get(key) {
                    Some(Value::String(s)) => {
                        summary.insert(key.into(), Value::String(s.clone()));
                    }
                    Some(Value::Null) | None => {}
                    Some(other) => {
                        summary.insert(key.into(), Value::String(other.to_string()));
                    }
                }
            }
        }

        summary
    }
}

/// Stateless alert normalizer
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertNormalizer;

impl AlertNormalizer {
    /// Normalize a raw alert payload
    ///
    /// `now` is only used to default the fired-at time.
    #[must_use]
    pub fn normalize(payload: &Value, now: DateTime<Utc>) -> NormalizedAlert {
        let alert_id = first_non_empty([
            string_at(payload, &["alert_id"]),
            string_at(payload, &["alertId"]),
            string_at(payload, &["id"]),
            string_at(payload, &["data", "essentials", "alertId"]),
            string_at(payload, &["data", "essentials", "originAlertId"]),
        ]);

        let rule_name = first_non_empty([
            string_at(payload, &["rule_name"]),
            string_at(payload, &["ruleName"]),
            string_at(payload, &["data", "essentials", "alertRule"]),
            string_at(payload, &["summary"]),
            string_at(payload, &["title"]),
        ]);

        let severity = first_non_empty([
            string_at(payload, &["severity"]),
            string_at(payload, &["data", "essentials", "severity"]),
            string_at(payload, &["data", "alertContext", "severity"]),
        ]);

        let fired_at = first_non_empty([
            string_at(payload, &["fired_date_time"]),
            string_at(payload, &["firedDateTime"]),
            string_at(payload, &["data", "essentials", "firedDateTime"]),
            string_at(payload, &["timestamp"]),
        ]);

        let resource_id = first_non_empty([
            string_at(payload, &["resource_id"]),
            string_at(payload, &["resourceId"]),
            first_string_in_array(payload, &["data", "essentials", "alertTargetIDs"]),
            string_at(payload, &["data", "alertContext", "resourceId"]),
            scan_resource_id(payload),
        ]);

        NormalizedAlert {
            alert_id: alert_id.unwrap_or_else(|| UNKNOWN_ALERT_ID.to_string()),
            summary: rule_name.clone().unwrap_or_else(|| "Alert received".to_string()),
            rule_name: rule_name.unwrap_or_else(|| "unknown-rule".to_string()),
            severity: severity.unwrap_or_else(|| "unknown".to_string()),
            fired_at: fired_at
                .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true)),
            resource_id,
        }
    }
}

fn walk<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(root, |current, segment| current.as_object()?.get(*segment))
}

fn string_at(root: &Value, path: &[&str]) -> Option<String> {
    walk(root, path)?.as_str().map(str::to_string)
}

fn first_string_in_array(root: &Value, path: &[&str]) -> Option<String> {
    walk(root, path)?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn first_non_empty<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
}

fn scan_resource_id(payload: &Value) -> Option<String> {
    let mut candidates = Vec::new();
    collect_resource_ids(payload, &mut candidates);
    candidates.into_iter().find(|c| !c.trim().is_empty())
}

// Depth-first, document order.
fn collect_resource_ids(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let lowered = key.to_ascii_lowercase();
                if let Value::String(s) = child {
                    let is_resource_key =
                        matches!(lowered.as_str(), "resource_id" | "resourceid" | "resourceuri");
                    let is_arm_id = lowered == "id"
                        && s.to_ascii_lowercase().starts_with("/subscriptions/");
                    if is_resource_key || is_arm_id {
                        out.push(s.clone());
                    }
                }
                if child.is_object() || child.is_array() {
                    collect_resource_ids(child, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_resource_ids(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn direct_fields_win() {
        let payload = json!({
            "alert_id": " a1 ",
            "rule_name": "cost-spike",
            "severity": "Sev3",
            "resource_id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm1",
            "data": { "essentials": { "alertId": "other" } }
        });

        let alert = AlertNormalizer::normalize(&payload, now());
        assert_eq!(alert.alert_id, "a1");
        assert_eq!(alert.rule_name, "cost-spike");
        assert_eq!(alert.summary, "cost-spike");
        assert_eq!(alert.severity, "Sev3");
        assert!(alert.resource_id.unwrap().ends_with("/virtualMachines/vm1"));
    }

    #[test]
    fn common_schema_paths() {
        let payload = json!({
            "schemaId": "azureMonitorCommonAlertSchema",
            "data": {
                "essentials": {
                    "alertId": "/subscriptions/s/providers/Microsoft.AlertsManagement/alerts/123",
                    "alertRule": "budget-rule",
                    "severity": "Sev2",
                    "firedDateTime": "2024-01-01T00:00:00Z",
                    "alertTargetIDs": ["", "/subscriptions/s/resourceGroups/rg"]
                }
            }
        });

        let alert = AlertNormalizer::normalize(&payload, now());
        assert!(alert.alert_id.ends_with("/alerts/123"));
        assert_eq!(alert.rule_name, "budget-rule");
        assert_eq!(alert.severity, "Sev2");
        assert_eq!(alert.fired_at, "2024-01-01T00:00:00Z");
        assert_eq!(alert.resource_id.as_deref(), Some("/subscriptions/s/resourceGroups/rg"));
    }

    #[test]
    fn recursive_scan_finds_arm_id() {
        let payload = json!({
            "alert_id": "a2",
            "nested": [{ "deeper": { "id": "/subscriptions/x/resourceGroups/y" } }]
        });

        let alert = AlertNormalizer::normalize(&payload, now());
        assert_eq!(alert.resource_id.as_deref(), Some("/subscriptions/x/resourceGroups/y"));
    }

    #[test]
    fn defaults_never_fail() {
        let alert = AlertNormalizer::normalize(&json!("not an object"), now());

        assert_eq!(alert.alert_id, UNKNOWN_ALERT_ID);
        assert_eq!(alert.rule_name, "unknown-rule");
        assert_eq!(alert.severity, "unknown");
        assert_eq!(alert.summary, "Alert received");
        assert!(alert.fired_at.starts_with("2023-11-14T"));
        assert!(alert.resource_id.is_none());
    }

    #[test]
    fn summary_map_preserves_selected_fields() {
        let raw = json!({ "alert_id": "a3", "title": "Spend spike", "resource_type": 5 });
        let alert = AlertNormalizer::normalize(&raw, now());
        let summary = alert.summary_map(&raw, now());

        assert_eq!(summary["alert_id"], json!("a3"));
        assert_eq!(summary["title"], json!("Spend spike"));
        assert_eq!(summary["resource_type"], json!("5"));
        assert!(!summary.contains_key("resource_id"));
        assert_eq!(summary["received_at"], json!("2023-11-14T22:13:20.000Z"));
    }
}
