//! Remediation plans and actions
//!
//! Every [`RemediationAction`] requires human approval. The flag is not a
//! field: it is always serialized as `true` and ignored on input.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Kind of corrective step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationActionType {
    StopVm,
    ResizeVm,
    AddAutoShutdown,
    NotifyOwner,
    OpenTicket,
}

impl RemediationActionType {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RemediationActionType::StopVm => "stop_vm",
            RemediationActionType::ResizeVm => "resize_vm",
            RemediationActionType::AddAutoShutdown => "add_auto_shutdown",
            RemediationActionType::NotifyOwner => "notify_owner",
            RemediationActionType::OpenTicket => "open_ticket",
        }
    }
}

impl Display for RemediationActionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk of applying an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// One individually approvable corrective step
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemediationAction {
    #[serde(rename = "type")]
    pub action_type: RemediationActionType,
    pub target_resource_id: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    pub risk_level: RiskLevel,
}

impl RemediationAction {
    /// Create new action without parameters
    #[inline]
    #[must_use]
    pub fn new(
        action_type: RemediationActionType,
        target_resource_id: impl Into<String>,
        risk_level: RiskLevel,
    ) -> Self {
        Self {
            action_type,
            target_resource_id: target_resource_id.into(),
            parameters: BTreeMap::new(),
            risk_level,
        }
    }

    /// Add a parameter
    #[inline]
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Whether a human must approve before execution (always true)
    #[inline]
    #[must_use]
    pub const fn human_approval_required(&self) -> bool {
        true
    }
}

impl Serialize for RemediationAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RemediationAction", 5)?;
        state.serialize_field("type", &self.action_type)?;
        state.serialize_field("target_resource_id", &self.target_resource_id)?;
        state.serialize_field("parameters", &self.parameters)?;
        state.serialize_field("risk_level", &self.risk_level)?;
        state.serialize_field("human_approval_required", &self.human_approval_required())?;
        state.end()
    }
}

/// Ordered list of proposed actions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemediationPlan {
    pub summary: String,
    pub actions: Vec<RemediationAction>,
    #[serde(default)]
    pub rollback_notes: Option<String>,
}

impl RemediationPlan {
    /// Create new plan
    #[inline]
    #[must_use]
    pub fn new(summary: impl Into<String>, actions: Vec<RemediationAction>) -> Self {
        Self {
            summary: summary.into(),
            actions,
            rollback_notes: None,
        }
    }

    /// Set rollback notes
    #[inline]
    #[must_use]
    pub fn with_rollback_notes(mut self, notes: impl Into<String>) -> Self {
        self.rollback_notes = Some(notes.into());
        self
    }

    /// A plan with no actions is not executable
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn approval_flag_always_serialized_true() {
        let action = RemediationAction::new(RemediationActionType::StopVm, "/vm", RiskLevel::High);
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["human_approval_required"], json!(true));
        assert_eq!(value["type"], json!("stop_vm"));
    }

    #[test]
    fn approval_flag_ignored_on_input() {
        let action: RemediationAction = serde_json::from_value(json!({
            "type": "notify_owner",
            "target_resource_id": "/r",
            "risk_level": "low",
            "human_approval_required": false
        }))
        .unwrap();

        assert!(action.human_approval_required());
        assert_eq!(action.action_type, RemediationActionType::NotifyOwner);
    }
}
