//! Chat approval ingestion
//!
//! Turns signed Slack and Discord interaction callbacks into approval
//! records, hands approvals to the remediation saga, and builds the short
//! reply shown to the approver. Authentication happens before any parsing.

use crate::error::IngestError;
use crate::scheduler::ExecutionScheduler;
use crate::workflow::RemediationWorkflow;
use serde_json::{json, Value};
use spikehound_model::{ApprovalDecision, ApprovalRecord, Clock, QueueOutcome};
use spikehound_security::{DiscordSignatureVerifier, Headers, SignatureError, SlackSignatureVerifier};
use std::sync::Arc;
use tracing::{info, warn};

/// Source tag for Slack approvals
pub const SLACK_SOURCE: &str = "slack";
/// Source tag for Discord approvals
pub const DISCORD_SOURCE: &str = "discord";

const UNKNOWN_USER: &str = "unknown-user";
const DISCORD_PING: i64 = 1;
const DISCORD_COMPONENT: i64 = 3;

/// A parsed, not yet resolved, interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInteraction {
    pub decision: ApprovalDecision,
    /// Investigation id, or an opaque token for Discord
    pub reference: String,
    pub decided_by: String,
}

/// Reply to a recorded decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionReply {
    pub text: String,
    pub outcome: QueueOutcome,
    pub record: ApprovalRecord,
}

impl InteractionReply {
    /// Slack response body
    #[must_use]
    pub fn slack_body(&self) -> Value {
        json!({ "text": self.text })
    }

    /// Discord ephemeral channel-message response body
    #[must_use]
    pub fn discord_body(&self) -> Value {
        json!({ "type": 4, "data": { "content": self.text, "flags": 64 } })
    }
}

/// Outcome of a Discord interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscordResponse {
    /// Answer to Discord's endpoint ping
    Pong,
    Reply(InteractionReply),
}

impl DiscordResponse {
    /// Response body
    #[must_use]
    pub fn body(&self) -> Value {
        match self {
            DiscordResponse::Pong => json!({ "type": 1 }),
            DiscordResponse::Reply(reply) => reply.discord_body(),
        }
    }
}

/// Parse a Slack block-actions callback body
pub fn parse_slack_interaction(body: &[u8]) -> Result<ParsedInteraction, IngestError> {
    let raw = url::form_urlencoded::parse(body)
        .find(|(key, _)| key == "payload")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| IngestError::Malformed("missing slack payload".into()))?;
    let payload: Value = serde_json::from_str(&raw)
        .map_err(|_| IngestError::Malformed("invalid slack payload".into()))?;

    let action = payload
        .get("actions")
        .and_then(Value::as_array)
        .and_then(|actions| actions.first())
        .ok_or_else(|| IngestError::Malformed("missing slack action".into()))?;
    if !action.is_object() {
        return Err(IngestError::Malformed("invalid slack action".into()));
    }

    let action_id = action.get("action_id").and_then(Value::as_str).unwrap_or_default();
    let decision = ApprovalDecision::from_action_id(action_id)
        .ok_or_else(|| IngestError::UnknownAction(action_id.to_string()))?;

    let reference = action
        .get("value")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| IngestError::Malformed("missing investigation id".into()))?;

    let decided_by = payload
        .get("user")
        .and_then(|user| {
            ["username", "name", "id"]
                .iter()
                .find_map(|key| non_blank(user.get(*key)))
        })
        .unwrap_or(UNKNOWN_USER);

    Ok(ParsedInteraction {
        decision,
        reference: reference.to_string(),
        decided_by: decided_by.to_string(),
    })
}

/// Parse a Discord interaction body; `None` means a ping
pub fn parse_discord_interaction(body: &[u8]) -> Result<Option<ParsedInteraction>, IngestError> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|_| IngestError::Malformed("invalid discord payload".into()))?;
    if !payload.is_object() {
        return Err(IngestError::Malformed("invalid discord payload".into()));
    }

    match payload.get("type").and_then(Value::as_i64).unwrap_or(0) {
        DISCORD_PING => return Ok(None),
        DISCORD_COMPONENT => {}
        other => return Err(IngestError::UnsupportedType(other)),
    }

    let custom_id = payload
        .get("data")
        .and_then(|data| data.get("custom_id"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let (action_id, reference) = split_custom_id(custom_id)
        .ok_or_else(|| IngestError::Malformed("invalid discord action".into()))?;
    let decision = ApprovalDecision::from_action_id(action_id)
        .ok_or_else(|| IngestError::UnknownAction(action_id.to_string()))?;

    let decided_by = non_blank(payload.pointer("/member/user/username"))
        .or_else(|| non_blank(payload.pointer("/user/username")))
        .unwrap_or(UNKNOWN_USER);

    Ok(Some(ParsedInteraction {
        decision,
        reference: reference.to_string(),
        decided_by: decided_by.to_string(),
    }))
}

/// Split `action_id:reference`; both sides must be non-empty
#[must_use]
pub fn split_custom_id(custom_id: &str) -> Option<(&str, &str)> {
    let idx = custom_id.find(':')?;
    if idx == 0 || idx >= custom_id.len() - 1 {
        return None;
    }
    Some((&custom_id[..idx], &custom_id[idx + 1..]))
}

fn non_blank(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Authenticated entry point for chat approvals
pub struct ApprovalIngress {
    workflow: Arc<RemediationWorkflow>,
    scheduler: Arc<dyn ExecutionScheduler>,
    slack: SlackSignatureVerifier,
    discord: DiscordSignatureVerifier,
    clock: Arc<dyn Clock>,
}

impl ApprovalIngress {
    /// Create new ingress
    #[must_use]
    pub fn new(
        workflow: Arc<RemediationWorkflow>,
        scheduler: Arc<dyn ExecutionScheduler>,
        slack: SlackSignatureVerifier,
        discord: DiscordSignatureVerifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            workflow,
            scheduler,
            slack,
            discord,
            clock,
        }
    }

    /// Handle a Slack interaction callback
    pub async fn handle_slack(&self, headers: &Headers, body: &[u8]) -> Result<InteractionReply, IngestError> {
        self.slack
            .check(headers, body, self.clock.epoch_seconds())
            .map_err(|err| rejected(SLACK_SOURCE, err))?;

        let parsed = parse_slack_interaction(body)?;
        Ok(self.record(parsed.reference.clone(), parsed, SLACK_SOURCE, "*").await)
    }

    /// Handle a Discord interaction callback
    pub async fn handle_discord(&self, headers: &Headers, body: &[u8]) -> Result<DiscordResponse, IngestError> {
        self.discord
            .check(headers, body, self.clock.epoch_seconds())
            .map_err(|err| rejected(DISCORD_SOURCE, err))?;

        let Some(parsed) = parse_discord_interaction(body)? else {
            return Ok(DiscordResponse::Pong);
        };
        let investigation_id = self.workflow.state().tokens.resolve(&parsed.reference).await;
        Ok(DiscordResponse::Reply(
            self.record(investigation_id, parsed, DISCORD_SOURCE, "**").await,
        ))
    }

    async fn record(
        &self,
        investigation_id: String,
        parsed: ParsedInteraction,
        source: &str,
        emphasis: &str,
    ) -> InteractionReply {
        let record = ApprovalRecord::new(
            investigation_id.as_str(),
            parsed.decision,
            parsed.decided_by,
            self.clock.now(),
        );
        self.workflow.state().record_approval(record.clone());
        info!(
            investigation_id = %investigation_id,
            decision = %record.decision,
            decided_by = %record.decided_by,
            source,
            "approval_recorded"
        );

        let outcome = self
            .workflow
            .queue_approved_execution(&investigation_id, &record, source, self.scheduler.as_ref())
            .await;

        let mut text = format!(
            "Recorded {emphasis}{}{emphasis} decision for investigation `{investigation_id}`.",
            record.decision
        );
        if let Some(sentence) = outcome.user_text() {
            text.push(' ');
            text.push_str(sentence);
        }

        InteractionReply {
            text,
            outcome,
            record,
        }
    }
}

fn rejected(source: &str, err: SignatureError) -> IngestError {
    warn!(source, reason = %err, "interaction_rejected");
    IngestError::Unauthorized(err)
}

impl std::fmt::Debug for ApprovalIngress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalIngress")
            .field("slack", &self.slack)
            .field("discord", &self.discord)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn slack_body(payload: &Value) -> Vec<u8> {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("payload", &payload.to_string())
            .finish()
            .into_bytes()
    }

    #[test]
    fn slack_action_and_user() {
        let body = slack_body(&json!({
            "user": { "id": "U1", "name": "", "username": "alice" },
            "actions": [{ "action_id": "approve_remediation", "value": "a1" }]
        }));
        let parsed = parse_slack_interaction(&body).unwrap();
        assert_eq!(
            parsed,
            ParsedInteraction {
                decision: ApprovalDecision::Approve,
                reference: "a1".into(),
                decided_by: "alice".into(),
            }
        );
    }

    #[test]
    fn slack_user_falls_back_to_id_then_unknown() {
        let body = slack_body(&json!({
            "user": { "id": "U1" },
            "actions": [{ "action_id": "reject_remediation", "value": "a1" }]
        }));
        assert_eq!(parse_slack_interaction(&body).unwrap().decided_by, "U1");

        let body = slack_body(&json!({
            "actions": [{ "action_id": "investigate_more", "value": "a1" }]
        }));
        assert_eq!(parse_slack_interaction(&body).unwrap().decided_by, UNKNOWN_USER);
    }

    #[test]
    fn slack_rejects_bad_shapes() {
        assert_eq!(
            parse_slack_interaction(b"other=1").unwrap_err(),
            IngestError::Malformed("missing slack payload".into())
        );
        let body = slack_body(&json!({ "actions": [] }));
        assert_eq!(
            parse_slack_interaction(&body).unwrap_err(),
            IngestError::Malformed("missing slack action".into())
        );
        let body = slack_body(&json!({ "actions": [{ "action_id": "nuke", "value": "a1" }] }));
        assert_eq!(
            parse_slack_interaction(&body).unwrap_err(),
            IngestError::UnknownAction("nuke".into())
        );
        let body = slack_body(&json!({ "actions": [{ "action_id": "approve_remediation" }] }));
        assert_eq!(
            parse_slack_interaction(&body).unwrap_err(),
            IngestError::Malformed("missing investigation id".into())
        );
    }

    #[test]
    fn discord_ping_and_component() {
        assert_eq!(parse_discord_interaction(br#"{"type":1}"#).unwrap(), None);

        let body = json!({
            "type": 3,
            "data": { "custom_id": "approve_remediation:inv_abc" },
            "member": { "user": { "username": "carol" } },
            "user": { "username": "ignored" }
        });
        let parsed = parse_discord_interaction(body.to_string().as_bytes())
            .unwrap()
            .unwrap();
        assert_eq!(parsed.reference, "inv_abc");
        assert_eq!(parsed.decided_by, "carol");
    }

    #[test]
    fn discord_rejects_other_types() {
        assert_eq!(
            parse_discord_interaction(br#"{"type":2}"#).unwrap_err(),
            IngestError::UnsupportedType(2)
        );
        assert_eq!(
            parse_discord_interaction(br#"{"type":3,"data":{"custom_id":"approve_remediation:"}}"#)
                .unwrap_err(),
            IngestError::Malformed("invalid discord action".into())
        );
    }

    #[test]
    fn custom_id_split() {
        assert_eq!(split_custom_id("approve:a:b"), Some(("approve", "a:b")));
        assert_eq!(split_custom_id(":a1"), None);
        assert_eq!(split_custom_id("approve:"), None);
        assert_eq!(split_custom_id("approve"), None);
        assert_eq!(split_custom_id(""), None);
    }

    #[test]
    fn response_bodies() {
        assert_eq!(DiscordResponse::Pong.body(), json!({ "type": 1 }));
    }
}
