//! Notification sinks
//!
//! Delivery is best-effort everywhere: callers log a returned
//! [`NotifyError`] and carry on.

use crate::config::SpikehoundConfig;
use crate::error::NotifyError;
use crate::tokens::InvestigationTokens;
use serde_json::{json, Value};
use spikehound_model::InvestigationReport;
use std::time::Duration;
use url::Url;

/// Per-request bound for webhook posts
pub const WEBHOOK_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives finished reports and remediation follow-ups
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Announce a finished investigation
    async fn notify_report(&self, report: &InvestigationReport) -> Result<(), NotifyError>;

    /// Post a remediation follow-up message
    async fn notify_followup(&self, message: &str) -> Result<(), NotifyError>;
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotificationSink;

#[async_trait::async_trait]
impl NotificationSink for NoopNotificationSink {
    async fn notify_report(&self, _report: &InvestigationReport) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn notify_followup(&self, _message: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Posts to Slack and Discord incoming webhooks
#[derive(Debug, Clone)]
pub struct WebhookNotificationSink {
    client: reqwest::Client,
    slack_url: Option<Url>,
    discord_url: Option<Url>,
    tokens: InvestigationTokens,
}

impl WebhookNotificationSink {
    /// Create new sink; either URL may be absent
    pub fn new(
        slack_url: Option<Url>,
        discord_url: Option<Url>,
        tokens: InvestigationTokens,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            slack_url,
            discord_url: discord_url.map(with_components),
            tokens,
        })
    }

    /// Build from the configured webhook URLs
    pub fn from_config(config: &SpikehoundConfig, tokens: InvestigationTokens) -> Result<Self, NotifyError> {
        let slack_url = config.slack_webhook_url.as_deref().map(Url::parse).transpose()?;
        let discord_url = config.discord_webhook_url.as_deref().map(Url::parse).transpose()?;
        Self::new(slack_url, discord_url, tokens)
    }

    /// Whether any channel is configured
    #[inline]
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.slack_url.is_some() || self.discord_url.is_some()
    }

    async fn post(&self, url: &Url, payload: &Value) -> Result<(), NotifyError> {
        self.client
            .post(url.clone())
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn deliver(&self, slack: Option<Value>, discord: Option<Value>, event: &str) -> Result<(), NotifyError> {
        let mut failures = Vec::new();

        if let (Some(url), Some(payload)) = (&self.slack_url, slack) {
            if let Err(err) = self.post(url, &payload).await {
                tracing::warn!(channel = "slack", error = %err, event, "notification_failed");
                failures.push(format!("slack: {err}"));
            }
        }
        if let (Some(url), Some(payload)) = (&self.discord_url, discord) {
            if let Err(err) = self.post(url, &payload).await {
                tracing::warn!(channel = "discord", error = %err, event, "notification_failed");
                failures.push(format!("discord: {err}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(NotifyError::Delivery(failures.join("; ")))
        }
    }
}

#[async_trait::async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn notify_report(&self, report: &InvestigationReport) -> Result<(), NotifyError> {
        let slack = self.slack_url.as_ref().map(|_| slack_report_payload(report));
        let discord = match self.discord_url {
            Some(_) => {
                let token = self.tokens.remember(report.investigation_id()).await;
                Some(discord_report_payload(report, &token))
            }
            None => None,
        };
        self.deliver(slack, discord, "report").await
    }

    async fn notify_followup(&self, message: &str) -> Result<(), NotifyError> {
        let slack = Some(json!({ "text": message }));
        let discord = Some(json!({
            "content": message,
            "allowed_mentions": { "parse": [] },
        }));
        self.deliver(slack, discord, "followup").await
    }
}

fn with_components(mut url: Url) -> Url {
    if !url.query_pairs().any(|(key, _)| key.eq_ignore_ascii_case("with_components")) {
        url.query_pairs_mut().append_pair("with_components", "true");
    }
    url
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    if max_chars <= 3 {
        return value.chars().take(max_chars).collect();
    }
    let mut out: String = value.chars().take(max_chars - 3).collect();
    out.push_str("...");
    out
}

fn root_cause(report: &InvestigationReport) -> String {
    report
        .diagnosis_result
        .data()
        .map(|d| d.hypothesis.explanation.clone())
        .or_else(|| report.diagnosis_result.first_error().map(str::to_string))
        .unwrap_or_else(|| "Diagnosis unavailable.".to_string())
}

fn confidence_text(report: &InvestigationReport) -> String {
    report
        .diagnosis_result
        .data()
        .map_or_else(|| "n/a".to_string(), |d| format!("{}%", d.confidence()))
}

/// Slack message for a finished report, with decision buttons when a plan exists
#[must_use]
pub fn slack_report_payload(report: &InvestigationReport) -> Value {
    let alert_id = report.investigation_id();
    let top_cost = report
        .unified_findings
        .cost_findings
        .iter()
        .max_by(|a, b| a.amount.total_cmp(&b.amount))
        .map_or_else(
            || "No explicit cost finding".to_string(),
            |c| format!("`{}` ({:.2} {})", truncate(&c.resource_id, 120), c.amount, c.unit),
        );
    let first_action = report.plan().and_then(|p| p.actions.first());
    let first_action_text = first_action.map_or_else(
        || "No remediation action available".to_string(),
        |a| format!("{} on `{}`", a.action_type, truncate(&a.target_resource_id, 120)),
    );

    let mut blocks = vec![
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Incident investigation complete*\nAlert: `{alert_id}`") },
        }),
        json!({
            "type": "section",
            "fields": [
                { "type": "mrkdwn", "text": format!("*Top cost driver*\n{top_cost}") },
                { "type": "mrkdwn", "text": format!("*Confidence*\n{}", confidence_text(report)) },
            ],
        }),
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Root cause*\n{}", truncate(&root_cause(report), 400)) },
        }),
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*First remediation action*\n{first_action_text}") },
        }),
    ];

    if first_action.is_some() {
        blocks.push(json!({
            "type": "actions",
            "elements": [
                { "type": "button", "text": { "type": "plain_text", "text": "Approve", "emoji": true },
                  "style": "primary", "action_id": "approve_remediation", "value": alert_id },
                { "type": "button", "text": { "type": "plain_text", "text": "Reject", "emoji": true },
                  "style": "danger", "action_id": "reject_remediation", "value": alert_id },
                { "type": "button", "text": { "type": "plain_text", "text": "Investigate More", "emoji": true },
                  "action_id": "investigate_more", "value": alert_id },
            ],
        }));
    }

    json!({
        "text": format!("Investigation `{alert_id}` complete."),
        "blocks": blocks,
    })
}

/// Discord message for a finished report; buttons carry `token`, not the raw id
#[must_use]
pub fn discord_report_payload(report: &InvestigationReport, token: &str) -> Value {
    let alert_id = report.investigation_id();
    let first_action = report.plan().and_then(|p| p.actions.first());

    let mut lines = vec![
        "Incident investigation complete".to_string(),
        format!("Alert: `{alert_id}`"),
        format!("Confidence: {}", confidence_text(report)),
        format!("Root cause: {}", truncate(&root_cause(report), 300)),
    ];
    if let Some(action) = first_action {
        lines.push(format!(
            "First remediation action: {} on `{}`",
            action.action_type,
            truncate(&action.target_resource_id, 100)
        ));
    }

    let mut payload = json!({
        "content": lines.join("\n"),
        "allowed_mentions": { "parse": [] },
    });

    if first_action.is_some() {
        payload["components"] = json!([{
            "type": 1,
            "components": [
                { "type": 2, "style": 3, "custom_id": format!("approve_remediation:{token}"), "label": "Approve" },
                { "type": 2, "style": 4, "custom_id": format!("reject_remediation:{token}"), "label": "Reject" },
                { "type": 2, "style": 1, "custom_id": format!("investigate_more:{token}"), "label": "Investigate More" },
            ],
        }]);
    }
    payload
}
