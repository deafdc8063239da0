//! Testing utilities for Spikehound workspace
//!
//! Shared fixtures, scripted collaborators and request-signing helpers.

#![allow(missing_docs)]

use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};
use parking_lot::Mutex;
use serde_json::{json, Value};
use spikehound_core::{
    ActionExecutor, ExecutionScheduler, ExecutorError, NotificationSink, NotifyError, Procedure,
    ProcedureError, ScheduleError,
};
use spikehound_model::{
    ActionReport, ApprovalDecision, ApprovalRecord, ExecutionRequest, InvestigationReport,
    ProcedureId, ProcedureOutput, ProcedureResult, RemediationAction, RemediationActionType,
    RemediationPlan, RiskLevel, ScheduleHandle,
};
use spikehound_security::{
    Headers, SlackSignatureVerifier, DISCORD_SIGNATURE_HEADER, DISCORD_TIMESTAMP_HEADER,
    SLACK_SIGNATURE_HEADER, SLACK_TIMESTAMP_HEADER,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const VM_ID: &str =
    "/subscriptions/sub-1/resourceGroups/rg-prod/providers/Microsoft.Compute/virtualMachines/vm1";

// ----- fixtures -----

pub fn vm_alert(alert_id: &str) -> Value {
    json!({ "alertId": alert_id, "resourceId": VM_ID, "severity": "Sev2" })
}

pub fn plain_alert(alert_id: &str) -> Value {
    json!({ "alert_id": alert_id })
}

pub fn stop_and_notify_plan(target: &str) -> RemediationPlan {
    RemediationPlan::new(
        "Stop the VM and tell the owner",
        vec![
            RemediationAction::new(RemediationActionType::StopVm, target, RiskLevel::High),
            RemediationAction::new(RemediationActionType::NotifyOwner, target, RiskLevel::Low),
        ],
    )
}

pub fn record(investigation_id: &str, decision: ApprovalDecision, user: &str) -> ApprovalRecord {
    ApprovalRecord::new(investigation_id, decision, user, Utc::now())
}

pub fn approve(investigation_id: &str) -> ApprovalRecord {
    record(investigation_id, ApprovalDecision::Approve, "alice")
}

// ----- executors -----

/// Executor that records every call and succeeds
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<RemediationAction>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RemediationAction> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn execute(
        &self,
        action: &RemediationAction,
        _cancel: CancellationToken,
    ) -> Result<ActionReport, ExecutorError> {
        self.calls.lock().push(action.clone());
        Ok(ActionReport::ok(format!("{} done", action.action_type)))
    }
}

/// Executor that fails, or panics, on one action type
#[derive(Debug)]
pub struct FailingExecutor {
    on: RemediationActionType,
    message: String,
    panic: bool,
    calls: Mutex<Vec<RemediationActionType>>,
}

impl FailingExecutor {
    pub fn failing_on(on: RemediationActionType, message: &str) -> Self {
        Self {
            on,
            message: message.to_string(),
            panic: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn panicking_on(on: RemediationActionType, message: &str) -> Self {
        Self {
            panic: true,
            ..Self::failing_on(on, message)
        }
    }

    pub fn calls(&self) -> Vec<RemediationActionType> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl ActionExecutor for FailingExecutor {
    async fn execute(
        &self,
        action: &RemediationAction,
        _cancel: CancellationToken,
    ) -> Result<ActionReport, ExecutorError> {
        self.calls.lock().push(action.action_type);
        if action.action_type != self.on {
            return Ok(ActionReport::ok("done"));
        }
        if self.panic {
            panic!("{}", self.message);
        }
        Err(ExecutorError::failed(self.message.clone()))
    }
}

/// Executor that blocks until its token is cancelled
#[derive(Debug, Default)]
pub struct BlockingExecutor;

#[async_trait::async_trait]
impl ActionExecutor for BlockingExecutor {
    async fn execute(
        &self,
        _action: &RemediationAction,
        cancel: CancellationToken,
    ) -> Result<ActionReport, ExecutorError> {
        cancel.cancelled().await;
        Err(ExecutorError::Cancelled)
    }
}

// ----- schedulers -----

/// Scheduler that records requests; can be switched to fail
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    requests: Mutex<Vec<ExecutionRequest>>,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let scheduler = Self::default();
        scheduler.set_failing(true);
        scheduler
    }

    /// Sleep inside each handoff, widening race windows
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait::async_trait]
impl ExecutionScheduler for RecordingScheduler {
    async fn schedule(&self, request: ExecutionRequest) -> Result<ScheduleHandle, ScheduleError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ScheduleError::Handoff("scheduler offline".into()));
        }
        let mut requests = self.requests.lock();
        requests.push(request);
        Ok(ScheduleHandle::new(format!("exec-{}", requests.len())))
    }
}

// ----- notification -----

/// Sink that records what it was asked to send; can be switched to fail
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    reports: Mutex<Vec<String>>,
    followups: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let sink = Self::default();
        sink.failing.store(true, Ordering::SeqCst);
        sink
    }

    /// Investigation ids of announced reports
    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().clone()
    }

    pub fn followups(&self) -> Vec<String> {
        self.followups.lock().clone()
    }

    fn outcome(&self) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(NotifyError::Delivery("sink offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify_report(&self, report: &InvestigationReport) -> Result<(), NotifyError> {
        self.reports.lock().push(report.investigation_id().to_string());
        self.outcome()
    }

    async fn notify_followup(&self, message: &str) -> Result<(), NotifyError> {
        self.followups.lock().push(message.to_string());
        self.outcome()
    }
}

// ----- procedures -----

/// Scripted stage-1 behavior
#[derive(Debug, Clone)]
pub enum Script {
    /// Sleep, then succeed
    Sleep(Duration),
    /// Never finish
    Hang,
    /// Return a failure
    Fail(String),
    Panic(String),
    /// Succeed but claim another identity
    Claim(ProcedureId),
}

/// Investigator that follows a [`Script`] and counts invocations
#[derive(Debug)]
pub struct ScriptedProcedure {
    id: ProcedureId,
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedProcedure {
    pub fn new(id: ProcedureId, script: Script) -> Self {
        Self {
            id,
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl<I: Sync + ?Sized> Procedure<I, ProcedureOutput> for ScriptedProcedure {
    async fn run(
        &self,
        _input: &I,
        cancel: CancellationToken,
    ) -> Result<ProcedureResult<ProcedureOutput>, ProcedureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let started = Utc::now();
        let mut id = self.id;
        match &self.script {
            Script::Sleep(delay) => tokio::select! {
                () = cancel.cancelled() => return Err(ProcedureError::Cancelled),
                () = tokio::time::sleep(*delay) => {}
            },
            Script::Hang => {
                cancel.cancelled().await;
                return Err(ProcedureError::Cancelled);
            }
            Script::Fail(message) => return Err(ProcedureError::failed(message.clone())),
            Script::Panic(message) => panic!("{message}"),
            Script::Claim(other) => id = *other,
        }
        let output = ProcedureOutput::Extension(json!({ "scripted": self.id.as_str() }));
        Ok(ProcedureResult::ok(id, started, Utc::now(), output))
    }
}

/// Procedure of any shape that only returns once cancelled
#[derive(Debug, Default)]
pub struct HangingProcedure {
    calls: AtomicUsize,
}

impl HangingProcedure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl<I: Sync + ?Sized, O: Send> Procedure<I, O> for HangingProcedure {
    async fn run(
        &self,
        _input: &I,
        cancel: CancellationToken,
    ) -> Result<ProcedureResult<O>, ProcedureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        cancel.cancelled().await;
        Err(ProcedureError::Cancelled)
    }
}

// ----- request signing -----

/// Headers carrying a valid Slack signature for `body` at `timestamp`
pub fn sign_slack(secret: &str, timestamp: i64, body: &[u8]) -> Headers {
    let ts = timestamp.to_string();
    let signature = SlackSignatureVerifier::new(secret)
        .compute_signature(&ts, body)
        .unwrap_or_default();
    let mut headers = Headers::new();
    headers.insert(SLACK_TIMESTAMP_HEADER.to_string(), ts);
    headers.insert(SLACK_SIGNATURE_HEADER.to_string(), signature);
    headers
}

/// Deterministic Discord key pair; returns the key and its public hex
pub fn discord_keys(seed: u8) -> (SigningKey, String) {
    let key = SigningKey::from_bytes(&[seed; 32]);
    let public_hex = hex::encode(key.verifying_key().to_bytes());
    (key, public_hex)
}

/// Headers carrying a valid Discord signature for `body` at `timestamp`
pub fn sign_discord(key: &SigningKey, timestamp: i64, body: &[u8]) -> Headers {
    let ts = timestamp.to_string();
    let mut message = ts.clone().into_bytes();
    message.extend_from_slice(body);
    let signature = key.sign(&message);

    let mut headers = Headers::new();
    headers.insert(DISCORD_TIMESTAMP_HEADER.to_string(), ts);
    headers.insert(DISCORD_SIGNATURE_HEADER.to_string(), hex::encode(signature.to_bytes()));
    headers
}

/// Form-encoded Slack block-actions body
pub fn slack_action_body(action_id: &str, investigation_id: &str, user: &str) -> Vec<u8> {
    let payload = json!({
        "type": "block_actions",
        "user": { "username": user },
        "actions": [{ "action_id": action_id, "value": investigation_id }],
    });
    let mut body = String::from("payload=");
    for byte in payload.to_string().bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                body.push(char::from(byte));
            }
            _ => body.push_str(&format!("%{byte:02X}")),
        }
    }
    body.into_bytes()
}

/// Discord component interaction body
pub fn discord_component_body(custom_id: &str, user: &str) -> Vec<u8> {
    json!({
        "type": 3,
        "data": { "custom_id": custom_id },
        "member": { "user": { "username": user } },
    })
    .to_string()
    .into_bytes()
}
