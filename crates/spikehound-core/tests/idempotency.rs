//! Duplicate alert deliveries within and beyond the idempotency window

use chrono::Duration as ChronoDuration;
use spikehound_core::prelude::*;
use spikehound_model::ManualClock;
use spikehound_test_utils::{plain_alert, vm_alert, Script, ScriptedProcedure};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct Harness {
    clock: Arc<ManualClock>,
    history: Arc<ScriptedProcedure>,
    service: SpikehoundService,
}

fn harness(ttl_secs: u64) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let history = Arc::new(ScriptedProcedure::new(ProcedureId::History, Script::Sleep(Duration::ZERO)));
    let procedures = ProcedureSet::fallback(clock.clone()).with_history(history.clone());
    let service = SpikehoundService::builder(SpikehoundConfig::new().with_idempotency_ttl_secs(ttl_secs))
        .clock(clock.clone())
        .procedures(procedures)
        .build()
        .unwrap();
    Harness {
        clock,
        history,
        service,
    }
}

async fn deliver(h: &Harness, alert: &serde_json::Value) -> AlertResponse {
    h.service
        .intake
        .receive(alert, &CancellationToken::new())
        .await
        .unwrap()
}

fn report_of(response: &AlertResponse) -> Arc<InvestigationReport> {
    match response {
        AlertResponse::Report { report, .. } => report.clone(),
        AlertResponse::Accepted { .. } => panic!("expected an inline report"),
    }
}

#[tokio::test]
async fn duplicate_within_ttl_returns_cached_report() {
    let h = harness(600);

    let first = deliver(&h, &vm_alert("a1")).await;
    h.clock.advance(ChronoDuration::seconds(599));
    let second = deliver(&h, &vm_alert("a1")).await;

    assert!(!first.is_cached());
    assert!(second.is_cached());
    assert!(Arc::ptr_eq(&report_of(&first), &report_of(&second)));
    assert_eq!(h.history.calls(), 1);
}

#[tokio::test]
async fn delivery_after_ttl_recomputes() {
    let h = harness(600);

    let first = deliver(&h, &vm_alert("a1")).await;
    h.clock.advance(ChronoDuration::seconds(601));
    let second = deliver(&h, &vm_alert("a1")).await;

    assert!(!second.is_cached());
    assert!(!Arc::ptr_eq(&report_of(&first), &report_of(&second)));
    assert_eq!(h.history.calls(), 2);
}

#[tokio::test]
async fn different_ids_are_independent() {
    let h = harness(600);

    deliver(&h, &plain_alert("a1")).await;
    let other = deliver(&h, &plain_alert("a2")).await;

    assert!(!other.is_cached());
    assert_eq!(h.history.calls(), 2);
    assert_eq!(h.service.state.reports.len(), 2);
}

#[tokio::test]
async fn expired_entries_are_pruned_on_next_delivery() {
    let h = harness(60);

    deliver(&h, &plain_alert("old")).await;
    h.clock.advance(ChronoDuration::seconds(120));
    deliver(&h, &plain_alert("new")).await;

    assert_eq!(h.service.state.reports.len(), 1);
    assert!(h.service.state.reports.get("new").is_some());
}

#[tokio::test]
async fn unidentifiable_alerts_share_the_unknown_key() {
    let h = harness(600);

    deliver(&h, &serde_json::json!({ "note": "no id here" })).await;
    let second = deliver(&h, &serde_json::json!({ "other": true })).await;

    assert!(second.is_cached());
    assert_eq!(report_of(&second).investigation_id(), spikehound_model::UNKNOWN_ALERT_ID);
}
