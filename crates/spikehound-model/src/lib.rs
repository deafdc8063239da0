//! Spikehound Model
//!
//! The typed records that flow through an investigation:
//!
//! - [`ProcedureResult<T>`]: the envelope every procedure call returns
//! - [`NormalizedAlert`] and [`AlertNormalizer`]: the correlation key and
//!   summary extracted from an arbitrary alert payload
//! - [`UnifiedFindings`] and [`InvestigationReport`]: merged investigator output
//! - [`Diagnosis`], [`RemediationPlan`], [`RemediationAction`]
//! - [`ApprovalRecord`], [`ExecutionOutcome`], [`ExecutionRequest`]
//! - [`Clock`]: injectable time source
//!
//! # Example
//!
//! ```rust
//! use spikehound_model::{AlertNormalizer, ProcedureId, ProcedureResult, SystemClock, Clock};
//!
//! let payload = serde_json::json!({ "alert_id": "a1", "severity": "Sev3" });
//! let alert = AlertNormalizer::normalize(&payload, SystemClock.now());
//! assert_eq!(alert.alert_id, "a1");
//!
//! let now = SystemClock.now();
//! let result: ProcedureResult<u32> = ProcedureResult::ok(ProcedureId::Cost, now, now, 7);
//! assert!(result.is_ok());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod alert;
pub mod approval;
pub mod clock;
pub mod diagnosis;
pub mod execution;
pub mod findings;
pub mod procedure;
pub mod remediation;

pub use alert::{AlertNormalizer, AlertSummary, NormalizedAlert, UNKNOWN_ALERT_ID};
pub use approval::{ApprovalDecision, ApprovalRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use diagnosis::{Diagnosis, RootCauseHypothesis};
pub use execution::{
    ActionReport, ExecutionOutcome, ExecutionRequest, ExecutionStatus, ExecutionSummary,
    QueueOutcome, ScheduleHandle,
};
pub use findings::{
    CostFinding, HistoryFindings, InvestigationFindings, InvestigationReport, ProcedureOutput,
    ResourceFindings, UnifiedFindings,
};
pub use procedure::{ProcedureId, ProcedureResult, ProcedureStatus};
pub use remediation::{RemediationAction, RemediationActionType, RemediationPlan, RiskLevel};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
