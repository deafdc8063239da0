//! Spikehound Core
//!
//! Orchestration for alert-driven incident response.
//!
//! # Flow
//!
//! ```text
//! alert ─→ AlertIntake ─→ CoordinatorPipeline ─→ InvestigationReport ─→ NotificationSink
//!              │               cost ┐
//!       IdempotencyCache   resource ├─ merge ─→ diagnosis ─→ planning
//!                           history ┘
//!
//! chat callback ─→ ApprovalIngress ─→ RemediationWorkflow ─→ ExecutionScheduler
//!                  (signature check)   (claim once)               │
//!                                                                 ↓
//!                                      ExecutionEngine ←─ execute_request ─→ follow-up
//! ```
//!
//! # Guarantees
//!
//! - **Isolation**: a slow, failing or panicking procedure becomes an
//!   `Error` result and never takes its siblings down
//! - **Determinism**: merged findings do not depend on completion order
//! - **Queue once**: concurrent approvals schedule at most one execution
//! - **Fail closed**: unsigned or stale callbacks are rejected before parsing
//!
//! # Example
//!
//! ```rust,no_run
//! use spikehound_core::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), SpikehoundError> {
//! let service = SpikehoundService::builder(SpikehoundConfig::from_env()?).build()?;
//! let alert = serde_json::json!({ "alert_id": "a1", "resource_id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm1" });
//!
//! let response = service.intake.receive(&alert, &CancellationToken::new()).await?;
//! assert!(!response.is_cached());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod approval;
pub mod cache;
pub mod claims;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod intake;
pub mod isolation;
pub mod merge;
pub mod notify;
pub mod pipeline;
pub mod procedure;
pub mod procedures;
pub mod scheduler;
pub mod service;
pub mod state;
pub mod tokens;
pub mod workflow;

pub use approval::{
    parse_discord_interaction, parse_slack_interaction, split_custom_id, ApprovalIngress,
    DiscordResponse, InteractionReply, ParsedInteraction, DISCORD_SOURCE, SLACK_SOURCE,
};
pub use cache::{CacheEntry, IdempotencyCache};
pub use claims::{ClaimAttempt, ClaimState, ExecutionClaims, PendingClaim};
pub use config::SpikehoundConfig;
pub use engine::ExecutionEngine;
pub use error::{
    ConfigError, ExecutorError, IngestError, NotifyError, ProcedureError, ScheduleError,
    SpikehoundError,
};
pub use executor::{ActionExecutor, DryRunActionExecutor, VmResourceId};
pub use intake::{AlertIntake, AlertResponse};
pub use isolation::run_isolated;
pub use merge::merge_findings;
pub use notify::{
    discord_report_payload, slack_report_payload, NoopNotificationSink, NotificationSink,
    WebhookNotificationSink,
};
pub use pipeline::{CoordinatorPipeline, DEFAULT_NOTIFY_TIMEOUT, DEFAULT_PROCEDURE_TIMEOUT};
pub use procedure::{
    DiagnosisRef, InvestigationInput, InvestigatorRef, PlannerRef, PlanningInput, Procedure,
    ProcedureSet,
};
pub use procedures::{
    FallbackCostProcedure, FallbackDiagnosisProcedure, FallbackHistoryProcedure,
    FallbackRemediationProcedure, FallbackResourceProcedure,
};
pub use scheduler::{
    ExecutionScheduler, InProcessExecutionScheduler, InProcessInvestigationScheduler,
    InvestigationScheduler,
};
pub use service::{ServiceBuilder, SpikehoundService};
pub use state::IncidentState;
pub use tokens::{InvestigationTokens, TOKEN_PREFIX};
pub use workflow::{followup_message, RemediationWorkflow};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        ActionExecutor, AlertIntake, AlertResponse, ApprovalIngress, CoordinatorPipeline,
        ExecutionScheduler, IncidentState, NotificationSink, Procedure, ProcedureSet,
        RemediationWorkflow, SpikehoundConfig, SpikehoundError, SpikehoundService,
    };
    pub use spikehound_model::{
        ApprovalDecision, ApprovalRecord, Clock, ExecutionOutcome, ExecutionStatus,
        InvestigationReport, ProcedureId, ProcedureResult, ProcedureStatus, QueueOutcome,
        RemediationPlan, SystemClock,
    };
}
