//! Remediation action executors
//!
//! An executor performs one action and reports how it went. Returning
//! [`ExecutorError::Failed`] or panicking both become an `Error` outcome in
//! the engine; [`ExecutorError::Cancelled`] aborts the batch.

use crate::error::ExecutorError;
use once_cell::sync::Lazy;
use regex::Regex;
use spikehound_model::{ActionReport, RemediationAction, RemediationActionType};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Performs a single remediation action
#[async_trait::async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute `action`
    async fn execute(
        &self,
        action: &RemediationAction,
        cancel: CancellationToken,
    ) -> Result<ActionReport, ExecutorError>;
}

static VM_RESOURCE_ID: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)^/subscriptions/(?P<subscription>[^/]+)/resourceGroups/(?P<resource_group>[^/]+)/providers/Microsoft\.Compute/virtualMachines/(?P<vm_name>[^/]+)$",
    )
    .ok()
});

/// Parsed Azure virtual machine resource id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmResourceId {
    pub subscription: String,
    pub resource_group: String,
    pub vm_name: String,
}

impl VmResourceId {
    /// Parse a full VM resource id, ignoring case
    #[must_use]
    pub fn parse(resource_id: &str) -> Option<Self> {
        let caps = VM_RESOURCE_ID.as_ref()?.captures(resource_id.trim())?;
        Some(Self {
            subscription: caps["subscription"].to_string(),
            resource_group: caps["resource_group"].to_string(),
            vm_name: caps["vm_name"].to_string(),
        })
    }
}

/// Executor that validates and describes actions without touching anything
///
/// Mirrors the dispatch of a live cloud executor:
/// - `StopVm` validates the target id
/// - `ResizeVm` and `AddAutoShutdown` are not implemented
/// - `NotifyOwner` and `OpenTicket` are manual
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunActionExecutor;

impl DryRunActionExecutor {
    /// Create new dry-run executor
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ActionExecutor for DryRunActionExecutor {
    async fn execute(
        &self,
        action: &RemediationAction,
        cancel: CancellationToken,
    ) -> Result<ActionReport, ExecutorError> {
        if cancel.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }

        let report = match action.action_type {
            RemediationActionType::StopVm => match VmResourceId::parse(&action.target_resource_id) {
                Some(vm) => {
                    info!(
                        subscription = %vm.subscription,
                        resource_group = %vm.resource_group,
                        vm = %vm.vm_name,
                        "dry_run_stop_vm"
                    );
                    ActionReport::ok(format!(
                        "Dry run: would stop VM {} in resource group {}.",
                        vm.vm_name, vm.resource_group
                    ))
                }
                None => ActionReport::error("Target resource ID is not a valid Azure VM resource ID."),
            },
            RemediationActionType::ResizeVm => {
                ActionReport::degraded("VM resize execution is not implemented yet.")
            }
            RemediationActionType::AddAutoShutdown => {
                ActionReport::degraded("Auto-shutdown schedule execution is not implemented yet.")
            }
            RemediationActionType::NotifyOwner => {
                ActionReport::skipped("Owner notification is a manual action.")
            }
            RemediationActionType::OpenTicket => {
                ActionReport::skipped("Ticket creation is a manual action.")
            }
        };
        Ok(report)
    }
}
