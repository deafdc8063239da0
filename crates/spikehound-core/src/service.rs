//! Service assembly
//!
//! Wires configuration, shared state, pipeline, saga, schedulers and entry
//! points into one value. Collaborators default to the in-process pieces of
//! this crate and can be replaced before `build`.

use crate::approval::ApprovalIngress;
use crate::config::SpikehoundConfig;
use crate::error::{ConfigError, SpikehoundError};
use crate::executor::{ActionExecutor, DryRunActionExecutor};
use crate::intake::AlertIntake;
use crate::notify::{NoopNotificationSink, NotificationSink, WebhookNotificationSink};
use crate::pipeline::CoordinatorPipeline;
use crate::procedure::ProcedureSet;
use crate::scheduler::{InProcessExecutionScheduler, InProcessInvestigationScheduler};
use crate::state::IncidentState;
use crate::tokens::InvestigationTokens;
use crate::workflow::RemediationWorkflow;
use spikehound_model::{Clock, SystemClock};
use std::sync::Arc;
use tracing::info;

/// A fully wired service instance
#[derive(Debug)]
pub struct SpikehoundService {
    pub config: SpikehoundConfig,
    pub state: Arc<IncidentState>,
    pub pipeline: Arc<CoordinatorPipeline>,
    pub workflow: Arc<RemediationWorkflow>,
    pub executions: Arc<InProcessExecutionScheduler>,
    pub investigations: Option<Arc<InProcessInvestigationScheduler>>,
    pub intake: AlertIntake,
    pub approvals: ApprovalIngress,
}

impl SpikehoundService {
    /// Start building from `config`
    #[inline]
    #[must_use]
    pub fn builder(config: SpikehoundConfig) -> ServiceBuilder {
        ServiceBuilder::new(config)
    }

    /// Wait for all background work spawned so far
    pub async fn wait_idle(&self) {
        if let Some(investigations) = &self.investigations {
            investigations.wait_idle().await;
        }
        self.pipeline.wait_notifications().await;
        self.executions.wait_idle().await;
    }

    /// Cancel background work and refuse new handoffs
    pub async fn shutdown(&self) {
        if let Some(investigations) = &self.investigations {
            investigations.shutdown().await;
        }
        self.pipeline.wait_notifications().await;
        self.executions.shutdown().await;
    }
}

/// Builder for [`SpikehoundService`]
pub struct ServiceBuilder {
    config: SpikehoundConfig,
    clock: Option<Arc<dyn Clock>>,
    executor: Option<Arc<dyn ActionExecutor>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    procedures: Option<ProcedureSet>,
}

impl ServiceBuilder {
    /// Create new builder
    #[must_use]
    pub fn new(config: SpikehoundConfig) -> Self {
        Self {
            config,
            clock: None,
            executor: None,
            notifier: None,
            procedures: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[inline]
    #[must_use]
    pub fn executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    #[inline]
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    #[inline]
    #[must_use]
    pub fn procedures(mut self, procedures: ProcedureSet) -> Self {
        self.procedures = Some(procedures);
        self
    }

    /// Validate the configuration and wire everything
    pub fn build(self) -> Result<SpikehoundService, SpikehoundError> {
        let config = self.config;
        config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let tokens = InvestigationTokens::default();
        let state = Arc::new(
            IncidentState::new(config.idempotency_ttl(), clock.clone()).with_tokens(tokens.clone()),
        );

        let notifier: Arc<dyn NotificationSink> = match self.notifier {
            Some(notifier) => notifier,
            None => {
                let sink = WebhookNotificationSink::from_config(&config, tokens).map_err(|err| {
                    ConfigError::Invalid {
                        field: "webhook_url",
                        reason: err.to_string(),
                    }
                })?;
                if sink.is_configured() {
                    Arc::new(sink)
                } else {
                    Arc::new(NoopNotificationSink)
                }
            }
        };

        let procedures = self
            .procedures
            .unwrap_or_else(|| ProcedureSet::for_cloud_mode(config.cloud_enabled, clock.clone()));
        let pipeline = Arc::new(
            CoordinatorPipeline::new(procedures, clock.clone())
                .with_notifier(notifier.clone())
                .with_timeout(config.procedure_timeout()),
        );

        let executor = self
            .executor
            .unwrap_or_else(|| Arc::new(DryRunActionExecutor::new()));
        let workflow = Arc::new(
            RemediationWorkflow::new(state.clone(), executor, clock.clone())
                .with_notifier(notifier)
                .with_execution_enabled(config.execution_enabled),
        );
        let executions = Arc::new(InProcessExecutionScheduler::new(workflow.clone()));

        let mut intake = AlertIntake::new(pipeline.clone(), state.clone(), clock.clone());
        let investigations = if config.use_durable {
            let scheduler = Arc::new(InProcessInvestigationScheduler::new(
                pipeline.clone(),
                state.clone(),
            ));
            intake = intake.with_durable(scheduler.clone());
            Some(scheduler)
        } else {
            None
        };

        let approvals = ApprovalIngress::new(
            workflow.clone(),
            executions.clone(),
            config.slack_verifier(),
            config.discord_verifier(),
            clock,
        );

        info!(
            durable = config.use_durable,
            execution_enabled = config.execution_enabled,
            cloud_enabled = config.cloud_enabled,
            ttl_secs = config.idempotency_ttl_secs,
            "spikehound_service_ready"
        );

        Ok(SpikehoundService {
            config,
            state,
            pipeline,
            workflow,
            executions,
            investigations,
            intake,
            approvals,
        })
    }
}

impl std::fmt::Debug for ServiceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
