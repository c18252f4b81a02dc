//! Step interpreter
//!
//! Walks a test case's steps in order against a live driver and records
//! one result per attempted step. A missing action or a failed check is
//! recorded and the run moves on; bad parameters, errors raised by an
//! action and panics inside an action stop the run after being recorded.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::actions::{coerce, ActionContext, ActionOutcome, ActionRegistry};
use crate::common::config::ActionSettings;
use crate::common::{Error, Result};
use crate::driver::AutomationDriver;

use super::config::Step;
use super::report::{RunLog, StepResult, StepStatus};

/// Executes steps through an action registry
pub struct StepInterpreter<'r> {
    registry: &'r ActionRegistry,
    settings: ActionSettings,
    step_timeout: Option<Duration>,
    stop_on_failure: bool,
}

impl<'r> StepInterpreter<'r> {
    pub fn new(registry: &'r ActionRegistry, settings: ActionSettings) -> Self {
        Self {
            registry,
            settings,
            step_timeout: None,
            stop_on_failure: false,
        }
    }

    /// Fail a step that runs longer than `limit`
    pub fn with_step_timeout(mut self, limit: Option<Duration>) -> Self {
        self.step_timeout = limit;
        self
    }

    /// Abort after the first step that records a failure
    pub fn with_stop_on_failure(mut self, stop: bool) -> Self {
        self.stop_on_failure = stop;
        self
    }

    /// Run every step in order and return the log
    pub async fn run(
        &self,
        steps: &[Step],
        driver: &dyn AutomationDriver,
        cancel: &CancellationToken,
    ) -> RunLog {
        let mut log = RunLog::new();
        self.run_into(steps, driver, cancel, &mut log).await;
        log
    }

    /// Run every step in order, appending results to `log` as they finish
    pub async fn run_into(
        &self,
        steps: &[Step],
        driver: &dyn AutomationDriver,
        cancel: &CancellationToken,
        log: &mut RunLog,
    ) {
        let ctx = ActionContext {
            driver,
            settings: &self.settings,
        };

        for (i, step) in steps.iter().enumerate() {
            let index = i + 1;
            if cancel.is_cancelled() {
                tracing::info!(step = index, "Run cancelled before step");
                log.mark_cancelled();
                break;
            }

            let span = tracing::info_span!("step", index, action = %step.action);
            let started = Instant::now();
            let result = self.execute(step, &ctx).instrument(span).await;
            let duration = started.elapsed();

            let (status, message, fatal) = match result {
                Ok(None) => (
                    StepStatus::Skipped,
                    "Step has no action name".to_string(),
                    false,
                ),
                Ok(Some(ActionOutcome::Passed(message))) => (StepStatus::Success, message, false),
                Ok(Some(ActionOutcome::Failed(message))) => (StepStatus::Failure, message, false),
                Err(e) => (StepStatus::Failure, e.describe(), e.is_fatal()),
            };

            match status {
                StepStatus::Success => tracing::info!(step = index, action = %step.action, "Step passed"),
                StepStatus::Skipped => tracing::warn!(step = index, "Step skipped"),
                StepStatus::Failure => {
                    tracing::warn!(step = index, action = %step.action, %message, "Step failed")
                }
            }

            log.push(StepResult {
                step_index: index,
                action_name: step.action.clone(),
                status,
                message,
                duration,
            });

            if fatal {
                tracing::error!(step = index, "Aborting run after fatal step error");
                log.mark_aborted();
                break;
            }
            if status == StepStatus::Failure && self.stop_on_failure {
                tracing::info!(step = index, "Stopping after failed step");
                log.mark_aborted();
                break;
            }
        }
    }

    /// Run one step; `Ok(None)` means it was skipped
    async fn execute(&self, step: &Step, ctx: &ActionContext<'_>) -> Result<Option<ActionOutcome>> {
        if step.action.trim().is_empty() {
            return Ok(None);
        }

        let definition = self.registry.lookup(&step.action)?;
        let params = coerce(definition.params, &step.params)
            .map_err(|reason| Error::parameter_mismatch(definition.name, reason))?;
        tracing::debug!(params = ?step.params, "Invoking action");

        let invocation = AssertUnwindSafe((definition.handler)(ctx, &params))
            .catch_unwind()
            .map(|caught| {
                caught.unwrap_or_else(|panic| {
                    let reason = panic_message(panic.as_ref());
                    tracing::error!(%reason, "Action panicked");
                    Err(Error::Internal(format!("action panicked: {}", reason)))
                })
            });
        let outcome = match self.step_timeout {
            Some(limit) => tokio::time::timeout(limit, invocation)
                .await
                .map_err(|_| {
                    Error::runtime_failure(
                        definition.name,
                        format!("step did not finish within {:.1}s", limit.as_secs_f64()),
                    )
                })?,
            None => invocation.await,
        };

        outcome
            .map(Some)
            .map_err(|e| Error::runtime_failure(definition.name, e.to_string()))
    }
}

/// Text of a panic payload
pub(super) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
