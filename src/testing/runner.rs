//! Run orchestration
//!
//! Ties one test case to one session: acquire, interpret, release,
//! aggregate. The session is released exactly once on every path,
//! including a panic inside the interpreter.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::actions::ActionRegistry;
use crate::common::config::{ActionSettings, Config};
use crate::common::Error;
use crate::session::{SessionConfig, SessionManager};

use super::config::TestCase;
use super::interpreter::{panic_message, StepInterpreter};
use super::report::{RunLog, RunReport, StepResult, StepStatus};

/// Runs test cases against sessions from a shared manager
pub struct RunOrchestrator {
    manager: Arc<SessionManager>,
    session_config: SessionConfig,
    settings: ActionSettings,
    step_timeout: Option<Duration>,
    stop_on_failure: bool,
}

impl RunOrchestrator {
    pub fn new(manager: Arc<SessionManager>, session_config: SessionConfig) -> Self {
        Self {
            manager,
            session_config,
            settings: ActionSettings::default(),
            step_timeout: None,
            stop_on_failure: false,
        }
    }

    /// Orchestrator using the run policy and action pacing from `config`
    pub fn from_config(
        manager: Arc<SessionManager>,
        session_config: SessionConfig,
        config: &Config,
    ) -> Self {
        Self::new(manager, session_config)
            .with_action_settings(config.actions.clone())
            .with_step_timeout(config.timeouts.step_secs.map(Duration::from_secs))
            .with_stop_on_failure(config.run.stop_on_failure)
    }

    pub fn with_action_settings(mut self, settings: ActionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_step_timeout(mut self, limit: Option<Duration>) -> Self {
        self.step_timeout = limit;
        self
    }

    pub fn with_stop_on_failure(mut self, stop: bool) -> Self {
        self.stop_on_failure = stop;
        self
    }

    /// Run a test case from acquire to release
    #[tracing::instrument(skip_all, fields(case = %case.name))]
    pub async fn execute(&self, case: &TestCase, cancel: CancellationToken) -> RunReport {
        let started = Instant::now();
        tracing::info!(steps = case.steps.len(), "Starting test run");

        let handle = match self.manager.acquire(&self.session_config).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "Session setup failed, no steps attempted");
                let mut log = RunLog::new();
                log.push(StepResult {
                    step_index: 0,
                    action_name: "Setup".to_string(),
                    status: StepStatus::Failure,
                    message: e.describe(),
                    duration: started.elapsed(),
                });
                log.mark_aborted();
                return RunReport::from_log(&case.name, log, started.elapsed());
            }
        };

        let interpreter = StepInterpreter::new(ActionRegistry::builtin(), self.settings.clone())
            .with_step_timeout(self.step_timeout)
            .with_stop_on_failure(self.stop_on_failure);

        // Action panics are recorded per step; this only catches the interpreter itself
        let mut log = RunLog::new();
        let outcome = AssertUnwindSafe(interpreter.run_into(
            &case.steps,
            handle.driver(),
            &cancel,
            &mut log,
        ))
        .catch_unwind()
        .await;

        if let Err(panic) = outcome {
            let reason = panic_message(panic.as_ref());
            tracing::error!(%reason, recorded = log.len(), "Step interpreter panicked");
            self.manager.mark_failed();

            log.push(StepResult {
                step_index: 0,
                action_name: "Run".to_string(),
                status: StepStatus::Failure,
                message: Error::Internal(format!("step interpreter panicked: {}", reason)).describe(),
                duration: started.elapsed(),
            });
            log.mark_aborted();
        }

        self.manager.release(handle).await;

        let report = RunReport::from_log(&case.name, log, started.elapsed());
        tracing::info!(
            status = %report.overall_status,
            steps = report.log.len(),
            cancelled = report.cancelled,
            "Test run finished"
        );
        report
    }

    /// Run a test case on its own task
    pub fn spawn(self: Arc<Self>, case: TestCase, cancel: CancellationToken) -> JoinHandle<RunReport> {
        tokio::spawn(async move { self.execute(&case, cancel).await })
    }
}
