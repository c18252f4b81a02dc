//! Automation session lifecycle
//!
//! Owns the single live connection to the remote automation server and
//! walks it through validation, activation and release.

pub mod config;
pub mod device;
pub mod preflight;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::driver::{AutomationDriver, Connector, WebDriverConnector};

pub use config::SessionConfig;
pub use preflight::PreflightCheck;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing acquired yet
    Uninitialized,
    /// Running pre-flight checks and connecting
    Validating,
    /// A session handle is live
    Active,
    /// The last session was released
    Released,
    /// Validation, connection or the live session failed
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Validating => write!(f, "validating"),
            Self::Active => write!(f, "active"),
            Self::Released => write!(f, "released"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The live session. Consumed by [`SessionManager::release`].
pub struct SessionHandle {
    driver: Box<dyn AutomationDriver>,
    opened_at: Instant,
}

impl SessionHandle {
    pub fn driver(&self) -> &dyn AutomationDriver {
        self.driver.as_ref()
    }

    pub fn id(&self) -> &str {
        self.driver.session_id()
    }

    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }
}

/// Lifecycle label plus whether a handle is outstanding
///
/// `live` is set when a handle is handed out and cleared only by
/// [`SessionManager::release`], whatever the label says in between.
#[derive(Debug)]
struct Slot {
    state: SessionState,
    live: bool,
}

/// Marks the lifecycle failed if an acquire is abandoned part-way
struct PendingAcquire<'a> {
    slot: &'a Mutex<Slot>,
    done: bool,
}

impl PendingAcquire<'_> {
    fn finish(mut self, state: SessionState) {
        self.done = true;
        let mut slot = lock(self.slot);
        set_state(&mut slot, state);
        slot.live = state == SessionState::Active;
    }
}

impl Drop for PendingAcquire<'_> {
    fn drop(&mut self) {
        if !self.done {
            set_state(&mut lock(self.slot), SessionState::Failed);
        }
    }
}

fn lock(cell: &Mutex<Slot>) -> std::sync::MutexGuard<'_, Slot> {
    cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn set_state(slot: &mut Slot, state: SessionState) {
    tracing::debug!(from = %slot.state, to = %state, "Session state change");
    slot.state = state;
}

/// Enforces at most one active session
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    checks: Vec<Box<dyn PreflightCheck>>,
    settle_delay: Duration,
    slot: Mutex<Slot>,
}

impl SessionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        checks: Vec<Box<dyn PreflightCheck>>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            connector,
            checks,
            settle_delay,
            slot: Mutex::new(Slot {
                state: SessionState::Uninitialized,
                live: false,
            }),
        }
    }

    /// Manager wired to a WebDriver server with the configured checks
    pub fn from_config(config: &Config) -> Self {
        let connector = WebDriverConnector::new(
            Duration::from_secs(config.timeouts.connect_secs),
            Duration::from_secs(config.timeouts.request_secs),
        );
        Self::new(
            Arc::new(connector),
            preflight::standard_checks(&config.preflight),
            Duration::from_millis(config.timeouts.settle_ms),
        )
    }

    /// Current lifecycle state
    pub fn status(&self) -> SessionState {
        lock(&self.slot).state
    }

    /// Validate the environment and open a session
    ///
    /// Fails with [`Error::SessionAlreadyActive`] while another session is
    /// validating, active or not yet released; the existing handle is never
    /// reused.
    #[tracing::instrument(skip_all, fields(server = %config.server_url))]
    pub async fn acquire(&self, config: &SessionConfig) -> Result<SessionHandle> {
        {
            let mut slot = lock(&self.slot);
            if slot.live || matches!(slot.state, SessionState::Validating | SessionState::Active) {
                return Err(Error::SessionAlreadyActive);
            }
            set_state(&mut slot, SessionState::Validating);
        }
        let pending = PendingAcquire {
            slot: &self.slot,
            done: false,
        };

        for check in &self.checks {
            tracing::debug!(check = check.name(), "Running pre-flight check");
            if let Err(e) = check.check(config).await {
                tracing::warn!(check = check.name(), error = %e, "Pre-flight check failed");
                pending.finish(SessionState::Failed);
                return Err(e);
            }
        }

        tracing::info!("Opening automation session");
        let driver = match self
            .connector
            .connect(&config.server_url, &config.capabilities)
            .await
        {
            Ok(driver) => driver,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open automation session");
                pending.finish(SessionState::Failed);
                return Err(e);
            }
        };

        // The device can report ready before its first layout pass is done
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        pending.finish(SessionState::Active);
        tracing::info!(session_id = %driver.session_id(), "Automation session active");

        Ok(SessionHandle {
            driver,
            opened_at: Instant::now(),
        })
    }

    /// Record that the live session is no longer usable
    ///
    /// The handle still counts as outstanding until it is released.
    pub fn mark_failed(&self) {
        set_state(&mut lock(&self.slot), SessionState::Failed);
    }

    /// End the session
    ///
    /// Errors from the remote side are logged and swallowed so they never
    /// mask the outcome of the run.
    pub async fn release(&self, handle: SessionHandle) {
        let id = handle.id().to_string();
        match handle.driver.quit().await {
            Ok(()) => tracing::info!(session_id = %id, age_secs = handle.age().as_secs(), "Automation session released"),
            Err(e) => tracing::warn!(session_id = %id, error = %e, "Error while releasing session"),
        }

        let mut slot = lock(&self.slot);
        slot.live = false;
        if slot.state != SessionState::Failed {
            set_state(&mut slot, SessionState::Released);
        }
    }
}
