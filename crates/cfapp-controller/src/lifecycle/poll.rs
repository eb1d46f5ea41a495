// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Start polling.

use std::time::Duration;

use cfapp_platform::{AppManager, AppStatus, InstanceState, PackageState};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::ControllerConfig;
use crate::error::{ControllerError, Result, ValidationError};

/// Classification of one status observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartState {
    /// At least one instance is running.
    Running,
    /// Staging or instance start still in progress.
    Pending,
    /// The platform reported a failure. Carries the failure message.
    Failed(String),
}

/// Classify an observed status.
///
/// Failure is read from structured fields only: a failed package, or crashed
/// instances with none running.
pub fn classify(app: &str, status: &AppStatus) -> StartState {
    if status.package_state == PackageState::Failed {
        let detail = status
            .staging_error
            .as_deref()
            .unwrap_or("staging failed");
        return StartState::Failed(format!("app {} failed to start: {}", app, detail));
    }
    if status.running_instances() > 0 {
        return StartState::Running;
    }
    if status.instances.is_empty() && status.package_state == PackageState::Staged {
        return StartState::Running;
    }
    if let Some(crashed) = status
        .instances
        .iter()
        .find(|i| i.state == InstanceState::Crashed)
    {
        let detail = crashed.details.as_deref().unwrap_or("instance crashed");
        return StartState::Failed(format!("app {} failed to start: {}", app, detail));
    }
    StartState::Pending
}

/// Doubling delay with an upper bound.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    /// Start at `initial`, never exceed `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            next: initial.min(max),
            max,
        }
    }

    /// Delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }
}

/// Poll an application until it runs, fails, or `timeout` elapses.
pub async fn wait_until_started(
    apps: &dyn AppManager,
    app_id: &str,
    app_name: &str,
    timeout: Duration,
    config: &ControllerConfig,
) -> Result<AppStatus> {
    let timed_out = || ControllerError::Timeout {
        app: app_name.to_string(),
        waited: timeout,
    };
    let deadline = Instant::now().checked_add(timeout).ok_or_else(|| {
        ValidationError::invalid("timeout", format!("{}s is out of range", timeout.as_secs()))
    })?;
    let mut backoff = Backoff::new(config.poll_interval, config.max_poll_interval);
    let mut polls = 0u32;

    loop {
        let status = tokio::time::timeout_at(deadline, apps.status(app_id))
            .await
            .map_err(|_| timed_out())??;
        polls += 1;

        match classify(app_name, &status) {
            StartState::Running => {
                debug!(app = %app_name, polls, running = status.running_instances(), "App running");
                return Ok(status);
            }
            StartState::Failed(message) => {
                warn!(app = %app_name, polls, message = %message, "App failed to start");
                return Err(ControllerError::StagingFailed {
                    app: app_name.to_string(),
                    message,
                });
            }
            StartState::Pending => {}
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(timed_out());
        }
        let delay = backoff.next_delay().min(deadline - now);
        debug!(
            app = %app_name,
            polls,
            package_state = ?status.package_state,
            delay_ms = delay.as_millis() as u64,
            "App not running yet"
        );
        tokio::time::sleep(delay).await;
    }
}
