// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lifecycle status of one reconciliation.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{ControllerError, Result};
use crate::model::AppState;

/// Where a reconciliation stands.
///
/// ```text
/// Defined → SourceStaged → Created → BindingsApplied → RoutesApplied
///         → EnvironmentSet → Starting → Started
///
/// any state ──error──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    /// Definition accepted, nothing done yet.
    Defined,
    /// Source validated and materialized.
    SourceStaged,
    /// Application shell created or patched.
    Created,
    /// Binding delta applied.
    BindingsApplied,
    /// Route mapping delta applied.
    RoutesApplied,
    /// Environment replaced (or already matching).
    EnvironmentSet,
    /// Staging or start requested, polling.
    Starting,
    /// Running and verified.
    Started,
    /// Terminal failure.
    Failed,
}

impl LifecycleStatus {
    /// Whether no further transition happens.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleStatus::Started | LifecycleStatus::Failed)
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleStatus::Defined => "defined",
            LifecycleStatus::SourceStaged => "source_staged",
            LifecycleStatus::Created => "created",
            LifecycleStatus::BindingsApplied => "bindings_applied",
            LifecycleStatus::RoutesApplied => "routes_applied",
            LifecycleStatus::EnvironmentSet => "environment_set",
            LifecycleStatus::Starting => "starting",
            LifecycleStatus::Started => "started",
            LifecycleStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Result of a create or update reconciliation.
#[derive(Debug)]
pub struct ReconcileOutcome {
    /// Final status, `Started` or `Failed`.
    pub status: LifecycleStatus,
    /// Every status passed through, in order.
    pub history: Vec<LifecycleStatus>,
    /// Id of the application, once the shell exists. Present on failures past
    /// `Created` so a follow-up delete can clean up.
    pub app_id: Option<String>,
    /// Verified state, or the failure cause.
    pub result: Result<AppState>,
}

impl ReconcileOutcome {
    /// Whether the application reached `Started`.
    pub fn is_started(&self) -> bool {
        self.status == LifecycleStatus::Started
    }

    /// Whether the history contains a status.
    pub fn reached(&self, status: LifecycleStatus) -> bool {
        self.history.contains(&status)
    }

    /// Verified state, on success.
    pub fn state(&self) -> Option<&AppState> {
        self.result.as_ref().ok()
    }

    /// Failure cause, on failure.
    pub fn error(&self) -> Option<&ControllerError> {
        self.result.as_ref().err()
    }

    /// Convert into the verified state or the failure cause.
    pub fn into_result(self) -> Result<AppState> {
        self.result
    }
}

/// Status tracker of one running reconciliation.
#[derive(Debug)]
pub(crate) struct Reconciliation {
    app: String,
    status: LifecycleStatus,
    history: Vec<LifecycleStatus>,
    app_id: Option<String>,
}

impl Reconciliation {
    pub(crate) fn new(app: &str) -> Self {
        Self {
            app: app.to_string(),
            status: LifecycleStatus::Defined,
            history: vec![LifecycleStatus::Defined],
            app_id: None,
        }
    }

    pub(crate) fn advance(&mut self, next: LifecycleStatus) {
        info!(app = %self.app, from = %self.status, to = %next, "Lifecycle transition");
        self.status = next;
        self.history.push(next);
    }

    pub(crate) fn set_app_id(&mut self, id: &str) {
        self.app_id = Some(id.to_string());
    }

    pub(crate) fn status(&self) -> LifecycleStatus {
        self.status
    }

    pub(crate) fn finish(mut self, state: AppState) -> ReconcileOutcome {
        self.advance(LifecycleStatus::Started);
        ReconcileOutcome {
            status: self.status,
            history: self.history,
            app_id: Some(state.id.clone()),
            result: Ok(state),
        }
    }

    pub(crate) fn fail(mut self, err: ControllerError) -> ReconcileOutcome {
        error!(app = %self.app, at = %self.status, error = %err, "Reconciliation failed");
        self.status = LifecycleStatus::Failed;
        self.history.push(LifecycleStatus::Failed);
        ReconcileOutcome {
            status: self.status,
            history: self.history,
            app_id: self.app_id,
            result: Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_failure_keeps_history_and_app_id() {
        let mut run = Reconciliation::new("web");
        run.advance(LifecycleStatus::SourceStaged);
        run.advance(LifecycleStatus::Created);
        run.set_app_id("app-1");

        let outcome = run.fail(ControllerError::Validation(ValidationError::MissingSource));

        assert_eq!(outcome.status, LifecycleStatus::Failed);
        assert_eq!(
            outcome.history,
            vec![
                LifecycleStatus::Defined,
                LifecycleStatus::SourceStaged,
                LifecycleStatus::Created,
                LifecycleStatus::Failed
            ]
        );
        assert_eq!(outcome.app_id.as_deref(), Some("app-1"));
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(LifecycleStatus::Started.is_terminal());
        assert!(LifecycleStatus::Failed.is_terminal());
        assert!(!LifecycleStatus::Starting.is_terminal());
        assert_eq!(LifecycleStatus::BindingsApplied.to_string(), "bindings_applied");
    }
}
