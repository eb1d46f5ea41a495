// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for cfapp-controller.

use std::path::PathBuf;
use std::time::Duration;

use cfapp_platform::{PlatformError, ResourceKind};
use thiserror::Error;

/// The desired-state definition is not acceptable. Raised before any remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No source variant is populated.
    #[error("no application source: set exactly one of url, path, git, github_release, docker_image")]
    MissingSource,

    /// More than one source variant is populated.
    #[error("conflicting application sources: {}", .0.join(", "))]
    ConflictingSources(Vec<&'static str>),

    /// A field holds an unacceptable value.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Schema field name.
        field: &'static str,
        /// Why the value was refused.
        reason: String,
    },
}

impl ValidationError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Materializing an application source failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    /// The download request could not be completed.
    #[error("download of {url} failed: {message}")]
    Download {
        /// Requested URL (credentials removed).
        url: String,
        /// Transport error.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("download of {url} returned HTTP {status}")]
    HttpStatus {
        /// Requested URL (credentials removed).
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The version-control checkout failed.
    #[error("checkout of {url} failed: {message}")]
    Checkout {
        /// Repository URL (credentials removed).
        url: String,
        /// stderr of the checkout.
        message: String,
    },

    /// The local path does not exist.
    #[error("source path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// Building the application package failed.
    #[error("packaging failed: {0}")]
    Package(#[from] zip::result::ZipError),

    /// A blocking packaging task panicked or was cancelled.
    #[error("packaging task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which remote operation an apply failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOperation {
    /// Binding a service instance.
    Bind,
    /// Removing a service binding.
    Unbind,
    /// Mapping a route.
    MapRoute,
    /// Removing a route mapping.
    UnmapRoute,
}

impl std::fmt::Display for ApplyOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyOperation::Bind => write!(f, "bind"),
            ApplyOperation::Unbind => write!(f, "unbind"),
            ApplyOperation::MapRoute => write!(f, "map"),
            ApplyOperation::UnmapRoute => write!(f, "unmap"),
        }
    }
}

/// One failed bind/unbind/map/unmap call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
    /// Identity of the entity (service instance id, or `route:port`).
    pub identity: String,
    /// Operation that failed.
    pub operation: ApplyOperation,
    /// Platform error message.
    pub message: String,
}

/// Aggregate of the individual failures of one apply step.
///
/// Entities that were applied successfully stay applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialApplyError {
    /// Entity kind ("service binding" or "route mapping").
    pub kind: &'static str,
    /// Number of operations attempted.
    pub attempted: usize,
    /// Failed operations, in execution order.
    pub failures: Vec<ApplyFailure>,
}

impl PartialApplyError {
    /// Identities of the entities whose operation failed.
    pub fn failed_identities(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.identity.as_str()).collect()
    }
}

impl std::fmt::Display for PartialApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} {} operations failed",
            self.failures.len(),
            self.attempted,
            self.kind
        )?;
        for failure in &self.failures {
            write!(
                f,
                "; {} {}: {}",
                failure.operation, failure.identity, failure.message
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for PartialApplyError {}

/// Controller errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ControllerError {
    /// The definition was rejected before any remote call.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The application source could not be materialized.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// A remote resource does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of the missing resource.
        kind: ResourceKind,
        /// Identifier or name that was looked up.
        id: String,
    },

    /// Any other platform failure.
    #[error("Platform error: {0}")]
    Platform(PlatformError),

    /// The platform reported that the application failed to start.
    #[error("{message}")]
    StagingFailed {
        /// Application name.
        app: String,
        /// Message matched on the observed status.
        message: String,
    },

    /// The application did not reach running within its declared timeout.
    #[error("app {app} did not start within {}s", .waited.as_secs())]
    Timeout {
        /// Application name.
        app: String,
        /// How long the controller waited.
        waited: Duration,
    },

    /// Some bind/unbind or map/unmap calls failed.
    #[error(transparent)]
    PartialApply(#[from] PartialApplyError),

    /// The session handle could not be constructed.
    #[error("Session error for {key}: {message}")]
    Session {
        /// Session key.
        key: String,
        /// Construction failure.
        message: String,
    },

    /// The application is still present after deletion.
    #[error("app {name} still exists after delete")]
    DestroyFailed {
        /// Application name.
        name: String,
    },

    /// Observed state does not match what was just applied.
    #[error("app {app} did not converge: {field} expected {expected}, observed {observed}")]
    Drift {
        /// Application name.
        app: String,
        /// Attribute that differs.
        field: &'static str,
        /// Value the controller applied.
        expected: String,
        /// Value read back from the platform.
        observed: String,
    },
}

impl ControllerError {
    /// Whether this error reports an absent remote resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ControllerError::NotFound { .. })
    }
}

impl From<PlatformError> for ControllerError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotFound { kind, id } => ControllerError::NotFound { kind, id },
            other => ControllerError::Platform(other),
        }
    }
}

/// Result type using ControllerError.
pub type Result<T> = std::result::Result<T, ControllerError>;
