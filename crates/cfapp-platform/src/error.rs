// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for platform operations.

use thiserror::Error;

/// Kind of remote resource an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// An application.
    App,
    /// A route.
    Route,
    /// A route mapping.
    RouteMapping,
    /// A service instance.
    ServiceInstance,
    /// A service binding.
    ServiceBinding,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::App => write!(f, "app"),
            ResourceKind::Route => write!(f, "route"),
            ResourceKind::RouteMapping => write!(f, "route mapping"),
            ResourceKind::ServiceInstance => write!(f, "service instance"),
            ResourceKind::ServiceBinding => write!(f, "service binding"),
        }
    }
}

/// Platform errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlatformError {
    /// The identified or named resource does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of the missing resource.
        kind: ResourceKind,
        /// Identifier or name that was looked up.
        id: String,
    },

    /// The platform refused the request.
    #[error("platform rejected request [{code}]: {message}")]
    Rejected {
        /// Platform error code.
        code: String,
        /// Platform error message.
        message: String,
    },

    /// The platform could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The request was malformed before it was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// I/O operation failed (e.g. reading bits for upload).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlatformError {
    /// Build a not-found error.
    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        PlatformError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Build a rejection error.
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        PlatformError::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether this error reports an absent resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound { .. })
    }
}

/// Result type for platform operations.
pub type Result<T> = std::result::Result<T, PlatformError>;
