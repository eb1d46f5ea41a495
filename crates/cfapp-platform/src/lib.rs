// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! cfapp Platform - remote platform facade contract
//!
//! This crate describes the operations the reconciliation controller consumes
//! from a multi-tenant application platform. The transport behind these
//! operations (REST client, credentials, session bootstrapping) lives outside
//! this workspace; anything implementing the three manager traits can be
//! plugged into `cfapp-controller`.
//!
//! # Managers
//!
//! | Trait | Operations |
//! |-------|------------|
//! | [`AppManager`] | create, read, update, delete, find by name, upload bits, start, stop, restage, status |
//! | [`RouteManager`] | map route, unmap route, list mappings for app |
//! | [`ServiceBindingManager`] | bind, unbind, list bindings for app |
//!
//! # Application Status
//!
//! ```text
//!      create            upload_bits           start
//!   ─────────► STOPPED ─────────────► PENDING ───────► STAGED ──► RUNNING
//!                                       │                 │
//!                                       ▼                 ▼
//!                                 STAGING FAILED       CRASHED
//! ```
//!
//! # Modules
//!
//! - [`error`]: Error types for platform operations
//! - [`memory`]: In-process platform used by tests and dry runs
//! - [`traits`]: Manager trait definitions
//! - [`types`]: Records exchanged with the platform

#![deny(missing_docs)]

/// Error types for platform operations.
pub mod error;

/// In-process platform implementation with fault injection.
pub mod memory;

/// Manager trait definitions.
pub mod traits;

/// Records exchanged with the platform.
pub mod types;

pub use error::{PlatformError, ResourceKind, Result};
pub use memory::{InMemoryPlatform, PlatformCall, StartBehavior};
pub use traits::{AppManager, RouteManager, ServiceBindingManager};
pub use types::{
    AppPatch, AppRecord, AppRunState, AppSpec, AppStatus, DEFAULT_APP_PORT, HealthCheckType,
    InstanceState, InstanceStatus, PackageState, RouteMapping, ServiceBinding,
};
