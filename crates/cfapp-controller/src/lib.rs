// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! cfapp Controller - application lifecycle reconciliation
//!
//! This crate drives one declared application onto a multi-tenant platform and
//! keeps it there: it materializes the application's source, creates or
//! patches the application, reconciles service bindings and route mappings as
//! set deltas, replaces the environment, starts or restages, and polls until
//! the application runs or fails.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                  IaC engine (create/read/update/delete)       │
//! └───────────────────────────────────────────────────────────────┘
//!                                 │ AppDefinition / AppState
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         AppController                         │
//! │  SourceResolver ─► diff ─► apply ─► start ─► poll ─► verify    │
//! └───────────────────────────────────────────────────────────────┘
//!                                 │ SessionRegistry (one per space)
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │      cfapp-platform managers: apps, routes, service bindings  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! | Status | Reached when |
//! |--------|--------------|
//! | `Defined` | Reconciliation begins |
//! | `SourceStaged` | Source validated and packaged (or unchanged) |
//! | `Created` | Application shell created or patched |
//! | `BindingsApplied` | Binding delta applied without failures |
//! | `RoutesApplied` | Mapping delta applied without failures |
//! | `EnvironmentSet` | Environment matches the definition |
//! | `Starting` | Start, restart or restage requested |
//! | `Started` | At least one instance runs and read-back matches |
//! | `Failed` | Any step failed; the outcome carries the cause |
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cfapp_controller::{AppController, ControllerConfig, FixedConnector, SessionRegistry};
//!
//! let registry = Arc::new(SessionRegistry::new(Arc::new(FixedConnector::new(platform))));
//! let controller = AppController::new(registry, ControllerConfig::from_env()?);
//!
//! let outcome = controller.create(&definition).await;
//! let state = outcome.into_result()?;
//! ```

/// Controller configuration.
pub mod config;

/// Set and attribute diffing.
pub mod diff;

/// Error types.
pub mod error;

/// Lifecycle orchestration.
pub mod lifecycle;

/// Declared and observed application models.
pub mod model;

/// Session registry.
pub mod session;

/// Application source resolution.
pub mod source;

/// Existence and convergence checks.
pub mod verify;

pub use config::{ConfigError, ControllerConfig};
pub use diff::{
    AttributeDiff, Keyed, MappingKey, RestartRequirement, SetDiff, diff_attributes, diff_sets,
    restart_requirement,
};
pub use error::{
    ApplyFailure, ApplyOperation, ControllerError, PartialApplyError, Result, SourceError,
    ValidationError,
};
pub use lifecycle::{AppController, LifecycleStatus, ReconcileOutcome};
pub use model::{
    AppDefinition, AppState, BindingState, DesiredMapping, GitSpec, GithubReleaseSpec,
    MappedTarget, RoleMapping, RouteRole, RouteSpec, RouteState, RouteTarget, ServiceBindingSpec,
    SourceFields,
};
pub use session::{FixedConnector, SessionConnector, SessionHandle, SessionKey, SessionRegistry};
pub use source::{AppSource, Artifact, ArtifactKind, ResolvedSource, SourceResolver};
pub use verify::ExistenceVerifier;
