// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Manager trait definitions.
//!
//! Each trait is a facade over one family of remote calls. Implementations
//! must be safe to share between concurrently running reconciliations.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{AppPatch, AppRecord, AppSpec, AppStatus, RouteMapping, ServiceBinding};

/// Application lifecycle operations.
#[async_trait]
pub trait AppManager: Send + Sync {
    /// Create an application shell (stopped, no bits).
    async fn create(&self, spec: &AppSpec) -> Result<AppRecord>;

    /// Read an application by id.
    async fn read(&self, app_id: &str) -> Result<AppRecord>;

    /// Patch an application's attributes.
    async fn update(&self, app_id: &str, patch: &AppPatch) -> Result<AppRecord>;

    /// Delete an application shell.
    async fn delete(&self, app_id: &str) -> Result<()>;

    /// Find an application by name within a space.
    ///
    /// Returns [`PlatformError::NotFound`](crate::PlatformError::NotFound)
    /// when no application carries that name.
    async fn find_by_name(&self, space_id: &str, name: &str) -> Result<AppRecord>;

    /// Upload an application package (zip) as the app's bits.
    async fn upload_bits(&self, app_id: &str, package: &Path) -> Result<()>;

    /// Request the application to run (stages first if needed).
    async fn start(&self, app_id: &str) -> Result<()>;

    /// Request the application to stop.
    async fn stop(&self, app_id: &str) -> Result<()>;

    /// Discard the current droplet and stage again.
    async fn restage(&self, app_id: &str) -> Result<()>;

    /// Current staging and instance status.
    async fn status(&self, app_id: &str) -> Result<AppStatus>;
}

/// Route mapping operations.
#[async_trait]
pub trait RouteManager: Send + Sync {
    /// Map a route to an application port.
    async fn map_route(&self, app_id: &str, route_id: &str, port: u16) -> Result<RouteMapping>;

    /// Remove a route mapping.
    async fn unmap_route(&self, mapping_id: &str) -> Result<()>;

    /// List every mapping targeting an application.
    async fn list_mappings_for_app(&self, app_id: &str) -> Result<Vec<RouteMapping>>;
}

/// Service binding operations.
#[async_trait]
pub trait ServiceBindingManager: Send + Sync {
    /// Bind a service instance to an application.
    async fn bind(
        &self,
        app_id: &str,
        service_instance_id: &str,
        params: Option<&Value>,
    ) -> Result<ServiceBinding>;

    /// Remove a binding.
    async fn unbind(&self, binding_id: &str) -> Result<()>;

    /// List every binding of an application.
    async fn list_bindings_for_app(&self, app_id: &str) -> Result<Vec<ServiceBinding>>;
}
