// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory platform for testing.
//!
//! Implements all three manager traits against process-local state so the
//! controller can be exercised without a real platform. Start behaviour can be
//! scripted per application name, and individual binds or route mappings can
//! be made to fail.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{PlatformError, ResourceKind, Result};
use crate::traits::{AppManager, RouteManager, ServiceBindingManager};
use crate::types::{
    AppPatch, AppRecord, AppRunState, AppSpec, AppStatus, DEFAULT_APP_PORT, InstanceState,
    InstanceStatus, PackageState, RouteMapping, ServiceBinding,
};

const DEFAULT_MEMORY_MB: u64 = 1024;
const DEFAULT_DISK_QUOTA_MB: u64 = 1024;
const DEFAULT_STACK: &str = "cflinuxfs4";

/// How a started application behaves when its status is polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartBehavior {
    /// Instances report running after the given number of status polls.
    Healthy {
        /// Polls answered with `STARTING` before instances report `RUNNING`.
        polls_to_running: u32,
    },
    /// Staging fails with the given message.
    StagingFails(String),
    /// Staging succeeds but every instance crashes with the given reason.
    Crashes(String),
    /// Instances stay in `STARTING` forever.
    NeverStarts,
}

impl Default for StartBehavior {
    fn default() -> Self {
        StartBehavior::Healthy {
            polls_to_running: 1,
        }
    }
}

/// A mutating call received by the platform, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    /// `AppManager::create`.
    CreateApp {
        /// Requested name.
        name: String,
    },
    /// `AppManager::update`.
    UpdateApp {
        /// Target app.
        app_id: String,
        /// Attributes changed by the patch.
        fields: Vec<&'static str>,
    },
    /// `AppManager::delete`.
    DeleteApp {
        /// Target app.
        app_id: String,
    },
    /// `AppManager::upload_bits`.
    UploadBits {
        /// Target app.
        app_id: String,
    },
    /// `AppManager::start`.
    Start {
        /// Target app.
        app_id: String,
    },
    /// `AppManager::stop`.
    Stop {
        /// Target app.
        app_id: String,
    },
    /// `AppManager::restage`.
    Restage {
        /// Target app.
        app_id: String,
    },
    /// `ServiceBindingManager::bind`.
    Bind {
        /// Target app.
        app_id: String,
        /// Bound service instance.
        service_instance_id: String,
    },
    /// `ServiceBindingManager::unbind`.
    Unbind {
        /// Removed binding.
        binding_id: String,
    },
    /// `RouteManager::map_route`.
    MapRoute {
        /// Target app.
        app_id: String,
        /// Mapped route.
        route_id: String,
        /// Target port.
        port: u16,
    },
    /// `RouteManager::unmap_route`.
    UnmapRoute {
        /// Removed mapping.
        mapping_id: String,
    },
}

#[derive(Debug)]
struct StoredApp {
    record: AppRecord,
    package_bytes: Option<u64>,
    polls_since_start: u32,
}

#[derive(Debug, Default)]
struct PlatformState {
    apps: HashMap<String, StoredApp>,
    bindings: HashMap<String, ServiceBinding>,
    mappings: HashMap<String, RouteMapping>,
    behaviors: HashMap<String, StartBehavior>,
    failing_service_instances: HashMap<String, String>,
    failing_routes: HashMap<String, String>,
    calls: Vec<PlatformCall>,
}

/// In-memory platform implementing every manager trait.
///
/// Cloning is cheap and clones share state, so a single platform can back the
/// app, route and binding managers of a session.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlatform {
    state: Arc<Mutex<PlatformState>>,
    default_behavior: StartBehavior,
    /// Delay applied before every call to simulate network latency.
    pub latency: Duration,
}

impl InMemoryPlatform {
    /// Create an empty platform where apps start after one status poll.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a platform whose apps behave as given unless overridden by name.
    pub fn with_default_behavior(behavior: StartBehavior) -> Self {
        Self {
            default_behavior: behavior,
            ..Self::default()
        }
    }

    /// Set the simulated latency of every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Script the start behaviour of the app with the given name.
    pub async fn set_start_behavior(&self, app_name: &str, behavior: StartBehavior) {
        let mut state = self.state.lock().await;
        state.behaviors.insert(app_name.to_string(), behavior);
    }

    /// Make every bind of the given service instance fail.
    pub async fn fail_binds_for(&self, service_instance_id: &str, message: &str) {
        let mut state = self.state.lock().await;
        state
            .failing_service_instances
            .insert(service_instance_id.to_string(), message.to_string());
    }

    /// Make every mapping of the given route fail.
    pub async fn fail_route(&self, route_id: &str, message: &str) {
        let mut state = self.state.lock().await;
        state
            .failing_routes
            .insert(route_id.to_string(), message.to_string());
    }

    /// Mutating calls received so far.
    pub async fn calls(&self) -> Vec<PlatformCall> {
        self.state.lock().await.calls.clone()
    }

    /// Forget recorded calls.
    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Number of applications currently present.
    pub async fn app_count(&self) -> usize {
        self.state.lock().await.apps.len()
    }

    /// Size of the package uploaded for an app, if any.
    pub async fn package_size(&self, app_id: &str) -> Option<u64> {
        let state = self.state.lock().await;
        state.apps.get(app_id).and_then(|a| a.package_bytes)
    }

    /// Overwrite an app's environment behind the controller's back.
    pub async fn set_remote_environment(&self, app_id: &str, environment: HashMap<String, String>) {
        let mut state = self.state.lock().await;
        if let Some(app) = state.apps.get_mut(app_id) {
            app.record.environment = environment;
        }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn name_taken(state: &PlatformState, space_id: &str, name: &str, except: Option<&str>) -> bool {
    state.apps.values().any(|a| {
        a.record.space_id == space_id && a.record.name == name && Some(a.record.id.as_str()) != except
    })
}

fn instance_statuses(count: u32, state: InstanceState, details: Option<&str>) -> Vec<InstanceStatus> {
    (0..count)
        .map(|index| InstanceStatus {
            index,
            state,
            details: details.map(str::to_string),
        })
        .collect()
}

#[async_trait]
impl AppManager for InMemoryPlatform {
    async fn create(&self, spec: &AppSpec) -> Result<AppRecord> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        if spec.name.is_empty() {
            return Err(PlatformError::InvalidRequest("app name is required".to_string()));
        }
        if name_taken(&state, &spec.space_id, &spec.name, None) {
            return Err(PlatformError::rejected(
                "CF-AppNameTaken",
                format!("The app name is taken: {}", spec.name),
            ));
        }

        let now = Utc::now();
        let ports = if spec.ports.is_empty() {
            BTreeSet::from([DEFAULT_APP_PORT])
        } else {
            spec.ports.clone()
        };
        let record = AppRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: spec.name.clone(),
            space_id: spec.space_id.clone(),
            memory_mb: spec.memory_mb.unwrap_or(DEFAULT_MEMORY_MB),
            disk_quota_mb: spec.disk_quota_mb.unwrap_or(DEFAULT_DISK_QUOTA_MB),
            instances: spec.instances,
            stack_id: DEFAULT_STACK.to_string(),
            buildpack: spec.buildpack.clone(),
            docker_image: spec.docker_image.clone(),
            command: spec.command.clone(),
            health_check_type: spec.health_check_type,
            health_check_http_endpoint: spec.health_check_http_endpoint.clone(),
            health_check_timeout_secs: spec.health_check_timeout_secs,
            enable_ssh: spec.enable_ssh,
            ports,
            environment: spec.environment.clone(),
            state: AppRunState::Stopped,
            package_state: PackageState::Pending,
            created_at: now,
            updated_at: now,
        };

        state.calls.push(PlatformCall::CreateApp {
            name: spec.name.clone(),
        });
        state.apps.insert(
            record.id.clone(),
            StoredApp {
                record: record.clone(),
                package_bytes: None,
                polls_since_start: 0,
            },
        );

        tracing::debug!(app_id = %record.id, name = %record.name, "Created app");
        Ok(record)
    }

    async fn read(&self, app_id: &str) -> Result<AppRecord> {
        self.simulate_latency().await;
        let state = self.state.lock().await;
        state
            .apps
            .get(app_id)
            .map(|a| a.record.clone())
            .ok_or_else(|| PlatformError::not_found(ResourceKind::App, app_id))
    }

    async fn update(&self, app_id: &str, patch: &AppPatch) -> Result<AppRecord> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        let space_id = state
            .apps
            .get(app_id)
            .map(|a| a.record.space_id.clone())
            .ok_or_else(|| PlatformError::not_found(ResourceKind::App, app_id))?;
        if let Some(name) = &patch.name
            && name_taken(&state, &space_id, name, Some(app_id))
        {
            return Err(PlatformError::rejected(
                "CF-AppNameTaken",
                format!("The app name is taken: {}", name),
            ));
        }

        state.calls.push(PlatformCall::UpdateApp {
            app_id: app_id.to_string(),
            fields: patch.changed_fields(),
        });
        let app = state
            .apps
            .get_mut(app_id)
            .ok_or_else(|| PlatformError::not_found(ResourceKind::App, app_id))?;
        patch.apply_to(&mut app.record);
        app.record.updated_at = Utc::now();
        Ok(app.record.clone())
    }

    async fn delete(&self, app_id: &str) -> Result<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        if !state.apps.contains_key(app_id) {
            return Err(PlatformError::not_found(ResourceKind::App, app_id));
        }
        let referenced = state.bindings.values().any(|b| b.app_id == app_id)
            || state.mappings.values().any(|m| m.app_id == app_id);
        if referenced {
            return Err(PlatformError::rejected(
                "CF-AssociationNotEmpty",
                format!("app {} still has bindings or route mappings", app_id),
            ));
        }

        state.calls.push(PlatformCall::DeleteApp {
            app_id: app_id.to_string(),
        });
        state.apps.remove(app_id);
        Ok(())
    }

    async fn find_by_name(&self, space_id: &str, name: &str) -> Result<AppRecord> {
        self.simulate_latency().await;
        let state = self.state.lock().await;
        state
            .apps
            .values()
            .find(|a| a.record.space_id == space_id && a.record.name == name)
            .map(|a| a.record.clone())
            .ok_or_else(|| PlatformError::not_found(ResourceKind::App, name))
    }

    async fn upload_bits(&self, app_id: &str, package: &Path) -> Result<()> {
        self.simulate_latency().await;
        let metadata = tokio::fs::metadata(package).await?;
        if !metadata.is_file() {
            return Err(PlatformError::InvalidRequest(format!(
                "package is not a file: {}",
                package.display()
            )));
        }

        let mut state = self.state.lock().await;
        let app = state
            .apps
            .get_mut(app_id)
            .ok_or_else(|| PlatformError::not_found(ResourceKind::App, app_id))?;
        app.package_bytes = Some(metadata.len());
        app.record.package_state = PackageState::Pending;
        state.calls.push(PlatformCall::UploadBits {
            app_id: app_id.to_string(),
        });
        Ok(())
    }

    async fn start(&self, app_id: &str) -> Result<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        let app = state
            .apps
            .get_mut(app_id)
            .ok_or_else(|| PlatformError::not_found(ResourceKind::App, app_id))?;
        if app.package_bytes.is_none() && app.record.docker_image.is_none() {
            return Err(PlatformError::rejected(
                "CF-AppPackageInvalid",
                format!("app {} has no bits to stage", app.record.name),
            ));
        }
        app.record.state = AppRunState::Started;
        app.polls_since_start = 0;
        state.calls.push(PlatformCall::Start {
            app_id: app_id.to_string(),
        });
        Ok(())
    }

    async fn stop(&self, app_id: &str) -> Result<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        let app = state
            .apps
            .get_mut(app_id)
            .ok_or_else(|| PlatformError::not_found(ResourceKind::App, app_id))?;
        app.record.state = AppRunState::Stopped;
        state.calls.push(PlatformCall::Stop {
            app_id: app_id.to_string(),
        });
        Ok(())
    }

    async fn restage(&self, app_id: &str) -> Result<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        let app = state
            .apps
            .get_mut(app_id)
            .ok_or_else(|| PlatformError::not_found(ResourceKind::App, app_id))?;
        app.record.package_state = PackageState::Pending;
        app.record.state = AppRunState::Started;
        app.polls_since_start = 0;
        state.calls.push(PlatformCall::Restage {
            app_id: app_id.to_string(),
        });
        Ok(())
    }

    async fn status(&self, app_id: &str) -> Result<AppStatus> {
        self.simulate_latency().await;
        let mut guard = self.state.lock().await;
        let PlatformState { apps, behaviors, .. } = &mut *guard;

        let app = apps
            .get_mut(app_id)
            .ok_or_else(|| PlatformError::not_found(ResourceKind::App, app_id))?;

        if app.record.state == AppRunState::Stopped {
            return Ok(AppStatus {
                package_state: app.record.package_state,
                staging_error: None,
                instances: instance_statuses(app.record.instances, InstanceState::Down, None),
            });
        }

        app.polls_since_start += 1;
        let behavior = behaviors
            .get(&app.record.name)
            .cloned()
            .unwrap_or_else(|| self.default_behavior.clone());

        let status = match behavior {
            StartBehavior::Healthy { polls_to_running } => {
                if app.polls_since_start < polls_to_running {
                    AppStatus {
                        package_state: app.record.package_state,
                        staging_error: None,
                        instances: instance_statuses(
                            app.record.instances,
                            InstanceState::Starting,
                            None,
                        ),
                    }
                } else {
                    app.record.package_state = PackageState::Staged;
                    AppStatus {
                        package_state: PackageState::Staged,
                        staging_error: None,
                        instances: instance_statuses(
                            app.record.instances,
                            InstanceState::Running,
                            None,
                        ),
                    }
                }
            }
            StartBehavior::StagingFails(message) => {
                app.record.package_state = PackageState::Failed;
                AppStatus {
                    package_state: PackageState::Failed,
                    staging_error: Some(message),
                    instances: Vec::new(),
                }
            }
            StartBehavior::Crashes(reason) => {
                app.record.package_state = PackageState::Staged;
                AppStatus {
                    package_state: PackageState::Staged,
                    staging_error: None,
                    instances: instance_statuses(
                        app.record.instances,
                        InstanceState::Crashed,
                        Some(reason.as_str()),
                    ),
                }
            }
            StartBehavior::NeverStarts => AppStatus {
                package_state: app.record.package_state,
                staging_error: None,
                instances: instance_statuses(app.record.instances, InstanceState::Starting, None),
            },
        };

        Ok(status)
    }
}

#[async_trait]
impl RouteManager for InMemoryPlatform {
    async fn map_route(&self, app_id: &str, route_id: &str, port: u16) -> Result<RouteMapping> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        let app = state
            .apps
            .get(app_id)
            .ok_or_else(|| PlatformError::not_found(ResourceKind::App, app_id))?;
        if !app.record.ports.contains(&port) {
            return Err(PlatformError::rejected(
                "CF-RoutingError",
                format!("app {} does not listen on port {}", app.record.name, port),
            ));
        }
        if let Some(message) = state.failing_routes.get(route_id) {
            return Err(PlatformError::rejected("CF-RouteMappingFailed", message.clone()));
        }
        let duplicate = state
            .mappings
            .values()
            .any(|m| m.app_id == app_id && m.route_id == route_id && m.port == port);
        if duplicate {
            return Err(PlatformError::rejected(
                "CF-RouteMappingTaken",
                format!("route {} is already mapped to port {}", route_id, port),
            ));
        }

        let mapping = RouteMapping {
            id: uuid::Uuid::new_v4().to_string(),
            app_id: app_id.to_string(),
            route_id: route_id.to_string(),
            port,
        };
        state.calls.push(PlatformCall::MapRoute {
            app_id: app_id.to_string(),
            route_id: route_id.to_string(),
            port,
        });
        state.mappings.insert(mapping.id.clone(), mapping.clone());
        Ok(mapping)
    }

    async fn unmap_route(&self, mapping_id: &str) -> Result<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        if state.mappings.remove(mapping_id).is_none() {
            return Err(PlatformError::not_found(ResourceKind::RouteMapping, mapping_id));
        }
        state.calls.push(PlatformCall::UnmapRoute {
            mapping_id: mapping_id.to_string(),
        });
        Ok(())
    }

    async fn list_mappings_for_app(&self, app_id: &str) -> Result<Vec<RouteMapping>> {
        self.simulate_latency().await;
        let state = self.state.lock().await;
        if !state.apps.contains_key(app_id) {
            return Err(PlatformError::not_found(ResourceKind::App, app_id));
        }
        Ok(state
            .mappings
            .values()
            .filter(|m| m.app_id == app_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ServiceBindingManager for InMemoryPlatform {
    async fn bind(
        &self,
        app_id: &str,
        service_instance_id: &str,
        params: Option<&Value>,
    ) -> Result<ServiceBinding> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        if !state.apps.contains_key(app_id) {
            return Err(PlatformError::not_found(ResourceKind::App, app_id));
        }
        if let Some(message) = state.failing_service_instances.get(service_instance_id) {
            return Err(PlatformError::rejected("CF-ServiceBrokerBadResponse", message.clone()));
        }
        let taken = state
            .bindings
            .values()
            .any(|b| b.app_id == app_id && b.service_instance_id == service_instance_id);
        if taken {
            return Err(PlatformError::rejected(
                "CF-ServiceBindingAppServiceTaken",
                format!("{} is already bound to {}", service_instance_id, app_id),
            ));
        }

        let binding = ServiceBinding {
            id: uuid::Uuid::new_v4().to_string(),
            app_id: app_id.to_string(),
            service_instance_id: service_instance_id.to_string(),
            credentials: serde_json::json!({
                "uri": format!("svc://{}", service_instance_id),
                "params": params.cloned().unwrap_or(Value::Null),
            }),
            created_at: Utc::now(),
        };
        state.calls.push(PlatformCall::Bind {
            app_id: app_id.to_string(),
            service_instance_id: service_instance_id.to_string(),
        });
        state.bindings.insert(binding.id.clone(), binding.clone());
        Ok(binding)
    }

    async fn unbind(&self, binding_id: &str) -> Result<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        if state.bindings.remove(binding_id).is_none() {
            return Err(PlatformError::not_found(ResourceKind::ServiceBinding, binding_id));
        }
        state.calls.push(PlatformCall::Unbind {
            binding_id: binding_id.to_string(),
        });
        Ok(())
    }

    async fn list_bindings_for_app(&self, app_id: &str) -> Result<Vec<ServiceBinding>> {
        self.simulate_latency().await;
        let state = self.state.lock().await;
        if !state.apps.contains_key(app_id) {
            return Err(PlatformError::not_found(ResourceKind::App, app_id));
        }
        Ok(state
            .bindings
            .values()
            .filter(|b| b.app_id == app_id)
            .cloned()
            .collect())
    }
}

impl InMemoryPlatform {
    /// Ids of service instances currently bound to an app.
    pub async fn bound_service_instances(&self, app_id: &str) -> HashSet<String> {
        let state = self.state.lock().await;
        state
            .bindings
            .values()
            .filter(|b| b.app_id == app_id)
            .map(|b| b.service_instance_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> AppSpec {
        AppSpec {
            name: name.to_string(),
            space_id: "space-1".to_string(),
            instances: 1,
            enable_ssh: true,
            ..AppSpec::default()
        }
    }

    async fn uploaded_app(platform: &InMemoryPlatform, name: &str) -> (AppRecord, tempfile::NamedTempFile) {
        let app = platform.create(&spec(name)).await.unwrap();
        let package = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(package.path(), b"PK\x03\x04bits").unwrap();
        platform.upload_bits(&app.id, package.path()).await.unwrap();
        (app, package)
    }

    #[tokio::test]
    async fn test_create_applies_platform_defaults() {
        let platform = InMemoryPlatform::new();
        let app = platform.create(&spec("spring-music")).await.unwrap();

        assert_eq!(app.memory_mb, DEFAULT_MEMORY_MB);
        assert_eq!(app.ports, BTreeSet::from([DEFAULT_APP_PORT]));
        assert_eq!(app.state, AppRunState::Stopped);
        assert_eq!(app.stack_id, DEFAULT_STACK);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_name_in_space() {
        let platform = InMemoryPlatform::new();
        platform.create(&spec("spring-music")).await.unwrap();

        let err = platform.create(&spec("spring-music")).await.unwrap_err();
        assert!(matches!(err, PlatformError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_find_by_name_not_found() {
        let platform = InMemoryPlatform::new();
        let err = platform.find_by_name("space-1", "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_start_without_bits_is_rejected() {
        let platform = InMemoryPlatform::new();
        let app = platform.create(&spec("empty")).await.unwrap();

        let err = platform.start(&app.id).await.unwrap_err();
        assert!(matches!(err, PlatformError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_healthy_app_runs_after_configured_polls() {
        let platform = InMemoryPlatform::with_default_behavior(StartBehavior::Healthy {
            polls_to_running: 3,
        });
        let (app, _package) = uploaded_app(&platform, "slow").await;
        platform.start(&app.id).await.unwrap();

        assert_eq!(platform.status(&app.id).await.unwrap().running_instances(), 0);
        assert_eq!(platform.status(&app.id).await.unwrap().running_instances(), 0);
        let status = platform.status(&app.id).await.unwrap();
        assert_eq!(status.running_instances(), 1);
        assert_eq!(status.package_state, PackageState::Staged);
    }

    #[tokio::test]
    async fn test_scripted_staging_failure() {
        let platform = InMemoryPlatform::new();
        platform
            .set_start_behavior("big-jar", StartBehavior::StagingFails("disk quota exceeded".into()))
            .await;
        let (app, _package) = uploaded_app(&platform, "big-jar").await;
        platform.start(&app.id).await.unwrap();

        let status = platform.status(&app.id).await.unwrap();
        assert_eq!(status.package_state, PackageState::Failed);
        assert_eq!(status.staging_error.as_deref(), Some("disk quota exceeded"));
    }

    #[tokio::test]
    async fn test_delete_rejected_while_bound() {
        let platform = InMemoryPlatform::new();
        let app = platform.create(&spec("bound")).await.unwrap();
        let binding = platform.bind(&app.id, "db", None).await.unwrap();

        assert!(platform.delete(&app.id).await.is_err());

        platform.unbind(&binding.id).await.unwrap();
        platform.delete(&app.id).await.unwrap();
        assert_eq!(platform.app_count().await, 0);
    }

    #[tokio::test]
    async fn test_bind_same_instance_twice_is_rejected() {
        let platform = InMemoryPlatform::new();
        let app = platform.create(&spec("bound")).await.unwrap();
        platform.bind(&app.id, "db", None).await.unwrap();

        let err = platform.bind(&app.id, "db", None).await.unwrap_err();
        assert!(err.to_string().contains("CF-ServiceBindingAppServiceTaken"));
    }

    #[tokio::test]
    async fn test_map_route_requires_declared_port() {
        let platform = InMemoryPlatform::new();
        let app = platform.create(&spec("web")).await.unwrap();

        assert!(platform.map_route(&app.id, "route-1", 9999).await.is_err());
        let mapping = platform.map_route(&app.id, "route-1", 8080).await.unwrap();
        assert_eq!(mapping.port, 8080);
        assert_eq!(platform.list_mappings_for_app(&app.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_calls_record_mutations_only() {
        let platform = InMemoryPlatform::new();
        let app = platform.create(&spec("web")).await.unwrap();
        platform.read(&app.id).await.unwrap();
        platform.list_bindings_for_app(&app.id).await.unwrap();

        assert_eq!(
            platform.calls().await,
            vec![PlatformCall::CreateApp {
                name: "web".to_string()
            }]
        );
    }
}
