// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Records exchanged with the platform.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Port the platform routes to when an application declares none.
pub const DEFAULT_APP_PORT: u16 = 8080;

/// How the platform decides an instance is healthy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheckType {
    /// TCP connect to the application port.
    #[default]
    Port,
    /// Process liveness only.
    Process,
    /// HTTP GET against an endpoint.
    Http,
    /// No health check.
    None,
}

impl std::fmt::Display for HealthCheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthCheckType::Port => write!(f, "port"),
            HealthCheckType::Process => write!(f, "process"),
            HealthCheckType::Http => write!(f, "http"),
            HealthCheckType::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for HealthCheckType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "port" => Ok(HealthCheckType::Port),
            "process" => Ok(HealthCheckType::Process),
            "http" => Ok(HealthCheckType::Http),
            "none" => Ok(HealthCheckType::None),
            _ => Err(format!("Unknown health check type: {}", s)),
        }
    }
}

/// Desired run state of an application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppRunState {
    /// Not running.
    #[default]
    Stopped,
    /// Requested to run.
    Started,
}

/// Staging state of the application's current package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PackageState {
    /// Bits uploaded (or not yet) and not staged.
    #[default]
    Pending,
    /// Staging produced a runnable droplet.
    Staged,
    /// Staging failed.
    Failed,
}

/// State of a single running instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceState {
    /// Instance is being placed or booting.
    Starting,
    /// Instance passed its health check.
    Running,
    /// Instance exited or failed its health check.
    Crashed,
    /// Instance is not running.
    Down,
}

/// Attributes used to create an application shell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSpec {
    /// Application name (unique per space).
    pub name: String,
    /// Space the application is placed in.
    pub space_id: String,
    /// Memory per instance in MB (platform default when unset).
    pub memory_mb: Option<u64>,
    /// Disk quota per instance in MB (platform default when unset).
    pub disk_quota_mb: Option<u64>,
    /// Number of instances.
    pub instances: u32,
    /// Buildpack name or URL.
    pub buildpack: Option<String>,
    /// Container image reference (mutually exclusive with bits).
    pub docker_image: Option<String>,
    /// Start command.
    pub command: Option<String>,
    /// Health check type.
    pub health_check_type: HealthCheckType,
    /// Endpoint for HTTP health checks.
    pub health_check_http_endpoint: Option<String>,
    /// Health check timeout in seconds.
    pub health_check_timeout_secs: Option<u32>,
    /// Whether SSH access is enabled.
    pub enable_ssh: bool,
    /// Ports the application listens on.
    pub ports: BTreeSet<u16>,
    /// Environment variables.
    pub environment: HashMap<String, String>,
}

/// Partial update of an application shell. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppPatch {
    /// New name.
    pub name: Option<String>,
    /// New memory per instance in MB.
    pub memory_mb: Option<u64>,
    /// New disk quota per instance in MB.
    pub disk_quota_mb: Option<u64>,
    /// New instance count.
    pub instances: Option<u32>,
    /// New buildpack.
    pub buildpack: Option<String>,
    /// New container image. `Some(None)` drops the image so the app runs
    /// from uploaded bits.
    pub docker_image: Option<Option<String>>,
    /// New start command.
    pub command: Option<String>,
    /// New health check type.
    pub health_check_type: Option<HealthCheckType>,
    /// New HTTP health check endpoint.
    pub health_check_http_endpoint: Option<String>,
    /// New health check timeout.
    pub health_check_timeout_secs: Option<u32>,
    /// New SSH flag.
    pub enable_ssh: Option<bool>,
    /// New port set.
    pub ports: Option<BTreeSet<u16>>,
    /// Replacement environment (whole map, never merged).
    pub environment: Option<HashMap<String, String>>,
}

impl AppPatch {
    /// A patch that only replaces the environment.
    pub fn environment(environment: HashMap<String, String>) -> Self {
        Self {
            environment: Some(environment),
            ..Self::default()
        }
    }

    /// Names of the attributes this patch changes, in a fixed order.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.memory_mb.is_some() {
            fields.push("memory");
        }
        if self.disk_quota_mb.is_some() {
            fields.push("disk_quota");
        }
        if self.instances.is_some() {
            fields.push("instances");
        }
        if self.buildpack.is_some() {
            fields.push("buildpack");
        }
        if self.docker_image.is_some() {
            fields.push("docker_image");
        }
        if self.command.is_some() {
            fields.push("command");
        }
        if self.health_check_type.is_some() {
            fields.push("health_check_type");
        }
        if self.health_check_http_endpoint.is_some() {
            fields.push("health_check_http_endpoint");
        }
        if self.health_check_timeout_secs.is_some() {
            fields.push("health_check_timeout");
        }
        if self.enable_ssh.is_some() {
            fields.push("enable_ssh");
        }
        if self.ports.is_some() {
            fields.push("ports");
        }
        if self.environment.is_some() {
            fields.push("environment");
        }
        fields
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Apply the patch to a record.
    pub fn apply_to(&self, record: &mut AppRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(memory) = self.memory_mb {
            record.memory_mb = memory;
        }
        if let Some(disk) = self.disk_quota_mb {
            record.disk_quota_mb = disk;
        }
        if let Some(instances) = self.instances {
            record.instances = instances;
        }
        if let Some(buildpack) = &self.buildpack {
            record.buildpack = Some(buildpack.clone());
        }
        if let Some(image) = &self.docker_image {
            record.docker_image = image.clone();
        }
        if let Some(command) = &self.command {
            record.command = Some(command.clone());
        }
        if let Some(kind) = self.health_check_type {
            record.health_check_type = kind;
        }
        if let Some(endpoint) = &self.health_check_http_endpoint {
            record.health_check_http_endpoint = Some(endpoint.clone());
        }
        if let Some(timeout) = self.health_check_timeout_secs {
            record.health_check_timeout_secs = Some(timeout);
        }
        if let Some(ssh) = self.enable_ssh {
            record.enable_ssh = ssh;
        }
        if let Some(ports) = &self.ports {
            record.ports = ports.clone();
        }
        if let Some(environment) = &self.environment {
            record.environment = environment.clone();
        }
    }
}

/// An application as observed on the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppRecord {
    /// Platform-assigned id.
    pub id: String,
    /// Application name.
    pub name: String,
    /// Space the application lives in.
    pub space_id: String,
    /// Memory per instance in MB.
    pub memory_mb: u64,
    /// Disk quota per instance in MB.
    pub disk_quota_mb: u64,
    /// Desired instance count.
    pub instances: u32,
    /// Stack the application is staged on.
    pub stack_id: String,
    /// Buildpack, if any.
    pub buildpack: Option<String>,
    /// Container image, if any.
    pub docker_image: Option<String>,
    /// Start command, if any.
    pub command: Option<String>,
    /// Health check type.
    pub health_check_type: HealthCheckType,
    /// HTTP health check endpoint.
    pub health_check_http_endpoint: Option<String>,
    /// Health check timeout in seconds.
    pub health_check_timeout_secs: Option<u32>,
    /// Whether SSH is enabled.
    pub enable_ssh: bool,
    /// Ports the application listens on.
    pub ports: BTreeSet<u16>,
    /// Environment variables.
    pub environment: HashMap<String, String>,
    /// Requested run state.
    pub state: AppRunState,
    /// Package staging state.
    pub package_state: PackageState,
    /// When the application was created.
    pub created_at: DateTime<Utc>,
    /// When the application was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Runtime status of an application, polled while it starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppStatus {
    /// Package staging state.
    pub package_state: PackageState,
    /// Staging error reported by the platform.
    pub staging_error: Option<String>,
    /// Per-instance states.
    pub instances: Vec<InstanceStatus>,
}

impl AppStatus {
    /// Number of instances reporting `RUNNING`.
    pub fn running_instances(&self) -> usize {
        self.instances
            .iter()
            .filter(|i| i.state == InstanceState::Running)
            .count()
    }
}

/// Status of one application instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceStatus {
    /// Instance index.
    pub index: u32,
    /// Instance state.
    pub state: InstanceState,
    /// Platform-provided detail (crash reason etc).
    pub details: Option<String>,
}

/// Binding between an application and a service instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBinding {
    /// Platform-assigned binding id.
    pub id: String,
    /// Bound application.
    pub app_id: String,
    /// Bound service instance.
    pub service_instance_id: String,
    /// Credentials injected into the application.
    pub credentials: Value,
    /// When the binding was created.
    pub created_at: DateTime<Utc>,
}

/// Mapping between a route and an application port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMapping {
    /// Platform-assigned mapping id.
    pub id: String,
    /// Mapped application.
    pub app_id: String,
    /// Mapped route.
    pub route_id: String,
    /// Application port receiving the traffic.
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_check_type_round_trips_through_str() {
        for kind in [
            HealthCheckType::Port,
            HealthCheckType::Process,
            HealthCheckType::Http,
            HealthCheckType::None,
        ] {
            let parsed: HealthCheckType = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("tcp".parse::<HealthCheckType>().is_err());
    }

    #[test]
    fn test_patch_changed_fields() {
        let patch = AppPatch {
            memory_mb: Some(1024),
            instances: Some(2),
            ..AppPatch::default()
        };
        assert_eq!(patch.changed_fields(), vec!["memory", "instances"]);
        assert!(!patch.is_empty());
        assert!(AppPatch::default().is_empty());
    }

    #[test]
    fn test_environment_patch_replaces_whole_map() {
        let now = Utc::now();
        let mut record = AppRecord {
            id: "app-1".to_string(),
            name: "spring-music".to_string(),
            space_id: "space-1".to_string(),
            memory_mb: 768,
            disk_quota_mb: 512,
            instances: 1,
            stack_id: "cflinuxfs4".to_string(),
            buildpack: None,
            docker_image: None,
            command: None,
            health_check_type: HealthCheckType::Port,
            health_check_http_endpoint: None,
            health_check_timeout_secs: None,
            enable_ssh: true,
            ports: BTreeSet::from([DEFAULT_APP_PORT]),
            environment: HashMap::from([("OLD".to_string(), "1".to_string())]),
            state: AppRunState::Stopped,
            package_state: PackageState::Pending,
            created_at: now,
            updated_at: now,
        };

        AppPatch::environment(HashMap::from([("NEW".to_string(), "2".to_string())]))
            .apply_to(&mut record);

        assert_eq!(record.environment.len(), 1);
        assert_eq!(record.environment.get("NEW").map(String::as_str), Some("2"));

        record.docker_image = Some("nginx:latest".to_string());
        let clear = AppPatch {
            docker_image: Some(None),
            ..AppPatch::default()
        };
        assert_eq!(clear.changed_fields(), vec!["docker_image"]);
        clear.apply_to(&mut record);
        assert_eq!(record.docker_image, None);
    }
}
