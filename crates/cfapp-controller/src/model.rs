// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Desired-state definition and read-back state of an application.
//!
//! [`AppDefinition`] is the declarative surface handed to the controller by the
//! IaC engine. [`AppState`] is what the controller reports back after a
//! reconciliation or a read; it is always recomputed from the platform.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use cfapp_platform::{
    AppRecord, AppSpec, DEFAULT_APP_PORT, HealthCheckType, RouteMapping, ServiceBinding,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ControllerConfig;
use crate::error::ValidationError;
use crate::source::AppSource;

/// Longest convergence bound a definition may declare, in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

// ============================================================================
// Desired state
// ============================================================================

/// Declarative description of one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppDefinition {
    /// Application name, unique within the space.
    pub name: String,
    /// Space id the application is placed in.
    pub space: String,
    /// Memory per instance in MB (platform default when unset).
    pub memory: Option<u64>,
    /// Disk quota per instance in MB (platform default when unset).
    pub disk_quota: Option<u64>,
    /// Number of instances.
    pub instances: u32,
    /// Convergence bound in seconds.
    pub timeout: Option<u64>,
    /// Ports the application listens on. The first one receives role routes.
    pub ports: Vec<u16>,
    /// Application source (exactly one variant).
    #[serde(flatten)]
    pub source: SourceFields,
    /// Buildpack name or URL.
    pub buildpack: Option<String>,
    /// Start command.
    pub command: Option<String>,
    /// Health check type.
    pub health_check_type: HealthCheckType,
    /// Endpoint for `http` health checks.
    pub health_check_http_endpoint: Option<String>,
    /// Health check timeout in seconds.
    pub health_check_timeout: Option<u32>,
    /// Whether SSH access is enabled.
    pub enable_ssh: bool,
    /// Environment variables (replaced wholesale on change).
    pub environment: HashMap<String, String>,
    /// Service instances bound to the application.
    pub service_binding: Vec<ServiceBindingSpec>,
    /// Role routes.
    pub route: Option<RouteSpec>,
    /// Port-addressed routes for multi-port applications.
    pub route_target: Vec<RouteTarget>,
}

impl Default for AppDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            space: String::new(),
            memory: None,
            disk_quota: None,
            instances: 1,
            timeout: None,
            ports: Vec::new(),
            source: SourceFields::default(),
            buildpack: None,
            command: None,
            health_check_type: HealthCheckType::Port,
            health_check_http_endpoint: None,
            health_check_timeout: None,
            enable_ssh: true,
            environment: HashMap::new(),
            service_binding: Vec::new(),
            route: None,
            route_target: Vec::new(),
        }
    }
}

/// The five mutually exclusive source fields as they appear in the schema.
///
/// Use [`AppSource::from_fields`] to turn them into a validated source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceFields {
    /// Archive URL (`http(s)://` or `file://`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Local file or directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Version-control checkout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSpec>,
    /// Release asset download.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_release: Option<GithubReleaseSpec>,
    /// Container image reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_image: Option<String>,
}

/// `git { ... }` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSpec {
    /// Repository URL.
    pub url: String,
    /// Branch to check out.
    pub branch: Option<String>,
    /// Tag to check out.
    pub tag: Option<String>,
    /// User for https repositories.
    pub user: Option<String>,
    /// Password or token for https repositories.
    pub password: Option<String>,
}

/// `github_release { ... }` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubReleaseSpec {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Asset file name.
    pub filename: String,
    /// Release tag, or `latest`.
    pub version: Option<String>,
    /// Basic auth user.
    pub user: Option<String>,
    /// Basic auth password or token.
    pub password: Option<String>,
}

/// `service_binding { ... }` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceBindingSpec {
    /// Service instance id. Identity of the binding.
    pub service_instance: String,
    /// Arbitrary binding parameters passed to the broker.
    pub params: Option<Value>,
}

impl ServiceBindingSpec {
    /// Binding of a service instance without parameters.
    pub fn new(service_instance: impl Into<String>) -> Self {
        Self {
            service_instance: service_instance.into(),
            params: None,
        }
    }
}

/// `route { ... }` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSpec {
    /// Route receiving normal traffic.
    pub default_route: Option<String>,
    /// Route used while a new version is staged.
    pub stage_route: Option<String>,
    /// Route promoted to live traffic.
    pub live_route: Option<String>,
}

impl RouteSpec {
    /// Route id declared for a role.
    pub fn get(&self, role: RouteRole) -> Option<&str> {
        let route = match role {
            RouteRole::Default => &self.default_route,
            RouteRole::Stage => &self.stage_route,
            RouteRole::Live => &self.live_route,
        };
        route.as_deref().filter(|r| !r.is_empty())
    }
}

/// `route_target { ... }` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteTarget {
    /// Route id.
    pub route: String,
    /// Declared application port receiving the traffic.
    pub port: u16,
}

/// Role of a route mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteRole {
    /// `default_route`.
    Default,
    /// `stage_route`.
    Stage,
    /// `live_route`.
    Live,
}

impl RouteRole {
    /// Every role, in mapping order.
    pub const ALL: [RouteRole; 3] = [RouteRole::Default, RouteRole::Stage, RouteRole::Live];
}

impl std::fmt::Display for RouteRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteRole::Default => write!(f, "default"),
            RouteRole::Stage => write!(f, "stage"),
            RouteRole::Live => write!(f, "live"),
        }
    }
}

/// A route mapping the definition asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredMapping {
    /// Route id.
    pub route_id: String,
    /// Application port.
    pub port: u16,
    /// Role, if the mapping comes from the `route` block.
    pub role: Option<RouteRole>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl AppDefinition {
    /// Ports the application listens on, falling back to the platform default.
    pub fn effective_ports(&self) -> BTreeSet<u16> {
        if self.ports.is_empty() {
            BTreeSet::from([DEFAULT_APP_PORT])
        } else {
            self.ports.iter().copied().collect()
        }
    }

    /// Port receiving role routes: the first declared port.
    pub fn primary_port(&self) -> u16 {
        self.ports.first().copied().unwrap_or(DEFAULT_APP_PORT)
    }

    /// Convergence bound for this application.
    pub fn timeout(&self, config: &ControllerConfig) -> Duration {
        self.timeout
            .map(Duration::from_secs)
            .unwrap_or(config.default_timeout)
    }

    /// Validate the definition and build its source.
    ///
    /// Performs no I/O. Every rejection happens here, before the controller
    /// touches the platform.
    pub fn validate(&self) -> Result<AppSource, ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::invalid("name", "must not be empty"));
        }
        if self.space.trim().is_empty() {
            return Err(ValidationError::invalid("space", "must not be empty"));
        }
        if self.memory == Some(0) {
            return Err(ValidationError::invalid("memory", "must be greater than zero"));
        }
        if self.disk_quota == Some(0) {
            return Err(ValidationError::invalid("disk_quota", "must be greater than zero"));
        }
        match self.timeout {
            Some(0) => {
                return Err(ValidationError::invalid("timeout", "must be greater than zero"));
            }
            Some(secs) if secs > MAX_TIMEOUT_SECS => {
                return Err(ValidationError::invalid(
                    "timeout",
                    format!("must not exceed {} seconds", MAX_TIMEOUT_SECS),
                ));
            }
            _ => {}
        }
        if self.ports.contains(&0) {
            return Err(ValidationError::invalid("ports", "port 0 is not a valid port"));
        }
        if non_empty(&self.health_check_http_endpoint).is_some()
            && self.health_check_type != HealthCheckType::Http
        {
            return Err(ValidationError::invalid(
                "health_check_http_endpoint",
                format!(
                    "only allowed with health_check_type http, got {}",
                    self.health_check_type
                ),
            ));
        }

        let mut seen = HashSet::new();
        for binding in &self.service_binding {
            if binding.service_instance.is_empty() {
                return Err(ValidationError::invalid(
                    "service_binding",
                    "service_instance must not be empty",
                ));
            }
            if !seen.insert(binding.service_instance.as_str()) {
                return Err(ValidationError::invalid(
                    "service_binding",
                    format!("{} is bound more than once", binding.service_instance),
                ));
            }
        }

        let ports = self.effective_ports();
        for target in &self.route_target {
            if target.route.is_empty() {
                return Err(ValidationError::invalid("route_target", "route must not be empty"));
            }
            if !ports.contains(&target.port) {
                return Err(ValidationError::invalid(
                    "route_target",
                    format!("port {} of route {} is not declared in ports", target.port, target.route),
                ));
            }
        }
        let mut keys = HashSet::new();
        for mapping in self.desired_mappings() {
            if !keys.insert((mapping.route_id.clone(), mapping.port)) {
                return Err(ValidationError::invalid(
                    "route",
                    format!("route {} is mapped to port {} more than once", mapping.route_id, mapping.port),
                ));
            }
        }

        AppSource::from_fields(&self.source)
    }

    /// Bindings the definition asks for.
    pub fn desired_bindings(&self) -> &[ServiceBindingSpec] {
        &self.service_binding
    }

    /// Mappings the definition asks for: role routes on the primary port, then
    /// port-addressed targets in declaration order.
    pub fn desired_mappings(&self) -> Vec<DesiredMapping> {
        let primary = self.primary_port();
        let mut mappings = Vec::new();
        if let Some(route) = &self.route {
            for role in RouteRole::ALL {
                if let Some(route_id) = route.get(role) {
                    mappings.push(DesiredMapping {
                        route_id: route_id.to_string(),
                        port: primary,
                        role: Some(role),
                    });
                }
            }
        }
        for target in &self.route_target {
            mappings.push(DesiredMapping {
                route_id: target.route.clone(),
                port: target.port,
                role: None,
            });
        }
        mappings
    }

    /// Attributes of the application shell. The environment is applied in its
    /// own lifecycle step and is therefore left empty here.
    pub fn app_spec(&self, source: &AppSource) -> AppSpec {
        AppSpec {
            name: self.name.clone(),
            space_id: self.space.clone(),
            memory_mb: self.memory,
            disk_quota_mb: self.disk_quota,
            instances: self.instances,
            buildpack: non_empty(&self.buildpack).map(str::to_string),
            docker_image: source.docker_image().map(str::to_string),
            command: non_empty(&self.command).map(str::to_string),
            health_check_type: self.health_check_type,
            health_check_http_endpoint: non_empty(&self.health_check_http_endpoint)
                .map(str::to_string),
            health_check_timeout_secs: self.health_check_timeout,
            enable_ssh: self.enable_ssh,
            ports: self.effective_ports(),
            environment: HashMap::new(),
        }
    }
}

// ============================================================================
// Read-back state
// ============================================================================

/// Binding as reported in the read-back state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingState {
    /// Service instance id.
    pub service_instance: String,
    /// Platform-assigned binding id.
    pub binding_id: String,
}

/// Role mapping as reported in the read-back state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMapping {
    /// Route id.
    pub route_id: String,
    /// Platform-assigned mapping id.
    pub mapping_id: String,
}

/// The three role slots. Each holds at most one mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteState {
    /// `default_route` and `default_route_mapping_id`.
    pub default: Option<RoleMapping>,
    /// `stage_route` and `stage_route_mapping_id`.
    pub stage: Option<RoleMapping>,
    /// `live_route` and `live_route_mapping_id`.
    pub live: Option<RoleMapping>,
}

/// Port-addressed mapping as reported in the read-back state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MappedTarget {
    /// Route id.
    pub route: String,
    /// Application port.
    pub port: u16,
    /// Platform-assigned mapping id.
    pub mapping_id: String,
}

impl RouteState {
    /// Mapping held by a role.
    pub fn get(&self, role: RouteRole) -> Option<&RoleMapping> {
        match role {
            RouteRole::Default => self.default.as_ref(),
            RouteRole::Stage => self.stage.as_ref(),
            RouteRole::Live => self.live.as_ref(),
        }
    }

    fn slot(&mut self, role: RouteRole) -> &mut Option<RoleMapping> {
        match role {
            RouteRole::Default => &mut self.default,
            RouteRole::Stage => &mut self.stage,
            RouteRole::Live => &mut self.live,
        }
    }

    /// Split observed mappings into role slots and port-addressed targets.
    ///
    /// With `hints` (the desired `route` block), a role claims the mapping of
    /// its route on the primary port. Without hints, a role keeps the mapping
    /// whose id the `prior` state recorded, if it still exists. Every mapping
    /// not claimed by a role is reported as a target.
    pub fn correlate(
        mappings: &[RouteMapping],
        primary_port: u16,
        hints: Option<&RouteSpec>,
        prior: Option<&RouteState>,
    ) -> (RouteState, Vec<MappedTarget>) {
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut roles = RouteState::default();

        for role in RouteRole::ALL {
            let prior_id = prior
                .and_then(|p| p.get(role))
                .map(|m| m.mapping_id.as_str());
            let found = match hints {
                Some(hints) => hints.get(role).and_then(|route_id| {
                    let candidates: Vec<&RouteMapping> = mappings
                        .iter()
                        .filter(|m| {
                            m.route_id == route_id
                                && m.port == primary_port
                                && !claimed.contains(m.id.as_str())
                        })
                        .collect();
                    candidates
                        .iter()
                        .find(|m| Some(m.id.as_str()) == prior_id)
                        .or(candidates.first())
                        .copied()
                }),
                None => prior_id.and_then(|id| {
                    mappings
                        .iter()
                        .find(|m| m.id == id && !claimed.contains(m.id.as_str()))
                }),
            };
            if let Some(mapping) = found {
                claimed.insert(mapping.id.as_str());
                *roles.slot(role) = Some(RoleMapping {
                    route_id: mapping.route_id.clone(),
                    mapping_id: mapping.id.clone(),
                });
            }
        }

        let mut targets: Vec<MappedTarget> = mappings
            .iter()
            .filter(|m| !claimed.contains(m.id.as_str()))
            .map(|m| MappedTarget {
                route: m.route_id.clone(),
                port: m.port,
                mapping_id: m.id.clone(),
            })
            .collect();
        targets.sort();
        (roles, targets)
    }
}

/// Application state as read back from the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    /// Platform-assigned id.
    pub id: String,
    /// Application name.
    pub name: String,
    /// Space id.
    pub space: String,
    /// Memory per instance in MB.
    pub memory: u64,
    /// Disk quota per instance in MB.
    pub disk_quota: u64,
    /// Instance count.
    pub instances: u32,
    /// Stack the application is staged on.
    pub stack: String,
    /// Buildpack.
    pub buildpack: Option<String>,
    /// Container image.
    pub docker_image: Option<String>,
    /// Start command.
    pub command: Option<String>,
    /// Health check type.
    pub health_check_type: HealthCheckType,
    /// HTTP health check endpoint.
    pub health_check_http_endpoint: Option<String>,
    /// Health check timeout in seconds.
    pub health_check_timeout: Option<u32>,
    /// SSH flag.
    pub enable_ssh: bool,
    /// Declared ports.
    pub ports: BTreeSet<u16>,
    /// Environment variables.
    pub environment: HashMap<String, String>,
    /// Bindings, sorted by service instance.
    pub service_bindings: Vec<BindingState>,
    /// Role mappings.
    pub routes: RouteState,
    /// Port-addressed mappings, sorted by route and port.
    pub route_targets: Vec<MappedTarget>,
    /// Fingerprint of the source last deployed by the controller.
    pub source_fingerprint: Option<String>,
}

impl AppState {
    /// Build the state from observed platform records.
    pub fn observe(
        record: &AppRecord,
        bindings: &[ServiceBinding],
        routes: RouteState,
        route_targets: Vec<MappedTarget>,
        source_fingerprint: Option<String>,
    ) -> Self {
        let mut service_bindings: Vec<BindingState> = bindings
            .iter()
            .map(|b| BindingState {
                service_instance: b.service_instance_id.clone(),
                binding_id: b.id.clone(),
            })
            .collect();
        service_bindings.sort();

        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            space: record.space_id.clone(),
            memory: record.memory_mb,
            disk_quota: record.disk_quota_mb,
            instances: record.instances,
            stack: record.stack_id.clone(),
            buildpack: record.buildpack.clone(),
            docker_image: record.docker_image.clone(),
            command: record.command.clone(),
            health_check_type: record.health_check_type,
            health_check_http_endpoint: record.health_check_http_endpoint.clone(),
            health_check_timeout: record.health_check_timeout_secs,
            enable_ssh: record.enable_ssh,
            ports: record.ports.clone(),
            environment: record.environment.clone(),
            service_bindings,
            routes,
            route_targets,
            source_fingerprint,
        }
    }

    /// Binding id of a service instance.
    pub fn binding_id(&self, service_instance: &str) -> Option<&str> {
        self.service_bindings
            .iter()
            .find(|b| b.service_instance == service_instance)
            .map(|b| b.binding_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> AppDefinition {
        AppDefinition {
            name: "spring-music".to_string(),
            space: "space-1".to_string(),
            source: SourceFields {
                docker_image: Some("cloudfoundry/diego-docker-app:latest".to_string()),
                ..SourceFields::default()
            },
            ..AppDefinition::default()
        }
    }

    fn mapping(id: &str, route: &str, port: u16) -> RouteMapping {
        RouteMapping {
            id: id.to_string(),
            app_id: "app-1".to_string(),
            route_id: route.to_string(),
            port,
        }
    }

    #[test]
    fn test_schema_defaults() {
        let def: AppDefinition = serde_json::from_value(serde_json::json!({
            "name": "spring-music",
            "space": "space-1",
            "url": "https://example.com/spring-music.war"
        }))
        .unwrap();

        assert_eq!(def.instances, 1);
        assert!(def.enable_ssh);
        assert_eq!(def.health_check_type, HealthCheckType::Port);
        assert_eq!(def.effective_ports(), BTreeSet::from([8080]));
        assert_eq!(def.timeout(&ControllerConfig::default()), Duration::from_secs(60));
        assert_eq!(
            def.source.url.as_deref(),
            Some("https://example.com/spring-music.war")
        );
    }

    #[test]
    fn test_schema_nested_blocks() {
        let def: AppDefinition = serde_json::from_value(serde_json::json!({
            "name": "web",
            "space": "space-1",
            "ports": [8888, 9999],
            "git": { "url": "https://github.com/acme/web.git", "branch": "main" },
            "service_binding": [
                { "service_instance": "db" },
                { "service_instance": "fs1", "params": { "mode": "rw" } }
            ],
            "route": { "default_route": "route-1" },
            "route_target": [ { "route": "route-2", "port": 9999 } ]
        }))
        .unwrap();

        assert_eq!(def.primary_port(), 8888);
        assert_eq!(def.service_binding.len(), 2);
        assert_eq!(def.source.git.as_ref().map(|g| g.url.as_str()), Some("https://github.com/acme/web.git"));
        assert!(def.validate().is_ok());

        let mappings = def.desired_mappings();
        assert_eq!(
            mappings,
            vec![
                DesiredMapping {
                    route_id: "route-1".to_string(),
                    port: 8888,
                    role: Some(RouteRole::Default),
                },
                DesiredMapping {
                    route_id: "route-2".to_string(),
                    port: 9999,
                    role: None,
                },
            ]
        );
    }

    #[test]
    fn test_http_endpoint_requires_http_health_check() {
        let mut def = definition();
        def.health_check_http_endpoint = Some("/health".to_string());
        let err = def.validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidField {
                field: "health_check_http_endpoint",
                ..
            }
        ));

        def.health_check_type = HealthCheckType::Http;
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_route_target_port_must_be_declared() {
        let mut def = definition();
        def.ports = vec![8888];
        def.route_target = vec![RouteTarget {
            route: "route-1".to_string(),
            port: 9999,
        }];
        assert!(matches!(
            def.validate(),
            Err(ValidationError::InvalidField { field: "route_target", .. })
        ));
    }

    #[test]
    fn test_duplicate_route_and_port_rejected() {
        let mut def = definition();
        def.route = Some(RouteSpec {
            default_route: Some("route-1".to_string()),
            ..RouteSpec::default()
        });
        def.route_target = vec![RouteTarget {
            route: "route-1".to_string(),
            port: 8080,
        }];
        assert!(matches!(
            def.validate(),
            Err(ValidationError::InvalidField { field: "route", .. })
        ));
    }

    #[test]
    fn test_timeout_bounds() {
        let mut def = definition();
        def.timeout = Some(0);
        assert!(matches!(
            def.validate(),
            Err(ValidationError::InvalidField { field: "timeout", .. })
        ));

        def.timeout = Some(u64::MAX);
        assert!(matches!(
            def.validate(),
            Err(ValidationError::InvalidField { field: "timeout", .. })
        ));

        def.timeout = Some(MAX_TIMEOUT_SECS);
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let mut def = definition();
        def.service_binding = vec![ServiceBindingSpec::new("db"), ServiceBindingSpec::new("db")];
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_app_spec_leaves_environment_for_later_step() {
        let mut def = definition();
        def.environment.insert("KEY".to_string(), "value".to_string());
        def.command = Some(String::new());
        let source = def.validate().unwrap();

        let spec = def.app_spec(&source);
        assert!(spec.environment.is_empty());
        assert_eq!(spec.command, None);
        assert_eq!(
            spec.docker_image.as_deref(),
            Some("cloudfoundry/diego-docker-app:latest")
        );
    }

    #[test]
    fn test_correlate_with_hints_claims_primary_port() {
        let mappings = vec![
            mapping("m-2", "route-1", 9999),
            mapping("m-1", "route-1", 8080),
            mapping("m-3", "route-2", 8080),
        ];
        let hints = RouteSpec {
            default_route: Some("route-1".to_string()),
            live_route: Some("route-2".to_string()),
            ..RouteSpec::default()
        };

        let (roles, targets) = RouteState::correlate(&mappings, 8080, Some(&hints), None);

        assert_eq!(roles.default.as_ref().map(|m| m.mapping_id.as_str()), Some("m-1"));
        assert_eq!(roles.live.as_ref().map(|m| m.mapping_id.as_str()), Some("m-3"));
        assert!(roles.stage.is_none());
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].mapping_id, "m-2");
    }

    #[test]
    fn test_correlate_without_hints_uses_prior_ids() {
        let mappings = vec![mapping("m-1", "route-1", 8080), mapping("m-2", "route-2", 8080)];
        let prior = RouteState {
            stage: Some(RoleMapping {
                route_id: "route-2".to_string(),
                mapping_id: "m-2".to_string(),
            }),
            default: Some(RoleMapping {
                route_id: "route-gone".to_string(),
                mapping_id: "m-gone".to_string(),
            }),
            ..RouteState::default()
        };

        let (roles, targets) = RouteState::correlate(&mappings, 8080, None, Some(&prior));

        assert!(roles.default.is_none());
        assert_eq!(roles.stage.as_ref().map(|m| m.route_id.as_str()), Some("route-2"));
        assert_eq!(targets.iter().map(|t| t.mapping_id.as_str()).collect::<Vec<_>>(), vec!["m-1"]);
    }
}
