// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Two-phase application of binding and route deltas.
//!
//! Every removal runs before any addition so a replaced service instance or
//! route slot is free before its successor claims it. Each call is attempted
//! regardless of earlier failures; failures are collected and reported
//! together once both phases ran.

use cfapp_platform::{RouteManager, RouteMapping, ServiceBinding, ServiceBindingManager};
use tracing::{debug, warn};

use crate::diff::{Keyed, SetDiff};
use crate::error::{ApplyFailure, ApplyOperation, PartialApplyError};
use crate::model::{DesiredMapping, ServiceBindingSpec};

/// Outcome of one apply step.
#[derive(Debug)]
pub struct ApplyReport<T> {
    /// Entities present after the step: untouched plus newly created.
    pub active: Vec<T>,
    /// Number of calls attempted.
    pub attempted: usize,
    /// Failed calls.
    pub failures: Vec<ApplyFailure>,
    /// Whether any call succeeded in changing remote state.
    pub changed: bool,
}

impl<T> ApplyReport<T> {
    fn new(active: Vec<T>) -> Self {
        Self {
            active,
            attempted: 0,
            failures: Vec::new(),
            changed: false,
        }
    }

    fn record_failure(&mut self, identity: String, operation: ApplyOperation, message: String) {
        warn!(identity = %identity, operation = %operation, error = %message, "Apply operation failed");
        self.failures.push(ApplyFailure {
            identity,
            operation,
            message,
        });
    }

    /// The active entities, or the aggregated failures.
    pub fn into_result(self, kind: &'static str) -> Result<Vec<T>, PartialApplyError> {
        if self.failures.is_empty() {
            Ok(self.active)
        } else {
            Err(PartialApplyError {
                kind,
                attempted: self.attempted,
                failures: self.failures,
            })
        }
    }
}

/// Apply a binding delta.
pub async fn apply_bindings(
    manager: &dyn ServiceBindingManager,
    app_id: &str,
    diff: &SetDiff<'_, ServiceBindingSpec, ServiceBinding>,
) -> ApplyReport<ServiceBinding> {
    let mut report = ApplyReport::new(diff.unchanged.iter().map(|b| (*b).clone()).collect());

    for binding in &diff.to_remove {
        report.attempted += 1;
        match manager.unbind(&binding.id).await {
            Ok(()) => {
                debug!(service_instance = %binding.service_instance_id, binding_id = %binding.id, "Unbound service");
                report.changed = true;
            }
            Err(e) if e.is_not_found() => {
                debug!(binding_id = %binding.id, "Binding already gone");
            }
            Err(e) => report.record_failure(binding.key(), ApplyOperation::Unbind, e.to_string()),
        }
    }

    for spec in &diff.to_add {
        report.attempted += 1;
        match manager
            .bind(app_id, &spec.service_instance, spec.params.as_ref())
            .await
        {
            Ok(binding) => {
                debug!(service_instance = %binding.service_instance_id, binding_id = %binding.id, "Bound service");
                report.changed = true;
                report.active.push(binding);
            }
            Err(e) => report.record_failure(spec.key(), ApplyOperation::Bind, e.to_string()),
        }
    }

    report
        .active
        .sort_by(|a, b| a.service_instance_id.cmp(&b.service_instance_id));
    report
}

/// Apply a route mapping delta.
pub async fn apply_mappings(
    manager: &dyn RouteManager,
    app_id: &str,
    diff: &SetDiff<'_, DesiredMapping, RouteMapping>,
) -> ApplyReport<RouteMapping> {
    let mut report = ApplyReport::new(diff.unchanged.iter().map(|m| (*m).clone()).collect());

    for mapping in &diff.to_remove {
        report.attempted += 1;
        match manager.unmap_route(&mapping.id).await {
            Ok(()) => {
                debug!(route_id = %mapping.route_id, port = mapping.port, mapping_id = %mapping.id, "Unmapped route");
                report.changed = true;
            }
            Err(e) if e.is_not_found() => {
                debug!(mapping_id = %mapping.id, "Mapping already gone");
            }
            Err(e) => report.record_failure(
                mapping.key().to_string(),
                ApplyOperation::UnmapRoute,
                e.to_string(),
            ),
        }
    }

    for desired in &diff.to_add {
        report.attempted += 1;
        match manager
            .map_route(app_id, &desired.route_id, desired.port)
            .await
        {
            Ok(mapping) => {
                debug!(
                    route_id = %mapping.route_id,
                    port = mapping.port,
                    role = ?desired.role,
                    mapping_id = %mapping.id,
                    "Mapped route"
                );
                report.changed = true;
                report.active.push(mapping);
            }
            Err(e) => report.record_failure(
                desired.key().to_string(),
                ApplyOperation::MapRoute,
                e.to_string(),
            ),
        }
    }

    report.active.sort_by_key(|m| m.key());
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfapp_platform::{AppManager, AppSpec, InMemoryPlatform, PlatformCall};

    use crate::diff::diff_sets;

    async fn app(platform: &InMemoryPlatform) -> String {
        platform
            .create(&AppSpec {
                name: "web".to_string(),
                space_id: "space-1".to_string(),
                instances: 1,
                ..AppSpec::default()
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_removals_run_before_additions() {
        let platform = InMemoryPlatform::new();
        let app_id = app(&platform).await;
        platform.bind(&app_id, "db", None).await.unwrap();
        platform.clear_calls().await;

        let observed = platform.list_bindings_for_app(&app_id).await.unwrap();
        let desired = vec![ServiceBindingSpec::new("db-v2")];
        let diff = diff_sets(&desired, &observed);
        let report = apply_bindings(&platform, &app_id, &diff).await;

        let calls = platform.calls().await;
        assert!(matches!(calls[0], PlatformCall::Unbind { .. }));
        assert!(matches!(calls[1], PlatformCall::Bind { .. }));
        let active = report.into_result("service binding").unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].service_instance_id, "db-v2");
    }

    #[tokio::test]
    async fn test_failures_are_collected_not_short_circuited() {
        let platform = InMemoryPlatform::new();
        let app_id = app(&platform).await;
        platform.fail_binds_for("fs1", "broker unavailable").await;

        let desired = vec![
            ServiceBindingSpec::new("db"),
            ServiceBindingSpec::new("fs1"),
            ServiceBindingSpec::new("fs2"),
        ];
        let diff = diff_sets(&desired, &[] as &[ServiceBinding]);
        let report = apply_bindings(&platform, &app_id, &diff).await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.active.len(), 2);
        let err = report.into_result("service binding").unwrap_err();
        assert_eq!(err.failed_identities(), vec!["fs1"]);
        assert_eq!(platform.bound_service_instances(&app_id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_mapping_failure_reports_route_and_port() {
        let platform = InMemoryPlatform::new();
        let app_id = app(&platform).await;
        platform.fail_route("route-bad", "route is reserved").await;

        let desired = vec![
            DesiredMapping {
                route_id: "route-bad".to_string(),
                port: 8080,
                role: None,
            },
            DesiredMapping {
                route_id: "route-ok".to_string(),
                port: 8080,
                role: None,
            },
        ];
        let diff = diff_sets(&desired, &[] as &[RouteMapping]);
        let report = apply_mappings(&platform, &app_id, &diff).await;

        assert_eq!(report.active.len(), 1);
        let err = report.into_result("route mapping").unwrap_err();
        assert_eq!(err.failed_identities(), vec!["route-bad:8080"]);
        assert_eq!(err.failures[0].operation, ApplyOperation::MapRoute);
    }
}
