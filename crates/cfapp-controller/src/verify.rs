// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Existence and convergence checks.

use std::collections::BTreeMap;
use std::sync::Arc;

use cfapp_platform::DEFAULT_APP_PORT;
use tracing::{debug, instrument};

use crate::error::{ControllerError, Result};
use crate::model::{AppState, RouteRole, RouteState};
use crate::session::SessionHandle;

/// Idempotent reads against the platform.
#[derive(Debug, Clone)]
pub struct ExistenceVerifier {
    session: Arc<SessionHandle>,
}

impl ExistenceVerifier {
    /// Create a verifier over a session.
    pub fn new(session: Arc<SessionHandle>) -> Self {
        Self { session }
    }

    /// Whether an application with this name exists in the space.
    pub async fn exists(&self, space: &str, name: &str) -> Result<bool> {
        match self.session.apps.find_by_name(space, name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Confirm none of the named applications exists any more.
    pub async fn confirm_destroyed(&self, space: &str, names: &[&str]) -> Result<()> {
        for name in names {
            if self.exists(space, name).await? {
                return Err(ControllerError::DestroyFailed {
                    name: (*name).to_string(),
                });
            }
            debug!(space = %space, app = %name, "Destruction confirmed");
        }
        Ok(())
    }

    /// Read an application and everything attached to it.
    ///
    /// Role mappings are correlated through the mapping ids recorded in
    /// `prior_routes`.
    pub async fn observe(
        &self,
        app_id: &str,
        prior_routes: Option<&RouteState>,
        source_fingerprint: Option<String>,
    ) -> Result<AppState> {
        let record = self.session.apps.read(app_id).await?;
        let bindings = self.session.bindings.list_bindings_for_app(app_id).await?;
        let mappings = self.session.routes.list_mappings_for_app(app_id).await?;
        let primary = record.ports.first().copied().unwrap_or(DEFAULT_APP_PORT);
        let (routes, targets) = RouteState::correlate(&mappings, primary, None, prior_routes);
        Ok(AppState::observe(
            &record,
            &bindings,
            routes,
            targets,
            source_fingerprint,
        ))
    }

    /// Read the application back and compare it with what was applied.
    #[instrument(skip(self, expected), fields(app = %expected.name, app_id = %expected.id))]
    pub async fn confirm_converged(&self, expected: &AppState) -> Result<AppState> {
        let observed = self
            .observe(
                &expected.id,
                Some(&expected.routes),
                expected.source_fingerprint.clone(),
            )
            .await?;

        if let Some((field, want, got)) = first_difference(expected, &observed) {
            return Err(ControllerError::Drift {
                app: expected.name.clone(),
                field,
                expected: want,
                observed: got,
            });
        }
        debug!("Convergence confirmed");
        Ok(observed)
    }
}

type Difference = (&'static str, String, String);

fn compare<T: PartialEq + std::fmt::Debug>(field: &'static str, a: &T, b: &T) -> Option<Difference> {
    (a != b).then(|| (field, format!("{:?}", a), format!("{:?}", b)))
}

fn sorted_env(state: &AppState) -> BTreeMap<&String, &String> {
    state.environment.iter().collect()
}

fn first_difference(expected: &AppState, observed: &AppState) -> Option<Difference> {
    let role = |s: &AppState, r| s.routes.get(r).cloned();

    compare("name", &expected.name, &observed.name)
        .or_else(|| compare("memory", &expected.memory, &observed.memory))
        .or_else(|| compare("disk_quota", &expected.disk_quota, &observed.disk_quota))
        .or_else(|| compare("instances", &expected.instances, &observed.instances))
        .or_else(|| compare("buildpack", &expected.buildpack, &observed.buildpack))
        .or_else(|| compare("docker_image", &expected.docker_image, &observed.docker_image))
        .or_else(|| compare("command", &expected.command, &observed.command))
        .or_else(|| {
            compare(
                "health_check_type",
                &expected.health_check_type,
                &observed.health_check_type,
            )
        })
        .or_else(|| {
            compare(
                "health_check_http_endpoint",
                &expected.health_check_http_endpoint,
                &observed.health_check_http_endpoint,
            )
        })
        .or_else(|| {
            compare(
                "health_check_timeout",
                &expected.health_check_timeout,
                &observed.health_check_timeout,
            )
        })
        .or_else(|| compare("enable_ssh", &expected.enable_ssh, &observed.enable_ssh))
        .or_else(|| compare("ports", &expected.ports, &observed.ports))
        .or_else(|| compare("environment", &sorted_env(expected), &sorted_env(observed)))
        .or_else(|| {
            compare(
                "service_binding",
                &expected.service_bindings,
                &observed.service_bindings,
            )
        })
        .or_else(|| {
            RouteRole::ALL.into_iter().find_map(|r| {
                compare("route", &role(expected, r), &role(observed, r))
            })
        })
        .or_else(|| compare("route_target", &expected.route_targets, &observed.route_targets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use cfapp_platform::{AppManager, AppSpec, InMemoryPlatform};

    use crate::session::SessionKey;

    async fn setup() -> (InMemoryPlatform, ExistenceVerifier, String) {
        let platform = InMemoryPlatform::new();
        let session = Arc::new(SessionHandle::from_platform(
            SessionKey::for_space("space-1"),
            platform.clone(),
        ));
        let app = platform
            .create(&AppSpec {
                name: "web".to_string(),
                space_id: "space-1".to_string(),
                instances: 1,
                ..AppSpec::default()
            })
            .await
            .unwrap();
        (platform, ExistenceVerifier::new(session), app.id)
    }

    #[tokio::test]
    async fn test_exists_and_destroyed() {
        let (platform, verifier, app_id) = setup().await;

        assert!(verifier.exists("space-1", "web").await.unwrap());
        assert!(!verifier.exists("space-2", "web").await.unwrap());
        assert!(matches!(
            verifier.confirm_destroyed("space-1", &["gone", "web"]).await,
            Err(ControllerError::DestroyFailed { name }) if name == "web"
        ));

        platform.delete(&app_id).await.unwrap();
        verifier.confirm_destroyed("space-1", &["web"]).await.unwrap();
    }

    #[tokio::test]
    async fn test_converged_state_passes() {
        let (_platform, verifier, app_id) = setup().await;
        let expected = verifier.observe(&app_id, None, None).await.unwrap();

        let observed = verifier.confirm_converged(&expected).await.unwrap();
        assert_eq!(observed, expected);
    }

    #[tokio::test]
    async fn test_environment_drift_detected() {
        let (platform, verifier, app_id) = setup().await;
        let expected = verifier.observe(&app_id, None, None).await.unwrap();
        platform
            .set_remote_environment(
                &app_id,
                HashMap::from([("INJECTED".to_string(), "1".to_string())]),
            )
            .await;

        let err = verifier.confirm_converged(&expected).await.unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Drift {
                field: "environment",
                ..
            }
        ));
    }
}
