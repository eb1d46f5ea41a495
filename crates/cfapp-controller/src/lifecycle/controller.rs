// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Create, update, read and delete of one application.

use std::sync::Arc;

use cfapp_platform::{AppPatch, AppRunState, PlatformError, RouteMapping, ServiceBinding};
use tracing::{debug, info, instrument};

use super::apply::{apply_bindings, apply_mappings};
use super::poll::wait_until_started;
use super::status::{LifecycleStatus, ReconcileOutcome, Reconciliation};
use crate::config::ControllerConfig;
use crate::diff::{RestartRequirement, diff_attributes, diff_sets, restart_requirement};
use crate::error::{Result, ValidationError};
use crate::model::{AppDefinition, AppState, RouteState};
use crate::session::{SessionHandle, SessionKey, SessionRegistry};
use crate::source::SourceResolver;
use crate::verify::ExistenceVerifier;

/// Treat an absent resource as an empty result.
fn absent_ok<T: Default>(result: std::result::Result<T, PlatformError>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_not_found() => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// Reconciles application definitions against the platform.
///
/// Cheap to share: every reconciliation keeps its own state on the stack, and
/// the only shared structure is the session registry.
#[derive(Debug)]
pub struct AppController {
    registry: Arc<SessionRegistry>,
    resolver: SourceResolver,
    config: ControllerConfig,
}

impl AppController {
    /// Create a controller.
    pub fn new(registry: Arc<SessionRegistry>, config: ControllerConfig) -> Self {
        Self {
            resolver: SourceResolver::new(&config),
            registry,
            config,
        }
    }

    /// Session registry used by this controller.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Controller configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    async fn session(&self, space: &str) -> Result<Arc<SessionHandle>> {
        self.registry.acquire(&SessionKey::for_space(space)).await
    }

    /// Create an application and drive it to `Started`.
    #[instrument(skip(self, desired), fields(app = %desired.name, space = %desired.space))]
    pub async fn create(&self, desired: &AppDefinition) -> ReconcileOutcome {
        let mut run = Reconciliation::new(&desired.name);
        match self.run_create(desired, &mut run).await {
            Ok(state) => run.finish(state),
            Err(err) => run.fail(err),
        }
    }

    async fn run_create(&self, desired: &AppDefinition, run: &mut Reconciliation) -> Result<AppState> {
        let source = desired.validate()?;
        let session = self.session(&desired.space).await?;
        let resolved = self.resolver.resolve(&source).await?;
        run.advance(LifecycleStatus::SourceStaged);

        let record = session.apps.create(&desired.app_spec(&source)).await?;
        run.set_app_id(&record.id);
        run.advance(LifecycleStatus::Created);

        // A new shell has nothing bound or mapped yet.
        let no_bindings: Vec<ServiceBinding> = Vec::new();
        let binding_diff = diff_sets(desired.desired_bindings(), &no_bindings);
        let bindings = apply_bindings(session.bindings.as_ref(), &record.id, &binding_diff)
            .await
            .into_result("service binding")?;
        run.advance(LifecycleStatus::BindingsApplied);

        let no_mappings: Vec<RouteMapping> = Vec::new();
        let desired_mappings = desired.desired_mappings();
        let mapping_diff = diff_sets(&desired_mappings, &no_mappings);
        let mappings = apply_mappings(session.routes.as_ref(), &record.id, &mapping_diff)
            .await
            .into_result("route mapping")?;
        run.advance(LifecycleStatus::RoutesApplied);

        let record = if desired.environment != record.environment {
            session
                .apps
                .update(&record.id, &AppPatch::environment(desired.environment.clone()))
                .await?
        } else {
            record
        };
        run.advance(LifecycleStatus::EnvironmentSet);

        if let Some(package) = resolved.package_path() {
            session.apps.upload_bits(&record.id, package).await?;
        }
        drop(resolved);
        session.apps.start(&record.id).await?;
        run.advance(LifecycleStatus::Starting);

        wait_until_started(
            session.apps.as_ref(),
            &record.id,
            &record.name,
            desired.timeout(&self.config),
            &self.config,
        )
        .await?;

        let (routes, targets) = RouteState::correlate(
            &mappings,
            desired.primary_port(),
            desired.route.as_ref(),
            None,
        );
        let expected = AppState::observe(
            &record,
            &bindings,
            routes,
            targets,
            Some(source.fingerprint()),
        );
        ExistenceVerifier::new(session).confirm_converged(&expected).await
    }

    /// Bring an existing application in line with a changed definition.
    ///
    /// `prior` is the state recorded by the previous reconciliation; its id,
    /// source fingerprint and role mapping ids are used. Everything else is
    /// read fresh from the platform.
    #[instrument(skip(self, prior, desired), fields(app = %desired.name, app_id = %prior.id))]
    pub async fn update(&self, prior: &AppState, desired: &AppDefinition) -> ReconcileOutcome {
        let mut run = Reconciliation::new(&desired.name);
        run.set_app_id(&prior.id);
        match self.run_update(prior, desired, &mut run).await {
            Ok(state) => run.finish(state),
            Err(err) => run.fail(err),
        }
    }

    async fn run_update(
        &self,
        prior: &AppState,
        desired: &AppDefinition,
        run: &mut Reconciliation,
    ) -> Result<AppState> {
        let source = desired.validate()?;
        if desired.space != prior.space {
            return Err(ValidationError::invalid(
                "space",
                format!(
                    "cannot move app from space {} to {}; recreate it instead",
                    prior.space, desired.space
                ),
            )
            .into());
        }
        let session = self.session(&desired.space).await?;
        let record = session.apps.read(&prior.id).await?;

        let fingerprint = source.fingerprint();
        let source_changed = prior.source_fingerprint.as_deref() != Some(fingerprint.as_str());
        let resolved = if source_changed {
            info!(kind = source.kind(), "Source changed");
            Some(self.resolver.resolve(&source).await?)
        } else {
            None
        };
        run.advance(LifecycleStatus::SourceStaged);

        let attributes = diff_attributes(desired, &source, &record);
        let record = if attributes.patch.is_empty() {
            record
        } else {
            info!(fields = ?attributes.patch.changed_fields(), "Patching app");
            session.apps.update(&record.id, &attributes.patch).await?
        };
        run.advance(LifecycleStatus::Created);

        let observed_bindings = session.bindings.list_bindings_for_app(&record.id).await?;
        let binding_diff = diff_sets(desired.desired_bindings(), &observed_bindings);
        info!(
            add = binding_diff.to_add.len(),
            remove = binding_diff.to_remove.len(),
            keep = binding_diff.unchanged.len(),
            "Binding delta"
        );
        let report = apply_bindings(session.bindings.as_ref(), &record.id, &binding_diff).await;
        let bindings_changed = report.changed;
        let bindings = report.into_result("service binding")?;
        run.advance(LifecycleStatus::BindingsApplied);

        let observed_mappings = session.routes.list_mappings_for_app(&record.id).await?;
        let desired_mappings = desired.desired_mappings();
        let mapping_diff = diff_sets(&desired_mappings, &observed_mappings);
        info!(
            add = mapping_diff.to_add.len(),
            remove = mapping_diff.to_remove.len(),
            keep = mapping_diff.unchanged.len(),
            "Route mapping delta"
        );
        let mappings = apply_mappings(session.routes.as_ref(), &record.id, &mapping_diff)
            .await
            .into_result("route mapping")?;
        run.advance(LifecycleStatus::RoutesApplied);

        let record = match &attributes.environment {
            Some(environment) => {
                session
                    .apps
                    .update(&record.id, &AppPatch::environment(environment.clone()))
                    .await?
            }
            None => record,
        };
        run.advance(LifecycleStatus::EnvironmentSet);

        if let Some(package) = resolved.as_ref().and_then(|r| r.package_path()) {
            session.apps.upload_bits(&record.id, package).await?;
        }
        drop(resolved);

        let requirement = restart_requirement(&attributes, bindings_changed, source_changed);
        debug!(requirement = ?requirement, from = %run.status(), "Rolling out");
        match requirement {
            RestartRequirement::Restage => session.apps.restage(&record.id).await?,
            RestartRequirement::Restart => {
                session.apps.stop(&record.id).await?;
                session.apps.start(&record.id).await?;
            }
            RestartRequirement::None if record.state == AppRunState::Stopped => {
                session.apps.start(&record.id).await?;
            }
            RestartRequirement::None => {}
        }
        run.advance(LifecycleStatus::Starting);

        wait_until_started(
            session.apps.as_ref(),
            &record.id,
            &record.name,
            desired.timeout(&self.config),
            &self.config,
        )
        .await?;

        let (routes, targets) = RouteState::correlate(
            &mappings,
            desired.primary_port(),
            desired.route.as_ref(),
            Some(&prior.routes),
        );
        let expected = AppState::observe(&record, &bindings, routes, targets, Some(fingerprint));
        ExistenceVerifier::new(session).confirm_converged(&expected).await
    }

    /// Read an application back. `None` when it no longer exists.
    #[instrument(skip(self, prior))]
    pub async fn read(
        &self,
        space: &str,
        app_id: &str,
        prior: Option<&AppState>,
    ) -> Result<Option<AppState>> {
        let session = self.session(space).await?;
        let verifier = ExistenceVerifier::new(session);
        match verifier
            .observe(
                app_id,
                prior.map(|p| &p.routes),
                prior.and_then(|p| p.source_fingerprint.clone()),
            )
            .await
        {
            Ok(state) => Ok(Some(state)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete an application with its route mappings and bindings.
    ///
    /// Deleting an application that does not exist succeeds.
    #[instrument(skip(self))]
    pub async fn delete(&self, space: &str, app_id: &str) -> Result<()> {
        let session = self.session(space).await?;
        let record = match session.apps.read(app_id).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                info!("App already absent");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mappings = absent_ok(session.routes.list_mappings_for_app(app_id).await)?;
        for mapping in &mappings {
            absent_ok(session.routes.unmap_route(&mapping.id).await)?;
            debug!(route_id = %mapping.route_id, port = mapping.port, "Unmapped route");
        }

        let bindings = absent_ok(session.bindings.list_bindings_for_app(app_id).await)?;
        for binding in &bindings {
            absent_ok(session.bindings.unbind(&binding.id).await)?;
            debug!(service_instance = %binding.service_instance_id, "Unbound service");
        }

        absent_ok(session.apps.delete(app_id).await)?;
        info!(
            app = %record.name,
            mappings = mappings.len(),
            bindings = bindings.len(),
            "App deleted"
        );

        ExistenceVerifier::new(session)
            .confirm_destroyed(space, &[record.name.as_str()])
            .await
    }
}
