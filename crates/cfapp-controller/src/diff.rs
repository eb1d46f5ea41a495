// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Desired versus observed deltas.
//!
//! Collections (bindings, route mappings) are compared by identity and yield
//! add/remove sets. Scalars are compared one by one and yield an [`AppPatch`]
//! carrying only the attributes that differ. Both outputs are ordered by key,
//! never by input order.

use std::collections::BTreeMap;

use cfapp_platform::{AppPatch, AppRecord, RouteMapping, ServiceBinding};

use crate::model::{AppDefinition, DesiredMapping, ServiceBindingSpec};
use crate::source::AppSource;

/// An entity with a stable identity.
pub trait Keyed {
    /// Identity type.
    type Key: Ord + Clone + std::fmt::Display;

    /// Identity of this entity.
    fn key(&self) -> Self::Key;
}

impl Keyed for ServiceBindingSpec {
    type Key = String;

    fn key(&self) -> String {
        self.service_instance.clone()
    }
}

impl Keyed for ServiceBinding {
    type Key = String;

    fn key(&self) -> String {
        self.service_instance_id.clone()
    }
}

/// Route and port of a mapping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MappingKey {
    /// Route id.
    pub route_id: String,
    /// Application port.
    pub port: u16,
}

impl std::fmt::Display for MappingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.route_id, self.port)
    }
}

impl Keyed for DesiredMapping {
    type Key = MappingKey;

    fn key(&self) -> MappingKey {
        MappingKey {
            route_id: self.route_id.clone(),
            port: self.port,
        }
    }
}

impl Keyed for RouteMapping {
    type Key = MappingKey;

    fn key(&self) -> MappingKey {
        MappingKey {
            route_id: self.route_id.clone(),
            port: self.port,
        }
    }
}

/// Set delta between desired entities `D` and observed entities `O`.
#[derive(Debug)]
pub struct SetDiff<'a, D, O> {
    /// Desired entities with no observed counterpart.
    pub to_add: Vec<&'a D>,
    /// Observed entities with no desired counterpart.
    pub to_remove: Vec<&'a O>,
    /// Observed entities that match a desired one and stay untouched.
    pub unchanged: Vec<&'a O>,
}

impl<D, O> SetDiff<'_, D, O> {
    /// Whether any add or remove is needed.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Compare two collections by identity.
///
/// When the observed side holds several entities with the same identity, the
/// first is kept and the others are scheduled for removal.
pub fn diff_sets<'a, D, O>(desired: &'a [D], observed: &'a [O]) -> SetDiff<'a, D, O>
where
    D: Keyed,
    O: Keyed<Key = D::Key>,
{
    let mut wanted: BTreeMap<D::Key, &'a D> = BTreeMap::new();
    for item in desired {
        wanted.entry(item.key()).or_insert(item);
    }
    let mut present: BTreeMap<D::Key, Vec<&'a O>> = BTreeMap::new();
    for item in observed {
        present.entry(item.key()).or_default().push(item);
    }

    let mut diff = SetDiff {
        to_add: Vec::new(),
        to_remove: Vec::new(),
        unchanged: Vec::new(),
    };
    for (key, items) in &present {
        let mut items = items.iter();
        if let Some(first) = items.next() {
            if wanted.contains_key(key) {
                diff.unchanged.push(*first);
            } else {
                diff.to_remove.push(*first);
            }
        }
        diff.to_remove.extend(items.copied());
    }
    for (key, item) in wanted {
        if !present.contains_key(&key) {
            diff.to_add.push(item);
        }
    }
    diff
}

/// Scalar delta of an application shell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeDiff {
    /// Attributes to patch, environment excluded.
    pub patch: AppPatch,
    /// Replacement environment, when it differs.
    pub environment: Option<std::collections::HashMap<String, String>>,
}

impl AttributeDiff {
    /// Whether nothing differs.
    pub fn is_empty(&self) -> bool {
        self.patch.is_empty() && self.environment.is_none()
    }
}

fn changed<T: PartialEq + Clone>(desired: Option<&T>, observed: Option<&T>) -> Option<T> {
    match desired {
        Some(value) if Some(value) != observed => Some(value.clone()),
        _ => None,
    }
}

fn non_empty(value: &Option<String>) -> Option<&String> {
    value.as_ref().filter(|v| !v.is_empty())
}

/// Compare a definition against the observed application.
///
/// Optional attributes the definition leaves unset keep their platform value.
/// The image is the exception: it follows the source, so moving away from an
/// image source clears it.
pub fn diff_attributes(desired: &AppDefinition, source: &AppSource, record: &AppRecord) -> AttributeDiff {
    let ports = desired.effective_ports();
    let image = source.docker_image().map(str::to_string);

    let patch = AppPatch {
        name: changed(Some(&desired.name), Some(&record.name)),
        memory_mb: changed(desired.memory.as_ref(), Some(&record.memory_mb)),
        disk_quota_mb: changed(desired.disk_quota.as_ref(), Some(&record.disk_quota_mb)),
        instances: changed(Some(&desired.instances), Some(&record.instances)),
        buildpack: changed(non_empty(&desired.buildpack), record.buildpack.as_ref()),
        docker_image: (image != record.docker_image).then(|| image.clone()),
        command: changed(non_empty(&desired.command), record.command.as_ref()),
        health_check_type: changed(
            Some(&desired.health_check_type),
            Some(&record.health_check_type),
        ),
        health_check_http_endpoint: changed(
            non_empty(&desired.health_check_http_endpoint),
            record.health_check_http_endpoint.as_ref(),
        ),
        health_check_timeout_secs: changed(
            desired.health_check_timeout.as_ref(),
            record.health_check_timeout_secs.as_ref(),
        ),
        enable_ssh: changed(Some(&desired.enable_ssh), Some(&record.enable_ssh)),
        ports: changed(Some(&ports), Some(&record.ports)),
        environment: None,
    };

    let environment = (desired.environment != record.environment).then(|| desired.environment.clone());

    AttributeDiff { patch, environment }
}

/// What an update requires of the running application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RestartRequirement {
    /// Nothing, or a change the platform applies live (name, instance count).
    None,
    /// Stop and start so instances pick up new settings.
    Restart,
    /// Build a new droplet.
    Restage,
}

/// Decide how to roll out an update.
pub fn restart_requirement(
    attributes: &AttributeDiff,
    bindings_changed: bool,
    source_changed: bool,
) -> RestartRequirement {
    let patch = &attributes.patch;
    if source_changed || patch.buildpack.is_some() || patch.docker_image.is_some() {
        return RestartRequirement::Restage;
    }
    let restart = patch.memory_mb.is_some()
        || patch.disk_quota_mb.is_some()
        || patch.command.is_some()
        || patch.health_check_type.is_some()
        || patch.health_check_http_endpoint.is_some()
        || patch.health_check_timeout_secs.is_some()
        || patch.enable_ssh.is_some()
        || patch.ports.is_some()
        || attributes.environment.is_some()
        || bindings_changed;
    if restart {
        RestartRequirement::Restart
    } else {
        RestartRequirement::None
    }
}
