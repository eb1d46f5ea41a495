// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for cfapp-controller integration tests.
//!
//! Provides TestContext wiring an in-memory platform into a controller.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cfapp_controller::{
    AppController, AppDefinition, ControllerConfig, SessionConnector, SessionHandle, SessionKey,
    SessionRegistry, SourceFields,
};
use cfapp_platform::{InMemoryPlatform, PlatformError};

pub const SPACE: &str = "space-dev";

/// Install a test subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Connector counting how many sessions it built.
pub struct CountingConnector {
    platform: InMemoryPlatform,
    connects: AtomicUsize,
    delay: Duration,
}

impl CountingConnector {
    pub fn new(platform: InMemoryPlatform) -> Self {
        Self {
            platform,
            connects: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Make every construction take `delay`, widening the race window.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionConnector for CountingConnector {
    async fn connect(&self, key: &SessionKey) -> Result<SessionHandle, PlatformError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(SessionHandle::from_platform(key.clone(), self.platform.clone()))
    }
}

/// Controller wired to an in-memory platform.
pub struct TestContext {
    pub platform: InMemoryPlatform,
    pub connector: Arc<CountingConnector>,
    pub controller: Arc<AppController>,
    pub package: PathBuf,
    workdir: tempfile::TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_platform(InMemoryPlatform::new())
    }

    pub fn with_platform(platform: InMemoryPlatform) -> Self {
        init_tracing();
        let workdir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let package = workdir.path().join("app.zip");
        write_zip(&package, &[("index.js", b"console.log('hi')".as_slice())]);

        let connector = Arc::new(CountingConnector::new(platform.clone()));
        let registry = Arc::new(SessionRegistry::new(connector.clone()));
        let controller = Arc::new(AppController::new(registry, test_config()));

        Self {
            platform,
            connector,
            controller,
            package,
            workdir,
        }
    }

    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    /// Definition deploying the prepared zip package.
    pub fn zip_app(&self, name: &str) -> AppDefinition {
        AppDefinition {
            name: name.to_string(),
            space: SPACE.to_string(),
            source: SourceFields {
                path: Some(self.package.display().to_string()),
                ..SourceFields::default()
            },
            ..AppDefinition::default()
        }
    }
}

/// Definition deploying a container image.
pub fn image_app(name: &str, image: &str) -> AppDefinition {
    AppDefinition {
        name: name.to_string(),
        space: SPACE.to_string(),
        source: SourceFields {
            docker_image: Some(image.to_string()),
            ..SourceFields::default()
        },
        ..AppDefinition::default()
    }
}

/// Configuration with fast polling.
pub fn test_config() -> ControllerConfig {
    ControllerConfig::new()
        .with_default_timeout(Duration::from_secs(5))
        .with_poll_interval(Duration::from_millis(5), Duration::from_millis(20))
}

/// Write a zip archive holding the given files.
pub fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).expect("Failed to create zip");
    let mut writer = zip::ZipWriter::new(file);
    for (name, contents) in files {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .expect("Failed to start zip entry");
        writer.write_all(contents).expect("Failed to write zip entry");
    }
    writer.finish().expect("Failed to finish zip");
}
