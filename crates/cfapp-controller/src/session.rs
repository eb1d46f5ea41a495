// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared platform sessions.
//!
//! Every reconciliation touching the same space uses the same
//! [`SessionHandle`]. The registry index is a [`DashMap`] whose values are
//! one-shot cells: inserting the cell is the only write to the index, and the
//! handle inside a cell is published exactly once, fully built. Callers never
//! hold a shard lock across an await point.

use std::sync::Arc;

use async_trait::async_trait;
use cfapp_platform::{AppManager, PlatformError, RouteManager, ServiceBindingManager};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{ControllerError, Result};

/// Identity of a platform session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey(String);

impl SessionKey {
    /// Create a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Session of a space.
    pub fn for_space(space: &str) -> Self {
        Self::new(space)
    }

    /// Key as string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// The three manager facades of one session. Immutable once built.
pub struct SessionHandle {
    key: SessionKey,
    /// Application manager.
    pub apps: Arc<dyn AppManager>,
    /// Route manager.
    pub routes: Arc<dyn RouteManager>,
    /// Service binding manager.
    pub bindings: Arc<dyn ServiceBindingManager>,
    created_at: DateTime<Utc>,
}

impl SessionHandle {
    /// Assemble a handle from its facades.
    pub fn new(
        key: SessionKey,
        apps: Arc<dyn AppManager>,
        routes: Arc<dyn RouteManager>,
        bindings: Arc<dyn ServiceBindingManager>,
    ) -> Self {
        Self {
            key,
            apps,
            routes,
            bindings,
            created_at: Utc::now(),
        }
    }

    /// Handle whose three facades are served by one platform client.
    pub fn from_platform<P>(key: SessionKey, platform: P) -> Self
    where
        P: AppManager + RouteManager + ServiceBindingManager + 'static,
    {
        let platform = Arc::new(platform);
        Self::new(key, platform.clone(), platform.clone(), platform)
    }

    /// Key this handle was built for.
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// When the handle was built.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("key", &self.key)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Builds session handles. Called at most once per key by the registry.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Build the handle of a session.
    async fn connect(&self, key: &SessionKey) -> std::result::Result<SessionHandle, PlatformError>;
}

/// Connector serving every key from the same platform client.
pub struct FixedConnector<P> {
    platform: P,
}

impl<P> FixedConnector<P> {
    /// Create a connector over a platform client.
    pub fn new(platform: P) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl<P> SessionConnector for FixedConnector<P>
where
    P: AppManager + RouteManager + ServiceBindingManager + Clone + 'static,
{
    async fn connect(&self, key: &SessionKey) -> std::result::Result<SessionHandle, PlatformError> {
        Ok(SessionHandle::from_platform(key.clone(), self.platform.clone()))
    }
}

type Slot = Arc<OnceCell<Arc<SessionHandle>>>;

/// Process-wide store of session handles.
pub struct SessionRegistry {
    connector: Arc<dyn SessionConnector>,
    sessions: DashMap<SessionKey, Slot>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            connector,
            sessions: DashMap::new(),
        }
    }

    /// Handle of a session, building it on first use.
    ///
    /// Concurrent callers for the same key share one construction and all
    /// receive the same handle. A failed construction is reported to every
    /// caller waiting on it and retried by the next caller.
    pub async fn acquire(&self, key: &SessionKey) -> Result<Arc<SessionHandle>> {
        let slot: Slot = self.sessions.entry(key.clone()).or_default().value().clone();

        if let Some(handle) = slot.get() {
            return Ok(handle.clone());
        }

        let handle = slot
            .get_or_try_init(|| async {
                debug!(session = %key, "Connecting session");
                let handle = self.connector.connect(key).await.map_err(|e| {
                    ControllerError::Session {
                        key: key.to_string(),
                        message: e.to_string(),
                    }
                })?;
                info!(session = %key, "Session established");
                Ok::<_, ControllerError>(Arc::new(handle))
            })
            .await?;
        Ok(handle.clone())
    }

    /// Number of keys with a slot (built or being built).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session was ever requested.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Whether the handle of a key is built.
    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions
            .get(key)
            .map(|slot| slot.initialized())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use cfapp_platform::InMemoryPlatform;

    struct FlakyConnector {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl SessionConnector for FlakyConnector {
        async fn connect(
            &self,
            key: &SessionKey,
        ) -> std::result::Result<SessionHandle, PlatformError> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(PlatformError::Connection("token expired".to_string()));
            }
            Ok(SessionHandle::from_platform(key.clone(), InMemoryPlatform::new()))
        }
    }

    #[tokio::test]
    async fn test_acquire_returns_same_handle() {
        let registry = SessionRegistry::new(Arc::new(FixedConnector::new(InMemoryPlatform::new())));
        let key = SessionKey::for_space("space-A");

        let first = registry.acquire(&key).await.unwrap();
        let second = registry.acquire(&key).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.key(), &key);
        assert!(registry.contains(&key));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_debug_reports_session_count() {
        let registry = SessionRegistry::new(Arc::new(FixedConnector::new(InMemoryPlatform::new())));
        registry.acquire(&SessionKey::for_space("space-A")).await.unwrap();

        let shown = format!("{:?}", registry);
        assert!(shown.starts_with("SessionRegistry"));
        assert!(shown.contains("sessions: 1"));
    }

    #[tokio::test]
    async fn test_distinct_keys_get_distinct_handles() {
        let registry = SessionRegistry::new(Arc::new(FixedConnector::new(InMemoryPlatform::new())));

        let a = registry.acquire(&SessionKey::from("space-A")).await.unwrap();
        let b = registry.acquire(&SessionKey::from("space-B")).await.unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_construction_is_retried() {
        let registry = SessionRegistry::new(Arc::new(FlakyConnector {
            attempts: AtomicUsize::new(0),
        }));
        let key = SessionKey::for_space("space-A");

        let err = registry.acquire(&key).await.unwrap_err();
        assert!(matches!(err, ControllerError::Session { .. }));
        assert!(!registry.contains(&key));

        assert!(registry.acquire(&key).await.is_ok());
        assert!(registry.contains(&key));
    }
}
