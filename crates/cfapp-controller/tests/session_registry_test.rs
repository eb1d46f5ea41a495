// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Concurrency tests for the session registry.

mod common;

use std::sync::Arc;
use std::time::Duration;

use cfapp_controller::{SessionKey, SessionRegistry};
use cfapp_platform::InMemoryPlatform;
use common::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquires_share_one_construction() {
    init_tracing();
    let connector = Arc::new(
        CountingConnector::new(InMemoryPlatform::new()).with_delay(Duration::from_millis(50)),
    );
    let registry = Arc::new(SessionRegistry::new(connector.clone()));
    let key = SessionKey::for_space("space-a");

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let key = key.clone();
            tokio::spawn(async move { registry.acquire(&key).await })
        })
        .collect();

    let handles: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.expect("acquire task panicked").expect("acquire failed"))
        .collect();

    assert_eq!(connector.connects(), 1);
    assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    assert_eq!(handles[0].key(), &key);
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_keys_are_independent() {
    init_tracing();
    let connector = Arc::new(CountingConnector::new(InMemoryPlatform::new()));
    let registry = SessionRegistry::new(connector.clone());
    let dev = SessionKey::for_space("space-dev");
    let prod = SessionKey::for_space("space-prod");

    let first = registry.acquire(&dev).await.unwrap();
    assert!(registry.contains(&dev));
    assert!(!registry.contains(&prod));

    let other = registry.acquire(&prod).await.unwrap();
    let again = registry.acquire(&dev).await.unwrap();

    assert!(!Arc::ptr_eq(&first, &other));
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(connector.connects(), 2);
    assert_eq!(registry.len(), 2);
}
