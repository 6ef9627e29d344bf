use super::*;
use relaygate_types::ProxyError;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;

fn config(min_ttl_ms: u64, max_ttl_ms: u64, hot_threshold: u32) -> CacheConfig {
    CacheConfig { min_ttl_ms, max_ttl_ms, hot_window_ms: 10_000, hot_threshold, max_entries: 100 }
}

#[test]
fn test_ttl_shrinks_with_heat() {
    let cache: CacheLayer<u32> = CacheLayer::new("test", config(1_000, 10_000, 4));
    assert_eq!(cache.ttl_for_hits(0), Duration::from_millis(10_000));
    assert_eq!(cache.ttl_for_hits(2), Duration::from_millis(5_500));
    assert_eq!(cache.ttl_for_hits(4), Duration::from_millis(1_000));
    assert_eq!(cache.ttl_for_hits(50), Duration::from_millis(1_000));
}

#[tokio::test]
async fn test_hit_skips_loader() {
    let cache = CacheLayer::new("test", config(60_000, 60_000, 1));
    let calls = Arc::new(AtomicU32::new(0));

    for _ in 0..3 {
        let counter = calls.clone();
        let value = cache
            .get_or_load("workflow-platform:kb:list:u-1", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(7_u32)
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_lookups_share_one_load() {
    let cache = Arc::new(CacheLayer::new("test", config(60_000, 60_000, 1)));
    let calls = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let counter = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_or_load("k", move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok("loaded".to_string())
                })
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "loaded");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let cache: CacheLayer<u32> = CacheLayer::new("test", config(60_000, 60_000, 1));
    let err = cache
        .get_or_load("k", || async { Err(ProxyError::SessionNotFound { resource: "k".to_string() }) })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "session_not_found");
    assert!(cache.is_empty());

    let value = cache.get_or_load("k", || async { Ok(1) }).await.unwrap();
    assert_eq!(value, 1);
}

#[tokio::test]
async fn test_expired_entries_are_absent() {
    let cache: CacheLayer<u32> = CacheLayer::new("test", config(10, 10, 1));
    cache.get_or_load("k", || async { Ok(1) }).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let value = cache.get_or_load("k", || async { Ok(2) }).await.unwrap();
    assert_eq!(value, 2);

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(cache.purge_expired(), 1);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_prefix_invalidation() {
    let cache: CacheLayer<u32> = CacheLayer::new("test", config(60_000, 60_000, 1));
    cache.get_or_load("agent-platform:helpdesk:list:u-1", || async { Ok(1) }).await.unwrap();
    cache.get_or_load("agent-platform:helpdesk:conv:c-1", || async { Ok(2) }).await.unwrap();
    cache.get_or_load("agent-platform:billing:list:u-1", || async { Ok(3) }).await.unwrap();

    assert_eq!(cache.invalidate_prefix("agent-platform:helpdesk:"), 2);
    assert_eq!(cache.len(), 1);

    let reloaded = cache.get_or_load("agent-platform:helpdesk:list:u-1", || async { Ok(10) }).await.unwrap();
    assert_eq!(reloaded, 10);
}

#[tokio::test]
async fn test_invalidation_during_load_discards_result() {
    let cache = Arc::new(CacheLayer::<u32>::new("test", config(60_000, 60_000, 1)));
    let loader = {
        let cache = cache.clone();
        tokio::spawn(async move {
            cache
                .get_or_load("k", || async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(1)
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    cache.invalidate("k");

    assert_eq!(loader.await.unwrap().unwrap(), 1);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_capacity_evicts_soonest_expiring() {
    let cache: CacheLayer<u32> = CacheLayer::new(
        "test",
        CacheConfig { min_ttl_ms: 60_000, max_ttl_ms: 60_000, hot_window_ms: 10_000, hot_threshold: 1, max_entries: 2 },
    );
    for (i, key) in ["a", "b", "c"].into_iter().enumerate() {
        cache.get_or_load(key, move || async move { Ok(i as u32) }).await.unwrap();
    }
    assert_eq!(cache.len(), 2);
    assert!(!cache.invalidate("a"));
    assert!(cache.invalidate("c"));
}

#[tokio::test]
async fn test_ttl_follows_the_caller_that_started_the_load() {
    let cache = Arc::new(CacheLayer::new(
        "test",
        CacheConfig { min_ttl_ms: 20, max_ttl_ms: 60_000, hot_window_ms: 10_000, hot_threshold: 2, max_entries: 100 },
    ));
    let (release, gate) = tokio::sync::oneshot::channel::<()>();

    let starter = tokio::spawn({
        let cache = cache.clone();
        async move {
            cache
                .get_or_load("k", move || async move {
                    let _ = gate.await;
                    Ok(1_u32)
                })
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    let joiner = tokio::spawn({
        let cache = cache.clone();
        async move { cache.get_or_load("k", || async { Ok(2_u32) }).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    // the joiner (two hits, minimum TTL) is left to settle the load alone
    starter.abort();
    let _ = release.send(());
    assert_eq!(joiner.await.unwrap().unwrap(), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let value = cache.get_or_load("k", || async { Ok(3_u32) }).await.unwrap();
    assert_eq!(value, 1);
}
