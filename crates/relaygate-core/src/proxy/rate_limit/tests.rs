use super::*;
use relaygate_types::models::BucketConfig;

fn limiter(agent_capacity: u32, caller_capacity: u32) -> RateLimiter {
    RateLimiter::new(RateLimitConfig {
        per_agent: BucketConfig { capacity: agent_capacity, refill_per_sec: 1.0 },
        per_caller: BucketConfig { capacity: caller_capacity, refill_per_sec: 1.0 },
        idle_timeout_ms: 60_000,
    })
}

#[test]
fn test_excess_calls_for_one_caller_rejected() {
    let limiter = limiter(100, 3);
    let now = Instant::now();

    for _ in 0..3 {
        assert!(limiter.try_acquire_at("agent-a", "alice", now).is_ok());
    }
    let err = limiter.try_acquire_at("agent-a", "alice", now).unwrap_err();
    match err {
        ProxyError::RateLimitExceeded { scope, retry_after_ms } => {
            assert_eq!(scope, "caller:alice");
            assert!(retry_after_ms > 0 && retry_after_ms <= 1000);
        },
        other => panic!("unexpected error: {other:?}"),
    }

    // another caller on the same agent is unaffected
    assert!(limiter.try_acquire_at("agent-a", "bob", now).is_ok());
}

#[test]
fn test_rejection_consumes_nothing() {
    let limiter = limiter(2, 100);
    let now = Instant::now();

    assert!(limiter.try_acquire_at("agent-a", "alice", now).is_ok());
    assert!(limiter.try_acquire_at("agent-a", "alice", now).is_ok());
    assert!(limiter.try_acquire_at("agent-a", "alice", now).is_err());

    let state = limiter.state.lock();
    let caller = state
        .buckets
        .get(&BucketKey::Caller { agent_id: "agent-a".to_string(), caller_id: "alice".to_string() })
        .unwrap();
    assert!((caller.tokens() - 98.0).abs() < 1e-9);
}

#[test]
fn test_agent_bucket_shared_across_callers() {
    let limiter = limiter(2, 100);
    let now = Instant::now();

    assert!(limiter.try_acquire_at("agent-a", "alice", now).is_ok());
    assert!(limiter.try_acquire_at("agent-a", "bob", now).is_ok());
    let err = limiter.try_acquire_at("agent-a", "carol", now).unwrap_err();
    assert!(matches!(err, ProxyError::RateLimitExceeded { ref scope, .. } if scope == "agent:agent-a"));

    assert!(limiter.try_acquire_at("agent-b", "carol", now).is_ok());
}

#[test]
fn test_tokens_refill_over_time() {
    let limiter = limiter(100, 1);
    let now = Instant::now();

    assert!(limiter.try_acquire_at("agent-a", "alice", now).is_ok());
    assert!(limiter.try_acquire_at("agent-a", "alice", now).is_err());
    assert!(limiter.try_acquire_at("agent-a", "alice", now + Duration::from_millis(1100)).is_ok());
}

#[test]
fn test_idle_buckets_are_swept() {
    let limiter = RateLimiter::new(RateLimitConfig { idle_timeout_ms: 0, ..RateLimitConfig::default() });
    assert!(limiter.try_acquire("agent-a", "alice").is_ok());
    assert_eq!(limiter.tracked_buckets(), 2);

    std::thread::sleep(Duration::from_millis(2));
    assert_eq!(limiter.sweep_idle(), 2);
    assert_eq!(limiter.tracked_buckets(), 0);
}
