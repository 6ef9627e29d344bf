use super::*;

fn policy(jitter: f64) -> RetryPolicy {
    RetryPolicy::new(RetryConfig {
        max_attempts: 4,
        base_delay_ms: 100,
        max_delay_ms: 1_000,
        multiplier: 2.0,
        jitter,
    })
}

fn http(status: u16) -> ProxyError {
    ProxyError::ProviderHttp {
        provider: "generic-chat-a".to_string(),
        status,
        message: "x".to_string(),
        retry_after_secs: None,
        attempts: 1,
    }
}

#[test]
fn test_exponential_growth_is_capped() {
    let policy = policy(0.0);
    assert_eq!(policy.delay_for(1, None), Duration::from_millis(100));
    assert_eq!(policy.delay_for(2, None), Duration::from_millis(200));
    assert_eq!(policy.delay_for(3, None), Duration::from_millis(400));
    assert_eq!(policy.delay_for(10, None), Duration::from_millis(1_000));
}

#[test]
fn test_jitter_stays_in_band() {
    let policy = policy(0.5);
    for _ in 0..100 {
        let delay = policy.delay_for(2, None);
        assert!(delay >= Duration::from_millis(100) && delay <= Duration::from_millis(300));
    }
}

#[test]
fn test_retry_after_hint_wins_but_is_capped() {
    let policy = policy(0.5);
    assert_eq!(policy.delay_for(1, Some(Duration::from_millis(250))), Duration::from_millis(250));
    assert_eq!(policy.delay_for(1, Some(Duration::from_secs(30))), Duration::from_millis(1_000));
}

#[test]
fn test_only_retryable_errors_within_budget() {
    let policy = policy(0.0);
    assert!(policy.should_retry(&http(503), 1));
    assert!(policy.should_retry(&http(429), 3));
    assert!(!policy.should_retry(&http(503), 4));
    assert!(!policy.should_retry(&http(400), 1));
    assert!(!policy.should_retry(&ProxyError::config("bad"), 1));
}
