//! Prometheus metrics for relaygate observability.
//!
//! Exposes metrics compatible with Prometheus/OpenMetrics format:
//! - `relaygate_requests_total{provider,agent,outcome}` - Counter of upstream calls
//! - `relaygate_request_duration_seconds{provider,agent,outcome}` - Histogram of call durations
//! - `relaygate_stream_skipped_chunks_total{provider}` - Malformed stream chunks skipped
//! - `relaygate_retries_total{agent,kind}` - Retry attempts by error kind
//! - `relaygate_circuit_trips_total{agent}` - Circuit breaker openings
//! - `relaygate_rate_limited_total{agent,dimension}` - Calls rejected by the rate limiter
//! - `relaygate_cache_lookups_total{cache,result}` - Cache hits, misses and shared waits
//! - `relaygate_uptime_seconds` - Gauge of server uptime

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Global Prometheus handle for rendering metrics
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Global server start time for uptime calculation
static METRICS_START_TIME: OnceLock<Instant> = OnceLock::new();

/// Custom histogram buckets optimized for LLM API latency distribution.
///
/// LLM APIs have bimodal latency patterns:
/// - Fast responses (session lookups, short prompts): 100ms - 1s
/// - Slow responses (long generation, streaming): 5s - 60s+
const LLM_LATENCY_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Initialize the Prometheus metrics recorder.
///
/// Idempotent: later calls return the handle installed by the first one.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let _ = METRICS_START_TIME.get_or_init(Instant::now);
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().set_buckets(LLM_LATENCY_BUCKETS)?.install_recorder()?;

    describe_counter!("relaygate_requests_total", "Total number of upstream calls by outcome");
    describe_histogram!("relaygate_request_duration_seconds", "Upstream call duration in seconds");
    describe_counter!(
        "relaygate_stream_skipped_chunks_total",
        "Malformed upstream stream chunks skipped during translation"
    );
    describe_counter!("relaygate_retries_total", "Retry attempts by error kind");
    describe_counter!("relaygate_circuit_trips_total", "Circuit breaker transitions to open");
    describe_counter!("relaygate_rate_limited_total", "Calls rejected by the local rate limiter");
    describe_counter!("relaygate_cache_lookups_total", "Session cache lookups by result");
    describe_gauge!("relaygate_uptime_seconds", "Server uptime in seconds");

    let _ = PROMETHEUS_HANDLE.set(handle.clone());
    Ok(handle)
}

/// Get the Prometheus handle for rendering metrics.
/// Returns None if metrics have not been initialized.
pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Record a finished upstream call.
///
/// `outcome` is `ok` or a [`relaygate_types::ProxyError::kind`] value.
pub fn record_request(provider: &str, agent_id: &str, outcome: &str, elapsed: Duration) {
    let labels = [
        ("provider", provider.to_string()),
        ("agent", agent_id.to_string()),
        ("outcome", outcome.to_string()),
    ];

    counter!("relaygate_requests_total", &labels).increment(1);
    histogram!("relaygate_request_duration_seconds", &labels).record(elapsed.as_secs_f64());
}

pub fn record_skipped_chunk(provider: &str) {
    let labels = [("provider", provider.to_string())];
    counter!("relaygate_stream_skipped_chunks_total", &labels).increment(1);
}

pub fn record_retry(agent_id: &str, kind: &str) {
    let labels = [("agent", agent_id.to_string()), ("kind", kind.to_string())];
    counter!("relaygate_retries_total", &labels).increment(1);
}

pub fn record_circuit_trip(agent_id: &str) {
    let labels = [("agent", agent_id.to_string())];
    counter!("relaygate_circuit_trips_total", &labels).increment(1);
}

pub fn record_rate_limited(agent_id: &str, dimension: &str) {
    let labels = [("agent", agent_id.to_string()), ("dimension", dimension.to_string())];
    counter!("relaygate_rate_limited_total", &labels).increment(1);
}

pub fn record_cache_lookup(cache: &str, result: &str) {
    let labels = [("cache", cache.to_string()), ("result", result.to_string())];
    counter!("relaygate_cache_lookups_total", &labels).increment(1);
}

/// Update uptime gauge.
/// Should be called periodically or on metrics render.
pub fn update_uptime_gauge() {
    if let Some(start) = METRICS_START_TIME.get() {
        gauge!("relaygate_uptime_seconds").set(start.elapsed().as_secs_f64());
    }
}

/// Render all metrics in Prometheus text format.
pub fn render_metrics() -> String {
    update_uptime_gauge();

    if let Some(handle) = get_prometheus_handle() {
        handle.render()
    } else {
        String::from("# Metrics not initialized\n")
    }
}

/// Convert HTTP status code to category for metrics labels.
pub fn status_category(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}
