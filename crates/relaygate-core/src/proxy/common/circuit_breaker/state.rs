//! Circuit breaker state types

use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Agent is failing - requests fail immediately
    Open,
    /// Testing recovery - a single trial request is allowed
    HalfOpen,
}

impl CircuitState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

/// Per-agent circuit breaker state
#[derive(Debug)]
pub(crate) struct AgentCircuit {
    pub state: CircuitState,
    /// Failure instants inside the sliding window, oldest first
    pub failures: VecDeque<Instant>,
    pub opened_at: Option<Instant>,
    pub last_transition: Instant,
    pub trial_in_flight: bool,
    pub last_failure_reason: Option<String>,
}

impl Default for AgentCircuit {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: VecDeque::new(),
            opened_at: None,
            last_transition: Instant::now(),
            trial_in_flight: false,
            last_failure_reason: None,
        }
    }
}

impl AgentCircuit {
    pub fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.failures.front() {
            if now.saturating_duration_since(*oldest) > window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn transition(&mut self, to: CircuitState, now: Instant) {
        self.state = to;
        self.last_transition = now;
    }
}

/// Summary of circuit breaker states across all agents
#[derive(Debug, Clone, Default, Serialize)]
pub struct CircuitBreakerSummary {
    pub closed: usize,
    pub open: usize,
    pub half_open: usize,
    pub total_trips: u64,
}

/// Point-in-time view of one agent's circuit.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub agent_id: String,
    pub state: CircuitState,
    pub failures_in_window: usize,
    /// Milliseconds since the last state transition
    pub since_transition_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_reason: Option<String>,
}
