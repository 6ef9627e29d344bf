//! Circuit breaker for agent-level fast-fail behavior
//!
//! Failures are counted inside a sliding window. Once the window holds
//! `failure_threshold` failures the circuit opens and calls fail fast until the
//! cool-down elapses; then exactly one trial call is admitted.
//!
//! States:
//! - Closed: Normal operation, requests pass through
//! - Open: Agent is failing, requests fail immediately
//! - Half-Open: One trial request tests whether the agent recovered

mod state;


use state::AgentCircuit;
pub use state::{CircuitBreakerSummary, CircuitSnapshot, CircuitState};

use parking_lot::RwLock;
use relaygate_types::CircuitBreakerConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::proxy::prometheus;

/// Manages circuit breakers for all agents
#[derive(Debug)]
pub struct CircuitBreakerManager {
    config: CircuitBreakerConfig,
    circuits: RwLock<HashMap<String, AgentCircuit>>,
    total_trips: AtomicU64,
}

impl Default for CircuitBreakerManager {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreakerManager {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, circuits: RwLock::new(HashMap::new()), total_trips: AtomicU64::new(0) }
    }

    /// Ask permission for one call.
    ///
    /// Returns `Ok(())` if the call can proceed, `Err(Duration)` with a retry
    /// hint if the circuit is open or its half-open trial slot is taken.
    pub fn try_acquire(&self, agent_id: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut circuits = self.circuits.write();
        let circuit = circuits.entry(agent_id.to_string()).or_default();

        match circuit.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = circuit.opened_at.map_or(Duration::ZERO, |at| now.duration_since(at));
                if elapsed < self.config.cooldown() {
                    return Err(self.config.cooldown().saturating_sub(elapsed));
                }
                debug!(agent_id = %agent_id, "Circuit breaker transitioning to half-open");
                circuit.transition(CircuitState::HalfOpen, now);
                circuit.trial_in_flight = true;
                Self::log_state_change(agent_id, CircuitState::Open, CircuitState::HalfOpen, None);
                Ok(())
            },
            CircuitState::HalfOpen => {
                if circuit.trial_in_flight {
                    Err(self.config.cooldown())
                } else {
                    circuit.trial_in_flight = true;
                    Ok(())
                }
            },
        }
    }

    /// Like [`Self::try_acquire`], but hands back a permit that settles the
    /// outcome. A permit dropped before it is settled frees the trial slot.
    pub fn acquire<'a>(&'a self, agent_id: &'a str) -> Result<CircuitPermit<'a>, Duration> {
        self.try_acquire(agent_id)?;
        Ok(CircuitPermit { manager: self, agent_id, settled: false })
    }

    pub fn record_success(&self, agent_id: &str) {
        let now = Instant::now();
        let mut circuits = self.circuits.write();
        let circuit = circuits.entry(agent_id.to_string()).or_default();

        match circuit.state {
            CircuitState::Closed => {
                circuit.failures.clear();
            },
            CircuitState::HalfOpen => {
                info!(agent_id = %agent_id, "Circuit breaker closing - agent recovered");
                circuit.transition(CircuitState::Closed, now);
                circuit.failures.clear();
                circuit.opened_at = None;
                circuit.trial_in_flight = false;
                circuit.last_failure_reason = None;
                Self::log_state_change(
                    agent_id,
                    CircuitState::HalfOpen,
                    CircuitState::Closed,
                    Some("trial call succeeded"),
                );
            },
            CircuitState::Open => {
                debug!(agent_id = %agent_id, "Unexpected success in open state");
            },
        }
    }

    pub fn record_failure(&self, agent_id: &str, reason: &str) {
        let now = Instant::now();
        let mut circuits = self.circuits.write();
        let circuit = circuits.entry(agent_id.to_string()).or_default();

        circuit.last_failure_reason = Some(reason.to_string());
        circuit.failures.push_back(now);
        circuit.prune(now, self.config.window());

        match circuit.state {
            CircuitState::Closed => {
                if circuit.failures.len() >= self.config.failure_threshold as usize {
                    warn!(
                        agent_id = %agent_id,
                        failures = circuit.failures.len(),
                        reason = %reason,
                        "Circuit breaker opening - too many failures"
                    );
                    circuit.transition(CircuitState::Open, now);
                    circuit.opened_at = Some(now);
                    self.trip(agent_id);
                    Self::log_state_change(
                        agent_id,
                        CircuitState::Closed,
                        CircuitState::Open,
                        Some(reason),
                    );
                }
            },
            CircuitState::HalfOpen => {
                warn!(
                    agent_id = %agent_id,
                    reason = %reason,
                    "Circuit breaker re-opening - failure during half-open"
                );
                circuit.trial_in_flight = false;
                circuit.transition(CircuitState::Open, now);
                circuit.opened_at = Some(now);
                self.trip(agent_id);
                Self::log_state_change(
                    agent_id,
                    CircuitState::HalfOpen,
                    CircuitState::Open,
                    Some(reason),
                );
            },
            CircuitState::Open => {},
        }
    }

    /// Outcome that says nothing about upstream health (e.g. a rejected
    /// request). Frees a half-open trial slot without changing state.
    pub fn record_neutral(&self, agent_id: &str) {
        let mut circuits = self.circuits.write();
        if let Some(circuit) = circuits.get_mut(agent_id) {
            if circuit.state == CircuitState::HalfOpen {
                circuit.trial_in_flight = false;
            }
        }
    }

    fn trip(&self, agent_id: &str) {
        self.total_trips.fetch_add(1, Ordering::Relaxed);
        prometheus::record_circuit_trip(agent_id);
    }

    fn log_state_change(
        agent_id: &str,
        previous_state: CircuitState,
        new_state: CircuitState,
        reason: Option<&str>,
    ) {
        info!(
            "Circuit breaker state change: {} {:?} -> {:?} (reason: {:?})",
            agent_id, previous_state, new_state, reason
        );
    }

    pub fn get_state(&self, agent_id: &str) -> CircuitState {
        let circuits = self.circuits.read();
        circuits.get(agent_id).map_or(CircuitState::Closed, |c| c.state)
    }

    pub fn total_trips(&self) -> u64 {
        self.total_trips.load(Ordering::Relaxed)
    }

    pub fn get_summary(&self) -> CircuitBreakerSummary {
        let circuits = self.circuits.read();
        let mut summary = CircuitBreakerSummary { total_trips: self.total_trips(), ..Default::default() };

        for circuit in circuits.values() {
            match circuit.state {
                CircuitState::Closed => summary.closed += 1,
                CircuitState::Open => summary.open += 1,
                CircuitState::HalfOpen => summary.half_open += 1,
            }
        }

        summary
    }

    /// Per-agent snapshots, sorted by agent id.
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let now = Instant::now();
        let window = self.config.window();
        let circuits = self.circuits.read();

        let mut snapshots: Vec<CircuitSnapshot> = circuits
            .iter()
            .map(|(agent_id, circuit)| CircuitSnapshot {
                agent_id: agent_id.clone(),
                state: circuit.state,
                failures_in_window: circuit
                    .failures
                    .iter()
                    .filter(|at| now.saturating_duration_since(**at) <= window)
                    .count(),
                since_transition_ms: now
                    .saturating_duration_since(circuit.last_transition)
                    .as_millis() as u64,
                last_failure_reason: circuit.last_failure_reason.clone(),
            })
            .collect();
        snapshots.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        snapshots
    }
}

/// Admission for one call through a circuit.
#[must_use = "dropping an unsettled permit records a neutral outcome"]
#[derive(Debug)]
pub struct CircuitPermit<'a> {
    manager: &'a CircuitBreakerManager,
    agent_id: &'a str,
    settled: bool,
}

impl CircuitPermit<'_> {
    pub fn success(mut self) {
        self.settled = true;
        self.manager.record_success(self.agent_id);
    }

    pub fn failure(mut self, reason: &str) {
        self.settled = true;
        self.manager.record_failure(self.agent_id, reason);
    }

    pub fn neutral(mut self) {
        self.settled = true;
        self.manager.record_neutral(self.agent_id);
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!(agent_id = %self.agent_id, "Call abandoned before completion, releasing circuit slot");
            self.manager.record_neutral(self.agent_id);
        }
    }
}
