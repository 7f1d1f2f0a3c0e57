//! Circuit registry.
//!
//! # Responsibilities
//! - Own exactly one circuit per dependency identity
//! - Serialize all bookkeeping for a circuit behind its own mutex
//! - Serve read-only snapshots for health reporting
//!
//! # Design Decisions
//! - Explicit object owned by the dependency layer, never a global
//! - The lock guards bookkeeping only; it is never held across an operation
//! - Transitions are logged and exported as metrics after the lock is released

use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::circuit_breaker::{
    Admission, CircuitSnapshot, CircuitState, CircuitStatus, Transition, WindowSettings,
};
use crate::resilience::policy::CallPolicy;

/// Process-wide map of dependency identity → circuit.
#[derive(Debug, Default)]
pub struct CircuitRegistry {
    circuits: DashMap<String, Circuit>,
    settings: WindowSettings,
}

impl CircuitRegistry {
    pub fn new(settings: WindowSettings) -> Self {
        Self {
            circuits: DashMap::new(),
            settings,
        }
    }

    pub fn settings(&self) -> WindowSettings {
        self.settings
    }

    /// Get the circuit for `identity`, creating it Closed on first use.
    pub fn circuit(&self, identity: &str) -> Circuit {
        if let Some(existing) = self.circuits.get(identity) {
            return existing.value().clone();
        }
        self.circuits
            .entry(identity.to_string())
            .or_insert_with(|| {
                tracing::debug!(circuit = %identity, "Registering circuit");
                metrics::record_circuit_state(identity, CircuitStatus::Closed);
                Circuit::new(identity, self.settings)
            })
            .value()
            .clone()
    }

    /// Snapshot of one circuit; `None` when the identity has never been used.
    pub fn status(&self, identity: &str) -> Option<CircuitSnapshot> {
        self.circuits.get(identity).map(|c| c.snapshot())
    }

    /// Snapshots of every known circuit, sorted by identity.
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let mut all: Vec<_> = self.circuits.iter().map(|c| c.value().snapshot()).collect();
        all.sort_by(|a, b| a.identity.cmp(&b.identity));
        all
    }

    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }
}

/// Shared handle to one circuit.
#[derive(Debug, Clone)]
pub struct Circuit {
    identity: Arc<str>,
    state: Arc<Mutex<CircuitState>>,
}

impl Circuit {
    fn new(identity: &str, settings: WindowSettings) -> Self {
        Self {
            identity: Arc::from(identity),
            state: Arc::new(Mutex::new(CircuitState::new(settings))),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn status(&self) -> CircuitStatus {
        self.lock().status()
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        self.lock().snapshot(&self.identity)
    }

    /// Try to admit a call. Returns `None` when the circuit rejects it.
    pub fn try_acquire(&self, policy: &CallPolicy) -> Option<CallPermit> {
        let (admission, transition) = self.lock().admit(policy, Instant::now());
        self.announce(transition);

        match admission {
            Admission::Admitted => Some(CallPermit {
                circuit: self.clone(),
                probe_epoch: None,
                settled: false,
            }),
            Admission::Probe { epoch } => {
                tracing::debug!(circuit = %self.identity, epoch, "Admitted half-open probe");
                Some(CallPermit {
                    circuit: self.clone(),
                    probe_epoch: Some(epoch),
                    settled: false,
                })
            }
            Admission::Rejected => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitState> {
        // Bookkeeping never panics mid-update, so a poisoned lock still holds
        // consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn announce(&self, transition: Option<Transition>) {
        let Some(Transition { from, to }) = transition else {
            return;
        };
        match to {
            CircuitStatus::Open => {
                tracing::warn!(circuit = %self.identity, from = %from, "Circuit opened");
            }
            CircuitStatus::HalfOpen => {
                tracing::info!(circuit = %self.identity, "Circuit half-open, probing dependency");
            }
            CircuitStatus::Closed => {
                tracing::info!(circuit = %self.identity, from = %from, "Circuit closed after recovery");
            }
        }
        metrics::record_transition(&self.identity, from, to);
        metrics::record_circuit_state(&self.identity, to);
    }
}

/// Admission ticket for one call through a circuit.
///
/// Probe permits that are dropped without a verdict hand their slot back to
/// the half-open budget.
#[derive(Debug)]
pub struct CallPermit {
    circuit: Circuit,
    probe_epoch: Option<u64>,
    settled: bool,
}

impl CallPermit {
    pub fn is_probe(&self) -> bool {
        self.probe_epoch.is_some()
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// Record a success for this call.
    pub fn succeed(mut self) {
        self.settled = true;
        let transition = self.circuit.lock().record_success(Instant::now());
        self.circuit.announce(transition);
    }

    /// Record a failed attempt. Returns the circuit status afterwards.
    ///
    /// A failing probe settles the permit; ordinary calls may keep failing
    /// and retrying with the same permit.
    pub fn fail(&mut self) -> CircuitStatus {
        if self.is_probe() {
            self.settled = true;
        }
        let (transition, status) = {
            let mut state = self.circuit.lock();
            let transition = state.record_failure(self.probe_epoch, Instant::now());
            (transition, state.status())
        };
        self.circuit.announce(transition);
        status
    }

    /// Evaluate the failure ratio after retries are exhausted.
    pub fn exhaust(mut self, policy: &CallPolicy) {
        self.settled = true;
        let transition = self.circuit.lock().evaluate(policy, Instant::now());
        self.circuit.announce(transition);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(epoch) = self.probe_epoch {
            self.circuit.lock().release_probe(epoch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy() -> CallPolicy {
        CallPolicy::new(
            Duration::from_millis(100),
            0,
            Duration::from_millis(10),
            2.0,
            Duration::from_millis(100),
            Duration::ZERO,
            0.5,
            Duration::from_millis(200),
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_one_circuit_per_identity() {
        let registry = CircuitRegistry::default();
        let a = registry.circuit("postgres-auth");
        let b = registry.circuit("postgres-auth");
        assert!(Arc::ptr_eq(&a.state, &b.state));
        registry.circuit("redis-cache");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_status_of_unknown_identity() {
        let registry = CircuitRegistry::default();
        assert!(registry.status("nope").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshots_sorted() {
        let registry = CircuitRegistry::default();
        registry.circuit("openrouter-api");
        registry.circuit("cache");
        let ids: Vec<_> = registry.snapshots().into_iter().map(|s| s.identity).collect();
        assert_eq!(ids, vec!["cache".to_string(), "openrouter-api".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_probe_returns_slot() {
        let registry = CircuitRegistry::new(WindowSettings { size: 10, min_samples: 1 });
        let p = policy();
        let circuit = registry.circuit("pinecone");

        let mut permit = circuit.try_acquire(&p).unwrap();
        permit.fail();
        permit.exhaust(&p);
        assert_eq!(circuit.status(), CircuitStatus::Open);

        tokio::time::advance(Duration::from_millis(250)).await;

        let probe = circuit.try_acquire(&p).unwrap();
        assert!(probe.is_probe());
        assert!(circuit.try_acquire(&p).is_none());

        drop(probe);
        let again = circuit.try_acquire(&p).unwrap();
        assert!(again.is_probe());
        again.succeed();
        assert_eq!(circuit.status(), CircuitStatus::Closed);
    }
}
