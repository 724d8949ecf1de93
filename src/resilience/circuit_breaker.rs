//! Per-endpoint circuit breakers.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: endpoint assumed down, calls fail fast
//! - Half-Open: cooldown elapsed, calls admitted as probes
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Open: a late failure at or past the threshold (cooldown restarts)
//! Open → Half-Open: first admission check at or after next_attempt_at
//! Half-Open → Closed: a call succeeds
//! Half-Open → Open: a call fails (cooldown restarts)
//! ```
//!
//! # Design Decisions
//! - One record per endpoint, created on first use and never removed
//! - No timer: Open → Half-Open happens lazily inside `is_open`
//! - Each record is mutated under its map entry's write guard; observers and
//!   telemetry run after the guard is released

use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use serde::Serialize;

use crate::clock::Clock;
use crate::config::BreakerConfig;
use crate::observability::metrics;
use crate::resilience::events::{BreakerEvent, BreakerObserver};
use crate::telemetry::{ErrorCategory, ErrorRecord, ErrorReporter, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Breaker bookkeeping for one endpoint. Only the registry mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EndpointCircuit {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<u64>,
    next_attempt_at: Option<u64>,
}

impl EndpointCircuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            next_attempt_at: None,
        }
    }

    /// Open and not yet due for a probe at `now`.
    fn rejects_at(&self, now: u64) -> bool {
        self.state == CircuitState::Open && self.next_attempt_at.is_some_and(|t| now < t)
    }
}

/// Read-only view of one endpoint's breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub endpoint: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub is_open: bool,
    pub last_failure_at: Option<u64>,
    pub next_attempt_at: Option<u64>,
}

/// All breaker state for a process, keyed by endpoint.
pub struct CircuitRegistry {
    circuits: DashMap<String, EndpointCircuit>,
    config: ArcSwap<BreakerConfig>,
    clock: Arc<dyn Clock>,
    reporter: ErrorReporter,
    observers: Vec<Arc<dyn BreakerObserver>>,
}

impl CircuitRegistry {
    pub fn new(config: BreakerConfig, clock: Arc<dyn Clock>, reporter: ErrorReporter) -> Self {
        Self {
            circuits: DashMap::new(),
            config: ArcSwap::from_pointee(config),
            clock,
            reporter,
            observers: Vec::new(),
        }
    }

    /// Register an observer. Must happen before the registry is shared.
    pub fn with_observer(mut self, observer: Arc<dyn BreakerObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Swap thresholds. Existing records keep their state; an already
    /// scheduled `next_attempt_at` is not recomputed.
    pub fn update_config(&self, config: BreakerConfig) {
        tracing::info!(
            failure_threshold = config.failure_threshold,
            cooldown_ms = config.cooldown_ms,
            "Breaker configuration updated"
        );
        self.config.store(Arc::new(config));
    }

    pub fn reporter(&self) -> &ErrorReporter {
        &self.reporter
    }

    /// Fetch the record for `endpoint`, creating it Closed if absent.
    ///
    /// The returned guard locks the record's shard; drop it before calling
    /// back into the registry.
    fn get_or_create(&self, endpoint: &str) -> RefMut<'_, String, EndpointCircuit> {
        if let Some(existing) = self.circuits.get_mut(endpoint) {
            return existing;
        }
        self.circuits
            .entry(endpoint.to_string())
            .or_insert_with(EndpointCircuit::new)
    }

    /// Pre-register an endpoint so it shows up in snapshots before its first call.
    pub fn register(&self, endpoint: &str) {
        drop(self.get_or_create(endpoint));
    }

    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }

    /// Apply the result of one call.
    pub fn record_outcome(&self, endpoint: &str, success: bool) {
        let event = if success {
            self.record_success(endpoint)
        } else {
            self.record_failure(endpoint)
        };

        if let Some(event) = event {
            if let BreakerEvent::Opened { failure_count, .. } = &event {
                self.reporter.report(
                    ErrorRecord::new(
                        ErrorCategory::System,
                        Severity::High,
                        format!("Circuit breaker opened for {endpoint} after {failure_count} failures"),
                        "circuit_breaker",
                    )
                    .with_endpoint(endpoint),
                );
            }
            self.notify(&event);
        }
    }

    fn record_success(&self, endpoint: &str) -> Option<BreakerEvent> {
        let mut circuit = self.get_or_create(endpoint);
        let previous = circuit.state;
        *circuit = EndpointCircuit::new();
        drop(circuit);

        if previous == CircuitState::Closed {
            return None;
        }
        tracing::info!(endpoint = %endpoint, from = previous.as_str(), "Circuit closed");
        metrics::record_transition(endpoint, CircuitState::Closed);
        Some(BreakerEvent::Closed {
            endpoint: endpoint.to_string(),
        })
    }

    fn record_failure(&self, endpoint: &str) -> Option<BreakerEvent> {
        let config = self.config.load();
        let now = self.clock.now_millis();

        let mut circuit = self.get_or_create(endpoint);
        circuit.failure_count = circuit.failure_count.saturating_add(1);
        circuit.last_failure_at = Some(now);

        let previous = circuit.state;
        let trips = previous == CircuitState::HalfOpen
            || circuit.failure_count >= config.failure_threshold;
        if !trips {
            return None;
        }

        let next_attempt_at = now.saturating_add(config.cooldown_ms);
        circuit.state = CircuitState::Open;
        circuit.next_attempt_at = Some(next_attempt_at);
        let failure_count = circuit.failure_count;
        drop(circuit);

        if previous == CircuitState::Open {
            tracing::warn!(
                endpoint = %endpoint,
                failure_count,
                cooldown_ms = config.cooldown_ms,
                "Late failure on open circuit, cooldown restarted"
            );
        } else {
            tracing::warn!(
                endpoint = %endpoint,
                failure_count,
                cooldown_ms = config.cooldown_ms,
                "Circuit opened"
            );
            metrics::record_transition(endpoint, CircuitState::Open);
        }
        Some(BreakerEvent::Opened {
            endpoint: endpoint.to_string(),
            failure_count,
            next_attempt_at,
        })
    }

    /// Whether calls to `endpoint` must be rejected right now.
    ///
    /// Moves an Open circuit whose cooldown has elapsed to Half-Open and
    /// admits the caller as a probe. Unknown endpoints are never open.
    pub fn is_open(&self, endpoint: &str) -> bool {
        let now = self.clock.now_millis();
        let Some(mut circuit) = self.circuits.get_mut(endpoint) else {
            return false;
        };

        if circuit.state != CircuitState::Open {
            return false;
        }
        if circuit.rejects_at(now) {
            return true;
        }

        circuit.state = CircuitState::HalfOpen;
        drop(circuit);

        tracing::info!(endpoint = %endpoint, "Circuit half-open, admitting probe");
        metrics::record_transition(endpoint, CircuitState::HalfOpen);
        self.notify(&BreakerEvent::HalfOpened {
            endpoint: endpoint.to_string(),
        });
        false
    }

    /// Snapshot without side effects. Unknown endpoints read as Closed.
    pub fn get_state(&self, endpoint: &str) -> CircuitSnapshot {
        let now = self.clock.now_millis();
        match self.circuits.get(endpoint) {
            Some(circuit) => snapshot(endpoint, &circuit, now),
            None => snapshot(endpoint, &EndpointCircuit::new(), now),
        }
    }

    /// Snapshots of every tracked endpoint, sorted by name.
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let now = self.clock.now_millis();
        let mut all: Vec<_> = self
            .circuits
            .iter()
            .map(|entry| snapshot(entry.key(), entry.value(), now))
            .collect();
        all.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        all
    }

    pub(crate) fn notify(&self, event: &BreakerEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

fn snapshot(endpoint: &str, circuit: &EndpointCircuit, now: u64) -> CircuitSnapshot {
    CircuitSnapshot {
        endpoint: endpoint.to_string(),
        state: circuit.state,
        failure_count: circuit.failure_count,
        is_open: circuit.rejects_at(now),
        last_failure_at: circuit.last_failure_at,
        next_attempt_at: circuit.next_attempt_at,
    }
}

impl std::fmt::Debug for CircuitRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitRegistry")
            .field("endpoints", &self.circuits.len())
            .field("config", &self.config.load_full())
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::telemetry::TelemetryQueue;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<BreakerEvent>>);

    impl BreakerObserver for Recorder {
        fn on_event(&self, event: &BreakerEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    struct Harness {
        registry: CircuitRegistry,
        clock: Arc<ManualClock>,
        queue: Arc<TelemetryQueue>,
        events: Arc<Recorder>,
    }

    fn harness(failure_threshold: u32, cooldown_ms: u64) -> Harness {
        let clock = Arc::new(ManualClock::new(10_000));
        let queue = Arc::new(TelemetryQueue::new(100));
        let events = Arc::new(Recorder::default());
        let reporter = ErrorReporter::new(queue.clone(), clock.clone());
        let registry = CircuitRegistry::new(
            BreakerConfig {
                failure_threshold,
                cooldown_ms,
            },
            clock.clone(),
            reporter,
        )
        .with_observer(events.clone());
        Harness {
            registry,
            clock,
            queue,
            events,
        }
    }

    #[test]
    fn test_unknown_endpoint_is_closed_and_not_created() {
        let h = harness(2, 1_000);
        assert!(!h.registry.is_open("x"));

        let snap = h.registry.get_state("x");
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.failure_count, 0);
        assert!(!snap.is_open);
        assert!(h.registry.is_empty());
    }

    #[test]
    fn test_failure_on_unknown_endpoint_creates_record() {
        let h = harness(5, 1_000);
        h.registry.record_outcome("x", false);

        let snap = h.registry.get_state("x");
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.failure_count, 1);
        assert_eq!(snap.last_failure_at, Some(10_000));
        assert_eq!(snap.next_attempt_at, None);
        assert_eq!(h.registry.len(), 1);
    }

    #[test]
    fn test_opens_at_threshold_and_reports() {
        let h = harness(3, 1_000);
        h.registry.record_outcome("x", false);
        h.registry.record_outcome("x", false);
        assert!(!h.registry.is_open("x"));
        assert!(h.queue.is_empty());

        h.registry.record_outcome("x", false);
        assert!(h.registry.is_open("x"));

        let snap = h.registry.get_state("x");
        assert_eq!(snap.state, CircuitState::Open);
        assert_eq!(snap.next_attempt_at, Some(11_000));

        let records = h.queue.drain(10);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, ErrorCategory::System);
        assert_eq!(records[0].severity, Severity::High);
        assert_eq!(records[0].endpoint.as_deref(), Some("x"));

        let events = h.events.0.lock().unwrap();
        assert_eq!(
            *events,
            vec![BreakerEvent::Opened {
                endpoint: "x".into(),
                failure_count: 3,
                next_attempt_at: 11_000,
            }]
        );
    }

    #[test]
    fn test_cooldown_boundary_and_idempotent_half_open() {
        let h = harness(2, 1_000);
        h.registry.record_outcome("x", false);
        h.registry.record_outcome("x", false);

        h.clock.advance(Duration::from_millis(999));
        assert!(h.registry.is_open("x"));
        assert_eq!(h.registry.get_state("x").state, CircuitState::Open);

        h.clock.advance(Duration::from_millis(1));
        assert!(!h.registry.is_open("x"));
        assert_eq!(h.registry.get_state("x").state, CircuitState::HalfOpen);

        assert!(!h.registry.is_open("x"));
        assert_eq!(h.registry.get_state("x").state, CircuitState::HalfOpen);

        let half_opens = h
            .events
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, BreakerEvent::HalfOpened { .. }))
            .count();
        assert_eq!(half_opens, 1);
    }

    #[test]
    fn test_half_open_failure_reopens_with_new_cooldown() {
        let h = harness(2, 1_000);
        h.registry.record_outcome("x", false);
        h.registry.record_outcome("x", false);
        h.clock.advance(Duration::from_millis(1_000));
        assert!(!h.registry.is_open("x"));

        h.clock.advance(Duration::from_millis(50));
        h.registry.record_outcome("x", false);

        let snap = h.registry.get_state("x");
        assert_eq!(snap.state, CircuitState::Open);
        assert_eq!(snap.next_attempt_at, Some(12_050));
        assert!(h.registry.is_open("x"));
    }

    #[test]
    fn test_late_failure_while_open_restarts_cooldown() {
        let h = harness(2, 1_000);
        h.registry.record_outcome("x", false);
        h.registry.record_outcome("x", false);

        h.clock.advance(Duration::from_millis(500));
        h.registry.record_outcome("x", false);

        let snap = h.registry.get_state("x");
        assert_eq!(snap.state, CircuitState::Open);
        assert_eq!(snap.failure_count, 3);
        assert_eq!(snap.next_attempt_at, Some(11_500));
        assert_eq!(snap.last_failure_at, Some(10_500));

        h.clock.advance(Duration::from_millis(999));
        assert!(h.registry.is_open("x"));
        h.clock.advance(Duration::from_millis(1));
        assert!(!h.registry.is_open("x"));

        let records = h.queue.drain(10);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.category == ErrorCategory::System));

        let opened: Vec<_> = h
            .events
            .0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                BreakerEvent::Opened { next_attempt_at, .. } => Some(*next_attempt_at),
                _ => None,
            })
            .collect();
        assert_eq!(opened, vec![11_000, 11_500]);
    }

    #[test]
    fn test_success_resets_everything() {
        let h = harness(2, 1_000);
        h.registry.record_outcome("x", false);
        h.registry.record_outcome("x", false);
        h.clock.advance(Duration::from_millis(1_000));
        assert!(!h.registry.is_open("x"));

        h.registry.record_outcome("x", true);
        let snap = h.registry.get_state("x");
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.failure_count, 0);
        assert_eq!(snap.last_failure_at, None);
        assert_eq!(snap.next_attempt_at, None);

        let events = h.events.0.lock().unwrap();
        assert_eq!(events.last(), Some(&BreakerEvent::Closed { endpoint: "x".into() }));
    }

    #[test]
    fn test_success_while_closed_emits_nothing() {
        let h = harness(3, 1_000);
        h.registry.record_outcome("x", false);
        h.registry.record_outcome("x", true);
        assert_eq!(h.registry.get_state("x").failure_count, 0);
        assert!(h.events.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_get_state_does_not_transition() {
        let h = harness(1, 100);
        h.registry.record_outcome("x", false);
        h.clock.advance(Duration::from_millis(500));

        let snap = h.registry.get_state("x");
        assert_eq!(snap.state, CircuitState::Open);
        assert!(!snap.is_open);
        assert_eq!(h.registry.get_state("x").state, CircuitState::Open);
    }

    #[test]
    fn test_endpoints_are_independent() {
        let h = harness(1, 1_000);
        h.registry.record_outcome("a", false);
        assert!(h.registry.is_open("a"));
        assert!(!h.registry.is_open("b"));
    }

    #[test]
    fn test_register_and_snapshots_sorted() {
        let h = harness(5, 1_000);
        h.registry.register("zeta");
        h.registry.register("alpha");
        h.registry.register("alpha");

        let snapshots = h.registry.snapshots();
        let names: Vec<_> = snapshots.iter().map(|s| s.endpoint.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(snapshots
            .iter()
            .all(|s| s.state == CircuitState::Closed && s.next_attempt_at.is_none()));
        assert!(!h.registry.is_open("alpha"));
    }

    #[test]
    fn test_update_config_applies_to_next_failure() {
        let h = harness(5, 1_000);
        h.registry.record_outcome("x", false);
        h.registry.update_config(BreakerConfig {
            failure_threshold: 2,
            cooldown_ms: 50,
        });
        h.registry.record_outcome("x", false);

        let snap = h.registry.get_state("x");
        assert_eq!(snap.state, CircuitState::Open);
        assert_eq!(snap.next_attempt_at, Some(10_050));
    }

    #[test]
    fn test_snapshot_serializes_state_names() {
        let h = harness(1, 1_000);
        h.registry.record_outcome("x", false);
        let json = serde_json::to_value(h.registry.get_state("x")).unwrap();
        assert_eq!(json["state"], "OPEN");
        assert_eq!(json["is_open"], true);
    }
}
