//! Shared helpers for integration tests.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use endpoint_resilience::config::{BreakerConfig, ResilienceConfig};
use endpoint_resilience::{
    BreakerEvent, BreakerObserver, Clock, ManualClock, ResilientExecutor, TelemetryQueue,
};

/// Records every event it sees.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<BreakerEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<BreakerEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl BreakerObserver for RecordingObserver {
    fn on_event(&self, event: &BreakerEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[allow(dead_code)]
pub struct Harness {
    pub executor: ResilientExecutor,
    pub queue: Arc<TelemetryQueue>,
    pub observer: Arc<RecordingObserver>,
}

/// Executor over `clock` with the given breaker settings.
pub fn harness_with_clock(
    failure_threshold: u32,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
) -> Harness {
    let config = ResilienceConfig {
        breaker: BreakerConfig {
            failure_threshold,
            cooldown_ms: cooldown.as_millis() as u64,
        },
        ..ResilienceConfig::default()
    };
    let queue = Arc::new(TelemetryQueue::new(100));
    let observer = Arc::new(RecordingObserver::default());
    let executor = ResilientExecutor::from_config(
        &config,
        clock,
        queue.clone(),
        vec![observer.clone() as Arc<dyn BreakerObserver>],
    );
    Harness {
        executor,
        queue,
        observer,
    }
}

#[allow(dead_code)]
pub fn harness(failure_threshold: u32, cooldown: Duration) -> (Harness, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let h = harness_with_clock(failure_threshold, cooldown, clock.clone());
    (h, clock)
}

/// Counts invocations and fails the first `failures` of them.
#[derive(Clone, Default)]
pub struct Flaky {
    calls: Arc<AtomicU32>,
    failures: u32,
}

#[allow(dead_code)]
impl Flaky {
    pub fn failing(failures: u32) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            failures,
        }
    }

    pub fn always_failing() -> Self {
        Self::failing(u32::MAX)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// A thunk suitable for `execute_with_policy`.
    pub fn operation(&self) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<u32, String>> + Send>> {
        let calls = self.calls.clone();
        let failures = self.failures;
        move || {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures {
                    Err(format!("attempt {n} failed"))
                } else {
                    Ok(n)
                }
            })
        }
    }
}
