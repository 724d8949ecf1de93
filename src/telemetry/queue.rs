//! Bounded in-memory telemetry queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::observability::metrics;
use crate::telemetry::record::ErrorRecord;
use crate::telemetry::{TelemetryError, TelemetrySink};

/// FIFO of error records waiting to be flushed.
///
/// When full, the oldest record is dropped to make room.
#[derive(Debug)]
pub struct TelemetryQueue {
    records: Mutex<VecDeque<ErrorRecord>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl TelemetryQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Records discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Pop up to `max` records in insertion order.
    pub fn drain(&self, max: usize) -> Vec<ErrorRecord> {
        let mut records = self.lock();
        let take = max.min(records.len());
        records.drain(..take).collect()
    }

    /// Put a batch that failed to export back at the front.
    ///
    /// Only as many records as fit are restored, newest of the batch first to go.
    pub fn requeue(&self, batch: Vec<ErrorRecord>) {
        let mut records = self.lock();
        let room = self.capacity.saturating_sub(records.len());
        let overflow = batch.len().saturating_sub(room);
        if overflow > 0 {
            self.record_drop(overflow as u64);
        }
        for record in batch.into_iter().take(room).rev() {
            records.push_front(record);
        }
    }

    fn record_drop(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
        metrics::record_telemetry_dropped(count);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ErrorRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TelemetrySink for TelemetryQueue {
    fn enqueue(&self, record: ErrorRecord) -> Result<(), TelemetryError> {
        let mut records = self.lock();
        if records.len() >= self.capacity {
            records.pop_front();
            self.record_drop(1);
            tracing::debug!(capacity = self.capacity, "Telemetry queue full, dropped oldest record");
        }
        records.push_back(record);
        Ok(())
    }
}
