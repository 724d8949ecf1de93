//! Periodic telemetry flushing.
//!
//! # Responsibilities
//! - Drain the queue in batches on a fixed interval
//! - Requeue batches the exporter could not deliver
//! - Drain everything once more on shutdown

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::TelemetryConfig;
use crate::observability::metrics;
use crate::telemetry::exporter::TelemetryExporter;
use crate::telemetry::queue::TelemetryQueue;
use crate::telemetry::TelemetryError;

pub struct TelemetryFlusher<X> {
    queue: Arc<TelemetryQueue>,
    exporter: X,
    batch_size: usize,
    interval: Duration,
}

impl<X: TelemetryExporter> TelemetryFlusher<X> {
    pub fn new(queue: Arc<TelemetryQueue>, exporter: X, config: &TelemetryConfig) -> Self {
        Self {
            queue,
            exporter,
            batch_size: config.batch_size.max(1),
            interval: Duration::from_millis(config.flush_interval_ms.max(1)),
        }
    }

    /// Export one batch. Returns how many records were delivered.
    pub async fn flush_once(&self) -> Result<usize, TelemetryError> {
        let batch = self.queue.drain(self.batch_size);
        if batch.is_empty() {
            return Ok(0);
        }

        match self.exporter.export(&batch).await {
            Ok(()) => {
                metrics::record_telemetry_flushed(batch.len());
                Ok(batch.len())
            }
            Err(e) => {
                tracing::warn!(error = %e, records = batch.len(), "Telemetry export failed, requeueing");
                self.queue.requeue(batch);
                Err(e)
            }
        }
    }

    /// Flush until the queue is empty or an export fails.
    pub async fn flush_all(&self) -> Result<usize, TelemetryError> {
        let mut total = 0;
        loop {
            match self.flush_once().await? {
                0 => return Ok(total),
                n => total += n,
            }
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = crate::clock::millis(self.interval),
            batch_size = self.batch_size,
            "Telemetry flusher starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.flush_once().await {
                        tracing::debug!(error = %e, "Telemetry flush deferred to next tick");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Telemetry flusher received shutdown signal, draining queue");
                    match self.flush_all().await {
                        Ok(n) => tracing::info!(records = n, "Telemetry drained"),
                        Err(e) => tracing::warn!(
                            error = %e,
                            remaining = self.queue.len(),
                            "Telemetry could not be fully drained"
                        ),
                    }
                    break;
                }
            }
        }
    }
}
