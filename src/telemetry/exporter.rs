//! Batch exporters for queued telemetry.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::telemetry::record::ErrorRecord;
use crate::telemetry::TelemetryError;

/// Ships a batch of records somewhere durable.
pub trait TelemetryExporter: Send + Sync {
    fn export(
        &self,
        batch: &[ErrorRecord],
    ) -> impl Future<Output = Result<(), TelemetryError>> + Send;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchPayload<'a> {
    session_id: &'a str,
    errors: &'a [ErrorRecord],
}

/// POSTs batches as JSON to a collector.
#[derive(Debug, Clone)]
pub struct HttpExporter {
    client: reqwest::Client,
    url: Url,
    session_id: String,
}

impl HttpExporter {
    pub fn new(url: Url, session_id: impl Into<String>) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url,
            session_id: session_id.into(),
        })
    }
}

impl TelemetryExporter for HttpExporter {
    async fn export(&self, batch: &[ErrorRecord]) -> Result<(), TelemetryError> {
        let payload = BatchPayload {
            session_id: &self.session_id,
            errors: batch,
        };
        let response = self
            .client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TelemetryError::Rejected(status.as_u16()))
        }
    }
}

/// Writes each record to the log. Used when no collector is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogExporter;

impl TelemetryExporter for LogExporter {
    async fn export(&self, batch: &[ErrorRecord]) -> Result<(), TelemetryError> {
        for record in batch {
            tracing::info!(
                target: "endpoint_resilience::telemetry",
                id = %record.id,
                category = ?record.category,
                severity = ?record.severity,
                context = %record.context,
                endpoint = record.endpoint.as_deref().unwrap_or("-"),
                "{}",
                record.message
            );
        }
        Ok(())
    }
}
