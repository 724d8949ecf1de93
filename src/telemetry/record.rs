//! Error telemetry records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Broad area an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Network,
    Api,
    Websocket,
    Data,
    Ui,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One queued error event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub id: String,
    /// Milliseconds on the reporter's clock.
    pub timestamp: u64,
    pub session_id: String,
    pub category: ErrorCategory,
    pub message: String,
    pub severity: Severity,
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl ErrorRecord {
    pub fn new(
        category: ErrorCategory,
        severity: Severity,
        message: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            id: new_error_id(),
            timestamp: 0,
            session_id: String::new(),
            category,
            message: message.into(),
            severity,
            context: context.into(),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

/// Fresh record identifier. Also handed to callers as their error reference.
pub fn new_error_id() -> String {
    Uuid::new_v4().to_string()
}
