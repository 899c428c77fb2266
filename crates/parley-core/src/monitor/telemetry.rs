//! Call telemetry records

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::logging::Logger;

/// How a call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Success,
    Failure,
    Timeout,
    Cancelled,
}

impl std::fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallOutcome::Success => write!(f, "success"),
            CallOutcome::Failure => write!(f, "failure"),
            CallOutcome::Timeout => write!(f, "timeout"),
            CallOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One record per call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub correlation_id: String,
    pub tool_name: String,
    pub model: Option<String>,
    pub outcome: CallOutcome,
    pub duration: Duration,
}

/// Destination for telemetry records
pub trait TelemetrySink: Send + Sync {
    fn record(&self, record: TelemetryRecord);
}

/// Writes records through a logger
pub struct LogTelemetrySink {
    logger: Arc<dyn Logger>,
}

impl LogTelemetrySink {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }
}

impl TelemetrySink for LogTelemetrySink {
    fn record(&self, record: TelemetryRecord) {
        self.logger.info(&format!(
            "[Telemetry] call={} tool={} model={} outcome={} duration_ms={}",
            record.correlation_id,
            record.tool_name,
            record.model.as_deref().unwrap_or("-"),
            record.outcome,
            record.duration.as_millis()
        ));
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemoryTelemetrySink {
    records: Mutex<Vec<TelemetryRecord>>,
}

impl MemoryTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().clone()
    }
}

impl TelemetrySink for MemoryTelemetrySink {
    fn record(&self, record: TelemetryRecord) {
        self.records.lock().push(record);
    }
}
