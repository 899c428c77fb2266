//! Execution supervision
//!
//! States: running, then completed, timed out, or cancelled. Timeouts are
//! an outcome; cancellation is an error that callers must propagate.

mod executor;
mod heartbeat;
mod telemetry;

pub use executor::{ExecutionMonitor, Invocation, MonitorError, MonitorOutcome};
pub use heartbeat::heartbeat_level;
pub use telemetry::{CallOutcome, LogTelemetrySink, MemoryTelemetrySink, TelemetryRecord, TelemetrySink};
