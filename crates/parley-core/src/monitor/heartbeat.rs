//! Progress heartbeat for long-running calls

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};

use crate::config::MonitorConfig;
use crate::logging::{LogLevel, Logger};

/// Log level for a heartbeat after `elapsed`
pub fn heartbeat_level(elapsed: Duration, config: &MonitorConfig) -> LogLevel {
    if elapsed >= config.error_after() {
        LogLevel::Error
    } else if elapsed >= config.warn_after() {
        LogLevel::Warn
    } else {
        LogLevel::Info
    }
}

/// Log progress every interval until dropped
///
/// Never returns and never aborts anything; the monitor drops this future
/// together with the call it describes.
pub async fn run_heartbeat(logger: Arc<dyn Logger>, label: String, config: MonitorConfig, started: Instant) {
    let period = config.heartbeat_interval();
    let mut ticks = time::interval_at(started + period, period);

    loop {
        ticks.tick().await;
        let elapsed = started.elapsed();
        let level = heartbeat_level(elapsed, &config);
        let message = match level {
            LogLevel::Error => format!(
                "[Monitor] {} still running after {:.0}s; well past expected duration",
                label,
                elapsed.as_secs_f64()
            ),
            LogLevel::Warn => format!(
                "[Monitor] {} still running after {:.0}s; longer than usual",
                label,
                elapsed.as_secs_f64()
            ),
            _ => format!("[Monitor] {} in progress ({:.0}s)", label, elapsed.as_secs_f64()),
        };
        logger.log(level, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryLogger;

    fn config() -> MonitorConfig {
        MonitorConfig {
            timeout_secs: 600.0,
            heartbeat_interval_secs: 10.0,
            warn_after_secs: 30.0,
            error_after_secs: 50.0,
        }
    }

    #[test]
    fn escalation_thresholds() {
        let c = config();
        assert_eq!(heartbeat_level(Duration::from_secs(10), &c), LogLevel::Info);
        assert_eq!(heartbeat_level(Duration::from_secs(30), &c), LogLevel::Warn);
        assert_eq!(heartbeat_level(Duration::from_secs(49), &c), LogLevel::Warn);
        assert_eq!(heartbeat_level(Duration::from_secs(50), &c), LogLevel::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn escalates_while_running() {
        let logger = Arc::new(MemoryLogger::new());
        let beat = run_heartbeat(logger.clone(), "chat".into(), config(), Instant::now());

        let _ = time::timeout(Duration::from_secs(61), beat).await;

        let levels: Vec<LogLevel> = logger.entries().iter().map(|e| e.level).collect();
        assert_eq!(
            levels,
            vec![
                LogLevel::Info,
                LogLevel::Info,
                LogLevel::Warn,
                LogLevel::Warn,
                LogLevel::Error,
                LogLevel::Error
            ]
        );
    }
}
