//! Console logger

use super::traits::{LogLevel, Logger};

/// Writes lines to the terminal
///
/// Info goes to stdout unless `stderr_only` is set; a stdio MCP transport
/// owns stdout, so servers speaking over stdio must set it.
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    prefix: String,
    min_level: LogLevel,
    stderr_only: bool,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleLogger {
    pub fn new() -> Self {
        Self::with_prefix("[Parley]")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            min_level: LogLevel::Info,
            stderr_only: false,
        }
    }

    /// Drop lines below `level`
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn stderr_only(mut self) -> Self {
        self.stderr_only = true;
        self
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    fn emit(&self, level: LogLevel, message: &str) {
        if !self.enabled(level) {
            return;
        }
        if level == LogLevel::Info && !self.stderr_only {
            println!("{} {}: {}", self.prefix, level, message);
        } else {
            eprintln!("{} {}: {}", self.prefix, level, message);
        }
    }
}

impl Logger for ConsoleLogger {
    fn debug(&self, message: &str) {
        self.emit(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.emit(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.emit(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.emit(LogLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_hide_debug() {
        let logger = ConsoleLogger::new();
        assert_eq!(logger.prefix, "[Parley]");
        assert!(!logger.enabled(LogLevel::Debug));
        assert!(logger.enabled(LogLevel::Info));
    }

    #[test]
    fn builder_options() {
        let logger = ConsoleLogger::with_prefix("[stdio]")
            .with_min_level(LogLevel::Warn)
            .stderr_only();
        assert!(logger.stderr_only);
        assert!(!logger.enabled(LogLevel::Info));
        assert!(logger.enabled(LogLevel::Error));
    }
}
