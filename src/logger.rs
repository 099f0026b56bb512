//! Logging collaborator
//!
//! The resampler reports configuration problems to an injected [`Logger`] rather
//! than returning them through the real-time path. Frontends that already route
//! their diagnostics somewhere (an on-screen console, a log window) implement the
//! trait themselves; everyone else uses [`TracingLogger`].

use tracing::Level;

/// Receives human-readable diagnostics from the audio path
pub trait Logger: Send {
    /// Record a message at the given level
    fn log(&self, level: Level, message: &str);

    /// Record an error
    fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }

    /// Record an informational message
    fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }
}

/// [`Logger`] that forwards every message to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        // tracing::event! needs the level as a constant
        match level {
            Level::ERROR => tracing::error!(target: "emu_audio", "{message}"),
            Level::WARN => tracing::warn!(target: "emu_audio", "{message}"),
            Level::INFO => tracing::info!(target: "emu_audio", "{message}"),
            Level::DEBUG => tracing::debug!(target: "emu_audio", "{message}"),
            Level::TRACE => tracing::trace!(target: "emu_audio", "{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Recorder(Arc<Mutex<Vec<(Level, String)>>>);

    impl Logger for Recorder {
        fn log(&self, level: Level, message: &str) {
            self.0.lock().push((level, message.to_string()));
        }
    }

    #[test]
    fn test_default_methods_route_levels() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let logger = Recorder(Arc::clone(&lines));

        logger.error("bad rate");
        logger.info("rate changed");

        let lines = lines.lock();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], (Level::ERROR, "bad rate".to_string()));
        assert_eq!(lines[1].0, Level::INFO);
    }

    #[test]
    fn test_tracing_logger_accepts_all_levels() {
        let logger = TracingLogger;
        for level in [
            Level::ERROR,
            Level::WARN,
            Level::INFO,
            Level::DEBUG,
            Level::TRACE,
        ] {
            logger.log(level, "message");
        }
    }
}
