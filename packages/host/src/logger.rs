//! The logger handle the runtime passes into every call.

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Logger handle supplied by the runtime.
///
/// Only `log` is required; the level helpers forward to it.
///
/// # Object Safety
///
/// This trait is object-safe: the context carries it as `Arc<dyn Logger>`.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message)
    }

    fn info(&self, message: &str) {
        self.log(Level::Info, message)
    }

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message)
    }

    fn error(&self, message: &str) {
        self.log(Level::Error, message)
    }
}

/// A logger that emits `tracing` events under the `poseidon::host` target.
///
/// Subscriber setup belongs to the process hosting the runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::Debug => tracing::debug!(target: "poseidon::host", "{}", message),
            Level::Info => tracing::info!(target: "poseidon::host", "{}", message),
            Level::Warn => tracing::warn!(target: "poseidon::host", "{}", message),
            Level::Error => tracing::error!(target: "poseidon::host", "{}", message),
        }
    }
}
