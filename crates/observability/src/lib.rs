//! Tracing and logging setup shared by the binary and tests.

/// Subscriber configuration (format, filter).
pub mod tracing;

pub use self::tracing::{LOG_FORMAT_VAR, LogFormat, ParseLogFormatError};

/// Initialize process-wide logging from the environment.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    self::tracing::init(LogFormat::from_env());
}
