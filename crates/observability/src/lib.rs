//! Tracing and logging setup shared by scheduler binaries.

/// Log output format and subscriber initialization.
pub mod tracing;

pub use crate::tracing::{LogFormat, ParseLogFormatError};

/// Initialize process-wide logging in the format named by
/// `BOSSMAN_LOG_FORMAT` (JSON unless set to `text`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::from_env());
}

/// Initialize process-wide logging in an explicit format.
pub fn init_with(format: LogFormat) {
    tracing::init(format);
}
