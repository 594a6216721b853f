//! Process-wide tracing setup for the DisasterConnect desktop binaries.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize tracing with JSON output.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::Json);
}

/// Initialize tracing with an explicit output format.
pub fn init_with(format: LogFormat) {
    tracing::init(format);
}
