//! Process-wide tracing setup shared by the binaries and test harnesses.

pub mod tracing;

/// Initialize structured logging.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}
