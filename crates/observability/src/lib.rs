//! Tracing setup shared by the binaries.

pub mod subscriber;

pub use subscriber::LogFormat;

/// Initialize process-wide tracing with the format from `CARAVAN_LOG_FORMAT`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    subscriber::init(LogFormat::from_env());
}
