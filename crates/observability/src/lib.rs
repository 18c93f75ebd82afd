//! Process-wide tracing setup shared by Findesk binaries.

pub mod tracing;

pub use self::tracing::LogFormat;

/// Initialize tracing with the format selected by `FINDESK_LOG_FORMAT`.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    let format = std::env::var("FINDESK_LOG_FORMAT")
        .map(|v| LogFormat::parse(&v))
        .unwrap_or_default();
    tracing::init(format);
}
