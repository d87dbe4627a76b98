//! Error types for monitor construction and lifecycle misuse.
//!
//! Probe failures are never surfaced here; they are counted in the report.

use thiserror::Error;

/// Result type alias for monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("task rate must be at least 1 per second")]
    ZeroRate,

    #[error("target reliability must be a percentage between 0 and 100, got {0}")]
    TargetReliability(f64),

    #[error("invalid warning pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("probes cannot be added once the monitor has started running")]
    AlreadyStarted,

    #[error("monitor has already been run")]
    AlreadyRun,
}
