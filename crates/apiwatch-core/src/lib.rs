//! apiwatch-core — configuration for the apiwatch availability monitor.
//!
//! Loads `apiwatch.toml`, layers the deployment environment variables on
//! top, and validates the result before any probe is run.

pub mod config;
pub mod duration;
pub mod error;

pub use config::{
    ApiConfig, DeploymentSettings, MonitorSettings, ProbeSettings, WatchConfig,
    DEFAULT_TARGET_RELIABILITY, DEV_TARGET_RELIABILITY, MIN_SENSIBLE_RELIABILITY,
};
pub use duration::parse_duration;
pub use error::{ConfigError, ConfigResult};
