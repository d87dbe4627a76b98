//! apiwatch.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};

/// Reliability target for full production-sized deployments.
pub const DEFAULT_TARGET_RELIABILITY: f64 = 99.95;
/// Reliability target for slim development deployments.
pub const DEV_TARGET_RELIABILITY: f64 = 99.0;
/// Anything lower than this is not a meaningful availability target.
pub const MIN_SENSIBLE_RELIABILITY: f64 = 99.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub probes: ProbeSettings,
    pub deployment: Option<DeploymentSettings>,
}

/// Connection details for the control-plane API under observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub skip_ssl_validation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_rate")]
    pub rate_per_second: u32,
    #[serde(default = "default_target")]
    pub target_reliability: f64,
    #[serde(default = "default_dev_target")]
    pub dev_target_reliability: f64,
    /// Use `dev_target_reliability` instead of `target_reliability`.
    #[serde(default)]
    pub slim_dev_deployment: bool,
    #[serde(default = "default_warning_patterns")]
    pub warning_patterns: Vec<String>,
}

/// Names of the fixtures the standard probes look up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSettings {
    #[serde(default = "default_org")]
    pub org: String,
    #[serde(default = "default_space")]
    pub space: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

/// Where to find out whether the deployment under way has finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSettings {
    pub status_url: String,
    pub bearer_token: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
    #[serde(default = "default_max_failures")]
    pub max_consecutive_failures: u32,
}

fn default_workers() -> usize {
    4
}

fn default_rate() -> u32 {
    2
}

fn default_target() -> f64 {
    DEFAULT_TARGET_RELIABILITY
}

fn default_dev_target() -> f64 {
    DEV_TARGET_RELIABILITY
}

fn default_warning_patterns() -> Vec<String> {
    vec![
        "cannot fetch token: 503 Service Unavailable".to_string(),
        r"CF-StatsUnavailable\|200002".to_string(),
    ]
}

fn default_org() -> String {
    "admin".to_string()
}

fn default_space() -> String {
    "healthchecks".to_string()
}

fn default_app_name() -> String {
    "healthcheck".to_string()
}

fn default_poll_interval() -> String {
    "2s".to_string()
}

fn default_max_failures() -> u32 {
    5
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            rate_per_second: default_rate(),
            target_reliability: default_target(),
            dev_target_reliability: default_dev_target(),
            slim_dev_deployment: false,
            warning_patterns: default_warning_patterns(),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            org: default_org(),
            space: default_space(),
            app_name: default_app_name(),
        }
    }
}

impl MonitorSettings {
    /// The reliability target that applies to this run.
    pub fn effective_target(&self) -> f64 {
        if self.slim_dev_deployment {
            self.dev_target_reliability
        } else {
            self.target_reliability
        }
    }
}

impl DeploymentSettings {
    pub fn poll_interval(&self) -> ConfigResult<Duration> {
        parse_duration(&self.poll_interval).ok_or_else(|| ConfigError::Invalid {
            field: "deployment.poll_interval",
            reason: format!("unparseable duration {:?}", self.poll_interval),
        })
    }
}

impl WatchConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Overlay the deployment environment variables read through `lookup`.
    ///
    /// `SYSTEM_DNS_ZONE_NAME` sets the API address to `https://api.<zone>`;
    /// `CF_USER`, `CF_PASS` set the credentials; `SKIP_SSL_VALIDATION` and
    /// `SLIM_DEV_DEPLOYMENT` are enabled by the literal value `true`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(zone) = lookup("SYSTEM_DNS_ZONE_NAME") {
            self.api.address = format!("https://api.{zone}");
        }
        if let Some(user) = lookup("CF_USER") {
            self.api.username = user;
        }
        if let Some(pass) = lookup("CF_PASS") {
            self.api.password = pass;
        }
        if let Some(skip) = lookup("SKIP_SSL_VALIDATION") {
            self.api.skip_ssl_validation = skip == "true";
        }
        if let Some(slim) = lookup("SLIM_DEV_DEPLOYMENT") {
            self.monitor.slim_dev_deployment = slim == "true";
        }
    }

    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// Reject settings that would make the run meaningless.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.api.address.is_empty() {
            return Err(ConfigError::Missing("api.address"));
        }
        if self.api.username.is_empty() {
            return Err(ConfigError::Missing("api.username"));
        }
        if self.api.password.is_empty() {
            return Err(ConfigError::Missing("api.password"));
        }

        let target = self.monitor.effective_target();
        if !(MIN_SENSIBLE_RELIABILITY..=100.0).contains(&target) {
            return Err(ConfigError::TargetReliability {
                value: target,
                min: MIN_SENSIBLE_RELIABILITY,
            });
        }
        if self.monitor.workers == 0 {
            return Err(ConfigError::Invalid {
                field: "monitor.workers",
                reason: "at least one worker is required".to_string(),
            });
        }
        if self.monitor.rate_per_second == 0 {
            return Err(ConfigError::Invalid {
                field: "monitor.rate_per_second",
                reason: "rate must be greater than zero".to_string(),
            });
        }
        for pattern in &self.monitor.warning_patterns {
            regex::Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
        }

        if let Some(deployment) = &self.deployment {
            if deployment.status_url.is_empty() {
                return Err(ConfigError::Missing("deployment.status_url"));
            }
            deployment.poll_interval()?;
            if deployment.max_consecutive_failures == 0 {
                return Err(ConfigError::Invalid {
                    field: "deployment.max_consecutive_failures",
                    reason: "at least one poll attempt is required".to_string(),
                });
            }
        }
        Ok(())
    }
}
