pub mod check;
pub mod run;

use std::path::Path;

use apiwatch_core::WatchConfig;
use tracing::debug;

/// Read `path` if it exists, overlay the process environment, validate.
pub fn load_config(path: &Path) -> anyhow::Result<WatchConfig> {
    let mut config = if path.exists() {
        debug!(path = %path.display(), "loading config file");
        WatchConfig::from_file(path)?
    } else {
        debug!(path = %path.display(), "no config file, using defaults");
        WatchConfig::default()
    };
    config.apply_process_env();
    config.validate()?;
    Ok(config)
}
