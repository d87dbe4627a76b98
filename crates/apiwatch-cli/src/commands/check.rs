use std::path::Path;

use super::load_config;

pub fn check_config(path: &Path) -> anyhow::Result<()> {
    let mut config = load_config(path)?;
    if !config.api.password.is_empty() {
        config.api.password = "********".to_string();
    }
    if let Some(deployment) = config.deployment.as_mut() {
        if deployment.bearer_token.is_some() {
            deployment.bearer_token = Some("********".to_string());
        }
    }

    println!("{}", config.to_toml_string()?);
    println!(
        "✓ Configuration valid, target reliability {:.2}%",
        config.monitor.effective_target()
    );
    Ok(())
}
