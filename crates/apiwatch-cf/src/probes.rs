//! The standard availability probes.

use anyhow::{Context, bail};

use apiwatch_core::ProbeSettings;
use apiwatch_monitor::{Monitor, MonitorResult};

use crate::client::{CfClient, CfClientFactory};

pub const LIST_APPS_PROBE: &str = "Listing all apps in a space";
pub const APP_DETAILS_PROBE: &str = "Fetching detailed app information";

/// Register both standard probes on `monitor`.
pub fn register_standard_probes(
    monitor: &mut Monitor<CfClientFactory>,
    settings: &ProbeSettings,
) -> MonitorResult<()> {
    let s = settings.clone();
    monitor.add(LIST_APPS_PROBE, move |client: CfClient| {
        let s = s.clone();
        async move { list_apps_in_space(&client, &s).await }
    })?;

    let s = settings.clone();
    monitor.add(APP_DETAILS_PROBE, move |client: CfClient| {
        let s = s.clone();
        async move { fetch_app_details(&client, &s).await }
    })?;
    Ok(())
}

/// Org → space → apps in that space; at least one app must exist.
pub async fn list_apps_in_space(client: &CfClient, s: &ProbeSettings) -> anyhow::Result<()> {
    let org = client
        .org_by_name(&s.org)
        .await
        .with_context(|| format!("Failed to fetch '{}' org", s.org))?;
    let space = client
        .space_by_name(&s.space, &org.metadata.guid)
        .await
        .with_context(|| {
            format!(
                "Failed to fetch '{}' space within '{}' org",
                s.space, s.org
            )
        })?;

    let apps = client
        .apps_by_query(&[
            format!("organization_guid:{}", org.metadata.guid),
            format!("space_guid:{}", space.metadata.guid),
        ])
        .await
        .with_context(|| {
            format!(
                "Failed to query apps within space '{}' in org '{}'",
                s.space, s.org
            )
        })?;
    if apps.is_empty() {
        bail!(
            "Failed to find any apps in the '{}' space, expected at least one to be returned",
            s.space
        );
    }
    Ok(())
}

/// Org → app by name → stats, instances, and routes of that app.
pub async fn fetch_app_details(client: &CfClient, s: &ProbeSettings) -> anyhow::Result<()> {
    let org = client
        .org_by_name(&s.org)
        .await
        .with_context(|| format!("Failed to fetch '{}' org", s.org))?;

    let apps = client
        .apps_by_query(&[
            format!("name:{}", s.app_name),
            format!("organization_guid:{}", org.metadata.guid),
        ])
        .await
        .with_context(|| format!("Failed to query app by name within '{}' org", s.org))?;
    let Some(app) = apps.first() else {
        bail!(
            "Failed to find the app named '{}' within '{}' org",
            s.app_name,
            s.org
        );
    };
    let guid = &app.metadata.guid;

    client
        .app_stats(guid)
        .await
        .context("Failed to fetch app stats")?;
    client
        .app_instances(guid)
        .await
        .context("Failed to fetch app instances")?;
    client
        .app_routes(guid)
        .await
        .context("Failed to fetch app routes")?;
    Ok(())
}
