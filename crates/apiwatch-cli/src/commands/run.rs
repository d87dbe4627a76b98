use std::path::Path;
use std::sync::Arc;

use anyhow::bail;
use tracing::info;

use apiwatch_cf::{CfClientFactory, register_standard_probes};
use apiwatch_deploy::DeploymentWatcher;
use apiwatch_monitor::{Monitor, ProgressSink, Report, StdoutSink, Verdict};

use super::load_config;

pub async fn run(config_path: &Path, format: &str) -> anyhow::Result<()> {
    if !matches!(format, "text" | "json") {
        bail!("unknown format {format:?}, expected text or json");
    }
    let config = load_config(config_path)?;
    let target = config.monitor.effective_target();
    let sink: Arc<dyn ProgressSink> = Arc::new(StdoutSink);

    sink.emit(&format!("Target reliability is set to {target:.2}%"));

    let mut monitor = Monitor::new(
        CfClientFactory::new(config.api.clone()),
        sink.clone(),
        config.monitor.workers,
        &config.monitor.warning_patterns,
        config.monitor.rate_per_second,
        target,
    )?;
    register_standard_probes(&mut monitor, &config.probes)?;
    let stop = monitor.stop_handle();

    // ── Stop triggers ──────────────────────────────────────────

    let watcher = match &config.deployment {
        Some(settings) => {
            let watcher = DeploymentWatcher::from_settings(settings)?.with_sink(sink.clone());
            let stop = stop.clone();
            Some(tokio::spawn(async move { watcher.watch(&stop).await }))
        }
        None => {
            info!("no [deployment] configured, monitoring until interrupted");
            None
        }
    };

    let interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping monitor");
            interrupt.stop();
        }
    });

    // ── Run ────────────────────────────────────────────────────

    let report = monitor.run().await?;
    let watch_result = match watcher {
        Some(handle) => Some(handle.await?),
        None => None,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text(sink.as_ref(), &report),
    }

    if let Some(Err(e)) = watch_result {
        bail!(e);
    }
    judge(&report)
}

fn print_text(sink: &dyn ProgressSink, report: &Report) {
    sink.emit(&format!(
        "Finished after duration {:.2} seconds",
        report.elapsed().as_secs_f64()
    ));
    if !report.failures().is_empty() {
        sink.emit("Encountered errors");
        for failure in report.failures() {
            sink.emit(&format!("  [{}] {}", failure.probe, failure.error));
        }
    }
    sink.emit(&report.to_string());
}

/// Turn the report's verdict into the process outcome.
fn judge(report: &Report) -> anyhow::Result<()> {
    match report.verdict() {
        Verdict::Passed => Ok(()),
        Verdict::NoSuccesses => bail!("expected at least one success"),
        Verdict::BelowTarget => bail!(
            "expected the tests to pass the reliability threshold: {:.2}% < {:.2}%",
            report.reliability(),
            report.target_reliability()
        ),
    }
}
