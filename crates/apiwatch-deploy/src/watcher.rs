//! Deployment watcher — polls deployment status and stops the monitor.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use apiwatch_core::DeploymentSettings;
use apiwatch_monitor::{ProgressSink, StopHandle};

use crate::error::{WatchError, WatchResult};
use crate::status::{ConcourseJob, DeploymentStatus};

/// How a watch ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The deployment finished and the monitor was stopped.
    Completed { polls: u32 },
    /// The monitor was stopped by something else first.
    StoppedElsewhere,
}

pub struct DeploymentWatcher<S: DeploymentStatus> {
    status: S,
    poll_interval: Duration,
    max_consecutive_failures: u32,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl DeploymentWatcher<ConcourseJob> {
    /// Watch the job configured in `[deployment]`.
    pub fn from_settings(settings: &DeploymentSettings) -> WatchResult<Self> {
        let job = ConcourseJob::new(&settings.status_url, settings.bearer_token.clone())?;
        Ok(Self::new(
            job,
            settings.poll_interval()?,
            settings.max_consecutive_failures,
        ))
    }
}

impl<S: DeploymentStatus> DeploymentWatcher<S> {
    pub fn new(status: S, poll_interval: Duration, max_consecutive_failures: u32) -> Self {
        Self {
            status,
            poll_interval,
            max_consecutive_failures: max_consecutive_failures.max(1),
            sink: None,
        }
    }

    /// Also report progress to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn emit(&self, line: &str) {
        if let Some(sink) = &self.sink {
            sink.emit(line);
        }
    }

    /// Poll until the deployment completes, the status source stays
    /// unreachable, or `stop` is signalled by someone else.
    ///
    /// Both completion and exhausting the failure budget stop the monitor.
    pub async fn watch(&self, stop: &StopHandle) -> WatchResult<WatchOutcome> {
        let mut remaining = self.max_consecutive_failures;
        let mut polls = 0;

        info!(
            interval_ms = self.poll_interval.as_millis() as u64,
            max_failures = self.max_consecutive_failures,
            "deployment watcher started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = stop.stopped() => {
                    debug!(polls, "monitor stopped elsewhere, watcher exiting");
                    return Ok(WatchOutcome::StoppedElsewhere);
                }
            }
            polls += 1;

            match self.status.complete().await {
                Ok(true) => {
                    info!(polls, "deployment completed, stopping monitor");
                    self.emit("detected deployment job completed, stopping monitor");
                    stop.stop();
                    return Ok(WatchOutcome::Completed { polls });
                }
                Ok(false) => {
                    remaining = self.max_consecutive_failures;
                    debug!(polls, "deployment still running");
                }
                Err(e) => {
                    remaining -= 1;
                    if remaining == 0 {
                        warn!(error = %e, "deployment status unreachable, stopping monitor");
                        stop.stop();
                        return Err(WatchError::Unreachable {
                            attempts: self.max_consecutive_failures,
                            last_error: format!("{e:#}"),
                        });
                    }
                    warn!(remaining, error = %e, "failed to get deployment status");
                    self.emit(&format!(
                        "failed to get deployment status [{remaining} attempts remaining]: {e:#}"
                    ));
                }
            }
        }
    }
}
