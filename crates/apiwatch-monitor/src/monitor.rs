//! Availability monitor — runs registered probes until told to stop.
//!
//! The `Monitor` spawns a fixed pool of worker tasks that share one rate
//! limiter, one classifier, and one aggregator. `run` blocks until every
//! worker has observed the stop signal and returns the final `Report`.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::aggregator::Aggregator;
use crate::classifier::{Classifier, PatternClassifier};
use crate::error::{MonitorError, MonitorResult};
use crate::factory::ClientFactory;
use crate::limiter::RateLimiter;
use crate::registry::{ProbeRegistry, ProbeResult};
use crate::report::{DEFAULT_WARNING_POLICY, Report, WarningPolicy};
use crate::sink::ProgressSink;
use crate::stop::StopHandle;
use crate::worker::{Shared, run_worker};

pub struct Monitor<F: ClientFactory> {
    factory: Arc<F>,
    sink: Arc<dyn ProgressSink>,
    workers: usize,
    rate_per_second: u32,
    classifier: Arc<dyn Classifier>,
    target_reliability: f64,
    warning_policy: WarningPolicy,
    registry: Arc<ProbeRegistry<F::Client>>,
    stop: StopHandle,
    started: AtomicBool,
}

impl<F: ClientFactory> Monitor<F> {
    /// Create a monitor.
    ///
    /// Errors whose rendered text matches one of `warning_patterns` are
    /// classified as warnings. At most `rate_per_second` executions start
    /// per second across all `workers`.
    pub fn new<I, S>(
        factory: F,
        sink: Arc<dyn ProgressSink>,
        workers: usize,
        warning_patterns: I,
        rate_per_second: u32,
        target_reliability: f64,
    ) -> MonitorResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if workers == 0 {
            return Err(MonitorError::NoWorkers);
        }
        if rate_per_second == 0 {
            return Err(MonitorError::ZeroRate);
        }
        if !(0.0..=100.0).contains(&target_reliability) {
            return Err(MonitorError::TargetReliability(target_reliability));
        }
        let classifier = PatternClassifier::new(warning_patterns)?;

        Ok(Self {
            factory: Arc::new(factory),
            sink,
            workers,
            rate_per_second,
            classifier: Arc::new(classifier),
            target_reliability,
            warning_policy: DEFAULT_WARNING_POLICY,
            registry: Arc::new(ProbeRegistry::new()),
            stop: StopHandle::new(),
            started: AtomicBool::new(false),
        })
    }

    /// Replace the pattern classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_warning_policy(mut self, policy: WarningPolicy) -> Self {
        self.warning_policy = policy;
        self
    }

    /// Register a probe. Only valid before `run`.
    pub fn add<P, Fut>(&mut self, name: impl Into<String>, probe: P) -> MonitorResult<()>
    where
        P: Fn(F::Client) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProbeResult> + Send + 'static,
    {
        if self.started.load(Ordering::SeqCst) {
            return Err(MonitorError::AlreadyStarted);
        }
        let registry = Arc::get_mut(&mut self.registry).ok_or(MonitorError::AlreadyStarted)?;
        registry.add(name, probe);
        Ok(())
    }

    pub fn probe_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Signal every worker to stop. Idempotent; safe from any task.
    pub fn stop(&self) {
        if self.stop.stop() {
            info!("monitor stop requested");
        }
    }

    /// A handle an external trigger can hold to stop this monitor.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run every worker until stop, then return the report.
    ///
    /// Probe failures never make this fail; they are counted in the report.
    /// Calling `run` a second time is an error.
    pub async fn run(&self) -> MonitorResult<Report> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(MonitorError::AlreadyRun);
        }

        let started_at = SystemTime::now();
        let clock = Instant::now();
        let shared = Arc::new(Shared {
            registry: Arc::clone(&self.registry),
            factory: Arc::clone(&self.factory),
            limiter: RateLimiter::new(self.rate_per_second),
            classifier: Arc::clone(&self.classifier),
            aggregator: Aggregator::new(),
            sink: Arc::clone(&self.sink),
        });

        info!(
            workers = self.workers,
            rate = self.rate_per_second,
            probes = self.registry.len(),
            target = self.target_reliability,
            "monitor starting"
        );
        self.sink.emit(&format!(
            "Monitoring {} probe(s) with {} worker(s) at {} execution(s)/s",
            self.registry.len(),
            self.workers,
            self.rate_per_second
        ));

        if self.registry.is_empty() {
            warn!("no probes registered, idling until stopped");
            self.stop.stopped().await;
        } else {
            let handles: Vec<_> = (0..self.workers)
                .map(|id| tokio::spawn(run_worker(id, Arc::clone(&shared), self.stop.subscribe())))
                .collect();

            for handle in handles {
                if let Err(e) = handle.await {
                    error!(error = %e, "worker task ended abnormally");
                }
            }
        }

        let report = shared
            .aggregator
            .finalize(
                started_at,
                clock.elapsed(),
                self.target_reliability,
                self.warning_policy,
            )
            .await;

        info!(
            successes = report.success_count(),
            warnings = report.warning_count(),
            failures = report.failure_count(),
            reliability = report.reliability(),
            elapsed_secs = report.elapsed().as_secs_f64(),
            "monitor stopped"
        );
        self.sink.emit(&format!(
            "Stopped after {:.2}s: {} success(es), {} warning(s), {} failure(s)",
            report.elapsed().as_secs_f64(),
            report.success_count(),
            report.warning_count(),
            report.failure_count()
        ));

        Ok(report)
    }

    /// Whether `report` met its reliability target. Equality passes.
    pub fn have_tests_passed(&self, report: &Report) -> bool {
        report.meets_target()
    }
}
