//! Result aggregator — shared outcome counters for all workers.
//!
//! Counters are plain atomics; only failure details take a lock, and only
//! long enough to push one entry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use tokio::sync::Mutex;

use crate::classifier::Outcome;
use crate::report::{Counts, FailureDetail, Report, WarningPolicy};

/// One completed probe execution, handed straight to the aggregator.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub probe: String,
    pub at: SystemTime,
    pub outcome: Outcome,
    /// Rendered error text; `None` for successes.
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct Aggregator {
    success: AtomicU64,
    warning: AtomicU64,
    failure: AtomicU64,
    failures: Mutex<Vec<FailureDetail>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, record: ExecutionRecord) {
        match record.outcome {
            Outcome::Success => {
                self.success.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Warning => {
                self.warning.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Failure => {
                self.failures.lock().await.push(FailureDetail {
                    probe: record.probe,
                    at: record.at,
                    error: record.error.unwrap_or_default(),
                });
                self.failure.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Current totals. Exact once every writer has finished.
    pub fn counts(&self) -> Counts {
        Counts {
            success: self.success.load(Ordering::Relaxed),
            warning: self.warning.load(Ordering::Relaxed),
            failure: self.failure.load(Ordering::Relaxed),
        }
    }

    /// Produce the final report for a run that started at `started_at`.
    pub async fn finalize(
        &self,
        started_at: SystemTime,
        elapsed: Duration,
        target_reliability: f64,
        policy: WarningPolicy,
    ) -> Report {
        let failures = self.failures.lock().await.clone();
        Report::new(
            started_at,
            elapsed,
            self.counts(),
            failures,
            target_reliability,
            policy,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(probe: &str, outcome: Outcome, error: Option<&str>) -> ExecutionRecord {
        ExecutionRecord {
            probe: probe.to_string(),
            at: SystemTime::now(),
            outcome,
            error: error.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn counts_each_outcome() {
        let agg = Aggregator::new();
        agg.record(record("a", Outcome::Success, None)).await;
        agg.record(record("a", Outcome::Success, None)).await;
        agg.record(record("b", Outcome::Warning, Some("CF-StatsUnavailable|200002")))
            .await;
        agg.record(record("c", Outcome::Failure, Some("boom"))).await;

        let counts = agg.counts();
        assert_eq!(counts.success, 2);
        assert_eq!(counts.warning, 1);
        assert_eq!(counts.failure, 1);
        assert_eq!(counts.total(), 4);
    }

    #[tokio::test]
    async fn only_failures_are_retained() {
        let agg = Aggregator::new();
        agg.record(record("a", Outcome::Warning, Some("transient"))).await;
        agg.record(record("b", Outcome::Failure, Some("first"))).await;
        agg.record(record("c", Outcome::Failure, Some("second"))).await;

        let report = agg
            .finalize(SystemTime::now(), Duration::from_secs(1), 99.0, WarningPolicy::Exclude)
            .await;
        let errors: Vec<&str> = report.failures().iter().map(|f| f.error.as_str()).collect();
        assert_eq!(errors, vec!["first", "second"]);
        assert_eq!(report.failures()[0].probe, "b");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_lose_no_updates() {
        let agg = Arc::new(Aggregator::new());
        let mut handles = Vec::new();
        for worker in 0..8 {
            let agg = Arc::clone(&agg);
            handles.push(tokio::spawn(async move {
                for i in 0..300 {
                    let outcome = match i % 3 {
                        0 => Outcome::Success,
                        1 => Outcome::Warning,
                        _ => Outcome::Failure,
                    };
                    agg.record(record(&format!("w{worker}"), outcome, Some("e")))
                        .await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let counts = agg.counts();
        assert_eq!(counts.success, 800);
        assert_eq!(counts.warning, 800);
        assert_eq!(counts.failure, 800);
        assert_eq!(counts.total(), 2400);

        let report = agg
            .finalize(SystemTime::now(), Duration::ZERO, 99.0, WarningPolicy::Exclude)
            .await;
        assert_eq!(report.failures().len(), 800);
    }
}
