//! The immutable summary of one monitoring run.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::Serialize;

/// How warning outcomes enter the reliability calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningPolicy {
    /// Warnings are inconclusive: left out of numerator and denominator.
    Exclude,
    /// Warnings count as successful executions.
    CountAsSuccess,
}

impl fmt::Display for WarningPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningPolicy::Exclude => write!(f, "warnings excluded"),
            WarningPolicy::CountAsSuccess => write!(f, "warnings count as successes"),
        }
    }
}

/// Warnings are known, expected failures and say nothing either way
/// about availability.
pub const DEFAULT_WARNING_POLICY: WarningPolicy = WarningPolicy::Exclude;

/// Outcome totals for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub success: u64,
    pub warning: u64,
    pub failure: u64,
}

impl Counts {
    pub fn total(&self) -> u64 {
        self.success + self.warning + self.failure
    }
}

/// Percentage of conclusive executions that succeeded.
///
/// Defined as 100 when there were no conclusive executions at all.
pub fn reliability(counts: Counts, policy: WarningPolicy) -> f64 {
    let good = match policy {
        WarningPolicy::Exclude => counts.success,
        WarningPolicy::CountAsSuccess => counts.success + counts.warning,
    };
    let conclusive = good + counts.failure;
    if conclusive == 0 {
        return 100.0;
    }
    100.0 * good as f64 / conclusive as f64
}

/// A failed execution kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureDetail {
    pub probe: String,
    pub at: SystemTime,
    pub error: String,
}

/// Final judgement of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    /// Not a single probe succeeded; the API was never reachable.
    NoSuccesses,
    BelowTarget,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    started_at: SystemTime,
    finished_at: SystemTime,
    elapsed: Duration,
    counts: Counts,
    failures: Vec<FailureDetail>,
    target_reliability: f64,
    reliability: f64,
    warning_policy: WarningPolicy,
}

impl Report {
    pub fn new(
        started_at: SystemTime,
        elapsed: Duration,
        counts: Counts,
        failures: Vec<FailureDetail>,
        target_reliability: f64,
        warning_policy: WarningPolicy,
    ) -> Self {
        Self {
            started_at,
            finished_at: started_at + elapsed,
            elapsed,
            counts,
            failures,
            target_reliability,
            reliability: reliability(counts, warning_policy),
            warning_policy,
        }
    }

    pub fn finished_at(&self) -> SystemTime {
        self.finished_at
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn counts(&self) -> Counts {
        self.counts
    }

    pub fn success_count(&self) -> u64 {
        self.counts.success
    }

    pub fn warning_count(&self) -> u64 {
        self.counts.warning
    }

    pub fn failure_count(&self) -> u64 {
        self.counts.failure
    }

    /// Failed executions in the order they were recorded.
    pub fn failures(&self) -> &[FailureDetail] {
        &self.failures
    }

    pub fn target_reliability(&self) -> f64 {
        self.target_reliability
    }

    pub fn reliability(&self) -> f64 {
        self.reliability
    }

    /// Whether observed reliability reached the target. Equality passes.
    pub fn meets_target(&self) -> bool {
        self.reliability >= self.target_reliability
    }

    /// Combine the reliability check with the requirement that at least
    /// one probe succeeded, so "no evidence" is never reported as a pass.
    pub fn verdict(&self) -> Verdict {
        if self.counts.success == 0 {
            Verdict::NoSuccesses
        } else if !self.meets_target() {
            Verdict::BelowTarget
        } else {
            Verdict::Passed
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "API availability report")?;
        writeln!(f, "  successes:   {}", self.counts.success)?;
        writeln!(f, "  warnings:    {}", self.counts.warning)?;
        writeln!(f, "  failures:    {}", self.counts.failure)?;
        writeln!(
            f,
            "  reliability: {:.2}% (target {:.2}%, {})",
            self.reliability, self.target_reliability, self.warning_policy
        )?;
        write!(f, "  elapsed:     {:.2}s", self.elapsed.as_secs_f64())?;
        if !self.failures.is_empty() {
            write!(f, "\n  failed executions:")?;
            for failure in &self.failures {
                write!(f, "\n    [{}] {}", failure.probe, failure.error)?;
            }
        }
        Ok(())
    }
}
