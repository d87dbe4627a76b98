//! apiwatch-monitor — continuous API availability probing.
//!
//! Runs a fixed pool of workers that repeatedly execute registered probes
//! against the control-plane API while an unrelated deployment is under
//! way, and reports whether the observed reliability met its target.
//!
//! # Architecture
//!
//! ```text
//! Monitor
//!   ├── ProbeRegistry (ordered probes, round-robin cursor)
//!   ├── RateLimiter (global token bucket on execution starts)
//!   ├── N worker tasks
//!   │   ├── ClientFactory::connect() → fresh client per execution
//!   │   ├── probe(client) → Result<(), anyhow::Error>
//!   │   ├── Classifier → Success | Warning | Failure
//!   │   └── Aggregator (atomic counters, failure list)
//!   └── StopHandle (watch channel, idempotent)
//! ```
//!
//! # Stopping
//!
//! `stop()` can be called from any task at any time, any number of times.
//! Workers observe it before starting a new execution and while waiting
//! for a rate-limiter token. In-flight probes are never interrupted, and
//! their outcomes are still recorded in the final `Report`.
//!
//! # Reliability
//!
//! `reliability = 100 * successes / (successes + failures)`, or 100 when
//! nothing conclusive ran. Warnings are excluded from both sides under
//! the default `WarningPolicy::Exclude`.

pub mod aggregator;
pub mod classifier;
pub mod error;
pub mod factory;
pub mod limiter;
pub mod monitor;
pub mod registry;
pub mod report;
pub mod sink;
pub mod stop;
mod worker;

pub use aggregator::{Aggregator, ExecutionRecord};
pub use classifier::{Classifier, Outcome, PatternClassifier, render_error};
pub use error::{MonitorError, MonitorResult};
pub use factory::{ClientFactory, CloneFactory};
pub use limiter::RateLimiter;
pub use monitor::Monitor;
pub use registry::{Probe, ProbeError, ProbeFuture, ProbeRegistry, ProbeResult};
pub use report::{
    Counts, DEFAULT_WARNING_POLICY, FailureDetail, Report, Verdict, WarningPolicy, reliability,
};
pub use sink::{MemorySink, ProgressSink, StdoutSink};
pub use stop::StopHandle;
