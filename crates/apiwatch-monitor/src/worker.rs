//! The worker loop executed by each unit of the pool.

use std::sync::Arc;
use std::time::SystemTime;

use anyhow::anyhow;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::aggregator::{Aggregator, ExecutionRecord};
use crate::classifier::{Classifier, Outcome, render_error};
use crate::factory::ClientFactory;
use crate::limiter::RateLimiter;
use crate::registry::{Probe, ProbeRegistry, ProbeResult};
use crate::sink::ProgressSink;

/// State shared by every worker for the duration of one run.
pub(crate) struct Shared<F: ClientFactory> {
    pub registry: Arc<ProbeRegistry<F::Client>>,
    pub factory: Arc<F>,
    pub limiter: RateLimiter,
    pub classifier: Arc<dyn Classifier>,
    pub aggregator: Aggregator,
    pub sink: Arc<dyn ProgressSink>,
}

/// Run probes until stop is observed. Returns the number of executions
/// this worker completed.
pub(crate) async fn run_worker<F: ClientFactory>(
    id: usize,
    shared: Arc<Shared<F>>,
    mut stop: watch::Receiver<bool>,
) -> u64 {
    let mut completed = 0;
    debug!(worker = id, "worker starting");

    loop {
        if *stop.borrow() {
            break;
        }
        if !shared.limiter.acquire(&mut stop).await {
            break;
        }
        let Some(probe) = shared.registry.next() else {
            break;
        };

        let at = SystemTime::now();
        let result = execute(&shared.factory, probe.clone()).await;
        let outcome = shared.classifier.classify(&result);
        let error = result.err().map(|e| render_error(&e));

        match outcome {
            Outcome::Success => {}
            Outcome::Warning => {
                let text = error.as_deref().unwrap_or_default();
                debug!(worker = id, probe = %probe.name(), error = %text, "probe warning");
                shared
                    .sink
                    .emit(&format!("warning: [{}] {}", probe.name(), text));
            }
            Outcome::Failure => {
                let text = error.as_deref().unwrap_or_default();
                warn!(worker = id, probe = %probe.name(), error = %text, "probe failed");
                shared
                    .sink
                    .emit(&format!("failure: [{}] {}", probe.name(), text));
            }
        }

        shared
            .aggregator
            .record(ExecutionRecord {
                probe: probe.name().to_string(),
                at,
                outcome,
                error,
            })
            .await;
        completed += 1;
    }

    debug!(worker = id, completed, "worker stopped");
    completed
}

/// Connect a fresh client and run the probe on its own task, so a
/// panicking probe becomes a failed execution instead of a dead worker.
async fn execute<F: ClientFactory>(factory: &Arc<F>, probe: Probe<F::Client>) -> ProbeResult {
    let factory = Arc::clone(factory);
    let task = tokio::spawn(async move {
        let client = factory.connect().await?;
        probe.execute(client).await
    });

    match task.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(anyhow!("probe panicked")),
        Err(e) => Err(anyhow!("probe task failed: {e}")),
    }
}
