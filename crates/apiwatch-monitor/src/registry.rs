//! Probe registry — the ordered set of named probe operations.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Error returned by a probe. Any error type converts into it.
pub type ProbeError = anyhow::Error;

/// Outcome of a single probe execution before classification.
pub type ProbeResult = Result<(), ProbeError>;

pub type ProbeFuture = Pin<Box<dyn Future<Output = ProbeResult> + Send>>;

type ProbeFn<C> = Arc<dyn Fn(C) -> ProbeFuture + Send + Sync>;

/// A named operation exercising the API through a client of type `C`.
pub struct Probe<C> {
    name: String,
    operation: ProbeFn<C>,
}

impl<C> Clone for Probe<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            operation: Arc::clone(&self.operation),
        }
    }
}

impl<C> Probe<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start one execution of the probe with a freshly derived client.
    pub fn execute(&self, client: C) -> ProbeFuture {
        (self.operation)(client)
    }
}

impl<C> std::fmt::Debug for Probe<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Probe").field("name", &self.name).finish()
    }
}

/// Probes in registration order, with a shared round-robin cursor.
///
/// Names are not keys: two probes may share a name and both run.
pub struct ProbeRegistry<C> {
    probes: Vec<Probe<C>>,
    cursor: AtomicUsize,
}

impl<C> Default for ProbeRegistry<C> {
    fn default() -> Self {
        Self {
            probes: Vec::new(),
            cursor: AtomicUsize::new(0),
        }
    }
}

impl<C> ProbeRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F, Fut>(&mut self, name: impl Into<String>, operation: F)
    where
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProbeResult> + Send + 'static,
    {
        let operation: ProbeFn<C> = Arc::new(move |client| Box::pin(operation(client)));
        self.probes.push(Probe {
            name: name.into(),
            operation,
        });
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.probes.iter().map(Probe::name).collect()
    }

    /// Next probe in the rotation shared by every worker.
    ///
    /// Each call advances a single cursor, so over `k * len()` calls every
    /// probe is handed out exactly `k` times regardless of which worker asks.
    pub fn next(&self) -> Option<&Probe<C>> {
        if self.probes.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.probes.len();
        self.probes.get(index)
    }
}
