//! Client factories — how each execution gets its own API client.

use std::future::Future;

/// Derives a fresh client for every probe execution.
///
/// Nothing is shared between executions: a connection failure surfaces
/// as that execution's error and is classified like any other.
pub trait ClientFactory: Send + Sync + 'static {
    type Client: Send + 'static;

    fn connect(&self) -> impl Future<Output = anyhow::Result<Self::Client>> + Send;
}

/// Hands each execution a clone of a fixed configuration value, leaving
/// client construction to the probe itself.
#[derive(Debug, Clone, Default)]
pub struct CloneFactory<T>(pub T);

impl<T> ClientFactory for CloneFactory<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Client = T;

    async fn connect(&self) -> anyhow::Result<T> {
        Ok(self.0.clone())
    }
}
