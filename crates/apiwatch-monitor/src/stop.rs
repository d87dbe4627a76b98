//! Broadcast stop signal shared by the monitor, its workers, and any
//! external trigger.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable handle that stops a running monitor.
///
/// Stopping is idempotent and never blocks; it is safe before, during,
/// or after a run.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StopHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal stop. Returns `true` only for the call that flipped the flag.
    pub fn stop(&self) -> bool {
        self.tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        })
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// A receiver for use at cooperative suspension points.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Resolve once stop has been signalled.
    pub async fn stopped(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so this only returns on stop.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn stop_is_idempotent() {
        let handle = StopHandle::new();
        assert!(!handle.is_stopped());
        assert!(handle.stop());
        assert!(!handle.stop());
        assert!(!handle.clone().stop());
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn stopped_resolves_when_already_stopped() {
        let handle = StopHandle::new();
        handle.stop();
        tokio::time::timeout(Duration::from_millis(100), handle.stopped())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn clones_share_the_signal() {
        let handle = StopHandle::new();
        let remote = handle.clone();
        let mut rx = handle.subscribe();

        tokio::spawn(async move { remote.stop() });

        rx.wait_for(|s| *s).await.unwrap();
        assert!(handle.is_stopped());
    }
}
