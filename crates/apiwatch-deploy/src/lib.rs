//! apiwatch-deploy — the stop trigger for availability monitoring.
//!
//! A `DeploymentWatcher` polls a `DeploymentStatus` source (a CI job
//! endpoint in practice) on a fixed interval and stops the monitor when
//! the deployment completes. If the status source fails more than the
//! configured number of consecutive times, the monitor is stopped as well
//! and the watcher reports the status source as unreachable.

pub mod error;
pub mod status;
pub mod watcher;

pub use error::{WatchError, WatchResult};
pub use status::{ConcourseJob, DeploymentStatus};
pub use watcher::{DeploymentWatcher, WatchOutcome};
