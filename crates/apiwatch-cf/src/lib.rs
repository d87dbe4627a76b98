//! apiwatch-cf — control-plane API access for availability probes.
//!
//! `CfClientFactory` turns an `ApiConfig` into a freshly authenticated
//! `CfClient` for every probe execution: a new HTTP client with no idle
//! connection pool, a fresh OAuth password-grant token, nothing cached.
//!
//! Error text is rendered the way the monitor's default warning patterns
//! expect (`cannot fetch token: 503 Service Unavailable`,
//! `cfclient error (CF-StatsUnavailable|200002): ...`).

pub mod client;
pub mod error;
pub mod probes;

pub use client::{CfClient, CfClientFactory};
pub use error::{CfError, CfResult};
pub use probes::register_standard_probes;
