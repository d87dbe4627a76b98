//! Sources of deployment completion status.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;

use crate::error::{WatchError, WatchResult};

/// Answers "has the deployment finished?".
pub trait DeploymentStatus: Send + Sync {
    fn complete(&self) -> impl Future<Output = anyhow::Result<bool>> + Send;
}

#[derive(Debug, Deserialize)]
struct Build {
    status: String,
}

#[derive(Debug, Deserialize)]
struct Job {
    finished_build: Option<Build>,
    next_build: Option<Build>,
}

/// A CI job endpoint in Concourse's format
/// (`/api/v1/teams/<team>/pipelines/<pipeline>/jobs/<job>`).
///
/// The deployment is complete when the job has a finished build and no
/// build is pending or running.
#[derive(Debug, Clone)]
pub struct ConcourseJob {
    http: reqwest::Client,
    url: String,
    bearer_token: Option<String>,
}

impl ConcourseJob {
    pub fn new(url: impl Into<String>, bearer_token: Option<String>) -> WatchResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(WatchError::Client)?;
        Ok(Self {
            http,
            url: url.into(),
            bearer_token,
        })
    }
}

/// Interpret a job document.
fn job_complete(body: &str) -> anyhow::Result<bool> {
    let job: Job = serde_json::from_str(body).context("failed to decode job status")?;
    Ok(job.next_build.is_none()
        && job
            .finished_build
            .is_some_and(|b| !matches!(b.status.as_str(), "pending" | "started")))
}

impl DeploymentStatus for ConcourseJob {
    async fn complete(&self) -> anyhow::Result<bool> {
        let mut request = self.http.get(&self.url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.url))?;
        let status = response.status();
        if !status.is_success() {
            bail!("unexpected response {status} from {}", self.url);
        }
        let body = response.text().await?;
        job_complete(&body)
    }
}
