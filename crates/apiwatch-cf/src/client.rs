//! Authenticated control-plane client, created fresh per execution.

use std::time::Duration;

use anyhow::Context;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use apiwatch_core::ApiConfig;
use apiwatch_monitor::ClientFactory;

use crate::error::{CfError, CfResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "apiwatch/0.1";

/// Builds a new `CfClient` for every probe execution.
#[derive(Debug, Clone)]
pub struct CfClientFactory {
    config: ApiConfig,
}

impl CfClientFactory {
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }
}

impl ClientFactory for CfClientFactory {
    type Client = CfClient;

    async fn connect(&self) -> anyhow::Result<CfClient> {
        CfClient::connect(&self.config)
            .await
            .context("Failed to connect to Cloud Foundry API")
    }
}

#[derive(Debug, Deserialize)]
struct Info {
    token_endpoint: String,
}

#[derive(Debug, Deserialize)]
struct Token {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: u64,
    error_code: String,
    description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    pub guid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Resource<T> {
    pub metadata: Metadata,
    pub entity: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceList<T> {
    pub resources: Vec<Resource<T>>,
}

/// The `entity` of orgs, spaces, and apps; only the name is needed.
#[derive(Debug, Clone, Deserialize)]
pub struct Named {
    pub name: String,
}

/// A client holding one bearer token and no pooled connections.
#[derive(Debug)]
pub struct CfClient {
    http: reqwest::Client,
    api: String,
    token: String,
}

impl CfClient {
    /// Discover the token endpoint and authenticate with a password grant.
    pub async fn connect(config: &ApiConfig) -> CfResult<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.skip_ssl_validation)
            .pool_max_idle_per_host(0)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(CfError::Client)?;
        let api = config.address.trim_end_matches('/').to_string();

        let info_url = format!("{api}/v2/info");
        let info: Info = decode(&info_url, send(&info_url, http.get(&info_url)).await?).await?;

        let token_url = format!("{}/oauth/token", info.token_endpoint.trim_end_matches('/'));
        let response = http
            .post(&token_url)
            .basic_auth("cf", Some(""))
            .form(&[
                ("grant_type", "password"),
                ("username", config.username.as_str()),
                ("password", config.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CfError::Token(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CfError::Token(response.status().to_string()));
        }
        let token: Token = response
            .json()
            .await
            .map_err(|e| CfError::Token(format!("invalid token response: {e}")))?;

        debug!(%api, "authenticated against control-plane API");
        Ok(Self {
            http,
            api,
            token: token.access_token,
        })
    }

    /// GET an API path, decoding the JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> CfResult<T> {
        let url = format!("{}{path}", self.api);
        let request = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query);
        let response = send(&url, request).await?;
        decode(&url, response).await
    }

    pub async fn org_by_name(&self, name: &str) -> CfResult<Resource<Named>> {
        let query = format!("name:{name}");
        let orgs: ResourceList<Named> = self
            .get_json("/v2/organizations", &[("q", query.as_str())])
            .await?;
        first(orgs, "organization", name)
    }

    pub async fn space_by_name(&self, name: &str, org_guid: &str) -> CfResult<Resource<Named>> {
        let query = format!("name:{name}");
        let spaces: ResourceList<Named> = self
            .get_json(
                &format!("/v2/organizations/{org_guid}/spaces"),
                &[("q", query.as_str())],
            )
            .await?;
        first(spaces, "space", name)
    }

    /// List apps filtered by `q` clauses such as `space_guid:<guid>`.
    pub async fn apps_by_query(&self, clauses: &[String]) -> CfResult<Vec<Resource<Named>>> {
        let query: Vec<(&str, &str)> = clauses.iter().map(|c| ("q", c.as_str())).collect();
        let apps: ResourceList<Named> = self.get_json("/v2/apps", &query).await?;
        Ok(apps.resources)
    }

    pub async fn app_stats(&self, app_guid: &str) -> CfResult<serde_json::Value> {
        self.get_json(&format!("/v2/apps/{app_guid}/stats"), &[]).await
    }

    pub async fn app_instances(&self, app_guid: &str) -> CfResult<serde_json::Value> {
        self.get_json(&format!("/v2/apps/{app_guid}/instances"), &[])
            .await
    }

    pub async fn app_routes(&self, app_guid: &str) -> CfResult<ResourceList<serde_json::Value>> {
        self.get_json(&format!("/v2/apps/{app_guid}/routes"), &[])
            .await
    }
}

async fn send(url: &str, request: reqwest::RequestBuilder) -> CfResult<Response> {
    request.send().await.map_err(|source| CfError::Request {
        url: url.to_string(),
        source,
    })
}

async fn decode<T: DeserializeOwned>(url: &str, response: Response) -> CfResult<T> {
    let status = response.status();
    let body = response.text().await.map_err(|source| CfError::Request {
        url: url.to_string(),
        source,
    })?;
    if !status.is_success() {
        return Err(error_from_body(url, status, &body));
    }
    serde_json::from_str(&body).map_err(|e| CfError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Prefer the structured control-plane error when the body carries one.
fn error_from_body(url: &str, status: StatusCode, body: &str) -> CfError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => CfError::Api {
            code: err.code,
            error_code: err.error_code,
            description: err.description,
        },
        Err(_) => CfError::Status {
            url: url.to_string(),
            status: status.to_string(),
            body: body.trim().to_string(),
        },
    }
}

fn first<T>(list: ResourceList<T>, kind: &'static str, name: &str) -> CfResult<Resource<T>> {
    list.resources
        .into_iter()
        .next()
        .ok_or_else(|| CfError::NotFound {
            kind,
            name: name.to_string(),
        })
}
