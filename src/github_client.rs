use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::ResponseCache;
use crate::error::{ApiError, FindError};
use crate::transport::ApiTransport;
use crate::types::{OwnerType, RawRepo, TreeResponse};

pub const DEFAULT_HOST: &str = "github.com";

/// Settings for [`GitHubClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub token: String,
    pub host: String,
    pub disable_cache: bool,
    /// Defaults to [`ResponseCache::default_dir`].
    pub cache_dir: Option<PathBuf>,
    pub cache_ttl: Duration,
    /// Longest reset we are willing to sleep through before retrying once.
    pub max_rate_limit_wait: Duration,
}

impl ClientOptions {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            host: DEFAULT_HOST.to_string(),
            disable_cache: false,
            cache_dir: None,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            max_rate_limit_wait: Duration::from_secs(60),
        }
    }

    pub fn rest_base(&self) -> String {
        if self.host == DEFAULT_HOST {
            "https://api.github.com".to_string()
        } else {
            format!("https://{}/api/v3", self.host)
        }
    }

    pub fn graphql_url(&self) -> String {
        if self.host == DEFAULT_HOST {
            "https://api.github.com/graphql".to_string()
        } else {
            format!("https://{}/api/graphql", self.host)
        }
    }
}

/// Authenticated REST + GraphQL client backed by reqwest.
pub struct GitHubClient {
    client: Client,
    token: String,
    rest_base: String,
    graphql_url: String,
    cache: Option<ResponseCache>,
    max_rate_limit_wait: Duration,
}

/// Rate-limit state reported in response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub remaining: Option<u32>,
    pub limit: Option<u32>,
    pub reset: Option<DateTime<Utc>>,
}

impl RateLimit {
    /// Reads the `X-RateLimit-*` headers; missing or malformed ones are `None`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        fn header<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
            headers.get(name)?.to_str().ok()?.parse().ok()
        }

        Self {
            remaining: header(headers, "X-RateLimit-Remaining"),
            limit: header(headers, "X-RateLimit-Limit"),
            reset: header::<i64>(headers, "X-RateLimit-Reset")
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        }
    }

    /// True once the window has no requests left.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Time left until the window resets, measured from `now`.
    pub fn wait_from(&self, now: DateTime<Utc>) -> Option<Duration> {
        let reset = self.reset?;
        // One extra second so we land after the reset, not on it.
        Some((reset - now).to_std().unwrap_or(Duration::ZERO) + Duration::from_secs(1))
    }
}

#[derive(Deserialize)]
struct OwnerResponse {
    #[serde(rename = "type")]
    kind: String,
}

impl GitHubClient {
    /// Builds the HTTP client and, unless disabled, the response cache.
    pub fn new(opts: ClientOptions) -> Result<Self, FindError> {
        if opts.token.trim().is_empty() {
            return Err(FindError::Config("GitHub token is required".to_string()));
        }

        // Create HTTP client
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FindError::Config(format!("failed to create GitHub client: {}", e)))?;

        // Cache falls back to the platform directory
        let cache = if opts.disable_cache {
            None
        } else {
            opts.cache_dir
                .clone()
                .or_else(ResponseCache::default_dir)
                .map(|dir| ResponseCache::new(dir, opts.cache_ttl))
        };
        if let Some(cache) = &cache {
            debug!("Caching responses in {}", cache.dir().display());
        }

        Ok(Self {
            client,
            token: opts.token.clone(),
            rest_base: opts.rest_base(),
            graphql_url: opts.graphql_url(),
            cache,
            max_rate_limit_wait: opts.max_rate_limit_wait,
        })
    }

    /// Adds the auth and API-version headers every call carries.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// GET a REST endpoint (relative to the API base) and decode it.
    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.rest_base, endpoint);

        // Serve from the cache when a fresh entry exists
        if let Some(cache) = &self.cache {
            if let Some(body) = cache.get(&url).await {
                return Ok(serde_json::from_str(&body)?);
            }
        }

        debug!("Requesting URL: {}", url);
        let body = self
            .send_with_rate_limit(|| self.authorize(self.client.get(&url)))
            .await?;

        if let Some(cache) = &self.cache {
            cache.put(&url, &body).await;
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// POST a GraphQL query and return its `data` object.
    async fn post_graphql(&self, query: &str) -> Result<Value, ApiError> {
        debug!("Posting GraphQL query ({} bytes)", query.len());
        let payload = json!({ "query": query });
        let body = self
            .send_with_rate_limit(|| self.authorize(self.client.post(&self.graphql_url)).json(&payload))
            .await?;

        graphql_data(serde_json::from_str(&body)?)
    }

    /// Sends a request, sleeping through at most one short rate-limit reset.
    async fn send_with_rate_limit<F>(&self, build: F) -> Result<String, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retried = false;
        loop {
            let response = build().send().await?;
            let status = response.status();
            let rate_limit = RateLimit::from_headers(response.headers());

            if let (Some(remaining), Some(limit)) = (rate_limit.remaining, rate_limit.limit) {
                debug!("Rate limit: {}/{}", remaining, limit);
            }

            if is_rate_limited(status, &rate_limit) {
                let wait = rate_limit.wait_from(Utc::now());
                match wait {
                    Some(wait) if !retried && wait <= self.max_rate_limit_wait => {
                        warn!("Rate limit reached. Waiting {} seconds...", wait.as_secs());
                        tokio::time::sleep(wait).await;
                        retried = true;
                        continue;
                    }
                    _ => {
                        return Err(ApiError::RateLimited {
                            reset: rate_limit.reset,
                        })
                    }
                }
            }

            // Read response body
            let body = response.text().await?;
            if !status.is_success() {
                return Err(status_error(status, &body));
            }

            if rate_limit.is_exhausted() {
                info!("Rate limit exhausted; further requests will wait for the reset");
            }
            return Ok(body);
        }
    }
}

/// Extracts `data` from a GraphQL response body. Any reported error fails
/// the whole response, even when partial `data` came back with it.
fn graphql_data(mut response: Value) -> Result<Value, ApiError> {
    let server_error = |message: &str| ApiError::Server {
        status: StatusCode::OK.as_u16(),
        message: message.to_string(),
    };

    if let Some(errors) = response["errors"].as_array().filter(|e| !e.is_empty()) {
        let message = errors[0]["message"].as_str().unwrap_or("GraphQL query failed");
        if errors.len() > 1 {
            debug!("GraphQL response carried {} errors", errors.len());
        }
        return Err(server_error(message));
    }

    match response.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => Ok(data),
        _ => Err(server_error("response carried no data")),
    }
}

fn is_rate_limited(status: StatusCode, rate_limit: &RateLimit) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && rate_limit.is_exhausted())
}

/// Maps a non-success status to a typed error, keeping the API's message.
fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());

    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Forbidden(message),
        _ => ApiError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl ApiTransport for GitHubClient {
    async fn get_owner_type(&self, name: &str) -> Result<OwnerType, ApiError> {
        let owner: OwnerResponse = self.get_json(&format!("users/{}", name)).await?;
        Ok(match owner.kind.as_str() {
            "Organization" => OwnerType::Organization,
            _ => OwnerType::User,
        })
    }

    async fn list_repositories(
        &self,
        owner: &str,
        owner_type: OwnerType,
        page: u32,
        per_page: u32,
        type_hint: &str,
    ) -> Result<Vec<RawRepo>, ApiError> {
        let base = match owner_type {
            OwnerType::Organization => format!("orgs/{}/repos", owner),
            OwnerType::User => format!("users/{}/repos", owner),
        };
        self.get_json(&format!(
            "{}?type={}&per_page={}&page={}",
            base, type_hint, per_page, page
        ))
        .await
    }

    async fn get_repository(&self, owner: &str, name: &str) -> Result<RawRepo, ApiError> {
        self.get_json(&format!("repos/{}/{}", owner, name)).await
    }

    async fn get_tree(
        &self,
        owner: &str,
        name: &str,
        git_ref: &str,
    ) -> Result<TreeResponse, ApiError> {
        self.get_json(&format!(
            "repos/{}/{}/git/trees/{}?recursive=1",
            owner, name, git_ref
        ))
        .await
    }

    async fn query_commit_history(&self, query: &str) -> Result<Value, ApiError> {
        self.post_graphql(query).await
    }
}
