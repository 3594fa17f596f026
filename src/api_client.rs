//! Rate-limited HTTP executor for key-authenticated intelligence APIs.
//!
//! One logical request may take several attempts. Every attempt holds a
//! permit from the client-wide concurrency gate, waits for the provider's
//! pacing slot, uses the next mirror in rotation, and is bounded by the
//! provider's timeout. Any transport error, timeout or non-200 status is
//! retried after a fixed delay until the attempt budget is spent.

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{AppConfig, ProviderConfig};
use crate::rate_limit::{ProviderState, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Provider-relative request description, replayed on every attempt
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path appended to the selected endpoint base URL
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }
}

/// A provider handle: display name, per-attempt timeout and shared
/// rotation/pacing state. Cloning shares the state.
#[derive(Debug, Clone)]
pub struct Provider {
    name: String,
    timeout: Duration,
    state: ProviderState,
}

impl Provider {
    /// Returns `None` when no endpoint is given
    pub fn new(
        name: impl Into<String>,
        endpoints: Vec<String>,
        min_interval: Duration,
        timeout: Duration,
    ) -> Option<Self> {
        Some(Self {
            name: name.into(),
            timeout,
            state: ProviderState::new(endpoints, min_interval)?,
        })
    }

    pub fn from_config(name: &str, config: &ProviderConfig) -> Option<Self> {
        Self::new(name, config.endpoints.clone(), config.min_interval(), config.timeout())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Last thing that went wrong before the attempt budget ran out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastFailure {
    Status(u16),
    Transport(String),
}

impl fmt::Display for LastFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastFailure::Status(code) => write!(f, "HTTP {}", code),
            LastFailure::Transport(reason) => write!(f, "{}", reason),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiCallError {
    #[error("{provider}: all {attempts} attempts failed (last: {last})")]
    Exhausted {
        provider: String,
        attempts: u32,
        last: LastFailure,
    },

    #[error("request concurrency gate closed")]
    GateClosed,
}

/// Successful (HTTP 200) response with its body fully read
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// Mirror that served the response
    pub endpoint: String,
    pub body: String,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Shared executor; clones share the HTTP connection pool and the gate.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(user_agent: &str, max_concurrent: usize, retry: RetryPolicy) -> Result<Self, reqwest::Error> {
        let http = Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            http,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            retry,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            &config.http.user_agent,
            config.limits.max_concurrent_requests,
            RetryPolicy::from_config(&config.retry),
        )
    }

    /// Execute one logical request against `provider`.
    pub async fn call(&self, provider: &Provider, request: &ApiRequest) -> Result<ApiResponse, ApiCallError> {
        let _permit = self.permits.acquire().await.map_err(|_| ApiCallError::GateClosed)?;

        let max_attempts = self.retry.max_attempts;
        let mut last = LastFailure::Transport("no attempt made".to_string());

        for attempt in 1..=max_attempts {
            let slot = provider.state.reserve_attempt().await;
            slot.wait().await;

            debug!(
                "{} {:?} {} (attempt {}/{})",
                provider.name, request.method, request.path, attempt, max_attempts
            );

            match self.send_once(provider, &slot.endpoint, request).await {
                Ok(response) if response.status == 200 => return Ok(response),
                Ok(response) => {
                    warn!(
                        "{} endpoint {} returned status {} (attempt {}/{})",
                        provider.name, slot.endpoint, response.status, attempt, max_attempts
                    );
                    last = LastFailure::Status(response.status);
                }
                Err(reason) => {
                    warn!(
                        "{} endpoint {} failed: {} (attempt {}/{})",
                        provider.name, slot.endpoint, reason, attempt, max_attempts
                    );
                    last = LastFailure::Transport(reason);
                }
            }

            if attempt < max_attempts {
                sleep(self.retry.delay).await;
            }
        }

        Err(ApiCallError::Exhausted {
            provider: provider.name.clone(),
            attempts: max_attempts,
            last,
        })
    }

    async fn send_once(&self, provider: &Provider, endpoint: &str, request: &ApiRequest) -> Result<ApiResponse, String> {
        let url = join_url(endpoint, &request.path);

        let mut builder = match request.method {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => self.http.post(&url),
        };
        builder = builder.timeout(provider.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(describe_transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(describe_transport_error)?;

        Ok(ApiResponse {
            status,
            endpoint: endpoint.to_string(),
            body,
        })
    }
}

fn join_url(endpoint: &str, path: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn describe_transport_error(err: reqwest::Error) -> String {
    // Strip the URL: query strings may carry API keys
    let err = err.without_url();
    if err.is_timeout() {
        format!("timed out: {}", err)
    } else {
        err.to_string()
    }
}
