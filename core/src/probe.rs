/// API Probe Client
///
/// Performs a single bounded GET against a user-supplied JSON endpoint and
/// normalizes every outcome into either a parsed [`ProbeResponse`] or a
/// classified [`FetchError`]. The client never retries; retry policy belongs
/// to callers.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Failure of a single probe attempt
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    #[error("Invalid URL: {message}")]
    InvalidUrl { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: status {code}")]
    HttpStatus { code: u16 },

    #[error("Response is not valid JSON: {message}")]
    Parse { message: String },

    #[error("Payload exceeds {limit_bytes} bytes")]
    PayloadTooLarge { limit_bytes: usize },
}

impl FetchError {
    /// True when the server answered but the answer was unusable
    pub fn received_response(&self) -> bool {
        matches!(
            self,
            FetchError::HttpStatus { .. }
                | FetchError::Parse { .. }
                | FetchError::PayloadTooLarge { .. }
        )
    }

    /// Short machine-readable kind, e.g. for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidUrl { .. } => "invalid_url",
            FetchError::Network { .. } => "network",
            FetchError::Timeout { .. } => "timeout",
            FetchError::HttpStatus { .. } => "http_status",
            FetchError::Parse { .. } => "parse",
            FetchError::PayloadTooLarge { .. } => "payload_too_large",
        }
    }
}

/// Successful probe result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResponse {
    /// Parsed JSON body
    pub data: Value,
    /// HTTP status code (always 2xx)
    pub status: u16,
    /// Wall-clock time spent on the request
    pub elapsed: Duration,
    /// Body size in bytes
    pub bytes: usize,
    pub fetched_at: DateTime<Utc>,
}

/// URL form safe for logs: scheme, host, port and path only.
///
/// Query strings and credentials may carry API keys and are dropped.
pub fn loggable_url(url: &str) -> String {
    match reqwest::Url::parse(url.trim()) {
        Ok(parsed) => {
            let mut shown = format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap_or(""));
            if let Some(port) = parsed.port() {
                shown.push_str(&format!(":{}", port));
            }
            shown.push_str(parsed.path());
            shown
        }
        Err(_) => {
            let end = url.find(['?', '#']).unwrap_or(url.len());
            let head = &url[..end];
            // Strip anything that looks like userinfo
            match head.rfind('@') {
                Some(at) => format!("…{}", &head[at + 1..]),
                None => head.to_string(),
            }
        }
    }
}

/// Source of JSON payloads for probes and refreshes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ProbeResponse, FetchError>;
}

/// Configuration for the probe client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Bound on the whole call (connect, headers, body) in milliseconds
    pub timeout_ms: u64,
    /// Largest accepted response body
    pub max_payload_bytes: usize,
    /// User agent string
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: std::env::var("GRIDWATCH_PROBE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(10_000),
            max_payload_bytes: std::env::var("GRIDWATCH_MAX_PAYLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(5 * 1024 * 1024),
            user_agent: std::env::var("GRIDWATCH_USER_AGENT")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "gridwatch/0.1".to_string()),
        }
    }
}

/// reqwest-backed probe client
#[derive(Clone)]
pub struct ProbeClient {
    config: ProbeConfig,
    http_client: reqwest::Client,
}

impl ProbeClient {
    /// Create a new probe client with default configuration
    pub fn new() -> Self {
        Self::with_config(ProbeConfig::default())
    }

    /// Create a new probe client with custom configuration
    pub fn with_config(config: ProbeConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        let http_client = match reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(&config.user_agent)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!(
                    target: "probe",
                    error = %e,
                    user_agent = %config.user_agent,
                    "Failed to build HTTP client; falling back without custom user agent"
                );
                reqwest::Client::builder()
                    .timeout(timeout)
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new())
            }
        };

        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    async fn fetch_inner(&self, url: reqwest::Url) -> Result<(u16, Vec<u8>), FetchError> {
        let mut response = self
            .http_client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                code: status.as_u16(),
            });
        }

        let limit = self.config.max_payload_bytes;
        if let Some(declared) = response.content_length() {
            if declared as usize > limit {
                return Err(FetchError::PayloadTooLarge { limit_bytes: limit });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify_body(e))? {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::PayloadTooLarge { limit_bytes: limit });
            }
            body.extend_from_slice(&chunk);
        }

        Ok((status.as_u16(), body))
    }

    /// Errors after a 2xx header: the server answered, so anything but a
    /// timeout is an unusable response rather than a network failure
    fn classify_body(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            return self.classify(e);
        }
        FetchError::Parse {
            message: format!("response body interrupted: {}", e.without_url()),
        }
    }

    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                timeout_ms: self.config.timeout_ms,
            }
        } else {
            FetchError::Network {
                message: e.without_url().to_string(),
            }
        }
    }
}

impl Default for ProbeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for ProbeClient {
    async fn fetch(&self, url: &str) -> Result<ProbeResponse, FetchError> {
        let parsed = reqwest::Url::parse(url.trim()).map_err(|e| FetchError::InvalidUrl {
            message: e.to_string(),
        })?;

        let shown = loggable_url(url);
        debug!(target: "probe", url = %shown, "Fetching");
        let started = Instant::now();
        let timeout = Duration::from_millis(self.config.timeout_ms);

        let outcome = match tokio::time::timeout(timeout, self.fetch_inner(parsed)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Timeout {
                timeout_ms: self.config.timeout_ms,
            }),
        };

        let (status, body) = outcome.map_err(|e| {
            warn!(target: "probe", url = %shown, kind = e.kind(), error = %e, "Probe failed");
            e
        })?;

        let data: Value = serde_json::from_slice(&body).map_err(|e| {
            warn!(target: "probe", url = %shown, error = %e, "Response body is not JSON");
            FetchError::Parse {
                message: e.to_string(),
            }
        })?;

        let elapsed = started.elapsed();
        debug!(
            target: "probe",
            url = %shown,
            status = status,
            bytes = body.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Probe succeeded"
        );

        Ok(ProbeResponse {
            data,
            status,
            elapsed,
            bytes: body.len(),
            fetched_at: Utc::now(),
        })
    }
}
