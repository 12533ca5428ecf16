//! The HTTP transport boundary.
//!
//! # Design
//! `Transport` is the single capability the dispatcher needs: send one
//! `HttpRequest`, get back an `HttpResponse` or fail. Status codes are never
//! errors at this layer; interpreting them is the dispatcher's job.
//!
//! `UreqTransport` is the default implementation. ureq is a blocking
//! client, so each call runs on tokio's blocking pool and the async caller
//! just awaits the join handle. Cancellation is whatever the caller does to
//! the awaiting future; the blocking call itself runs to completion.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::trace;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// Sends one request and returns the raw response.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        (**self).send(request)
    }
}

/// Settings for a `UreqTransport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Upper bound for the whole call. `None` leaves it to the OS.
    pub timeout: Option<Duration>,
    pub max_redirects: u32,
    /// Largest response body read into memory. `None` (the default) reads
    /// bodies of any size; ureq on its own stops at 10 MiB. A larger body
    /// fails the call with `TransportError::Request`.
    pub max_body_size: Option<u64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            max_redirects: 10,
            max_body_size: None,
        }
    }
}

static SHARED_AGENT: OnceLock<ureq::Agent> = OnceLock::new();

/// `Transport` backed by a `ureq::Agent`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    max_body_size: Option<u64>,
}

impl UreqTransport {
    /// Handle to the process-wide agent, created on first use with the
    /// default `TransportConfig`. Handles share one connection pool.
    pub fn shared() -> Self {
        let config = TransportConfig::default();
        let agent = SHARED_AGENT.get_or_init(|| build_agent(&config));
        Self {
            agent: agent.clone(),
            max_body_size: config.max_body_size,
        }
    }

    /// Transport with its own agent and connection pool.
    pub fn with_config(config: TransportConfig) -> Self {
        Self {
            agent: build_agent(&config),
            max_body_size: config.max_body_size,
        }
    }

    /// Wrap an existing agent, with no response body limit. The agent must
    /// be configured with `http_status_as_error(false)`, otherwise 4xx/5xx
    /// responses surface as transport errors instead of reaching status
    /// classification.
    pub fn from_agent(agent: ureq::Agent) -> Self {
        Self {
            agent,
            max_body_size: None,
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::shared()
    }
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport")
            .field("max_body_size", &self.max_body_size)
            .finish_non_exhaustive()
    }
}

impl Transport for UreqTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        let limit = self.max_body_size.unwrap_or(u64::MAX);
        tokio::task::spawn_blocking(move || execute(&agent, request, limit)).await?
    }
}

fn build_agent(config: &TransportConfig) -> ureq::Agent {
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(config.timeout)
        .max_redirects(config.max_redirects)
        .build()
        .new_agent()
}

/// Run `request` on `agent`, returning 4xx/5xx responses as data.
fn execute(
    agent: &ureq::Agent,
    request: HttpRequest,
    body_limit: u64,
) -> Result<HttpResponse, TransportError> {
    let mut builder = ureq::http::Request::builder()
        .method(request.method.as_str())
        .uri(request.url.as_str());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(directive) = request.cache.cache_control() {
        if request.header("cache-control").is_none() {
            builder = builder.header("cache-control", directive);
        }
    }

    let mut response = match request.body {
        Some(body) => agent.run(builder.body(body)?)?,
        None => agent.run(builder.body(())?)?,
    };

    let status = response.status().as_u16();
    let headers = header_pairs(response.headers());
    let body = response
        .body_mut()
        .with_config()
        .limit(body_limit)
        .read_to_vec()?;
    trace!(status, bytes = body.len(), "transport response");

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

/// Flatten a header map in wire order. Values that are not UTF-8 are kept,
/// with invalid bytes replaced by U+FFFD.
fn header_pairs(headers: &ureq::http::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}
