//! Pooled, retrying HTTP transport.
//!
//! [`TransportClient::send`] performs one logical request: it borrows scratch
//! buffers from a [`ScratchPool`], applies baseline and caller headers, and
//! retries transport-level failures with exponential backoff. A single
//! network attempt is delegated to an [`Exchange`], which is reqwest in
//! production and a scripted mock in tests.

mod pool;
mod reqwest_exchange;

pub use pool::{PooledScratch, Scratch, ScratchPool};
pub use reqwest::Method;
pub use reqwest_exchange::ReqwestExchange;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_ENCODING, CONNECTION};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::TransportConfig;
use crate::context::{Context, ContextError};

/// Backoff before the second attempt; doubles for every later one.
pub const BASE_BACKOFF: Duration = Duration::from_millis(100);

/// Failure of a single network attempt.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    #[error("attempt timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),
}

/// Failure of a whole `send` call.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The caller's context was already done; nothing was sent.
    #[error("request not started: {0}")]
    ContextDone(#[from] ContextError),

    /// The context deadline passed while the call was in flight.
    #[error("request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("unexpected status code: {status}")]
    Status { status: u16 },

    #[error("request failed after {attempts} retries: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

/// One network attempt as seen by an [`Exchange`].
#[derive(Debug, Clone, Copy)]
pub struct ExchangeRequest<'a> {
    pub method: &'a Method,
    pub url: &'a str,
    pub headers: &'a HeaderMap,
    pub body: &'a str,
}

/// Performs a single HTTP attempt.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Send `request`, append the response body to `body`, return the status.
    async fn execute(
        &self,
        request: ExchangeRequest<'_>,
        body: &mut Vec<u8>,
    ) -> Result<u16, ExchangeError>;
}

#[async_trait]
impl<E: Exchange + ?Sized> Exchange for std::sync::Arc<E> {
    async fn execute(
        &self,
        request: ExchangeRequest<'_>,
        body: &mut Vec<u8>,
    ) -> Result<u16, ExchangeError> {
        (**self).execute(request, body).await
    }
}

pub struct TransportClient<E = ReqwestExchange> {
    exchange: E,
    pool: ScratchPool,
    max_retries: u32,
    request_timeout: Duration,
    base_backoff: Duration,
}

impl TransportClient<ReqwestExchange> {
    /// Production transport. Fails if the HTTP client cannot be built.
    pub fn from_config(config: &TransportConfig) -> Result<Self, TransportError> {
        let exchange = ReqwestExchange::new(config)?;
        Ok(Self::new(exchange, config))
    }
}

impl<E: Exchange> TransportClient<E> {
    pub fn new(exchange: E, config: &TransportConfig) -> Self {
        Self {
            exchange,
            pool: ScratchPool::new(config.max_connections),
            max_retries: config.max_retries,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            base_backoff: BASE_BACKOFF,
        }
    }

    /// Override the per-attempt timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn pool(&self) -> &ScratchPool {
        &self.pool
    }

    /// Delay after failed attempt `attempt` (0-based): `base * 2^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Send one request, retrying transport failures.
    ///
    /// Each attempt is bounded by the request timeout; an attempt that runs
    /// out of time is retried like any other transport failure. A context
    /// deadline bounds the whole call, backoff included.
    /// Only HTTP 200 is a success; any other status ends the call at once.
    /// The returned body is owned by the caller and independent of the pool.
    pub async fn send(
        &self,
        ctx: &Context,
        method: Method,
        url: &str,
        payload: &str,
        headers: &[(String, String)],
    ) -> Result<Vec<u8>, TransportError> {
        if let Some(err) = ctx.err() {
            return Err(TransportError::ContextDone(err));
        }

        let mut scratch = self.pool.acquire();
        scratch
            .headers
            .insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        scratch
            .headers
            .insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        for (name, value) in headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| TransportError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            scratch.headers.insert(header_name, header_value);
        }

        let attempts = self.attempt(&method, url, payload, &mut scratch);
        let Some(timeout) = ctx.remaining() else {
            return attempts.await;
        };
        match tokio::time::timeout(timeout, attempts).await {
            Ok(result) => result,
            Err(_) => {
                warn!(url = url, ?timeout, "Context deadline reached mid-request");
                Err(TransportError::Timeout { timeout })
            }
        }
    }

    async fn attempt(
        &self,
        method: &Method,
        url: &str,
        payload: &str,
        scratch: &mut Scratch,
    ) -> Result<Vec<u8>, TransportError> {
        let Scratch { headers, body } = scratch;
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            body.clear();
            let request = ExchangeRequest {
                method,
                url,
                headers,
                body: payload,
            };

            let exchange = self.exchange.execute(request, body);
            let outcome = match tokio::time::timeout(self.request_timeout, exchange).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ExchangeError::Timeout),
            };

            match outcome {
                Ok(200) => {
                    debug!(url = url, attempt = attempt, bytes = body.len(), "Request succeeded");
                    return Ok(body.to_vec());
                }
                Ok(status) => {
                    debug!(url = url, status = status, "Request rejected");
                    return Err(TransportError::Status { status });
                }
                Err(e) => {
                    warn!(url = url, attempt = attempt, error = %e, "Request attempt failed");
                    last_error = Some(e);
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(self.backoff(attempt)).await;
                    }
                }
            }
        }

        Err(TransportError::RetriesExhausted {
            attempts: self.max_retries,
            last: last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string()),
        })
    }
}
