//! reqwest-backed [`Exchange`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use tracing::debug;

use crate::config::TransportConfig;

use super::{Exchange, ExchangeError, ExchangeRequest, TransportError};

#[derive(Debug, Clone)]
struct ClientSettings {
    request_timeout: Duration,
    max_idle_per_host: usize,
    idle_lifetime: Duration,
    max_lifetime: Duration,
}

#[derive(Debug)]
struct PooledClient {
    client: Client,
    built_at: Instant,
}

/// Connection-pooled HTTP exchange.
///
/// reqwest only bounds idle time, so the whole client (and with it every
/// pooled socket) is replaced once it reaches the max connection lifetime.
#[derive(Debug)]
pub struct ReqwestExchange {
    settings: ClientSettings,
    current: RwLock<PooledClient>,
}

impl ReqwestExchange {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let settings = ClientSettings {
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            max_idle_per_host: config.max_connections,
            idle_lifetime: Duration::from_secs(config.idle_connection_secs),
            max_lifetime: Duration::from_secs(config.max_connection_secs),
        };
        let client =
            build_client(&settings).map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self {
            settings,
            current: RwLock::new(PooledClient {
                client,
                built_at: Instant::now(),
            }),
        })
    }

    fn client(&self) -> Result<Client, ExchangeError> {
        {
            let current = self.current.read();
            if current.built_at.elapsed() < self.settings.max_lifetime {
                return Ok(current.client.clone());
            }
        }

        let mut current = self.current.write();
        // Another caller may have rebuilt it while we waited for the lock.
        if current.built_at.elapsed() >= self.settings.max_lifetime {
            debug!(
                age_secs = current.built_at.elapsed().as_secs(),
                "Recycling HTTP connection pool"
            );
            let client = build_client(&self.settings)
                .map_err(|e| ExchangeError::Other(format!("failed to rebuild client: {}", e)))?;
            *current = PooledClient {
                client,
                built_at: Instant::now(),
            };
        }
        Ok(current.client.clone())
    }
}

fn build_client(settings: &ClientSettings) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(settings.request_timeout)
        .pool_idle_timeout(settings.idle_lifetime)
        .pool_max_idle_per_host(settings.max_idle_per_host)
        .gzip(true)
        .no_proxy()
        .build()
}

fn classify(e: reqwest::Error) -> ExchangeError {
    if e.is_timeout() {
        ExchangeError::Timeout
    } else if e.is_connect() {
        ExchangeError::Connect(e.to_string())
    } else {
        ExchangeError::Other(e.to_string())
    }
}

#[async_trait]
impl Exchange for ReqwestExchange {
    async fn execute(
        &self,
        request: ExchangeRequest<'_>,
        body: &mut Vec<u8>,
    ) -> Result<u16, ExchangeError> {
        let client = self.client()?;

        let mut response = client
            .request(request.method.clone(), request.url)
            .headers(request.headers.clone())
            .body(request.body.to_owned())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            body.extend_from_slice(&chunk);
        }
        Ok(status)
    }
}
