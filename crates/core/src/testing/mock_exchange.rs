//! Mock HTTP exchange for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::transport::{Exchange, ExchangeError, ExchangeRequest, Method};

/// Scripted result of one attempt.
#[derive(Debug, Clone)]
pub struct MockOutcome {
    result: Result<(u16, Vec<u8>), ExchangeError>,
    delay: Duration,
}

impl MockOutcome {
    /// HTTP 200 with the given body.
    pub fn ok(body: &[u8]) -> Self {
        Self {
            result: Ok((200, body.to_vec())),
            delay: Duration::ZERO,
        }
    }

    /// Any status with an empty body.
    pub fn status(status: u16) -> Self {
        Self {
            result: Ok((status, Vec::new())),
            delay: Duration::ZERO,
        }
    }

    pub fn connect_error() -> Self {
        Self {
            result: Err(ExchangeError::Connect("connection refused".to_string())),
            delay: Duration::ZERO,
        }
    }

    pub fn timeout() -> Self {
        Self {
            result: Err(ExchangeError::Timeout),
            delay: Duration::ZERO,
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: String,
    pub started_at: Instant,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Decoded `key=value` pairs of a form body, in order.
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        self.body
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(k), decode(v))
            })
            .collect()
    }

    pub fn form_value(&self, key: &str) -> Option<String> {
        self.form_pairs()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

fn decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// Mock implementation of the Exchange trait.
///
/// Provides controllable behavior for testing:
/// - Queue outcomes per URL, consumed one per attempt
/// - Sticky outcomes answering every attempt once the queue is empty
/// - Record every request and the order in which URLs completed
///
/// An attempt with nothing scripted fails with a connection error.
///
/// # Example
///
/// ```rust,ignore
/// let mock = MockExchange::new();
/// mock.push(url, MockOutcome::connect_error());
/// mock.push(url, MockOutcome::ok(b"{}"));
///
/// let transport = TransportClient::new(mock, &TransportConfig::default());
/// let body = transport.send(&ctx, Method::POST, url, "", &[]).await?;
/// assert_eq!(transport.exchange().calls(url), 2);
/// ```
#[derive(Debug, Default)]
pub struct MockExchange {
    queued: Mutex<HashMap<String, VecDeque<MockOutcome>>>,
    sticky: Mutex<HashMap<String, MockOutcome>>,
    recorded: Mutex<Vec<RecordedRequest>>,
    completed: Mutex<Vec<String>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for the next attempt against `url`.
    pub fn push(&self, url: &str, outcome: MockOutcome) {
        self.queued
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(outcome);
    }

    /// Answer every otherwise unscripted attempt against `url` with `outcome`.
    pub fn always(&self, url: &str, outcome: MockOutcome) {
        self.sticky.lock().insert(url.to_string(), outcome);
    }

    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.recorded.lock().clone()
    }

    pub fn recorded_for(&self, url: &str) -> Vec<RecordedRequest> {
        self.recorded
            .lock()
            .iter()
            .filter(|r| r.url == url)
            .cloned()
            .collect()
    }

    /// Number of attempts made against `url`.
    pub fn calls(&self, url: &str) -> usize {
        self.recorded.lock().iter().filter(|r| r.url == url).count()
    }

    /// URLs in the order their attempts finished.
    pub fn completion_order(&self) -> Vec<String> {
        self.completed.lock().clone()
    }

    fn next_outcome(&self, url: &str) -> MockOutcome {
        if let Some(outcome) = self.queued.lock().get_mut(url).and_then(|q| q.pop_front()) {
            return outcome;
        }
        self.sticky.lock().get(url).cloned().unwrap_or_else(|| MockOutcome {
            result: Err(ExchangeError::Connect(format!("nothing scripted for {}", url))),
            delay: Duration::ZERO,
        })
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn execute(
        &self,
        request: ExchangeRequest<'_>,
        body: &mut Vec<u8>,
    ) -> Result<u16, ExchangeError> {
        self.recorded.lock().push(RecordedRequest {
            method: request.method.clone(),
            url: request.url.to_string(),
            headers: request.headers.clone(),
            body: request.body.to_string(),
            started_at: Instant::now(),
        });

        let outcome = self.next_outcome(request.url);
        if !outcome.delay.is_zero() {
            tokio::time::sleep(outcome.delay).await;
        }
        self.completed.lock().push(request.url.to_string());

        let (status, payload) = outcome.result?;
        body.extend_from_slice(&payload);
        Ok(status)
    }
}
