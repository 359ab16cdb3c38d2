use crate::config::HttpConfig;
use crate::error::FetchError;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Blocking GET. Season pages and odds exports are the only network inputs.
pub trait HttpFetcher: Send + Sync {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let bytes = self.get(url)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Exponential backoff bounds for transport retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(http: &HttpConfig) -> Self {
        Self {
            max_retries: http.max_retries,
            initial_delay: Duration::from_millis(http.initial_backoff_ms),
            max_delay: Duration::from_millis(http.max_backoff_ms),
            multiplier: 2.0,
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(delay_ms as u64).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or retries run out.
pub fn retry<T, F>(policy: &RetryPolicy, operation_name: &str, mut operation: F) -> Result<T, FetchError>
where
    F: FnMut() -> Result<T, FetchError>,
{
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{} succeeded after {} retries", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation_name,
                    attempt + 1,
                    policy.max_retries + 1,
                    e,
                    delay
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

pub struct ReqwestFetcher {
    client: Client,
    user_agent: String,
    policy: RetryPolicy,
}

impl ReqwestFetcher {
    pub fn new(http: &HttpConfig) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(http.timeout()).gzip(true).build()?;
        Ok(Self {
            client,
            user_agent: http.user_agent.clone(),
            policy: RetryPolicy::from_config(http),
        })
    }

    fn get_once(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent.as_str())
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp.bytes()?.to_vec())
    }
}

impl HttpFetcher for ReqwestFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let t0 = std::time::Instant::now();
        let bytes = retry(&self.policy, url, || self.get_once(url))?;
        metrics::histogram!("footy_fetch_duration_seconds").record(t0.elapsed().as_secs_f64());
        metrics::histogram!("footy_fetch_payload_bytes").record(bytes.len() as f64);
        debug!(url, bytes = bytes.len(), "fetched");
        Ok(bytes)
    }
}

/// Serves canned bodies by URL and counts requests. Used for offline runs and tests.
#[derive(Default)]
pub struct StaticFetcher {
    bodies: HashMap<String, Vec<u8>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits
            .lock()
            .map(|h| h.get(url).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl HttpFetcher for StaticFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if let Ok(mut hits) = self.hits.lock() {
            *hits.entry(url.to_string()).or_insert(0) += 1;
        }
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}
