//! Per-host politeness limits and a retrying HTTP transport.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::Url;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::config::{
    MAX_RETRIES, PER_HOST_CONCURRENCY, REQUEST_TIMEOUT_SECS, RETRY_BASE_DELAY_MS, USER_AGENT,
};
use crate::registry::error::RegistryError;

/// Origin timeout. Never retried here; the npm client escalates it to a
/// run-aborting failure.
const ORIGIN_TIMEOUT: u16 = 524;

/// HTTP client that caps in-flight requests per hostname and retries
/// transient failures with jittered exponential backoff.
///
/// One semaphore is created lazily per distinct hostname and shared for the
/// rest of the run, so the cap applies regardless of how many packages are
/// being checked concurrently.
pub struct PoliteClient {
    client: reqwest::Client,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
    per_host: usize,
}

impl PoliteClient {
    pub fn new() -> Self {
        Self::with_per_host(PER_HOST_CONCURRENCY)
    }

    pub fn with_per_host(per_host: usize) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to create HTTP client"),
            hosts: Mutex::new(HashMap::new()),
            per_host,
        }
    }

    fn limiter(&self, host: &str) -> Arc<Semaphore> {
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host)))
            .clone()
    }

    /// GET a JSON document. `Ok(None)` means HTTP 404.
    ///
    /// Connection failures, timeouts, and 5xx responses are retried up to
    /// [`MAX_RETRIES`] attempts; other client errors and HTTP 524 fail
    /// immediately. The per-host permit is held across retries so a flaky
    /// host is never hammered harder than a healthy one.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>, RegistryError> {
        let parsed = Url::parse(url)
            .map_err(|e| RegistryError::Parse(format!("invalid url {url}: {e}")))?;
        let host = parsed.host_str().unwrap_or_default().to_string();
        let limiter = self.limiter(&host);
        let _permit = limiter.acquire().await.map_err(|_| RegistryError::Fetch {
            message: format!("request queue for {host} closed"),
            status: None,
        })?;

        let mut last_error = RegistryError::Fetch {
            message: format!("{url}: no attempt made"),
            status: None,
        };

        for attempt in 1..=MAX_RETRIES {
            match self.client.get(parsed.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Ok(None);
                    }
                    if status.is_success() {
                        return match response.json::<T>().await {
                            Ok(document) => Ok(Some(document)),
                            Err(e) => Err(RegistryError::Parse(format!("{url}: {e}"))),
                        };
                    }
                    let error = RegistryError::Fetch {
                        message: format!("{url} returned {status}"),
                        status: Some(status.as_u16()),
                    };
                    if status.as_u16() == ORIGIN_TIMEOUT || !status.is_server_error() {
                        return Err(error);
                    }
                    last_error = error;
                }
                Err(e) => {
                    last_error = RegistryError::from(e);
                }
            }

            if attempt < MAX_RETRIES {
                let delay = backoff_delay(attempt);
                warn!(
                    "GET {} failed ({}), attempt {}/{}, retrying in {:?}",
                    url, last_error, attempt, MAX_RETRIES, delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error)
    }
}

impl Default for PoliteClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Exponential backoff with clock-derived jitter so concurrent retries
/// against the same host spread out.
fn backoff_delay(attempt: usize) -> Duration {
    let base = RETRY_BASE_DELAY_MS << (attempt - 1);
    let jitter = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()) % RETRY_BASE_DELAY_MS)
        .unwrap_or(0);
    Duration::from_millis(base + jitter)
}
