// HTTP client with bounded retry for idempotent reads

use super::error::{extract_error_message, ApiError};
use log::{error, warn};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use url::Url;

const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Start calls may do initial work server-side before returning, so their
/// timeout has to exceed plausible end-to-end duration. Status reads return
/// quickly regardless of job progress and get a much shorter one.
const START_TIMEOUT: Duration = Duration::from_secs(300);
const READ_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub start_timeout: Duration,
    pub read_timeout: Duration,
    /// Total attempts for an idempotent read, including the first.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            start_timeout: START_TIMEOUT,
            read_timeout: READ_TIMEOUT,
            max_retries: MAX_RETRIES,
            retry_base_delay: RETRY_BASE_DELAY,
        }
    }
}

impl ClientConfig {
    /// Reads `FAB_API_BASE_URL`, falling back to the local default.
    pub fn from_env() -> Self {
        let base_url = match std::env::var("FAB_API_BASE_URL") {
            Ok(raw) => match Url::parse(&raw) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Ignoring invalid FAB_API_BASE_URL {:?}: {}", raw, e);
                    default_base_url()
                }
            },
            Err(_) => default_base_url(),
        };

        Self {
            base_url,
            ..Self::default()
        }
    }
}

fn default_base_url() -> Url {
    // Statically known constant.
    Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid")
}

pub struct ApiClient {
    agent: ureq::Agent,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn join(&self, path: &str) -> Result<Url, ApiError> {
        self.config.base_url.join(path).map_err(|e| ApiError::Invalid {
            status: 0,
            message: format!("invalid request path {:?}: {}", path, e),
        })
    }

    /// Idempotent GET, retried on transient failures with exponential
    /// backoff.
    pub(crate) async fn get_json<T: DeserializeOwned + Send + 'static>(
        &self,
        path: &str,
    ) -> Result<T, ApiError> {
        let url = self.join(path)?;
        retry_idempotent(
            self.config.max_retries,
            self.config.retry_base_delay,
            path,
            || self.execute(url.clone(), None, self.config.read_timeout),
        )
        .await
    }

    /// State-changing POST. Never auto-retried, to avoid duplicate side
    /// effects; callers own any retry policy.
    pub(crate) async fn post_json<T: DeserializeOwned + Send + 'static>(
        &self,
        path: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<T, ApiError> {
        let url = self.join(path)?;
        match self.execute(url, Some(body), timeout).await {
            Ok(value) => Ok(value),
            Err(err) => {
                error!("[api] POST {} failed: {}", path, err);
                Err(err)
            }
        }
    }

    async fn execute<T: DeserializeOwned + Send + 'static>(
        &self,
        url: Url,
        body: Option<serde_json::Value>,
        timeout: Duration,
    ) -> Result<T, ApiError> {
        let agent = self.agent.clone();

        // ureq is blocking, body reads included; keep the whole exchange off
        // the async executor threads.
        tokio::task::spawn_blocking(move || {
            let method = if body.is_some() { "POST" } else { "GET" };
            let request = agent.request_url(method, &url).timeout(timeout);
            let outcome = match body {
                Some(json) => request.send_json(json),
                None => request.call(),
            };

            match outcome {
                Ok(response) => response
                    .into_json::<T>()
                    .map_err(|e| ApiError::transient(format!("failed to decode response: {}", e))),
                Err(ureq::Error::Status(status, response)) => {
                    let body = response.into_string().unwrap_or_default();
                    Err(ApiError::from_status(status, extract_error_message(&body, status)))
                }
                Err(ureq::Error::Transport(transport)) => {
                    Err(ApiError::transient(format!("network error: {}", transport)))
                }
            }
        })
        .await
        .map_err(|e| ApiError::transient(format!("request task failed: {}", e)))?
    }
}

/// Runs an idempotent operation up to `max_attempts` times. The k-th retry is
/// delayed by `base_delay * 2^(k-1)`; non-transient errors propagate
/// immediately. Every retry and every terminal failure is logged - without
/// that, a silent hang and a silent failure look identical on multi-minute
/// jobs.
pub(crate) async fn retry_idempotent<T, F, Fut>(
    max_attempts: u32,
    base_delay: Duration,
    label: &str,
    mut op: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = base_delay * 2u32.pow(attempt - 1);
                warn!(
                    "[api] {} failed ({}), retrying in {:?} ({}/{})",
                    label,
                    err,
                    delay,
                    attempt,
                    max_attempts - 1
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                error!("[api] {} failed after {} attempt(s): {}", label, attempt, err);
                return Err(err);
            }
        }
    }
}
