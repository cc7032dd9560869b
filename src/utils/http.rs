// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};

use crate::error::Result;
use crate::models::{MIN_REQUEST_INTERVAL_SECS, SourceConfig};

/// Create a configured asynchronous HTTP client.
///
/// The User-Agent carries the configured contact address, as the arXiv API
/// terms ask of automated clients.
pub fn create_client(config: &SourceConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(config.user_agent()?)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Enforces a minimum gap between successive upstream calls.
///
/// The interval never drops below [`MIN_REQUEST_INTERVAL_SECS`].
#[derive(Debug)]
pub struct RequestPacer {
    interval: Duration,
    last_call: Option<Instant>,
}

impl RequestPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_secs(MIN_REQUEST_INTERVAL_SECS)),
            last_call: None,
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(Duration::from_secs(config.request_interval_secs))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until a call is allowed, then record it as made now.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_call {
            let ready_at = last + self.interval;
            if ready_at > Instant::now() {
                log::debug!(
                    "Pacing upstream calls: waiting {:?}",
                    ready_at - Instant::now()
                );
                sleep_until(ready_at).await;
            }
        }
        self.last_call = Some(Instant::now());
    }
}
