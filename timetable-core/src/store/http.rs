//! Poll transport over the `/api/schedules` HTTP endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{RemoteSnapshot, RemoteStore, SnapshotStream, StoreError};
use crate::api::{ErrorResponse, SaveRequest, SaveResponse, SchedulesResponse, SCHEDULES_PATH};
use crate::models::{ScheduleMap, Version};

/// Default interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Remote store reached over plain HTTP, watched by polling.
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    client: reqwest::Client,
    poll_interval: Duration,
}

impl HttpStore {
    /// Creates a store for a server base URL such as `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of the schedules resource.
    pub fn endpoint(&self) -> String {
        build_http_url(&self.base_url, SCHEDULES_PATH)
    }

    async fn fetch_with(
        client: &reqwest::Client,
        url: &str,
        bust_cache: bool,
    ) -> Result<RemoteSnapshot, StoreError> {
        let mut request = client.get(url);
        if bust_cache {
            request = request
                .query(&[("t", Utc::now().timestamp_millis())])
                .header(reqwest::header::CACHE_CONTROL, "no-cache");
        }

        let response = request.send().await.map_err(map_transport_error)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: SchedulesResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        if !body.success {
            return Err(StoreError::Internal("Server reported failure".to_string()));
        }

        Ok(RemoteSnapshot {
            schedules: body.schedules,
            version: body.last_updated,
        })
    }
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn fetch_all(&self) -> Result<RemoteSnapshot, StoreError> {
        Self::fetch_with(&self.client, &self.endpoint(), false).await
    }

    async fn save_all(&self, schedules: &ScheduleMap) -> Result<Version, StoreError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&SaveRequest {
                schedules: schedules.clone(),
            })
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: SaveResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        if !body.success {
            return Err(StoreError::Internal("Save failed".to_string()));
        }

        Ok(body.last_updated)
    }

    /// Polls every `poll_interval`, starting one interval from now since the
    /// caller has just fetched.
    async fn watch(&self) -> Result<SnapshotStream, StoreError> {
        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let client = self.client.clone();
        let url = self.endpoint();

        let stream = futures::stream::unfold((client, url, ticker), |(client, url, mut ticker)| async move {
            ticker.tick().await;
            let result = Self::fetch_with(&client, &url, true).await;
            Some((result, (client, url, ticker)))
        });

        Ok(stream.boxed())
    }

    fn describe(&self) -> String {
        format!("poll {} every {}ms", self.base_url, self.poll_interval.as_millis())
    }
}

/// Joins a base URL and an absolute path, adding `http://` to bare hosts.
pub(crate) fn build_http_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{}{}", base, path)
    } else if let Some(rest) = base.strip_prefix("ws://") {
        format!("http://{}{}", rest, path)
    } else if let Some(rest) = base.strip_prefix("wss://") {
        format!("https://{}{}", rest, path)
    } else {
        format!("http://{}{}", base, path)
    }
}

fn map_transport_error(e: reqwest::Error) -> StoreError {
    if e.is_decode() {
        StoreError::Decode(e.to_string())
    } else {
        StoreError::Unreachable(e.to_string())
    }
}

/// Turns a non-success response into the matching error, preferring the
/// server's own `error` message.
async fn error_from_response(response: reqwest::Response) -> StoreError {
    let status = response.status().as_u16();
    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => format!("HTTP {}", status),
    };

    if status == 503 || message.contains("not configured") {
        StoreError::Unconfigured(message)
    } else if status == 400 {
        StoreError::BadRequest(message)
    } else if status == 500 {
        StoreError::Internal(message)
    } else {
        StoreError::Http { status, message }
    }
}
