//! Subscribe transport: one HTTP read to seed, then WebSocket push.
//!
//! The server sends the full document as a JSON text frame when the
//! subscription opens and again after every write.

use async_trait::async_trait;
use futures::StreamExt;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::http::HttpStore;
use super::{RemoteSnapshot, RemoteStore, SnapshotStream, StoreError};
use crate::api::{ScheduleDocument, SUBSCRIBE_PATH};
use crate::models::{ScheduleMap, Version};

/// Remote store whose changes are pushed by the server.
#[derive(Debug, Clone)]
pub struct PushStore {
    http: HttpStore,
}

impl PushStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: HttpStore::new(base_url),
        }
    }

    /// Builds the subscription URL, converting http(s) to ws(s) if needed.
    pub fn subscribe_url(&self) -> String {
        let server_url = self.http.base_url().trim_end_matches('/');
        let base_url = if let Some(rest) = server_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else if let Some(rest) = server_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if !server_url.starts_with("ws://") && !server_url.starts_with("wss://") {
            format!("ws://{}", server_url)
        } else {
            server_url.to_string()
        };

        format!("{}{}", base_url, SUBSCRIBE_PATH)
    }
}

fn parse_document(text: &str) -> Result<RemoteSnapshot, StoreError> {
    let doc: ScheduleDocument =
        serde_json::from_str(text).map_err(|e| StoreError::Decode(e.to_string()))?;
    Ok(RemoteSnapshot {
        schedules: doc.schedules,
        version: doc.last_updated,
    })
}

#[async_trait]
impl RemoteStore for PushStore {
    async fn fetch_all(&self) -> Result<RemoteSnapshot, StoreError> {
        self.http.fetch_all().await
    }

    async fn save_all(&self, schedules: &ScheduleMap) -> Result<Version, StoreError> {
        self.http.save_all(schedules).await
    }

    async fn watch(&self) -> Result<SnapshotStream, StoreError> {
        let url = self.subscribe_url();
        let (ws_stream, _) = connect_async(&url)
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        tracing::debug!("Subscribed to {}", url);

        let stream = ws_stream
            .take_while(|msg| futures::future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| async move {
                match msg {
                    Ok(Message::Text(text)) => Some(parse_document(text.as_str())),
                    // Pings are answered by the transport; binary frames are not ours
                    Ok(_) => None,
                    Err(e) => Some(Err(StoreError::Subscription(e.to_string()))),
                }
            });

        Ok(stream.boxed())
    }

    fn describe(&self) -> String {
        format!("subscribe {}", self.subscribe_url())
    }
}
