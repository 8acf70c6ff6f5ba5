use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::{FollowUpRequest, FollowUpResponse, HealthAssistResponse, TurnRequest};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Raw body chunks of an event-stream response.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

pub const CHAT_STREAM_PATH: &str = "/chat_stream";
pub const HEALTH_ASSIST_PATH: &str = "/health-assist";
pub const FOLLOW_UP_PATH: &str = "/follow-up";

/// The remote multi-agent backend a [`crate::session::ChatSession`] talks to.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Opens the streaming endpoint. A non-success status is an error, not an
    /// empty stream.
    async fn open_stream(&self, request: &TurnRequest) -> Result<ByteStream>;

    /// The non-streaming variant of the same turn.
    async fn health_assist(&self, request: &TurnRequest) -> Result<HealthAssistResponse>;

    async fn follow_up(&self, request: &FollowUpRequest) -> Result<FollowUpResponse>;
}

/// [`Backend`] over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> Result<reqwest::Response> {
        let url = self.config.endpoint(path);
        debug!("POST {}", url);
        let response = self.client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status, body));
        }
        Ok(response)
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T> {
        let response = self.post(path, body).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn open_stream(&self, request: &TurnRequest) -> Result<ByteStream> {
        let response = self.post(CHAT_STREAM_PATH, request).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ClientError::from))
            .boxed())
    }

    async fn health_assist(&self, request: &TurnRequest) -> Result<HealthAssistResponse> {
        self.post_json(HEALTH_ASSIST_PATH, request).await
    }

    async fn follow_up(&self, request: &FollowUpRequest) -> Result<FollowUpResponse> {
        self.post_json(FOLLOW_UP_PATH, request).await
    }
}
