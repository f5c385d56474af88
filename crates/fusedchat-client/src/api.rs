//! Client for the gateway's podcast endpoints.

use async_trait::async_trait;
use fusedchat_proto::protocol::{GenerateRequest, StartedTask};
use fusedchat_proto::task::StatusReport;
use reqwest::{Client, Url};
use thiserror::Error;
use tracing::debug;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx answer; `message` is the gateway's `{message}` if it sent one.
    #[error("gateway returned {status}: {}", message.as_deref().unwrap_or("no message"))]
    Http { status: u16, message: Option<String> },

    #[error("could not reach gateway: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to get a task ID from the server.")]
    MissingTaskId,

    #[error("unexpected response from gateway: {0}")]
    Decode(String),

    #[error("invalid gateway URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Text for the user: the relayed server message when there is one,
    /// `fallback` otherwise.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Http {
                message: Some(message),
                ..
            } if !message.is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

/// Source of task status answers for the poller.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn task_status(&self, task_id: &str) -> Result<StatusReport, ApiError>;
}

/// Everything the chat controller needs from the backend.
#[async_trait]
pub trait PodcastApi: StatusSource {
    async fn generate_podcast(
        &self,
        server_filename: &str,
        document_name: &str,
    ) -> Result<StartedTask, ApiError>;
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: Url,
    user_id: String,
    client: Client,
}

impl GatewayClient {
    pub fn new(base_url: &str, user_id: impl Into<String>) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            base_url,
            user_id: user_id.into(),
            client: Client::new(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        // Error bodies are best effort: a proxy may answer with plain text.
        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("message")?.as_str().map(str::to_string));
        Err(ApiError::Http {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl StatusSource for GatewayClient {
    async fn task_status(&self, task_id: &str) -> Result<StatusReport, ApiError> {
        let url = self.endpoint(&["api", "podcast", "status", task_id]);
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(USER_ID_HEADER, &self.user_id)
            .send()
            .await?;
        let body = Self::read_json(response).await?;
        serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PodcastApi for GatewayClient {
    async fn generate_podcast(
        &self,
        server_filename: &str,
        document_name: &str,
    ) -> Result<StartedTask, ApiError> {
        let url = self.endpoint(&["api", "podcast", "generate"]);
        debug!("POST {} for {:?}", url, document_name);
        let response = self
            .client
            .post(url)
            .header(USER_ID_HEADER, &self.user_id)
            .json(&GenerateRequest::new(server_filename, document_name))
            .send()
            .await?;
        let body = Self::read_json(response).await?;
        let task_id = body
            .get("task_id")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .ok_or(ApiError::MissingTaskId)?;
        Ok(StartedTask {
            task_id: task_id.to_string(),
            status: body
                .get("status")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }
}
