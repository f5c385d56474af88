//! HTTP client for the external AI service.
//!
//! The gateway only starts jobs and asks about them; the service owns task
//! state. Successful answers are relayed verbatim (status + JSON body).

use std::path::Path;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fusedchat_proto::protocol::HealthReport;
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{debug, warn};

use crate::credentials::Credentials;
use crate::error::{GatewayError, GatewayResult};

const START_FAILED: &str = "Failed to start podcast generation.";
const STATUS_FAILED: &str = "Failed to get podcast status.";

/// Body of `POST {service}/generate_podcast`.
#[derive(Debug, Serialize)]
pub struct PodcastJob<'a> {
    pub file_path: String,
    pub document_name: &'a str,
    pub api_keys: &'a Credentials,
}

impl<'a> PodcastJob<'a> {
    pub fn new(file_path: &Path, document_name: &'a str, api_keys: &'a Credentials) -> Self {
        Self {
            file_path: file_path.to_string_lossy().into_owned(),
            document_name,
            api_keys,
        }
    }
}

/// An upstream answer passed through unchanged.
#[derive(Debug, Clone)]
pub struct Relayed {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

impl IntoResponse for Relayed {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[derive(Debug, Clone)]
pub struct AiServiceClient {
    base_url: Url,
    client: Client,
}

impl AiServiceClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("AI service URL {} cannot be used as a base", base_url);
        }
        Ok(Self {
            base_url,
            client: Client::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            // Each segment is percent-encoded, so a task id cannot climb
            // into other service routes.
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub async fn generate_podcast(&self, job: &PodcastJob<'_>) -> GatewayResult<Relayed> {
        let url = self.endpoint(&["generate_podcast"]);
        debug!("POST {} for {:?}", url, job.document_name);
        let response = self
            .client
            .post(url)
            .json(job)
            .send()
            .await
            .map_err(|e| transport(e, START_FAILED))?;
        relay(response, START_FAILED).await
    }

    pub async fn podcast_status(&self, task_id: &str) -> GatewayResult<Relayed> {
        let url = self.endpoint(&["podcast_status", task_id]);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport(e, STATUS_FAILED))?;
        relay(response, STATUS_FAILED).await
    }

    /// `GET {service}/health`; Ok only for a 200 whose body says `ok`.
    pub async fn health(&self, timeout: Duration) -> anyhow::Result<HealthReport> {
        let response = self
            .client
            .get(self.endpoint(&["health"]))
            .timeout(timeout)
            .send()
            .await?;
        let status = response.status();
        let report: HealthReport = response.json().await?;
        if !status.is_success() || !report.is_ok() {
            anyhow::bail!(
                "AI service responded {} with status {:?}: {}",
                status,
                report.status,
                report.message.unwrap_or_default()
            );
        }
        Ok(report)
    }
}

fn transport(err: reqwest::Error, message: &str) -> GatewayError {
    warn!("AI service unreachable: {}", err);
    GatewayError::Transport {
        message: message.to_string(),
        source: err,
    }
}

async fn relay(response: reqwest::Response, fallback: &str) -> GatewayResult<Relayed> {
    let status = StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport(e, fallback))?;
    let body = serde_json::from_slice::<serde_json::Value>(&bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()));

    if status.is_success() {
        return Ok(Relayed { status, body });
    }

    warn!("AI service returned {}: {}", status, body);
    let message = body
        .get("error")
        .and_then(|e| e.as_str())
        .filter(|m| !m.is_empty())
        .unwrap_or(fallback)
        .to_string();
    Err(GatewayError::Upstream { status, message })
}
