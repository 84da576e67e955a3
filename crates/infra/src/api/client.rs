//! Backend HTTP client
//!
//! Implements the detection gateway against the remote management service.
//! Maps HTTP outcomes onto the domain error taxonomy: only `201 Created` is
//! a delivered detection; `401` is surfaced as `Unauthorized` so the worker
//! can run its single re-login retry; everything else becomes `Rejected` or
//! `Transport` and ends up in the offline store.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use roadwatch_core::{DetectionGateway, DetectionReceipt};
use roadwatch_domain::constants::HEALTH_CHECK_TIMEOUT_SECS;
use roadwatch_domain::{BackendConfig, DetectionEvent, DeviceError, Result};
use tracing::{debug, instrument};

use super::auth::AuthHeaderProvider;
use super::types::{DetectionPayload, DetectionResponse};

/// HTTP client for the detection endpoints
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    device_id: String,
    auth: Arc<dyn AuthHeaderProvider>,
    request_timeout: Duration,
    image_timeout: Duration,
}

impl BackendClient {
    /// Create a new backend client
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Config` if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig, auth: Arc<dyn AuthHeaderProvider>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| DeviceError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            device_id: config.device_id.clone(),
            auth,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            image_timeout: Duration::from_secs(config.image_timeout_secs),
        })
    }
}

#[async_trait]
impl DetectionGateway for BackendClient {
    #[instrument(skip(self, event), fields(confidence = event.confidence))]
    async fn submit_detection(&self, event: &DetectionEvent) -> Result<DetectionReceipt> {
        let headers = self.auth.auth_headers().await?;
        let payload = DetectionPayload::from_event(&self.device_id, event);

        let response = self
            .http
            .post(format!("{}/api/detections", self.base_url))
            .headers(headers)
            .timeout(self.request_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(map_transport)?;

        match response.status() {
            StatusCode::CREATED => {
                let body: DetectionResponse = response
                    .json()
                    .await
                    .map_err(|e| DeviceError::Transport(format!("invalid detection response: {e}")))?;
                debug!(detection_id = %body.id, "Detection accepted");
                Ok(DetectionReceipt { id: body.id })
            }
            StatusCode::UNAUTHORIZED => Err(DeviceError::Unauthorized(error_body(response).await)),
            status => Err(DeviceError::Rejected {
                status: status.as_u16(),
                message: error_body(response).await,
            }),
        }
    }

    async fn upload_image(&self, detection_id: &str, image_path: &Path) -> Result<()> {
        let mut headers = self.auth.auth_headers().await?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));

        let bytes = tokio::fs::read(image_path).await.map_err(|e| {
            DeviceError::Persistence(format!("failed to read image {}: {e}", image_path.display()))
        })?;

        let response = self
            .http
            .post(format!("{}/api/detections/{detection_id}/image", self.base_url))
            .headers(headers)
            .timeout(self.image_timeout)
            .body(bytes)
            .send()
            .await
            .map_err(map_transport)?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => Err(DeviceError::Unauthorized(error_body(response).await)),
            status => Err(DeviceError::Rejected {
                status: status.as_u16(),
                message: error_body(response).await,
            }),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        let headers = self.auth.auth_headers().await?;

        let response = self
            .http
            .get(format!("{}/api/health", self.base_url))
            .headers(headers)
            .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS))
            .send()
            .await
            .map_err(map_transport)?;

        Ok(response.status().is_success())
    }
}

fn map_transport(e: reqwest::Error) -> DeviceError {
    if e.is_timeout() {
        DeviceError::Transport(format!("request timed out: {e}"))
    } else {
        DeviceError::Transport(format!("request failed: {e}"))
    }
}

/// Best-effort error body for diagnostics, kept short for the stats snapshot
async fn error_body(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(text) if !text.is_empty() => text.chars().take(200).collect(),
        _ => "no response body".to_string(),
    }
}
