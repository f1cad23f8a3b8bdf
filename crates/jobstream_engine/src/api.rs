use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use jobstream_core::Manifest;
use jobstream_logging::{job_debug, job_info};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use url::Url;

use crate::backend::ByteStream;
use crate::{ApiError, ApiFailureKind, ConvertRequest, StartedJob};

const START_FAILED_MESSAGE: &str = "Failed to start conversion";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Root the endpoint paths are appended to, e.g. `http://host/api`.
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Applies to every request except the event stream, which may stay open indefinitely.
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client for the conversion service.
#[derive(Debug, Clone)]
pub struct ApiClient {
    settings: ClientSettings,
    base: Url,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let base = Url::parse(&settings.base_url)
            .map_err(|err| ApiError::new(ApiFailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::new(
                ApiFailureKind::InvalidUrl,
                format!("{} cannot be used as a base url", settings.base_url),
            ));
        }

        // No overall timeout here: the event stream is long-lived.
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ApiError::new(ApiFailureKind::Network, err.to_string()))?;

        Ok(Self {
            settings,
            base,
            client,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// `POST /convert`: starts a job and returns its identifier.
    pub async fn start_conversion(&self, github_url: &str) -> Result<StartedJob, ApiError> {
        let url = self.endpoint(&["convert"])?;
        let body = serde_json::to_vec(&ConvertRequest { github_url })
            .map_err(|err| ApiError::new(ApiFailureKind::Decode, err.to_string()))?;

        let response = self
            .client
            .post(url)
            .timeout(self.settings.request_timeout)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let bytes = response.bytes().await.unwrap_or_default();
            return Err(ApiError::new(
                ApiFailureKind::HttpStatus(status.as_u16()),
                error_detail(&bytes).unwrap_or_else(|| START_FAILED_MESSAGE.to_string()),
            ));
        }

        let started: StartedJob = read_json(response).await?;
        job_info!("started conversion job {}", started.job_id);
        Ok(started)
    }

    /// `GET /health`: `true` when the service answers with a success status.
    pub async fn health(&self) -> Result<bool, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&["health"])?)
            .timeout(self.settings.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Ok(response.status().is_success())
    }

    /// `GET /stream/{job_id}`: opens the event stream and yields raw body chunks.
    pub async fn open_stream(&self, job_id: &str) -> Result<ByteStream, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&["stream", job_id])?)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::new(
                ApiFailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        job_debug!("event stream for job {} opened", job_id);

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error))
            .boxed())
    }

    /// `GET /preview/{job_id}`: the final artifact manifest.
    pub async fn fetch_manifest(&self, job_id: &str) -> Result<Manifest, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&["preview", job_id])?)
            .timeout(self.settings.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::new(
                ApiFailureKind::HttpStatus(status.as_u16()),
                "Preview not ready",
            ));
        }
        read_json(response).await
    }

    /// `GET /download/{job_id}`: the converted archive as raw bytes.
    pub async fn download_archive(&self, job_id: &str) -> Result<Bytes, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&["download", job_id])?)
            .timeout(self.settings.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::new(
                ApiFailureKind::HttpStatus(status.as_u16()),
                "Download failed",
            ));
        }
        response.bytes().await.map_err(map_reqwest_error)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::new(ApiFailureKind::InvalidUrl, self.settings.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes)
        .map_err(|err| ApiError::new(ApiFailureKind::Decode, err.to_string()))
}

/// Pulls `detail` out of an error body such as `{"detail": "..."}`.
fn error_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value
        .get("detail")?
        .as_str()
        .filter(|detail| !detail.is_empty())
        .map(ToOwned::to_owned)
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(ApiFailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return ApiError::new(ApiFailureKind::InvalidUrl, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(ApiFailureKind::Decode, err.to_string());
    }
    ApiError::new(ApiFailureKind::Network, err.to_string())
}
