//! Provisioning service API
//!
//! `DeviceApi` and `ImageApi` are the narrow slices of the service the
//! provisioning flow depends on. `HttpApi` implements both over reqwest.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use vdev_core::{ApiErrorPayload, CreateInstanceBody, ImageRecord, ImageSubmission, Instance};

use crate::config::ServiceConfig;
use crate::fetch::FetchedAsset;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The service rejected the request with a structured error payload
    #[error("service error ({status}): {}", .payload.error)]
    Service {
        status: StatusCode,
        payload: ApiErrorPayload,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Device (instance) endpoints
#[async_trait]
pub trait DeviceApi: Send + Sync {
    async fn create_instance(&self, body: &CreateInstanceBody) -> Result<Instance, ApiError>;
    async fn list_instances(&self) -> Result<Vec<Instance>, ApiError>;
    async fn search_instances(&self, name: &str) -> Result<Vec<Instance>, ApiError>;
}

/// Image store endpoints
#[async_trait]
pub trait ImageApi: Send + Sync {
    /// Upload `asset` with the given metadata
    async fn create_image(
        &self,
        submission: &ImageSubmission,
        asset: &FetchedAsset,
    ) -> Result<ImageRecord, ApiError>;
}

/// reqwest-backed client for the provisioning API
pub struct HttpApi {
    base_url: String,
    client: reqwest::Client,
    api_token: Option<String>,
}

impl HttpApi {
    /// Create a new API client
    pub fn new(config: &ServiceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(
            client,
            &config.endpoint,
            config.api_token.clone(),
        ))
    }

    pub fn with_client(client: reqwest::Client, endpoint: &str, api_token: Option<String>) -> Self {
        Self {
            base_url: endpoint.trim_end_matches('/').to_string(),
            client,
            api_token,
        }
    }

    /// Construct an endpoint URL from a path under `/v1`
    pub fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await?;
        match serde_json::from_str::<ApiErrorPayload>(&body) {
            // A missing-asset report may arrive without a message or id
            Ok(payload)
                if !payload.error.is_empty()
                    || !payload.error_id.is_empty()
                    || payload.missing_fw_assets.is_some() =>
            {
                debug!(
                    status = %status,
                    error_id = %payload.error_id,
                    "Service returned error payload"
                );
                Err(ApiError::Service { status, payload })
            }
            _ => Err(ApiError::UnexpectedStatus { status, body }),
        }
    }
}

#[async_trait]
impl DeviceApi for HttpApi {
    async fn create_instance(&self, body: &CreateInstanceBody) -> Result<Instance, ApiError> {
        debug!(project = %body.project, name = %body.name, "POST instances");
        let response = self
            .request(reqwest::Method::POST, "instances")
            .json(body)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn list_instances(&self) -> Result<Vec<Instance>, ApiError> {
        let response = self.request(reqwest::Method::GET, "instances").send().await?;
        Self::parse(response).await
    }

    async fn search_instances(&self, name: &str) -> Result<Vec<Instance>, ApiError> {
        let response = self
            .request(reqwest::Method::GET, "instances")
            .query(&[("name", name)])
            .send()
            .await?;
        Self::parse(response).await
    }
}

#[async_trait]
impl ImageApi for HttpApi {
    async fn create_image(
        &self,
        submission: &ImageSubmission,
        asset: &FetchedAsset,
    ) -> Result<ImageRecord, ApiError> {
        let file = asset.open().await?;
        let part = Part::stream_with_length(reqwest::Body::from(file), asset.size())
            .file_name(asset.file_name().to_string())
            .mime_str(asset.content_type())?;

        let form = Form::new()
            .text("type", submission.kind.clone())
            .text("encoding", submission.encoding.clone())
            .text("encapsulated", submission.encapsulated.to_string())
            .text("name", submission.name.clone())
            .text("project", submission.project.clone())
            .part("file", part);

        debug!(
            project = %submission.project,
            name = %submission.name,
            size = asset.size(),
            "POST images"
        );

        let response = self
            .request(reqwest::Method::POST, "images")
            .multipart(form)
            .send()
            .await?;
        Self::parse(response).await
    }
}
