//! Client for an object-detection model hosted behind an HTTP inference API.
//!
//! Frames are sent as base64-encoded JPEG in the request body. The response lists predictions
//! with center-based boxes (see [`common::protocol`]).
use std::{fmt, time::Duration};

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use common::{
    protocol::{ErrorResponse, InferResponse},
    types::Detection,
};
use futures::future::BoxFuture;
use image::RgbImage;
use reqwest::{Client, StatusCode, Url};

use crate::{detector::Detector, surface::encode_jpeg};

/// Settings of the hosted model.
#[derive(Clone)]
pub struct HostedConfig {
    /// Base URL of the inference API.
    pub endpoint: String,
    /// Model identifier.
    pub model: String,
    pub version: u32,
    pub api_key: String,
    /// Minimum confidence of predictions returned by the service.
    pub min_confidence: f32,
    /// Request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub jpeg_quality: u8,
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://detect.roboflow.com".into(),
            model: "microsoft-coco".into(),
            version: 9,
            api_key: String::new(),
            min_confidence: 0.1,
            timeout: Some(Duration::from_secs(10)),
            jpeg_quality: 80,
        }
    }
}

// The access key is kept out of logs.
impl fmt::Debug for HostedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostedConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("version", &self.version)
            .field("api_key", &"<redacted>")
            .field("min_confidence", &self.min_confidence)
            .field("timeout", &self.timeout)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}

/// Detector backed by the hosted inference API.
pub struct HostedDetector {
    client: Client,
    model_url: Url,
    name: String,
    api_key: String,
    confidence_pct: u32,
    jpeg_quality: u8,
}

impl HostedDetector {
    pub fn new(config: HostedConfig) -> Result<Self> {
        if config.model.trim().is_empty() {
            bail!("model identifier must not be empty");
        }
        if config.api_key.trim().is_empty() {
            bail!("an access key is required for the hosted model");
        }
        if !(0.0..=1.0).contains(&config.min_confidence) {
            bail!(
                "minimum confidence must be within [0, 1], got {}",
                config.min_confidence
            );
        }

        let model_url = Url::parse(&format!(
            "{}/{}/{}",
            config.endpoint.trim_end_matches('/'),
            config.model,
            config.version
        ))
        .with_context(|| format!("invalid endpoint {:?}", config.endpoint))?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build HTTP client")?;

        log::info!(
            "Using hosted model {} version {} at {}",
            config.model,
            config.version,
            config.endpoint
        );

        Ok(Self {
            client,
            model_url,
            name: format!("{}/{}", config.model, config.version),
            api_key: config.api_key,
            confidence_pct: (config.min_confidence * 100.0).round() as u32,
            jpeg_quality: config.jpeg_quality,
        })
    }

    async fn check_access(&self) -> Result<()> {
        let resp = self
            .client
            .get(self.model_url.clone())
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await
            .with_context(|| format!("{} is unreachable", self.name))?;

        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let status = resp.status();
                let body = resp.bytes().await.unwrap_or_default();
                bail!(
                    "{} rejected the access key ({}): {}",
                    self.name,
                    status,
                    ErrorResponse::message_from(&body)
                )
            }
            status => {
                log::debug!("{} answered warm-up with {}", self.name, status);
                Ok(())
            }
        }
    }

    async fn infer(&self, frame: &RgbImage) -> Result<Vec<Detection>> {
        let (width, height) = frame.dimensions();
        let jpeg = encode_jpeg(frame, self.jpeg_quality)?;
        let body = STANDARD.encode(jpeg);

        let resp = self
            .client
            .post(self.model_url.clone())
            .query(&[
                ("api_key", self.api_key.clone()),
                ("confidence", self.confidence_pct.to_string()),
                ("format", "json".to_owned()),
            ])
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.name))?;

        let status = resp.status();
        let body = resp.bytes().await.context("failed to read response")?;
        if !status.is_success() {
            bail!(
                "{} returned {}: {}",
                self.name,
                status,
                ErrorResponse::message_from(&body)
            );
        }

        let detections = InferResponse::from_slice(&body)
            .context("invalid inference response")?
            .into_detections(width, height);
        log::debug!("{} found {} objects", self.name, detections.len());

        Ok(detections)
    }
}

impl Detector for HostedDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn warm_up(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.check_access())
    }

    fn detect<'a>(&'a self, frame: &'a RgbImage) -> BoxFuture<'a, Result<Vec<Detection>>> {
        Box::pin(self.infer(frame))
    }
}
