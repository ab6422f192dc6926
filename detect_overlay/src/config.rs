//! Command line and environment configuration.
//!
use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;

use crate::{driver::DisplayClock, remote::HostedConfig, threshold::ConfidenceThreshold};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Annotate a camera stream with a hosted object-detection model")]
pub struct Args {
    /// Address of the HTTP server serving the annotated stream
    #[clap(long, default_value = "127.0.0.1:3000")]
    pub server_address: String,

    /// Directory or file of still images to replay, or `webcam`
    #[clap(long, default_value = "webcam")]
    pub source: String,

    /// Video device used when the source is `webcam`
    #[clap(long, default_value = "/dev/video0")]
    pub device: String,

    /// Requested capture resolution
    #[clap(long, default_value = "1280x720")]
    pub resolution: String,

    /// Display refresh rate driving the frame loop
    #[clap(long, default_value_t = 60.0)]
    pub refresh_hz: f64,

    /// Initial confidence threshold for drawing detections
    #[clap(long, default_value_t = 0.6)]
    pub threshold: f32,

    /// Base URL of the hosted inference API
    #[clap(long, env = "DETECT_ENDPOINT", default_value = "https://detect.roboflow.com")]
    pub endpoint: String,

    /// Model identifier
    #[clap(long, env = "DETECT_MODEL", default_value = "microsoft-coco")]
    pub model: String,

    /// Model version
    #[clap(long, env = "DETECT_MODEL_VERSION", default_value_t = 9)]
    pub model_version: u32,

    /// Access key of the hosted model
    #[clap(long, env = "DETECT_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Minimum confidence of predictions returned by the model service
    #[clap(long, default_value_t = 0.1)]
    pub min_confidence: f32,

    /// Inference request timeout in milliseconds, 0 disables the timeout
    #[clap(long, default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// TrueType font for labels
    #[clap(long)]
    pub font: Option<PathBuf>,

    /// Hand out box colors in palette order instead of randomly
    #[clap(long)]
    pub deterministic_colors: bool,

    /// JPEG quality of the served stream
    #[clap(long, default_value_t = 80)]
    pub jpeg_quality: u8,
}

/// Where frames come from.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceConfig {
    Stills(PathBuf),
    Webcam {
        device: String,
        resolution: (u32, u32),
    },
}

/// Validated configuration.
#[derive(Debug)]
pub struct OverlayConfig {
    pub server_address: SocketAddr,
    pub source: SourceConfig,
    pub clock: DisplayClock,
    pub threshold: ConfidenceThreshold,
    pub hosted: HostedConfig,
    pub font: Option<PathBuf>,
    pub deterministic_colors: bool,
    pub jpeg_quality: u8,
}

impl Args {
    pub fn into_config(self) -> Result<OverlayConfig> {
        let server_address: SocketAddr = self
            .server_address
            .parse()
            .with_context(|| format!("invalid server address {:?}", self.server_address))?;

        let source = match self.source.as_str() {
            "webcam" => SourceConfig::Webcam {
                device: self.device,
                resolution: parse_resolution(&self.resolution)?,
            },
            path => SourceConfig::Stills(PathBuf::from(path)),
        };

        if !(1..=100).contains(&self.jpeg_quality) {
            bail!("JPEG quality must be within 1..=100, got {}", self.jpeg_quality);
        }

        let timeout = match self.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Ok(OverlayConfig {
            server_address,
            source,
            clock: DisplayClock::new(self.refresh_hz)?,
            threshold: ConfidenceThreshold::new(self.threshold)?,
            hosted: HostedConfig {
                endpoint: self.endpoint,
                model: self.model,
                version: self.model_version,
                api_key: self.api_key,
                min_confidence: self.min_confidence,
                timeout,
                jpeg_quality: self.jpeg_quality,
            },
            font: self.font,
            deterministic_colors: self.deterministic_colors,
            jpeg_quality: self.jpeg_quality,
        })
    }
}

/// Parse `WIDTHxHEIGHT`.
pub fn parse_resolution(s: &str) -> Result<(u32, u32)> {
    let (width, height) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("invalid resolution {s:?}, expected WIDTHxHEIGHT"))?;
    let width: u32 = width.trim().parse().context("invalid width")?;
    let height: u32 = height.trim().parse().context("invalid height")?;
    if width == 0 || height == 0 {
        bail!("resolution must not be empty, got {s:?}");
    }
    Ok((width, height))
}
