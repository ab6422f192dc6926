//! Wire format of the hosted inference service.
//!
use serde::{Deserialize, Serialize};

use crate::types::{CenterBox, Detection};

/// One prediction as returned by the service. `x` and `y` are the box center.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Prediction {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<u32>,
}

/// Dimensions of the image the service actually ran on.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

/// Successful inference response.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct InferResponse {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageInfo>,
}

/// Error body sent with non-success status codes.
#[derive(Clone, Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default, alias = "error")]
    pub message: Option<String>,
}

impl InferResponse {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Convert predictions to detections in the coordinate space of the submitted frame.
    ///
    /// If the service reports that it ran on an image of a different size, boxes are rescaled
    /// per axis. Input order is preserved.
    pub fn into_detections(self, frame_width: u32, frame_height: u32) -> Vec<Detection> {
        let (sx, sy) = match self.image {
            Some(info) if info.width > 0 && info.height > 0 => (
                frame_width as f32 / info.width as f32,
                frame_height as f32 / info.height as f32,
            ),
            _ => (1.0, 1.0),
        };

        self.predictions
            .into_iter()
            .map(|p| {
                let bbox = CenterBox::new(p.x, p.y, p.width, p.height);
                let bbox = if sx != 1.0 || sy != 1.0 {
                    bbox.scaled(sx, sy)
                } else {
                    bbox
                };
                Detection::new(p.class, p.confidence, bbox)
            })
            .collect()
    }
}

impl ErrorResponse {
    /// Extract a human readable message from an error body, falling back to the raw text.
    pub fn message_from(bytes: &[u8]) -> String {
        match serde_json::from_slice::<ErrorResponse>(bytes) {
            Ok(ErrorResponse { message: Some(msg) }) => msg,
            _ => String::from_utf8_lossy(bytes).trim().to_owned(),
        }
    }
}
