//! Endpoints of HTTP server.
//!
use std::convert::Infallible;

use axum::{
    body::StreamBody,
    extract::Query,
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Extension, Router,
};
use bytes::Bytes;
use futures::{future, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::threshold::ConfidenceThreshold;

/// State shared with the HTTP handlers.
#[derive(Clone)]
pub struct Viewer {
    pub frames: broadcast::Sender<Bytes>,
    pub threshold: ConfidenceThreshold,
}

/// Query parameters of the threshold endpoint.
#[derive(Debug, Deserialize)]
pub struct ThresholdParams {
    value: f32,
}

/// Build the router with all endpoints.
pub fn router(viewer: Viewer) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/index", get(index))
        .route("/healthcheck", get(healthcheck))
        .route("/stream", get(annotated_stream))
        .route("/threshold", get(get_threshold).post(set_threshold))
        .layer(Extension(viewer))
}

/// Health check endpoint.
pub async fn healthcheck() -> &'static str {
    "healthy"
}

pub async fn index(Extension(viewer): Extension<Viewer>) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Object detection</title></head>
<body>
    <h3>Live object detection</h3>
    <img src="/stream" style="max-width: 100%">
    <section id="settings">
        <label for="confidence">Prediction confidence</label><br>
        <input id="confidence" type="range" min="0" max="1" step="0.01" value="{threshold:.2}"
            oninput="document.getElementById('value').textContent = this.value;
                     fetch('/threshold?value=' + this.value, {{ method: 'POST' }});">
        <span id="value">{threshold:.2}</span>
    </section>
</body>
</html>
"#,
        threshold = viewer.threshold.get()
    ))
}

// Endpoint of the annotated image stream.
pub async fn annotated_stream(Extension(viewer): Extension<Viewer>) -> impl IntoResponse {
    log::info!("Annotated stream requested");

    // Frames missed by a slow viewer are dropped
    let stream = BroadcastStream::new(viewer.frames.subscribe())
        .filter_map(|item| future::ready(item.ok().map(Ok::<_, Infallible>)));

    // Set body and headers for multipart streaming
    let body = StreamBody::new(stream);
    let headers = [(
        header::CONTENT_TYPE,
        "multipart/x-mixed-replace; boundary=frame",
    )];

    (headers, body)
}

pub async fn get_threshold(Extension(viewer): Extension<Viewer>) -> String {
    format!("{:.2}", viewer.threshold.get())
}

pub async fn set_threshold(
    Extension(viewer): Extension<Viewer>,
    Query(params): Query<ThresholdParams>,
) -> (StatusCode, String) {
    match viewer.threshold.set(params.value) {
        Ok(value) => {
            log::info!("Confidence threshold changed to {value:.2}");
            (StatusCode::OK, format!("{value:.2}"))
        }
        Err(err) => (StatusCode::BAD_REQUEST, err.to_string()),
    }
}
