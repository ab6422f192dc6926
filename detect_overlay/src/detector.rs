//! Detection capability.
//!
use anyhow::Result;
use common::types::Detection;
use futures::future::{self, BoxFuture};
use image::RgbImage;

/// Asynchronous object detector.
///
/// Implementations may fail on any call; callers treat a failed call as a frame without
/// detections.
pub trait Detector: Send + Sync {
    /// Detector name, for logging.
    fn name(&self) -> &str;

    /// Resolve once the detector is ready to serve `detect` calls.
    fn warm_up(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(future::ready(Ok::<(), anyhow::Error>(())))
    }

    /// Detect objects in `frame`. Boxes are in the pixel coordinates of `frame`.
    fn detect<'a>(&'a self, frame: &'a RgbImage) -> BoxFuture<'a, Result<Vec<Detection>>>;
}

impl<D: Detector + ?Sized> Detector for std::sync::Arc<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn warm_up(&self) -> BoxFuture<'_, Result<()>> {
        (**self).warm_up()
    }

    fn detect<'a>(&'a self, frame: &'a RgbImage) -> BoxFuture<'a, Result<Vec<Detection>>> {
        (**self).detect(frame)
    }
}
