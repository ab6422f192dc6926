//! Annotate camera frames with the output of a hosted object-detection model.
pub mod color;
pub mod config;
pub mod detector;
pub mod driver;
pub mod endpoints;
pub mod meter;
pub mod remote;
pub mod render;
pub mod sensors;
pub mod surface;
pub mod threshold;

use bytes::Bytes;

/// Wrap a JPEG image as one part of a `multipart/x-mixed-replace` stream.
pub fn as_jpeg_stream_item(data: &[u8]) -> Bytes {
    Bytes::copy_from_slice(
        &[
            "--frame\r\nContent-Type: image/jpeg\r\n\r\n".as_bytes(),
            data,
            "\r\n\r\n".as_bytes(),
        ]
        .concat(),
    )
}
