//! Raster draw surfaces.
//!
//! [`OverlaySurface`] is a transparent RGBA layer of the same size as the frame, the equivalent of
//! a canvas stacked on top of the video. [`StreamingSurface`] additionally merges the layer into
//! every presented frame and publishes the result as an MJPEG stream item.
use std::{
    io::Cursor,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use image::{codecs::jpeg::JpegEncoder, ColorType, Rgba, RgbaImage, RgbImage};
use imageproc::{
    drawing::{draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
};
use rusttype::{Font, Scale};
use tokio::sync::broadcast;

use crate::{as_jpeg_stream_item, color::Color, render::DrawSurface};

/// Locations probed for a label font when none is configured.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
];

pub type LabelFont = Arc<Font<'static>>;

/// Load the label font.
///
/// An explicitly configured font must load. Without one, common install locations are probed and
/// `None` is returned if nothing is found.
pub fn load_font(path: Option<&Path>) -> Result<Option<LabelFont>> {
    if let Some(path) = path {
        return read_font(path).map(Some);
    }

    for candidate in FONT_CANDIDATES.iter().map(PathBuf::from) {
        if candidate.is_file() {
            match read_font(&candidate) {
                Ok(font) => {
                    log::info!("Using label font {}", candidate.display());
                    return Ok(Some(font));
                }
                Err(err) => log::debug!("Skipping font {}: {err:#}", candidate.display()),
            }
        }
    }

    log::warn!("No label font found, boxes will be drawn without labels");
    Ok(None)
}

fn read_font(path: &Path) -> Result<LabelFont> {
    let data = std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    match Font::try_from_vec(data) {
        Some(font) => Ok(Arc::new(font)),
        None => bail!("{} is not a valid TrueType font", path.display()),
    }
}

/// Transparent RGBA overlay.
pub struct OverlaySurface {
    layer: RgbaImage,
    font: Option<LabelFont>,
}

impl OverlaySurface {
    pub fn new(font: Option<LabelFont>) -> Self {
        Self {
            layer: RgbaImage::new(0, 0),
            font,
        }
    }

    pub fn layer(&self) -> &RgbaImage {
        &self.layer
    }

    /// Alpha-blend the overlay onto `frame`. Only the overlapping region is touched.
    pub fn composite_onto(&self, frame: &mut RgbImage) {
        let width = frame.width().min(self.layer.width());
        let height = frame.height().min(self.layer.height());

        for y in 0..height {
            for x in 0..width {
                let Rgba([r, g, b, a]) = *self.layer.get_pixel(x, y);
                if a == 0 {
                    continue;
                }
                let dst = frame.get_pixel_mut(x, y);
                let a = a as u16;
                for (d, s) in dst.0.iter_mut().zip([r, g, b]) {
                    *d = ((s as u16 * a + *d as u16 * (255 - a)) / 255) as u8;
                }
            }
        }
    }
}

impl DrawSurface for OverlaySurface {
    fn resize(&mut self, width: u32, height: u32) {
        // Like a canvas, a resize always starts from a cleared layer.
        self.layer = RgbaImage::new(width, height);
    }

    fn dimensions(&self) -> (u32, u32) {
        self.layer.dimensions()
    }

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color, line_width: u32) {
        if ![x, y, width, height].iter().all(|v| v.is_finite()) {
            log::debug!("Skipping box with non-finite geometry");
            return;
        }

        // Edges beyond the surface are pulled in to just outside of it, which keeps the visible
        // part of the outline unchanged and all pixel math within i32.
        let margin = line_width as f32 + 1.0;
        let (surface_w, surface_h) = self.layer.dimensions();
        let clip_x = |v: f32| v.round().clamp(-margin, surface_w as f32 + margin) as i32;
        let clip_y = |v: f32| v.round().clamp(-margin, surface_h as f32 + margin) as i32;

        let (left, right) = (clip_x(x), clip_x(x + width));
        let (top, bottom) = (clip_y(y), clip_y(y + height));
        let (width, height) = (right - left, bottom - top);
        let pixel = color.rgba();

        // Nested outlines centered on the path, `line_width` pixels thick.
        let inner = line_width as i32 / 2;
        for i in 0..line_width as i32 {
            let offset = i - inner;
            let (w, h) = (width - 2 * offset, height - 2 * offset);
            if w <= 0 || h <= 0 {
                continue;
            }
            let rect = Rect::at(left + offset, top + offset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut self.layer, rect, pixel);
        }
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color, font_px: f32) {
        let Some(font) = &self.font else {
            return;
        };

        let scale = Scale::uniform(font_px);
        let top = y - font.v_metrics(scale).ascent;

        // Glyph advances stay below one em, so a label starting further out is invisible.
        let extent = font_px * text.chars().count() as f32;
        let (surface_w, surface_h) = self.layer.dimensions();
        let visible = x.is_finite()
            && top.is_finite()
            && x + extent >= 0.0
            && top + 2.0 * font_px >= 0.0
            && x <= surface_w as f32
            && top <= surface_h as f32;
        if !visible {
            return;
        }

        draw_text_mut(
            &mut self.layer,
            color.rgba(),
            x.round() as i32,
            top.round() as i32,
            scale,
            font,
            text,
        );
    }
}

/// Overlay surface which publishes every presented frame to HTTP viewers.
pub struct StreamingSurface {
    overlay: OverlaySurface,
    tx: broadcast::Sender<Bytes>,
    jpeg_quality: u8,
}

impl StreamingSurface {
    pub fn new(overlay: OverlaySurface, tx: broadcast::Sender<Bytes>, jpeg_quality: u8) -> Self {
        Self {
            overlay,
            tx,
            jpeg_quality,
        }
    }
}

/// Encode an RGB frame as JPEG.
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode(frame, frame.width(), frame.height(), ColorType::Rgb8)
        .context("failed to encode frame")?;
    Ok(buf.into_inner())
}

impl DrawSurface for StreamingSurface {
    fn resize(&mut self, width: u32, height: u32) {
        self.overlay.resize(width, height);
    }

    fn dimensions(&self) -> (u32, u32) {
        self.overlay.dimensions()
    }

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color, line_width: u32) {
        self.overlay
            .stroke_rect(x, y, width, height, color, line_width);
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color, font_px: f32) {
        self.overlay.fill_text(text, x, y, color, font_px);
    }

    fn present(&mut self, frame: &RgbImage) {
        if self.tx.receiver_count() == 0 {
            log::debug!("No viewers, skipping frame encoding");
            return;
        }

        let mut frame = frame.clone();
        self.overlay.composite_onto(&mut frame);

        match encode_jpeg(&frame, self.jpeg_quality) {
            Ok(buf) => {
                if self.tx.send(as_jpeg_stream_item(&buf)).is_err() {
                    log::debug!("Send error - probably no listener");
                }
            }
            Err(err) => log::warn!("{err:#}"),
        }
    }
}

#[cfg(test)]
mod test {

    use image::Rgb;

    use super::*;

    const RED: Color = Color::from_u32(0xFF0000);

    #[test]
    fn test_resize_clears() {
        let mut surface = OverlaySurface::new(None);
        surface.resize(20, 10);
        surface.stroke_rect(2.0, 2.0, 10.0, 5.0, RED, 1);
        assert!(surface.layer().pixels().any(|p| p.0[3] > 0));

        surface.resize(30, 15);
        assert_eq!(surface.dimensions(), (30, 15));
        assert!(surface.layer().pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_stroke_is_hollow_and_thick() {
        let mut surface = OverlaySurface::new(None);
        surface.resize(100, 100);
        surface.stroke_rect(20.0, 20.0, 40.0, 40.0, RED, 4);

        let layer = surface.layer();
        // On the path and both sides of it
        for x in [18, 19, 20, 21] {
            assert_eq!(layer.get_pixel(x, 40).0, [255, 0, 0, 255], "x = {x}");
        }
        assert_eq!(layer.get_pixel(17, 40).0[3], 0);
        assert_eq!(layer.get_pixel(22, 40).0[3], 0);
        // Interior stays transparent
        assert_eq!(layer.get_pixel(40, 40).0[3], 0);
    }

    #[test]
    fn test_stroke_clipped_at_border() {
        let mut surface = OverlaySurface::new(None);
        surface.resize(50, 50);
        surface.stroke_rect(-10.0, -10.0, 30.0, 30.0, RED, 4);
        surface.stroke_rect(40.0, 40.0, 0.0, 0.0, RED, 4);

        assert_eq!(surface.layer().get_pixel(19, 5).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_far_off_boxes_are_clipped() {
        let mut surface = OverlaySurface::new(None);
        surface.resize(50, 50);

        surface.stroke_rect(3.0e9, 0.0, 20.0, 20.0, RED, 4);
        surface.stroke_rect(0.0, -3.0e9, 20.0, 20.0, RED, 4);
        surface.stroke_rect(f32::INFINITY, 10.0, 20.0, 20.0, RED, 4);
        surface.stroke_rect(10.0, 10.0, f32::NEG_INFINITY, 20.0, RED, 4);
        surface.stroke_rect(f32::NAN, 10.0, 20.0, 20.0, RED, 4);
        // All four edges lie outside the surface
        surface.stroke_rect(-3.0e9, -3.0e9, 6.0e9, 6.0e9, RED, 4);
        assert!(surface.layer().pixels().all(|p| p.0[3] == 0));

        // Only the left edge is visible
        surface.stroke_rect(10.0, 10.0, 3.0e9, 20.0, RED, 4);
        let layer = surface.layer();
        assert_eq!(layer.get_pixel(10, 20).0, [255, 0, 0, 255]);
        assert_eq!(layer.get_pixel(49, 20).0[3], 0);
        assert_eq!(layer.get_pixel(30, 10).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_far_off_labels_are_skipped() -> Result<()> {
        // Uses a system font when one is installed
        let mut surface = OverlaySurface::new(load_font(None)?);
        surface.resize(50, 50);

        for (x, y) in [
            (3.0e9, 20.0),
            (-3.0e9, 20.0),
            (10.0, 3.0e9),
            (10.0, -3.0e9),
            (f32::INFINITY, 20.0),
            (10.0, f32::NAN),
        ] {
            surface.fill_text("cup 91%", x, y, RED, 25.0);
        }
        assert!(surface.layer().pixels().all(|p| p.0[3] == 0));

        Ok(())
    }

    #[test]
    fn test_text_without_font_is_skipped() {
        let mut surface = OverlaySurface::new(None);
        surface.resize(50, 50);
        surface.fill_text("cup 91%", 5.0, 30.0, RED, 25.0);
        assert!(surface.layer().pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_missing_configured_font_is_error() {
        assert!(load_font(Some(Path::new("/does/not/exist.ttf"))).is_err());
    }

    #[test]
    fn test_composite_onto_frame() {
        let mut surface = OverlaySurface::new(None);
        surface.resize(10, 10);
        surface.stroke_rect(2.0, 2.0, 6.0, 6.0, RED, 1);

        let mut frame = RgbImage::from_pixel(10, 10, Rgb([0, 0, 255]));
        surface.composite_onto(&mut frame);

        assert_eq!(frame.get_pixel(2, 2).0, [255, 0, 0]);
        assert_eq!(frame.get_pixel(5, 5).0, [0, 0, 255]);
    }

    #[test]
    fn test_streaming_surface_publishes() -> Result<()> {
        let (tx, mut rx) = broadcast::channel(4);
        let mut surface = StreamingSurface::new(OverlaySurface::new(None), tx, 80);
        surface.resize(16, 16);
        surface.stroke_rect(4.0, 4.0, 8.0, 8.0, RED, 2);
        surface.present(&RgbImage::new(16, 16));

        let item = rx.try_recv()?;
        assert!(item.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n"));
        assert!(item.ends_with(b"\r\n\r\n"));

        Ok(())
    }
}
