//! Annotation renderer.
//!
//! Draws one unfilled rectangle and one text label per detection that passes the confidence
//! threshold. The only state carried between frames is the [`ColorTable`].
use common::types::Detection;
use image::RgbImage;

use crate::color::{Color, ColorTable};

/// Stroke thickness of bounding boxes in pixels.
pub const LINE_WIDTH: u32 = 4;
/// Label font size in pixels.
pub const FONT_PX: f32 = 25.0;
/// Vertical distance between the label baseline and the top edge of its box.
pub const LABEL_OFFSET: f32 = 10.0;

/// 2D drawing target sized to the video frame.
pub trait DrawSurface {
    /// Resize to `width` x `height` and clear everything drawn so far.
    fn resize(&mut self, width: u32, height: u32);

    fn dimensions(&self) -> (u32, u32);

    /// Draw the outline of a rectangle without filling it.
    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color, line_width: u32);

    /// Draw `text` with its baseline starting at `(x, y)`.
    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color, font_px: f32);

    /// Hand the drawn overlay together with the frame it belongs to to the viewer.
    fn present(&mut self, _frame: &RgbImage) {}
}

/// Draw all detections with `confidence >= threshold` and return how many were drawn.
///
/// Detections below the threshold neither draw nor claim a color.
pub fn draw_detections<S: DrawSurface + ?Sized>(
    surface: &mut S,
    colors: &mut ColorTable,
    threshold: f32,
    detections: &[Detection],
) -> usize {
    let mut drawn = 0;

    for detection in detections {
        if detection.confidence < threshold {
            continue;
        }

        let color = colors.color_for(&detection.class_label);
        let (x, y) = detection.bbox.top_left();

        surface.stroke_rect(
            x,
            y,
            detection.bbox.width,
            detection.bbox.height,
            color,
            LINE_WIDTH,
        );
        surface.fill_text(
            &detection.label_text(),
            x,
            y - LABEL_OFFSET,
            color,
            FONT_PX,
        );
        drawn += 1;
    }

    log::debug!(
        "Drew {} of {} detections (threshold {:.2})",
        drawn,
        detections.len(),
        threshold
    );

    drawn
}

#[cfg(test)]
pub(crate) mod test {

    use std::sync::{Arc, Mutex};

    use common::types::CenterBox;

    use super::*;
    use crate::color::DEFAULT_PALETTE;

    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum DrawOp {
        Resize(u32, u32),
        Rect {
            x: f32,
            y: f32,
            width: f32,
            height: f32,
            color: Color,
            line_width: u32,
        },
        Text {
            text: String,
            x: f32,
            y: f32,
            color: Color,
            font_px: f32,
        },
        Present,
    }

    /// Surface recording every call. Clones share the log.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSurface {
        pub(crate) ops: Arc<Mutex<Vec<DrawOp>>>,
        size: (u32, u32),
    }

    impl RecordingSurface {
        pub(crate) fn ops(&self) -> Vec<DrawOp> {
            self.ops.lock().unwrap().clone()
        }

        pub(crate) fn rects(&self) -> Vec<DrawOp> {
            self.ops()
                .into_iter()
                .filter(|op| matches!(op, DrawOp::Rect { .. }))
                .collect()
        }
    }

    impl DrawSurface for RecordingSurface {
        fn resize(&mut self, width: u32, height: u32) {
            self.size = (width, height);
            self.ops.lock().unwrap().push(DrawOp::Resize(width, height));
        }

        fn dimensions(&self) -> (u32, u32) {
            self.size
        }

        fn stroke_rect(
            &mut self,
            x: f32,
            y: f32,
            width: f32,
            height: f32,
            color: Color,
            line_width: u32,
        ) {
            self.ops.lock().unwrap().push(DrawOp::Rect {
                x,
                y,
                width,
                height,
                color,
                line_width,
            });
        }

        fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color, font_px: f32) {
            self.ops.lock().unwrap().push(DrawOp::Text {
                text: text.to_owned(),
                x,
                y,
                color,
                font_px,
            });
        }

        fn present(&mut self, _frame: &RgbImage) {
            self.ops.lock().unwrap().push(DrawOp::Present);
        }
    }

    fn cup(confidence: f32) -> Detection {
        Detection::new("cup", confidence, CenterBox::new(100.0, 100.0, 40.0, 60.0))
    }

    fn person(confidence: f32) -> Detection {
        Detection::new("person", confidence, CenterBox::new(300.0, 200.0, 100.0, 250.0))
    }

    #[test]
    fn test_threshold_example() {
        let mut surface = RecordingSurface::default();
        let mut colors = ColorTable::deterministic();

        let drawn = draw_detections(&mut surface, &mut colors, 0.6, &[cup(0.91), person(0.3)]);

        assert_eq!(drawn, 1);
        assert_eq!(
            surface.ops(),
            vec![
                DrawOp::Rect {
                    x: 80.0,
                    y: 70.0,
                    width: 40.0,
                    height: 60.0,
                    color: DEFAULT_PALETTE[0],
                    line_width: 4,
                },
                DrawOp::Text {
                    text: "cup 91%".into(),
                    x: 80.0,
                    y: 60.0,
                    color: DEFAULT_PALETTE[0],
                    font_px: 25.0,
                },
            ]
        );
        assert_eq!(colors.get("person"), None);
        assert_eq!(colors.len(), 1);
    }

    #[test]
    fn test_below_threshold_draws_nothing() {
        let mut surface = RecordingSurface::default();
        let mut colors = ColorTable::random();

        let drawn = draw_detections(&mut surface, &mut colors, 0.5, &[cup(0.49), person(0.1)]);

        assert_eq!(drawn, 0);
        assert!(surface.ops().is_empty());
        assert!(colors.is_empty());
        assert_eq!(colors.remaining(), DEFAULT_PALETTE.len());
    }

    #[test]
    fn test_confidence_equal_to_threshold_is_drawn() {
        let mut surface = RecordingSurface::default();
        let mut colors = ColorTable::random();

        assert_eq!(draw_detections(&mut surface, &mut colors, 0.5, &[cup(0.5)]), 1);
    }

    #[test]
    fn test_color_stable_across_frames() {
        let mut surface = RecordingSurface::default();
        let mut colors = ColorTable::random();

        draw_detections(&mut surface, &mut colors, 0.6, &[cup(0.7)]);
        draw_detections(&mut surface, &mut colors, 0.6, &[person(0.8), cup(0.95)]);

        let cup_colors: Vec<Color> = surface
            .rects()
            .into_iter()
            .filter_map(|op| match op {
                DrawOp::Rect { x, color, .. } if x == 80.0 => Some(color),
                _ => None,
            })
            .collect();

        assert_eq!(cup_colors.len(), 2);
        assert_eq!(cup_colors[0], cup_colors[1]);
        assert_ne!(colors.get("person"), colors.get("cup"));
    }

    #[test]
    fn test_input_order_preserved() {
        let mut surface = RecordingSurface::default();
        let mut colors = ColorTable::deterministic();

        draw_detections(&mut surface, &mut colors, 0.0, &[person(0.4), cup(0.4)]);

        let labels: Vec<String> = surface
            .ops()
            .into_iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(labels, vec!["person 40%", "cup 40%"]);
        assert_eq!(colors.get("person"), Some(DEFAULT_PALETTE[0]));
    }

    #[test]
    fn test_many_classes_do_not_fail() {
        let mut surface = RecordingSurface::default();
        let mut colors = ColorTable::random();

        let detections: Vec<Detection> = (0..30)
            .map(|i| Detection::new(format!("class-{i}"), 0.9, CenterBox::new(50.0, 50.0, 10.0, 10.0)))
            .collect();

        assert_eq!(draw_detections(&mut surface, &mut colors, 0.5, &detections), 30);
        assert_eq!(colors.len(), 30);
    }
}
