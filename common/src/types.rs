//! Detection data model.
//!
use serde::{Deserialize, Serialize};

/// Bounding box given by its center point and size, in source-frame pixels.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CenterBox {
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
}

impl CenterBox {
    pub fn new(center_x: f32, center_y: f32, width: f32, height: f32) -> Self {
        Self {
            center_x,
            center_y,
            width,
            height,
        }
    }

    /// Top-left corner of the box.
    pub fn top_left(&self) -> (f32, f32) {
        (
            self.center_x - self.width / 2.0,
            self.center_y - self.height / 2.0,
        )
    }

    /// Scale the box by independent factors per axis.
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            center_x: self.center_x * sx,
            center_y: self.center_y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }
}

/// One model output for a single frame.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Detection {
    pub class_label: String,
    pub confidence: f32,
    pub bbox: CenterBox,
}

impl Detection {
    pub fn new(class_label: impl Into<String>, confidence: f32, bbox: CenterBox) -> Self {
        Self {
            class_label: class_label.into(),
            confidence,
            bbox,
        }
    }

    /// Text drawn next to the box, e.g. `cup 91%`.
    pub fn label_text(&self) -> String {
        format!(
            "{} {}%",
            self.class_label,
            (self.confidence * 100.0).round() as i64
        )
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_top_left_from_center() {
        let bbox = CenterBox::new(100.0, 100.0, 40.0, 60.0);
        assert_eq!(bbox.top_left(), (80.0, 70.0));
    }

    #[test]
    fn test_top_left_may_leave_frame() {
        let bbox = CenterBox::new(5.0, 10.0, 30.0, 40.0);
        assert_eq!(bbox.top_left(), (-10.0, -10.0));
    }

    #[test]
    fn test_scaled() {
        let bbox = CenterBox::new(10.0, 20.0, 4.0, 8.0).scaled(2.0, 0.5);
        assert_eq!(bbox, CenterBox::new(20.0, 10.0, 8.0, 4.0));
    }

    #[test]
    fn test_label_text_rounds_percentage() {
        let bbox = CenterBox::default();
        assert_eq!(Detection::new("cup", 0.91, bbox).label_text(), "cup 91%");
        assert_eq!(Detection::new("dog", 0.555, bbox).label_text(), "dog 56%");
        assert_eq!(Detection::new("cat", 1.0, bbox).label_text(), "cat 100%");
        assert_eq!(Detection::new("bus", 0.004, bbox).label_text(), "bus 0%");
    }
}
