//! Color assignment for class labels.
//!
//! Every class label gets one color for the lifetime of a session. Colors are taken from a finite
//! pool without replacement; once the pool is empty, labels wrap around the full palette in
//! palette order.
use std::{collections::HashMap, fmt};

use anyhow::{bail, Result};
use image::Rgba;
use rand::Rng;

/// Opaque RGB color.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Color(pub [u8; 3]);

impl Color {
    pub const fn from_u32(rgb: u32) -> Self {
        Self([(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8])
    }

    /// Parse `#RRGGBB` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 {
            bail!("invalid color {hex:?}, expected #RRGGBB");
        }
        let rgb = u32::from_str_radix(digits, 16)?;
        Ok(Self::from_u32(rgb))
    }

    pub fn rgba(&self) -> Rgba<u8> {
        let [r, g, b] = self.0;
        Rgba([r, g, b, 255])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02X}{g:02X}{b:02X}")
    }
}

/// Visually distinct default colors.
pub const DEFAULT_PALETTE: [Color; 12] = [
    Color::from_u32(0xC7FC00),
    Color::from_u32(0xFF00FF),
    Color::from_u32(0x8622FF),
    Color::from_u32(0xFE0056),
    Color::from_u32(0x00FFCE),
    Color::from_u32(0xFF8000),
    Color::from_u32(0x00B7EB),
    Color::from_u32(0xFFFF00),
    Color::from_u32(0x0E7AFE),
    Color::from_u32(0xFFABAB),
    Color::from_u32(0x0000FF),
    Color::from_u32(0xCCCCCC),
];

/// Used only when the palette itself is empty.
pub const FALLBACK_COLOR: Color = Color::from_u32(0xCCCCCC);

/// Strategy choosing which of the remaining pool entries a new label receives.
pub trait ColorPicker: Send {
    /// Return an index in `0..remaining`. Only called with `remaining > 0`.
    fn pick(&mut self, remaining: usize) -> usize;
}

/// Uniformly random choice among the remaining colors.
#[derive(Debug, Default)]
pub struct RandomPicker;

impl ColorPicker for RandomPicker {
    fn pick(&mut self, remaining: usize) -> usize {
        rand::thread_rng().gen_range(0..remaining)
    }
}

/// Consume the pool front to back.
#[derive(Debug, Default)]
pub struct FrontPicker;

impl ColorPicker for FrontPicker {
    fn pick(&mut self, _remaining: usize) -> usize {
        0
    }
}

/// Session-scoped mapping from class label to display color.
pub struct ColorTable {
    palette: Vec<Color>,
    remaining: Vec<Color>,
    assigned: HashMap<String, Color>,
    picker: Box<dyn ColorPicker>,
    wrapped: usize,
}

impl ColorTable {
    pub fn new(palette: Vec<Color>, picker: Box<dyn ColorPicker>) -> Self {
        Self {
            remaining: palette.clone(),
            palette,
            assigned: HashMap::new(),
            picker,
            wrapped: 0,
        }
    }

    /// Default palette with random selection.
    pub fn random() -> Self {
        Self::new(DEFAULT_PALETTE.to_vec(), Box::new(RandomPicker))
    }

    /// Default palette consumed in order.
    pub fn deterministic() -> Self {
        Self::new(DEFAULT_PALETTE.to_vec(), Box::new(FrontPicker))
    }

    /// Color of `label`, assigning one on first sight.
    pub fn color_for(&mut self, label: &str) -> Color {
        if let Some(color) = self.assigned.get(label) {
            return *color;
        }

        let color = if self.remaining.is_empty() {
            self.next_wrapped()
        } else {
            // Out-of-range picks are clamped to the last entry.
            let idx = self.picker.pick(self.remaining.len());
            let idx = idx.min(self.remaining.len() - 1);
            self.remaining.swap_remove(idx)
        };

        log::debug!("Assigned color {} to class {:?}", color, label);
        self.assigned.insert(label.to_owned(), color);
        color
    }

    fn next_wrapped(&mut self) -> Color {
        if self.wrapped == 0 {
            log::warn!(
                "Color pool of {} exhausted, reusing palette colors",
                self.palette.len()
            );
        }
        let color = match self.palette.len() {
            0 => FALLBACK_COLOR,
            len => self.palette[self.wrapped % len],
        };
        self.wrapped += 1;
        color
    }

    /// Color of `label` if it has been assigned.
    pub fn get(&self, label: &str) -> Option<Color> {
        self.assigned.get(label).copied()
    }

    /// Number of labels with an assigned color.
    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    /// Number of pool colors not yet handed out.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

impl Default for ColorTable {
    fn default() -> Self {
        Self::random()
    }
}
