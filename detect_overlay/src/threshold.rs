//! Confidence threshold shared between the input surface and the frame loop.
//!
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use anyhow::{bail, Result};

pub const DEFAULT_THRESHOLD: f32 = 0.6;

/// Steps per unit of the threshold input control (step 0.01).
const STEPS: f32 = 100.0;

/// Minimum score required for a detection to be drawn.
///
/// Clones share the same value.
#[derive(Clone, Debug)]
pub struct ConfidenceThreshold {
    bits: Arc<AtomicU32>,
}

impl ConfidenceThreshold {
    pub fn new(value: f32) -> Result<Self> {
        let threshold = Self {
            bits: Arc::new(AtomicU32::new(DEFAULT_THRESHOLD.to_bits())),
        };
        threshold.set(value)?;
        Ok(threshold)
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Store `value` clamped to `[0, 1]` and snapped to the input step. Returns the stored value.
    pub fn set(&self, value: f32) -> Result<f32> {
        if !value.is_finite() {
            bail!("threshold must be a finite number, got {value}");
        }
        let value = (value.clamp(0.0, 1.0) * STEPS).round() / STEPS;
        self.bits.store(value.to_bits(), Ordering::Relaxed);
        log::debug!("Confidence threshold set to {value:.2}");
        Ok(value)
    }
}

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(DEFAULT_THRESHOLD.to_bits())),
        }
    }
}
