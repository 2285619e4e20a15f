//! Macro Peak Tracker
//!
//! Slow-release loudness anchor derived from the guide RMS. Expand mode and
//! the Gate/Fold modifiers measure the guide against this anchor, so it must
//! never reach zero.

use crate::dsp::utils::time_constant_coeff;

/// Effective release of the anchor.
const RELEASE_MS: f32 = 2000.0;
/// Floor keeping downstream divisions finite.
pub const MACRO_PEAK_FLOOR: f32 = 1e-4;

#[derive(Clone, Debug)]
pub struct MacroPeakTracker {
    release_coeff: f32,
    value: f32,
}

impl MacroPeakTracker {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            release_coeff: time_constant_coeff(RELEASE_MS, sample_rate),
            value: MACRO_PEAK_FLOOR,
        }
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        self.release_coeff = time_constant_coeff(RELEASE_MS, sample_rate);
    }

    /// Snap up to louder guide levels, otherwise decay toward the floor.
    #[inline]
    pub fn update(&mut self, guide_rms: f32) -> f32 {
        if guide_rms > self.value {
            self.value = guide_rms;
        } else {
            self.value *= self.release_coeff;
        }
        if !(self.value >= MACRO_PEAK_FLOOR) {
            self.value = MACRO_PEAK_FLOOR;
        }
        self.value
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = MACRO_PEAK_FLOOR;
    }
}
