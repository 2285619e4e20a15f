//! Per-callback configuration snapshot.
//!
//! The control thread owns the parameters; the audio thread copies them into an
//! `EngineConfig` once per callback and never looks at them again until the next
//! one. A change landing mid-buffer is therefore picked up on the next block.

use crate::modes::{GuideSource, Mode, ShredVariant};

pub const MIN_RATIO: u32 = 1;
pub const MAX_RATIO: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub mode: Mode,
    /// Intensity/ratio selector, 1..=8.
    pub ratio: u32,
    pub invert: bool,
    pub shred: bool,
    pub shred_variant: ShredVariant,
    pub gate: bool,
    /// Fraction of the macro peak below which the gate closes.
    pub gate_threshold: f32,
    pub guide_source: GuideSource,
    pub ghost_record: bool,
    pub ghost_play: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Neutral,
            ratio: MIN_RATIO,
            invert: false,
            shred: false,
            shred_variant: ShredVariant::Fold,
            gate: false,
            gate_threshold: 0.1,
            guide_source: GuideSource::Sidechain,
            ghost_record: false,
            ghost_play: false,
        }
    }
}

impl EngineConfig {
    /// Clamp selector values into their legal ranges.
    pub fn sanitized(mut self) -> Self {
        self.ratio = self.ratio.clamp(MIN_RATIO, MAX_RATIO);
        self.gate_threshold = if self.gate_threshold.is_finite() {
            self.gate_threshold.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    #[inline]
    pub fn ratio_f32(&self) -> f32 {
        self.ratio.clamp(MIN_RATIO, MAX_RATIO) as f32
    }
}
