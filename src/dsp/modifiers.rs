//! Post-fader modifier chain: Invert -> Shred -> Gate.
//!
//! Each stage is a small pure function except the Crush sample-and-hold, which
//! keeps one held value and a countdown per channel.

use std::f32::consts::FRAC_PI_2;

use crate::modes::ShredVariant;

/// Invert never applies more than +24 dB.
pub const INVERT_CEILING: f32 = 16.0;
const INVERT_FLOOR: f32 = 1.0 / INVERT_CEILING;

// Fold: drive grows with the macro peak anchor.
const FOLD_DRIVE_SCALE: f32 = 6.0;
const FOLD_WET: f32 = 0.6;

// Crush: hold length is this fraction of a beat.
const CRUSH_DIVISIONS_PER_BEAT: f64 = 128.0;
const CRUSH_WET: f32 = 0.7;
const CRUSH_DRY_DRIVE: f32 = 1.5;

const FUZZ_DRIVE: f32 = 25.0;
const FUZZ_LEVEL: f32 = 0.3;

/// Reciprocal of the fader gain, floor-guarded and capped.
#[inline]
pub fn invert_gain(gain: f32) -> f32 {
    let g = if gain.is_finite() { gain } else { 0.0 };
    (1.0 / g.max(INVERT_FLOOR)).min(INVERT_CEILING)
}

/// Sine wavefold blended with the dry signal.
#[inline]
pub fn fold(x: f32, macro_peak: f32) -> f32 {
    let drive = 1.0 + FOLD_DRIVE_SCALE * macro_peak.clamp(0.0, 1.0);
    let wet = (x * drive * FRAC_PI_2).sin();
    x * (1.0 - FOLD_WET) + wet * FOLD_WET
}

/// Hard-driven tanh fuzz at a fixed output level.
#[inline]
pub fn fuzz(x: f32) -> f32 {
    (x * FUZZ_DRIVE).tanh() * FUZZ_LEVEL
}

/// Hold length in samples for the tempo-locked decimator.
pub fn crush_hold_samples(sample_rate: f32, seconds_per_beat: f64) -> u32 {
    let samples = sample_rate as f64 * seconds_per_beat / CRUSH_DIVISIONS_PER_BEAT;
    samples.round().clamp(1.0, u32::MAX as f64) as u32
}

/// Per-channel sample-and-hold memory.
#[derive(Clone, Debug, Default)]
pub struct SampleHold {
    held: f32,
    counter: u32,
}

impl SampleHold {
    /// Tempo-locked decimation blended with a mildly saturated dry signal.
    #[inline]
    pub fn crush(&mut self, x: f32, hold_samples: u32) -> f32 {
        if self.counter == 0 {
            self.held = x;
            self.counter = hold_samples.max(1);
        }
        self.counter -= 1;
        self.held * CRUSH_WET + (x * CRUSH_DRY_DRIVE).tanh() * (1.0 - CRUSH_WET)
    }

    pub fn reset(&mut self) {
        self.held = 0.0;
        self.counter = 0;
    }
}

/// Apply the selected Shred variant.
#[inline]
pub fn shred(
    x: f32,
    variant: ShredVariant,
    macro_peak: f32,
    hold: &mut SampleHold,
    hold_samples: u32,
) -> f32 {
    match variant {
        ShredVariant::Fold => fold(x, macro_peak),
        ShredVariant::Crush => hold.crush(x, hold_samples),
        ShredVariant::Fuzz => fuzz(x),
    }
}

/// Zero the sample when the guide sits below `threshold * macro_peak`.
#[inline]
pub fn gate(x: f32, guide_level: f32, threshold: f32, macro_peak: f32) -> f32 {
    if guide_level < threshold * macro_peak {
        0.0
    } else {
        x
    }
}
