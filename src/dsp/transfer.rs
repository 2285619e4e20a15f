//! Mode Transfer Functions
//!
//! Pure mapping from live/guide envelopes to a raw target gain. Dispatched once
//! per sample on the `Mode` captured for the block; no state lives here so each
//! mode can be tested in isolation.
//!
//! | Mode    | Gain                                                        |
//! |---------|-------------------------------------------------------------|
//! | Neutral | guide / live, zero when the guide is silent                 |
//! | Ride    | Neutral with its dB value multiplied by the ratio           |
//! | Expand  | >= 1, lifts guide passages below the macro-peak threshold   |
//! | Punch   | Neutral times a crest-factor transient boost (capped x3)    |

use crate::dsp::utils::{db_to_lin, lin_to_db, smoothstep};
use crate::modes::Mode;

/// Hard ceiling on any target gain.
pub const MAX_TARGET_GAIN: f32 = 32.0;
/// Guide level treated as silence.
pub const GUIDE_SILENCE: f32 = 1e-5;
/// Stand-in divisor for a live level of exactly zero; also the crest floor.
const LIVE_FLOOR: f32 = 1e-5;

// Timeline playback has no real-time crest data, so it is held to +-12 dB.
const TIMELINE_MIN_GAIN: f32 = 0.251_188_64;
const TIMELINE_MAX_GAIN: f32 = 3.981_071_7;

// Expand: guide levels below UPPER * anchor are lifted toward it.
const EXPAND_UPPER_FRACTION: f32 = 0.5;
// Below LOWER * anchor the lift fades out so the noise floor stays put.
const EXPAND_LOWER_FRACTION: f32 = 0.05;

// Punch: how much sharper the guide must be before the ratio branch kicks in.
const PUNCH_CREST_MARGIN: f32 = 1.15;
// Relative crest difference counted as "close".
const PUNCH_CLOSE_FRACTION: f32 = 0.15;
// Crest factor counted as "high" (a sine is ~1.41).
const PUNCH_HIGH_CREST: f32 = 2.0;
const PUNCH_FIXED_BOOST: f32 = 1.25;
const PUNCH_MAX_BOOST: f32 = 3.0;
// Guide peak at which loudness compensation reaches unity.
const PUNCH_REFERENCE_PEAK: f32 = 0.5;
const PUNCH_MAX_COMPENSATION: f32 = 2.0;

/// Everything a transfer function may look at for one sample.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransferInput {
    pub live_rms: f32,
    pub live_peak: f32,
    /// Guide RMS, or the timeline value during Ghost playback.
    pub guide_rms: f32,
    pub guide_peak: f32,
    pub macro_peak: f32,
    /// Intensity/ratio selector as a float, >= 1.
    pub ratio: f32,
    /// Guide values come from the Ghost timeline.
    pub from_timeline: bool,
}

/// Raw target gain for `mode`, clamped to [0, 32].
pub fn target_gain(mode: Mode, input: &TransferInput) -> f32 {
    let raw = match mode {
        Mode::Neutral => neutral(input.live_rms, input.guide_rms),
        Mode::Ride => ride(input.live_rms, input.guide_rms, input.ratio),
        Mode::Expand => expand(input.guide_rms, input.macro_peak, input.ratio),
        Mode::Punch => punch(input),
    };

    let gain = if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, MAX_TARGET_GAIN)
    };

    // Exact zero (recorded silence) still ducks fully
    if input.from_timeline && gain > 0.0 {
        gain.clamp(TIMELINE_MIN_GAIN, TIMELINE_MAX_GAIN)
    } else {
        gain
    }
}

#[inline]
pub fn neutral(live_rms: f32, guide_rms: f32) -> f32 {
    if !(guide_rms >= GUIDE_SILENCE) {
        return 0.0;
    }
    // Any positive live level divides exactly; the [0, 32] clamp bounds the result
    let live = if live_rms > 0.0 { live_rms } else { LIVE_FLOOR };
    guide_rms / live
}

#[inline]
pub fn ride(live_rms: f32, guide_rms: f32, ratio: f32) -> f32 {
    let base = neutral(live_rms, guide_rms);
    if base <= 0.0 || ratio <= 1.0 {
        return base;
    }
    db_to_lin(lin_to_db(base) * ratio)
}

pub fn expand(guide_rms: f32, macro_peak: f32, ratio: f32) -> f32 {
    let upper = macro_peak * EXPAND_UPPER_FRACTION;
    if guide_rms >= upper || guide_rms < GUIDE_SILENCE {
        return 1.0;
    }

    let exponent = if ratio <= 1.0 { 0.5 } else { 1.0 / ratio };
    let x = guide_rms / upper;
    let expanded = upper * x.powf(exponent);

    let lower = macro_peak * EXPAND_LOWER_FRACTION;
    let weight = smoothstep(0.5 * lower, lower, guide_rms);
    let effective = guide_rms + (expanded - guide_rms) * weight;

    (effective / guide_rms).max(1.0)
}

#[inline]
fn crest(peak: f32, rms: f32) -> f32 {
    if rms <= LIVE_FLOOR {
        1.0
    } else {
        (peak / rms).max(1.0)
    }
}

pub fn punch(input: &TransferInput) -> f32 {
    let base = neutral(input.live_rms, input.guide_rms);
    if base <= 0.0 {
        return 0.0;
    }

    let guide_crest = crest(input.guide_peak, input.guide_rms);
    let live_crest = crest(input.live_peak, input.live_rms);

    let boost = if guide_crest > live_crest * PUNCH_CREST_MARGIN {
        // Quieter guide peaks get more help
        let compensation = (PUNCH_REFERENCE_PEAK / input.guide_peak.max(1e-3))
            .sqrt()
            .clamp(1.0, PUNCH_MAX_COMPENSATION);
        (guide_crest / live_crest) * compensation
    } else if (guide_crest - live_crest).abs() <= PUNCH_CLOSE_FRACTION * live_crest
        && guide_crest >= PUNCH_HIGH_CREST
        && live_crest >= PUNCH_HIGH_CREST
    {
        PUNCH_FIXED_BOOST
    } else {
        1.0
    };

    let scaled = 1.0 + (boost - 1.0) * input.ratio.max(1.0);
    base * scaled.clamp(1.0, PUNCH_MAX_BOOST)
}
