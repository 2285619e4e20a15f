//! Fader Ballistics
//!
//! Glides the applied gain toward the raw target with asymmetric one-pole
//! smoothing. Which direction is fast depends on the mode:
//! - **Neutral / Ride / Expand**: falling gain is fast (protective ducking),
//!   recovery is slow.
//! - **Punch**: rising gain is fast to catch transients, falling is slow.
//! - **Ghost playback**: long symmetric glide, the timeline has no transient
//!   detail worth chasing.
//! - **Expand** recovers over one beat of the host tempo.
//!
//! A pending snap (transport resync) makes the next sample jump straight to
//! its target.

use crate::dsp::utils::{flush_denormal, time_constant_coeff};
use crate::modes::Mode;

const NEUTRAL_FALL_MS: f32 = 5.0;
const NEUTRAL_RISE_MS: f32 = 50.0;
const RIDE_FALL_MS: f32 = 15.0;
const RIDE_RISE_MS: f32 = 30.0;
const PUNCH_RISE_MS: f32 = 1.5;
const PUNCH_FALL_MS: f32 = 40.0;
const EXPAND_FALL_MS: f32 = 10.0;
const GHOST_GLIDE_MS: f32 = 250.0;

/// Smoothing coefficients for one block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BallisticsCoeffs {
    /// Used while the gain is rising toward its target.
    pub rise: f32,
    /// Used while the gain is falling toward its target.
    pub fall: f32,
}

impl BallisticsCoeffs {
    fn from_ms(rise_ms: f32, fall_ms: f32, sample_rate: f32) -> Self {
        Self {
            rise: time_constant_coeff(rise_ms, sample_rate),
            fall: time_constant_coeff(fall_ms, sample_rate),
        }
    }
}

/// Precomputed per-mode coefficients. The tempo-synced Expand release is
/// recomputed only when the BPM changes.
pub struct BallisticsTable {
    sample_rate: f32,
    neutral: BallisticsCoeffs,
    ride: BallisticsCoeffs,
    punch: BallisticsCoeffs,
    glide: BallisticsCoeffs,
    expand: BallisticsCoeffs,
    expand_bpm: f64,
}

impl BallisticsTable {
    pub fn new(sample_rate: f32) -> Self {
        let mut table = Self {
            sample_rate,
            neutral: BallisticsCoeffs { rise: 0.0, fall: 0.0 },
            ride: BallisticsCoeffs { rise: 0.0, fall: 0.0 },
            punch: BallisticsCoeffs { rise: 0.0, fall: 0.0 },
            glide: BallisticsCoeffs { rise: 0.0, fall: 0.0 },
            expand: BallisticsCoeffs { rise: 0.0, fall: 0.0 },
            expand_bpm: 0.0,
        };
        table.prepare(sample_rate);
        table
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.neutral = BallisticsCoeffs::from_ms(NEUTRAL_RISE_MS, NEUTRAL_FALL_MS, sample_rate);
        self.ride = BallisticsCoeffs::from_ms(RIDE_RISE_MS, RIDE_FALL_MS, sample_rate);
        self.punch = BallisticsCoeffs::from_ms(PUNCH_RISE_MS, PUNCH_FALL_MS, sample_rate);
        self.glide = BallisticsCoeffs::from_ms(GHOST_GLIDE_MS, GHOST_GLIDE_MS, sample_rate);
        // force the Expand pair to be rebuilt on next use
        self.expand_bpm = 0.0;
    }

    /// Coefficients for the block. `bpm` must already be sanitized.
    pub fn coeffs(&mut self, mode: Mode, bpm: f64, timeline_playback: bool) -> BallisticsCoeffs {
        if timeline_playback {
            return self.glide;
        }
        match mode {
            Mode::Neutral => self.neutral,
            Mode::Ride => self.ride,
            Mode::Punch => self.punch,
            Mode::Expand => {
                if bpm != self.expand_bpm {
                    let beat_ms = (60_000.0 / bpm) as f32;
                    self.expand =
                        BallisticsCoeffs::from_ms(beat_ms, EXPAND_FALL_MS, self.sample_rate);
                    self.expand_bpm = bpm;
                }
                self.expand
            }
        }
    }
}

/// Continuous per-channel fader.
#[derive(Clone, Debug)]
pub struct Fader {
    gain: f32,
    snap_pending: bool,
}

impl Default for Fader {
    fn default() -> Self {
        Self::new()
    }
}

impl Fader {
    pub fn new() -> Self {
        Self {
            gain: 1.0,
            snap_pending: false,
        }
    }

    /// Make the next `process` call jump to its target.
    pub fn request_snap(&mut self) {
        self.snap_pending = true;
    }

    #[inline]
    pub fn process(&mut self, target: f32, coeffs: BallisticsCoeffs) -> f32 {
        let target = if target.is_finite() { target.max(0.0) } else { 0.0 };
        if self.snap_pending {
            self.gain = target;
            self.snap_pending = false;
            return self.gain;
        }

        let c = if target > self.gain {
            coeffs.rise
        } else {
            coeffs.fall
        };
        self.gain = flush_denormal(c * self.gain + (1.0 - c) * target);
        self.gain
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn reset(&mut self) {
        self.gain = 1.0;
        self.snap_pending = false;
    }
}
