//! Envelope Estimation
//!
//! Per-channel level followers for the live and guide buses. Every downstream
//! gain decision (mode transfer, gate, metering, Ghost recording) reads these
//! envelopes, so they run first in the per-sample chain.
//!
//! # Design Notes
//! - One follower per signal per channel, updated once per sample
//! - Two views exposed: smoothed RMS and peak-hold with release
//! - **No Allocations**: stack-only state, safe on the audio thread.
//!
//! # Time Constants
//! - **RMS**: 10ms mean-square integration. Short enough to follow phrasing,
//!   long enough to ignore the waveform itself.
//! - **Peak**: instant attack, 50ms exponential release. Used for crest-factor
//!   estimation in Punch mode.

use crate::dsp::utils::{flush_denormal, time_constant_coeff};

/// Mean-square integration time.
const RMS_TIME_MS: f32 = 10.0;
/// Peak release time.
const PEAK_RELEASE_MS: f32 = 50.0;

/// Envelope state for a single sample.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct EnvelopeReading {
    /// Square root of the smoothed mean square.
    pub rms: f32,
    /// Peak hold with exponential release.
    pub peak: f32,
}

impl EnvelopeReading {
    /// Peak to RMS ratio, guarded against silence.
    #[inline]
    pub fn crest_factor(&self) -> f32 {
        if self.rms <= 1e-6 {
            1.0
        } else {
            (self.peak / self.rms).max(1.0)
        }
    }
}

/// RMS + peak follower for one signal on one channel.
#[derive(Clone, Debug)]
pub struct EnvelopeFollower {
    rms_coeff: f32,
    peak_coeff: f32,

    mean_sq: f32,
    peak: f32,
}

impl EnvelopeFollower {
    pub fn new(sample_rate: f32) -> Self {
        let mut follower = Self {
            rms_coeff: 0.0,
            peak_coeff: 0.0,
            mean_sq: 0.0,
            peak: 0.0,
        };
        follower.prepare(sample_rate);
        follower
    }

    /// Update coefficients for a new sample rate.
    pub fn prepare(&mut self, sample_rate: f32) {
        self.rms_coeff = time_constant_coeff(RMS_TIME_MS, sample_rate);
        self.peak_coeff = time_constant_coeff(PEAK_RELEASE_MS, sample_rate);
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> EnvelopeReading {
        let x_abs = if input.is_finite() { input.abs() } else { 0.0 };

        self.mean_sq = self.rms_coeff * self.mean_sq + (1.0 - self.rms_coeff) * x_abs * x_abs;
        self.mean_sq = flush_denormal(self.mean_sq);

        // Instant attack, exponential release
        let decayed = flush_denormal(self.peak * self.peak_coeff);
        self.peak = if x_abs > decayed { x_abs } else { decayed };

        self.reading()
    }

    #[inline]
    pub fn reading(&self) -> EnvelopeReading {
        EnvelopeReading {
            rms: self.mean_sq.sqrt(),
            peak: self.peak,
        }
    }

    pub fn reset(&mut self) {
        self.mean_sq = 0.0;
        self.peak = 0.0;
    }
}
