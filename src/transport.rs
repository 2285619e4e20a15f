//! Host transport snapshot, captured once per callback.

pub const DEFAULT_BPM: f64 = 120.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransportSnapshot {
    pub bpm: f64,
    /// Musical position of the first sample in the block, in beats.
    pub position_beats: f64,
    /// False when the host did not report a position; `position_beats` is 0.
    pub position_known: bool,
    pub running: bool,
}

impl Default for TransportSnapshot {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            position_beats: 0.0,
            position_known: false,
            running: false,
        }
    }
}

impl TransportSnapshot {
    /// Build a snapshot from optional host values, substituting safe defaults.
    pub fn from_host(tempo: Option<f64>, position_beats: Option<f64>, running: bool) -> Self {
        let bpm = match tempo {
            Some(t) if t.is_finite() && t > 0.0 => t,
            _ => DEFAULT_BPM,
        };
        let (position_beats, position_known) = match position_beats {
            Some(p) if p.is_finite() => (p, true),
            _ => (0.0, false),
        };
        Self {
            bpm,
            position_beats,
            position_known,
            running,
        }
    }

    /// Known-position running snapshot.
    pub fn playing(bpm: f64, position_beats: f64) -> Self {
        Self::from_host(Some(bpm), Some(position_beats), true)
    }

    /// Known-position stopped snapshot.
    pub fn stopped(bpm: f64, position_beats: f64) -> Self {
        Self::from_host(Some(bpm), Some(position_beats), false)
    }

    /// BPM with non-positive or non-finite values replaced by the default.
    #[inline]
    pub fn safe_bpm(&self) -> f64 {
        if self.bpm.is_finite() && self.bpm > 0.0 {
            self.bpm
        } else {
            DEFAULT_BPM
        }
    }

    /// Musical-position advance per audio sample.
    #[inline]
    pub fn beats_per_sample(&self, sample_rate: f32) -> f64 {
        (self.safe_bpm() / 60.0) / sample_rate.max(1.0) as f64
    }

    /// Length of one beat in seconds.
    #[inline]
    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.safe_bpm()
    }
}
