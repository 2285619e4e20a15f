pub mod ballistics;
pub mod envelope;
pub mod ghost;
pub mod macro_peak;
pub mod modifiers;
pub mod output;
pub mod transfer;
pub mod utils;

pub use ballistics::{BallisticsCoeffs, BallisticsTable, Fader};
pub use envelope::{EnvelopeFollower, EnvelopeReading};
pub use ghost::{GhostCapacity, GhostEngine, GhostRead, GhostTimeline, TransportEvent, MAX_CHANNELS};
pub use macro_peak::MacroPeakTracker;
pub use modifiers::SampleHold;
pub use output::Clipper;
pub use transfer::{target_gain, TransferInput};

/// Per-channel state for the whole signal path. Never shared across channels.
pub struct ChannelState {
    pub live_env: EnvelopeFollower,
    pub guide_env: EnvelopeFollower,
    pub macro_peak: MacroPeakTracker,
    pub fader: Fader,
    pub hold: SampleHold,
    last_target: f32,
    last_applied: f32,
}

impl ChannelState {
    pub fn new(sr: f32) -> Self {
        Self {
            live_env: EnvelopeFollower::new(sr),
            guide_env: EnvelopeFollower::new(sr),
            macro_peak: MacroPeakTracker::new(sr),
            fader: Fader::new(),
            hold: SampleHold::default(),
            last_target: 1.0,
            last_applied: 1.0,
        }
    }

    pub fn prepare(&mut self, sr: f32) {
        self.live_env.prepare(sr);
        self.guide_env.prepare(sr);
        self.macro_peak.prepare(sr);
    }

    /// Transport restarted or looped: next sample snaps, hold memory is dropped.
    pub fn resync(&mut self) {
        self.fader.request_snap();
        self.hold.reset();
    }

    pub fn reset(&mut self) {
        self.live_env.reset();
        self.guide_env.reset();
        self.macro_peak.reset();
        self.fader.reset();
        self.hold.reset();
        self.last_target = 1.0;
        self.last_applied = 1.0;
    }

    #[inline]
    pub(crate) fn set_last(&mut self, target: f32, applied: f32) {
        self.last_target = target;
        self.last_applied = applied;
    }

    /// Raw target gain of the most recent sample.
    pub fn last_target(&self) -> f32 {
        self.last_target
    }

    /// Gain actually applied to the most recent sample, after Invert.
    pub fn last_applied(&self) -> f32 {
        self.last_applied
    }

    pub fn fader_gain(&self) -> f32 {
        self.fader.gain()
    }
}
