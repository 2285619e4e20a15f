//! Thread-safe metering for the control/UI layer.
//!
//! The audio thread stores once per callback; readers poll on their own
//! schedule. Floats are kept as `AtomicU32` bit patterns, everything is
//! `Relaxed`: last-value visibility is all the UI needs.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::modes::GhostStatus;

/// Gain reported for a fully closed fader.
pub const GAIN_DB_FLOOR: f32 = -100.0;

#[derive(Default)]
pub struct Meters {
    live_level: AtomicU32,
    guide_level: AtomicU32,
    output_level: AtomicU32,
    gain_db: AtomicU32,
    ghost_target: AtomicU32,
    ghost_status: AtomicU32,
    ghost_last_beat: AtomicU32,
    guide_active: AtomicBool,
    clipping: AtomicBool,
    record_led: AtomicBool,
    play_led: AtomicBool,
}

/// Values published at the end of one callback.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeterFrame {
    pub live_level: f32,
    pub guide_level: f32,
    pub output_level: f32,
    pub gain: f32,
    pub ghost_target: f32,
    pub ghost_last_beat: f64,
    pub guide_active: bool,
    pub clipping: bool,
}

impl Meters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: &MeterFrame, status: GhostStatus) {
        self.live_level
            .store(frame.live_level.to_bits(), Ordering::Relaxed);
        self.guide_level
            .store(frame.guide_level.to_bits(), Ordering::Relaxed);
        self.output_level
            .store(frame.output_level.to_bits(), Ordering::Relaxed);
        let gain_db = if frame.gain <= 1e-5 {
            GAIN_DB_FLOOR
        } else {
            20.0 * frame.gain.log10()
        };
        self.gain_db.store(gain_db.to_bits(), Ordering::Relaxed);
        self.ghost_target
            .store(frame.ghost_target.to_bits(), Ordering::Relaxed);
        self.ghost_last_beat
            .store((frame.ghost_last_beat as f32).to_bits(), Ordering::Relaxed);
        self.guide_active.store(frame.guide_active, Ordering::Relaxed);
        self.clipping.store(frame.clipping, Ordering::Relaxed);

        self.ghost_status.store(status as u32, Ordering::Relaxed);
        self.record_led.store(
            matches!(status, GhostStatus::Recording | GhostStatus::Armed),
            Ordering::Relaxed,
        );
        self.play_led
            .store(status == GhostStatus::Playing, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.publish(&MeterFrame::default(), GhostStatus::Idle);
    }

    pub fn get_live_level(&self) -> f32 {
        f32::from_bits(self.live_level.load(Ordering::Relaxed))
    }

    pub fn get_guide_level(&self) -> f32 {
        f32::from_bits(self.guide_level.load(Ordering::Relaxed))
    }

    pub fn get_output_level(&self) -> f32 {
        f32::from_bits(self.output_level.load(Ordering::Relaxed))
    }

    pub fn get_gain_db(&self) -> f32 {
        f32::from_bits(self.gain_db.load(Ordering::Relaxed))
    }

    pub fn get_ghost_target(&self) -> f32 {
        f32::from_bits(self.ghost_target.load(Ordering::Relaxed))
    }

    pub fn get_ghost_status(&self) -> GhostStatus {
        GhostStatus::from_u32(self.ghost_status.load(Ordering::Relaxed))
    }

    pub fn get_ghost_last_beat(&self) -> f32 {
        f32::from_bits(self.ghost_last_beat.load(Ordering::Relaxed))
    }

    pub fn is_guide_active(&self) -> bool {
        self.guide_active.load(Ordering::Relaxed)
    }

    pub fn is_clipping(&self) -> bool {
        self.clipping.load(Ordering::Relaxed)
    }

    pub fn record_led(&self) -> bool {
        self.record_led.load(Ordering::Relaxed)
    }

    pub fn play_led(&self) -> bool {
        self.play_led.load(Ordering::Relaxed)
    }
}
