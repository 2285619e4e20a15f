use nih_plug::prelude::Enum;

// =============================================================================
// PROCESSING MODES
// =============================================================================

/// Gain transfer function applied to the live bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[repr(usize)]
pub enum Mode {
    /// Plain level match: live follows the guide loudness.
    #[name = "Neutral"]
    Neutral,
    /// Level match with the dB gain multiplied by the ratio.
    #[name = "Ride"]
    Ride,
    /// Upward expansion of quiet guide passages toward the macro peak.
    #[name = "Expand"]
    Expand,
    /// Transient boost driven by guide vs live crest factor.
    #[name = "Punch"]
    Punch,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Neutral
    }
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Neutral => "Neutral",
            Mode::Ride => "Ride",
            Mode::Expand => "Expand",
            Mode::Punch => "Punch",
        }
    }

    /// Whether the final clipper should add analog-style coloration.
    pub fn soft_clips(&self) -> bool {
        matches!(self, Mode::Ride | Mode::Punch)
    }
}

/// Waveshaper used by the Shred modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[repr(usize)]
pub enum ShredVariant {
    #[name = "Fold"]
    Fold,
    #[name = "Crush"]
    Crush,
    #[name = "Fuzz"]
    Fuzz,
}

impl Default for ShredVariant {
    fn default() -> Self {
        ShredVariant::Fold
    }
}

/// Where the guide loudness comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[repr(usize)]
pub enum GuideSource {
    /// Aux sidechain input. Silence when the bus is absent.
    #[name = "Sidechain"]
    Sidechain,
    /// The live bus guides itself.
    #[name = "Self"]
    Live,
}

impl Default for GuideSource {
    fn default() -> Self {
        GuideSource::Sidechain
    }
}

// =============================================================================
// GHOST STATUS
// =============================================================================

/// Ghost engine state as shown on the metering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GhostStatus {
    Idle = 0,
    /// Recording requested, transport stopped.
    Armed = 1,
    Recording = 2,
    Playing = 3,
    /// Storage exhausted; recording no longer extends the timeline.
    Full = 4,
    /// Playback requested with nothing recorded.
    Error = 5,
}

impl GhostStatus {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => GhostStatus::Armed,
            2 => GhostStatus::Recording,
            3 => GhostStatus::Playing,
            4 => GhostStatus::Full,
            5 => GhostStatus::Error,
            _ => GhostStatus::Idle,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GhostStatus::Idle => "Idle",
            GhostStatus::Armed => "Armed",
            GhostStatus::Recording => "Recording",
            GhostStatus::Playing => "Playing",
            GhostStatus::Full => "Full",
            GhostStatus::Error => "Error",
        }
    }
}
