//! Ghost Timeline Engine
//!
//! Records guide loudness against musical position and replays it later in
//! place of the live guide envelope. The timeline is indexed in ticks
//! (`position_beats * ticks_per_beat`), one lane per channel.
//!
//! # Lifecycle
//! - **Setup**: storage is allocated once, sized by `GhostCapacity`.
//! - **Recording**: the audio thread writes guide RMS into the tick under each
//!   sample. Consecutive samples landing in the same tick overwrite (last write
//!   wins). Small gaps are interpolate-filled, large ones stay unwritten.
//! - **Playing**: two neighbouring ticks are interpolated; any unwritten tick
//!   means "no data".
//! - Storage is never grown or shrunk on the audio thread. Writes past the end
//!   are dropped and reported as `GhostStatus::Full`.
//!
//! # Transport Resync
//! `begin_block` compares the host transport with what the previous block
//! predicted. A stopped->running edge or a backward jump is reported as a
//! `TransportEvent` so the engine can snap its ballistics. Recorded data is
//! never discarded by a resync.

use crate::modes::GhostStatus;
use crate::transport::TransportSnapshot;

pub const MAX_CHANNELS: usize = 2;

/// Marker for a slot that has never been written.
const UNWRITTEN: f32 = -1.0;

/// Largest tick gap that gets interpolate-filled while recording.
pub const MAX_GAP_FILL_TICKS: usize = 32;

/// Below this level interpolation falls back to linear.
const EXP_INTERP_FLOOR: f32 = 1e-6;

/// Timeline resolution and duration ceiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GhostCapacity {
    pub ticks_per_beat: u32,
    pub max_beats: u32,
}

impl GhostCapacity {
    /// One hour of musical time at 240 BPM.
    pub const PLUGIN_DEFAULT: GhostCapacity = GhostCapacity {
        ticks_per_beat: 240,
        max_beats: 14_400,
    };

    pub fn slots(&self) -> usize {
        self.ticks_per_beat as usize * self.max_beats as usize
    }
}

impl Default for GhostCapacity {
    fn default() -> Self {
        Self::PLUGIN_DEFAULT
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Pre-sized per-channel loudness lanes indexed by tick.
pub struct GhostTimeline {
    lanes: [Vec<f32>; MAX_CHANNELS],
    ticks_per_beat: f64,
    written: bool,
}

impl Default for GhostTimeline {
    fn default() -> Self {
        Self {
            lanes: [Vec::new(), Vec::new()],
            ticks_per_beat: GhostCapacity::PLUGIN_DEFAULT.ticks_per_beat as f64,
            written: false,
        }
    }
}

impl GhostTimeline {
    /// Allocates the full capacity up front. Never call on the audio thread.
    pub fn new(capacity: GhostCapacity) -> Self {
        let slots = capacity.slots();
        Self {
            lanes: [vec![UNWRITTEN; slots], vec![UNWRITTEN; slots]],
            ticks_per_beat: capacity.ticks_per_beat.max(1) as f64,
            written: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.lanes[0].len()
    }

    pub fn ticks_per_beat(&self) -> f64 {
        self.ticks_per_beat
    }

    /// True when nothing has ever been recorded.
    pub fn is_empty(&self) -> bool {
        !self.written
    }

    /// Tick index under a musical position, `None` before the start.
    #[inline]
    pub fn tick_at(&self, position_beats: f64) -> Option<usize> {
        let tick = position_beats * self.ticks_per_beat;
        if tick.is_finite() && tick >= 0.0 {
            Some(tick.floor() as usize)
        } else {
            None
        }
    }

    /// Recorded value at one tick, `None` when unwritten or out of range.
    #[inline]
    pub fn get(&self, channel: usize, tick: usize) -> Option<f32> {
        let v = *self.lanes.get(channel)?.get(tick)?;
        if v >= 0.0 {
            Some(v)
        } else {
            None
        }
    }

    #[inline]
    fn set(&mut self, channel: usize, tick: usize, value: f32) -> bool {
        match self.lanes.get_mut(channel).and_then(|lane| lane.get_mut(tick)) {
            Some(slot) => {
                *slot = if value.is_finite() { value.max(0.0) } else { 0.0 };
                self.written = true;
                true
            }
            None => false,
        }
    }

    /// Interpolated loudness at a fractional position.
    ///
    /// Falls are interpolated multiplicatively and rises additively so a decay
    /// replays as a smooth exponential rather than a staircase.
    pub fn read(&self, channel: usize, position_beats: f64) -> Option<f32> {
        let tick = position_beats * self.ticks_per_beat;
        if !tick.is_finite() || tick < 0.0 {
            return None;
        }
        let i0 = tick.floor() as usize;
        let t = (tick - tick.floor()) as f32;
        let a = self.get(channel, i0)?;
        if t <= 1e-6 {
            return Some(a);
        }
        let b = self.get(channel, i0 + 1)?;
        Some(interpolate(a, b, t))
    }
}

#[inline]
fn interpolate(a: f32, b: f32, t: f32) -> f32 {
    if b < a && a > EXP_INTERP_FLOOR && b > EXP_INTERP_FLOOR {
        a * (b / a).powf(t)
    } else {
        a + (b - a) * t
    }
}

// =============================================================================
// Engine
// =============================================================================

/// What the transport did since the previous block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    None,
    /// Running flag flipped false -> true.
    Started,
    /// Position moved backward (loop or seek).
    Rewound,
}

impl TransportEvent {
    #[inline]
    pub fn needs_resync(&self) -> bool {
        !matches!(self, TransportEvent::None)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GhostState {
    Idle,
    Armed,
    Recording,
    Playing,
}

/// Per-sample playback result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GhostRead {
    /// Interpolated guide loudness.
    Value(f32),
    /// Transport stopped: hold unity gain.
    Hold,
    /// Transport running but the timeline has no data here: fade out.
    Exhausted,
}

pub struct GhostEngine {
    timeline: GhostTimeline,
    capacity: GhostCapacity,
    sample_rate: f32,

    state: GhostState,
    status: GhostStatus,

    // Transport tracking
    /// Transport running flag of the current block (previous block until `begin_block`).
    running: bool,
    block_start: f64,
    beats_per_sample: f64,
    expected_next: Option<f64>,

    // Recording cursor
    cursor: Option<usize>,
    last_recorded_beat: f64,
    storage_full: bool,
}

impl GhostEngine {
    /// Creates an engine without storage; call `prepare` before recording.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            timeline: GhostTimeline::default(),
            capacity: GhostCapacity { ticks_per_beat: 0, max_beats: 0 },
            sample_rate,
            state: GhostState::Idle,
            status: GhostStatus::Idle,
            running: false,
            block_start: 0.0,
            beats_per_sample: 0.0,
            expected_next: None,
            cursor: None,
            last_recorded_beat: 0.0,
            storage_full: false,
        }
    }

    /// Set the sample rate and (re)allocate storage if the capacity changed.
    /// Allocates; only call from setup.
    pub fn prepare(&mut self, sample_rate: f32, capacity: GhostCapacity) {
        self.sample_rate = sample_rate;
        if capacity != self.capacity {
            self.timeline = GhostTimeline::new(capacity);
            self.capacity = capacity;
        }
        self.reset();
    }

    /// Forget transport history. Recorded data is kept.
    pub fn reset(&mut self) {
        self.running = false;
        self.block_start = 0.0;
        self.expected_next = None;
        self.cursor = None;
        self.storage_full = false;
    }

    /// Capture the transport and the record/play request for this block.
    pub fn begin_block(
        &mut self,
        transport: &TransportSnapshot,
        record: bool,
        play: bool,
    ) -> TransportEvent {
        let bps = transport.beats_per_sample(self.sample_rate);
        let tolerance = 1.0 / self.timeline.ticks_per_beat();

        let position = if transport.position_known {
            transport.position_beats
        } else {
            self.expected_next.unwrap_or(0.0)
        };

        let event = if transport.running && !self.running {
            TransportEvent::Started
        } else if transport.running && transport.position_known {
            match self.expected_next {
                Some(expected) if position < expected - tolerance => TransportEvent::Rewound,
                Some(expected) if position > expected + tolerance => {
                    // Forward seek: no reset, but never gap-fill across it
                    self.cursor = None;
                    TransportEvent::None
                }
                _ => TransportEvent::None,
            }
        } else {
            TransportEvent::None
        };

        let state = if record {
            if transport.running {
                GhostState::Recording
            } else {
                GhostState::Armed
            }
        } else if play {
            GhostState::Playing
        } else {
            GhostState::Idle
        };

        if event.needs_resync() || state != GhostState::Recording {
            self.cursor = None;
        }
        if event.needs_resync() {
            crate::gf_log!("ghost: transport resync {:?} at beat {:.3}", event, position);
        }

        self.state = state;
        self.update_status();

        self.running = transport.running;
        self.block_start = position;
        // A stopped transport does not advance through the block
        self.beats_per_sample = if transport.running { bps } else { 0.0 };
        event
    }

    /// Advance the expected position past the block just processed.
    pub fn end_block(&mut self, samples: usize) {
        let advance = if self.running {
            self.beats_per_sample * samples as f64
        } else {
            0.0
        };
        self.expected_next = Some(self.block_start + advance);
        self.update_status();
    }

    fn update_status(&mut self) {
        let status = match self.state {
            GhostState::Idle => GhostStatus::Idle,
            GhostState::Armed => GhostStatus::Armed,
            GhostState::Recording if self.storage_full => GhostStatus::Full,
            GhostState::Recording => GhostStatus::Recording,
            GhostState::Playing if self.timeline.is_empty() => GhostStatus::Error,
            GhostState::Playing => GhostStatus::Playing,
        };
        if status != self.status {
            crate::gf_log!("ghost: {} -> {}", self.status.name(), status.name());
            self.status = status;
        }
    }

    /// Musical position of sample `index` within the current block.
    #[inline]
    pub fn position_at(&self, index: usize) -> f64 {
        self.block_start + self.beats_per_sample * index as f64
    }

    /// Write one frame of guide loudness at `position_beats`.
    pub fn record_frame(&mut self, position_beats: f64, values: &[f32]) {
        if self.state != GhostState::Recording {
            return;
        }
        let tick = match self.timeline.tick_at(position_beats) {
            Some(t) => t,
            None => return,
        };
        if tick >= self.timeline.capacity() {
            self.storage_full = true;
            return;
        }

        let channels = values.len().min(MAX_CHANNELS);
        if let Some(prev) = self.cursor {
            let gap = tick.saturating_sub(prev);
            if gap > 1 && gap <= MAX_GAP_FILL_TICKS {
                for (ch, &value) in values.iter().enumerate().take(channels) {
                    let start = self.timeline.get(ch, prev).unwrap_or(value);
                    for k in 1..gap {
                        let t = k as f32 / gap as f32;
                        self.timeline.set(ch, prev + k, start + (value - start) * t);
                    }
                }
            }
        }

        for (ch, &value) in values.iter().enumerate().take(channels) {
            self.timeline.set(ch, tick, value);
        }
        self.cursor = Some(tick);
        self.last_recorded_beat = position_beats;
        self.storage_full = false;
    }

    /// Timeline value for `channel` at `position_beats`.
    #[inline]
    pub fn read(&self, channel: usize, position_beats: f64) -> GhostRead {
        if !self.running {
            return GhostRead::Hold;
        }
        match self.timeline.read(channel, position_beats) {
            Some(v) => GhostRead::Value(v),
            None => GhostRead::Exhausted,
        }
    }

    /// Playback is active and has data to play.
    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state == GhostState::Playing && !self.timeline.is_empty()
    }

    pub fn status(&self) -> GhostStatus {
        self.status
    }

    pub fn last_recorded_beat(&self) -> f64 {
        self.last_recorded_beat
    }

    pub fn timeline(&self) -> &GhostTimeline {
        &self.timeline
    }
}
