//! Guide-following gain engine.
//!
//! Runs the whole per-sample path for every channel of a block:
//! envelopes -> macro peak -> (Ghost record/playback) -> mode transfer ->
//! ballistics -> Invert/Shred/Gate -> clipper, then publishes meters.
//!
//! ## Audio Thread Safety
//! - `process_block` never allocates, locks or blocks
//! - All storage (including the Ghost timeline) is sized in `setup()`
//! - Configuration and transport are captured once per block

use std::sync::Arc;

use anyhow::ensure;
use assert_no_alloc::permit_alloc;

use crate::config::EngineConfig;
use crate::dsp::modifiers::{self, crush_hold_samples, invert_gain};
use crate::dsp::transfer::GUIDE_SILENCE;
use crate::dsp::{
    target_gain, BallisticsTable, ChannelState, Clipper, GhostCapacity, GhostEngine, GhostRead,
    TransferInput, MAX_CHANNELS,
};
use crate::meters::{MeterFrame, Meters};
use crate::modes::GuideSource;
use crate::transport::TransportSnapshot;

pub const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

pub struct Engine {
    sample_rate: f32,
    channel_count: usize,
    channels: [ChannelState; MAX_CHANNELS],
    ghost: GhostEngine,
    capacity: GhostCapacity,
    ballistics: BallisticsTable,
    meters: Arc<Meters>,
}

impl Engine {
    /// No timeline storage is allocated until `setup`.
    pub fn new(capacity: GhostCapacity) -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channel_count: MAX_CHANNELS,
            channels: [
                ChannelState::new(DEFAULT_SAMPLE_RATE),
                ChannelState::new(DEFAULT_SAMPLE_RATE),
            ],
            ghost: GhostEngine::new(DEFAULT_SAMPLE_RATE),
            capacity,
            ballistics: BallisticsTable::new(DEFAULT_SAMPLE_RATE),
            meters: Arc::new(Meters::new()),
        }
    }

    /// Derive all coefficients and size the Ghost timeline. Not real-time safe.
    pub fn setup(
        &mut self,
        sample_rate: f32,
        max_block_size: usize,
        channels: usize,
    ) -> anyhow::Result<()> {
        ensure!(
            sample_rate.is_finite() && sample_rate > 0.0,
            "invalid sample rate: {}",
            sample_rate
        );
        ensure!(
            (1..=MAX_CHANNELS).contains(&channels),
            "unsupported channel count: {} (max {})",
            channels,
            MAX_CHANNELS
        );
        ensure!(max_block_size > 0, "max block size must be nonzero");

        self.sample_rate = sample_rate;
        self.channel_count = channels;

        for ch in self.channels.iter_mut() {
            ch.prepare(sample_rate);
            ch.reset();
        }
        self.ballistics.prepare(sample_rate);

        let capacity = self.capacity;
        let ghost = &mut self.ghost;
        permit_alloc(|| ghost.prepare(sample_rate, capacity));

        log::info!(
            "engine setup: {} Hz, {} ch, max block {}, timeline {} ticks/beat x {} beats",
            sample_rate,
            channels,
            max_block_size,
            capacity.ticks_per_beat,
            capacity.max_beats
        );
        Ok(())
    }

    /// Host reset. Envelopes and faders start over; recorded Ghost data stays.
    pub fn reset(&mut self) {
        for ch in self.channels.iter_mut() {
            ch.reset();
        }
        self.ghost.reset();
        self.meters.reset();
    }

    pub fn meters(&self) -> Arc<Meters> {
        self.meters.clone()
    }

    pub fn ghost(&self) -> &GhostEngine {
        &self.ghost
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelState> {
        self.channels[..self.channel_count].get(index)
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Process one block in place.
    ///
    /// * `live` - planar live channels, rewritten with the output
    /// * `guide` - planar sidechain channels; `None` or empty when the bus is absent.
    ///   A mono guide drives every live channel.
    pub fn process_block<G: AsRef<[f32]>>(
        &mut self,
        live: &mut [&mut [f32]],
        guide: Option<&[G]>,
        transport: &TransportSnapshot,
        config: &EngineConfig,
    ) {
        let config = config.sanitized();
        let channels = live.len().min(self.channel_count);
        if channels == 0 {
            return;
        }
        let samples = live[..channels]
            .iter()
            .map(|c| c.len())
            .min()
            .unwrap_or(0);

        let guide = match config.guide_source {
            GuideSource::Sidechain => guide.filter(|bus| !bus.is_empty()),
            GuideSource::Live => None,
        };

        // -----------------------------------------------------------------
        // Block-constant state
        // -----------------------------------------------------------------
        let event = self
            .ghost
            .begin_block(transport, config.ghost_record, config.ghost_play);
        if event.needs_resync() {
            for ch in self.channels[..channels].iter_mut() {
                ch.resync();
            }
        }

        let playback = self.ghost.is_playing();
        let coeffs = self
            .ballistics
            .coeffs(config.mode, transport.safe_bpm(), playback);
        let hold_samples = crush_hold_samples(self.sample_rate, transport.seconds_per_beat());
        let clipper = Clipper::select(config.mode, config.shred);
        let ratio = config.ratio_f32();

        let mut out_sq_sum = 0.0f32;
        let mut clipping = false;
        let mut ghost_target = 0.0f32;

        // -----------------------------------------------------------------
        // Per-sample path
        // -----------------------------------------------------------------
        for i in 0..samples {
            let position = self.ghost.position_at(i);
            let mut recorded = [0.0f32; MAX_CHANNELS];

            for ch in 0..channels {
                let x = live[ch][i];
                let g = match config.guide_source {
                    GuideSource::Live => x,
                    GuideSource::Sidechain => match guide {
                        Some(bus) => {
                            let lane = bus[ch.min(bus.len() - 1)].as_ref();
                            lane.get(i).copied().unwrap_or(0.0)
                        }
                        None => 0.0,
                    },
                };

                let ghost_read = if playback {
                    Some(self.ghost.read(ch, position))
                } else {
                    None
                };

                let state = &mut self.channels[ch];
                let live_env = state.live_env.process_sample(x);
                let guide_env = state.guide_env.process_sample(g);
                recorded[ch] = guide_env.rms;

                // (guide level, guide peak, from timeline, fixed target)
                let (guide_level, guide_peak, from_timeline, fixed_target) = match ghost_read {
                    None => (guide_env.rms, guide_env.peak, false, None),
                    Some(GhostRead::Value(v)) => {
                        ghost_target = ghost_target.max(v);
                        // No crest data on the timeline: peak == rms
                        (v, v, true, None)
                    }
                    Some(GhostRead::Hold) => (guide_env.rms, guide_env.peak, false, Some(1.0)),
                    Some(GhostRead::Exhausted) => (0.0, 0.0, true, Some(0.0)),
                };

                let anchor = state.macro_peak.update(guide_level);

                let target = match fixed_target {
                    Some(t) => t,
                    None => target_gain(
                        config.mode,
                        &TransferInput {
                            live_rms: live_env.rms,
                            live_peak: live_env.peak,
                            guide_rms: guide_level,
                            guide_peak,
                            macro_peak: anchor,
                            ratio,
                            from_timeline,
                        },
                    ),
                };

                let fader = state.fader.process(target, coeffs);
                let applied = if config.invert {
                    invert_gain(fader)
                } else {
                    fader
                };
                state.set_last(target, applied);

                let mut y = x * applied;
                if config.shred {
                    y = modifiers::shred(
                        y,
                        config.shred_variant,
                        anchor,
                        &mut state.hold,
                        hold_samples,
                    );
                }
                // A stopped replay holds unity; the gate has no guide to judge
                let held = matches!(ghost_read, Some(GhostRead::Hold));
                if config.gate && !held {
                    y = modifiers::gate(y, guide_level, config.gate_threshold, anchor);
                }

                if y.abs() > 1.0 {
                    clipping = true;
                }
                let y = clipper.process(y);
                out_sq_sum += y * y;
                live[ch][i] = y;
            }

            self.ghost.record_frame(position, &recorded[..channels]);
        }

        self.ghost.end_block(samples);

        // -----------------------------------------------------------------
        // Metering
        // -----------------------------------------------------------------
        let mut frame = MeterFrame {
            ghost_target,
            ghost_last_beat: self.ghost.last_recorded_beat(),
            clipping,
            ..MeterFrame::default()
        };
        for ch in self.channels[..channels].iter() {
            frame.live_level = frame.live_level.max(ch.live_env.reading().rms);
            frame.guide_level = frame.guide_level.max(ch.guide_env.reading().rms);
            frame.gain = frame.gain.max(ch.last_applied());
        }
        frame.guide_active = frame.guide_level >= GUIDE_SILENCE;
        if samples > 0 {
            frame.output_level = (out_sq_sum / (samples * channels) as f32).sqrt();
        }
        self.meters.publish(&frame, self.ghost.status());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::SampleHold;
    use crate::modes::{GhostStatus, Mode, ShredVariant};
    use std::f32::consts::PI;

    const SR: f32 = 48000.0;
    const BLOCK: usize = 512;
    const SMALL: GhostCapacity = GhostCapacity {
        ticks_per_beat: 240,
        max_beats: 256,
    };

    fn engine(channels: usize) -> Engine {
        let mut e = Engine::new(SMALL);
        e.setup(SR, BLOCK, channels).expect("setup");
        e
    }

    fn sine(freq: f32, amp: f32, start: usize, len: usize) -> Vec<f32> {
        (start..start + len)
            .map(|n| amp * (2.0 * PI * freq * n as f32 / SR).sin())
            .collect()
    }

    /// Runs `blocks` blocks; `live_fn`/`guide_fn` produce per-block buffers.
    /// Returns the output of the last block (channel 0).
    fn run(
        e: &mut Engine,
        blocks: usize,
        transport: &mut dyn FnMut(usize) -> TransportSnapshot,
        config: &EngineConfig,
        live_fn: &dyn Fn(usize) -> Vec<f32>,
        guide_fn: Option<&dyn Fn(usize) -> Vec<f32>>,
    ) -> Vec<f32> {
        let mut last = Vec::new();
        for b in 0..blocks {
            let mut l = live_fn(b);
            let mut r = live_fn(b);
            let guide = guide_fn.map(|f| vec![f(b), f(b)]);
            let mut bufs: [&mut [f32]; 2] = [&mut l, &mut r];
            let t = transport(b);
            e.process_block(&mut bufs, guide.as_deref(), &t, config);
            last = l;
        }
        last
    }

    fn stopped(_: usize) -> TransportSnapshot {
        TransportSnapshot::stopped(120.0, 0.0)
    }

    #[test]
    fn test_setup_rejects_bad_topology() {
        let mut e = Engine::new(SMALL);
        assert!(e.setup(0.0, 512, 2).is_err());
        assert!(e.setup(f32::NAN, 512, 2).is_err());
        assert!(e.setup(48000.0, 512, 3).is_err());
        assert!(e.setup(48000.0, 512, 0).is_err());
        assert!(e.setup(48000.0, 0, 2).is_err());
        assert!(e.setup(48000.0, 512, 1).is_ok());
        assert_eq!(e.ghost().timeline().capacity(), SMALL.slots());
    }

    #[test]
    fn test_silent_guide_silences_output() {
        let mut e = engine(2);
        let config = EngineConfig::default();
        let out = run(
            &mut e,
            60,
            &mut stopped,
            &config,
            &|b: usize| sine(440.0, 0.5, b * BLOCK, BLOCK),
            Some(&|_: usize| vec![0.0; BLOCK]),
        );
        assert!(out.iter().all(|&y| y.abs() < 1e-6));
        assert_eq!(e.meters().get_gain_db(), crate::meters::GAIN_DB_FLOOR);
        assert!(!e.meters().is_guide_active());
    }

    #[test]
    fn test_missing_sidechain_is_silence() {
        let mut e = engine(2);
        let config = EngineConfig::default();
        let out = run(
            &mut e,
            60,
            &mut stopped,
            &config,
            &|b: usize| sine(440.0, 0.5, b * BLOCK, BLOCK),
            None,
        );
        assert!(out.iter().all(|&y| y.abs() < 1e-6));
    }

    #[test]
    fn test_identical_guide_converges_to_unity() {
        let mut e = engine(2);
        let config = EngineConfig::default();
        let out = run(
            &mut e,
            200,
            &mut stopped,
            &config,
            &|b: usize| sine(220.0, 0.5, b * BLOCK, BLOCK),
            Some(&|b: usize| sine(220.0, 0.5, b * BLOCK, BLOCK)),
        );
        let input = sine(220.0, 0.5, 199 * BLOCK, BLOCK);
        assert!((e.channel(0).map(|c| c.fader_gain()).unwrap_or(0.0) - 1.0).abs() < 1e-4);
        for (y, x) in out.iter().zip(input.iter()) {
            assert!((y - x).abs() < 1e-4);
        }
    }

    #[test]
    fn test_self_guide_is_transparent() {
        let mut e = engine(2);
        let config = EngineConfig {
            guide_source: GuideSource::Live,
            ..EngineConfig::default()
        };
        let out = run(
            &mut e,
            200,
            &mut stopped,
            &config,
            &|b: usize| sine(330.0, 0.3, b * BLOCK, BLOCK),
            None,
        );
        let input = sine(330.0, 0.3, 199 * BLOCK, BLOCK);
        for (y, x) in out.iter().zip(input.iter()) {
            assert!((y - x).abs() < 1e-4);
        }
    }

    #[test]
    fn test_mono_guide_drives_both_channels() {
        let mut e = engine(2);
        let config = EngineConfig::default();
        for b in 0..100 {
            let mut l = vec![0.1f32; BLOCK];
            let mut r = vec![0.1f32; BLOCK];
            let guide = [vec![0.2f32; BLOCK]];
            let mut bufs: [&mut [f32]; 2] = [&mut l, &mut r];
            e.process_block(&mut bufs, Some(&guide[..]), &stopped(b), &config);
        }
        for ch in 0..2 {
            let gain = e.channel(ch).map(|c| c.fader_gain()).unwrap_or(0.0);
            assert!((gain - 2.0).abs() < 1e-3, "ch {} gain {}", ch, gain);
        }
    }

    #[test]
    fn test_transport_restart_snaps_fader() {
        let mut e = engine(2);
        let config = EngineConfig::default();
        let live = |_: usize| vec![0.4f32; BLOCK];

        // settle at 0.5 with the transport stopped
        run(&mut e, 100, &mut stopped, &config, &live, Some(&|_: usize| vec![0.2f32; BLOCK]));
        let settled = e.channel(0).map(|c| c.fader_gain()).unwrap_or(0.0);
        assert!((settled - 0.5).abs() < 1e-3);

        // guide jumps; while stopped the fader glides
        let mut l = vec![0.4f32; 1];
        let mut r = vec![0.4f32; 1];
        let guide = [vec![0.9f32; 1], vec![0.9f32; 1]];
        {
            let mut bufs: [&mut [f32]; 2] = [&mut l, &mut r];
            e.process_block(&mut bufs, Some(&guide[..]), &stopped(0), &config);
        }
        let ch = e.channel(0).expect("channel");
        assert!(ch.fader_gain() < ch.last_target());

        // transport starts: first sample lands exactly on target
        let mut l = vec![0.4f32; 1];
        let mut r = vec![0.4f32; 1];
        {
            let mut bufs: [&mut [f32]; 2] = [&mut l, &mut r];
            e.process_block(
                &mut bufs,
                Some(&guide[..]),
                &TransportSnapshot::playing(120.0, 0.0),
                &config,
            );
        }
        let ch = e.channel(0).expect("channel");
        assert_eq!(ch.fader_gain(), ch.last_target());
    }

    #[test]
    fn test_loop_snaps_fader() {
        let mut e = engine(2);
        let config = EngineConfig::default();
        let mut pos = 0.0;
        let bps = 2.0 / SR as f64;
        let mut transport = |_: usize| {
            let t = TransportSnapshot::playing(120.0, pos);
            pos += bps * BLOCK as f64;
            t
        };
        run(
            &mut e,
            20,
            &mut transport,
            &config,
            &|_: usize| vec![0.4f32; BLOCK],
            Some(&|_: usize| vec![0.2f32; BLOCK]),
        );

        // one sample with a louder guide, then loop back to beat 0
        let guide = [vec![0.9f32; 1], vec![0.9f32; 1]];
        let mut l = vec![0.4f32; 1];
        let mut r = vec![0.4f32; 1];
        let mut bufs: [&mut [f32]; 2] = [&mut l, &mut r];
        e.process_block(
            &mut bufs,
            Some(&guide[..]),
            &TransportSnapshot::playing(120.0, 0.0),
            &config,
        );
        let ch = e.channel(0).expect("channel");
        assert_eq!(ch.fader_gain(), ch.last_target());
    }

    #[test]
    fn test_ghost_record_then_replay() {
        let mut e = engine(2);
        let bps = 2.0 / SR as f64;
        let blocks = 200; // ~2.1s, ~4.3 beats

        // Record: guide at 0.25, transport running from beat 0
        let record = EngineConfig {
            ghost_record: true,
            ..EngineConfig::default()
        };
        let mut transport = |b: usize| TransportSnapshot::playing(120.0, b as f64 * bps * BLOCK as f64);
        run(
            &mut e,
            blocks,
            &mut transport,
            &record,
            &|_: usize| vec![0.1f32; BLOCK],
            Some(&|_: usize| vec![0.25f32; BLOCK]),
        );
        assert_eq!(e.meters().get_ghost_status(), GhostStatus::Recording);
        assert!(e.meters().record_led());
        assert!(e.meters().get_ghost_last_beat() > 4.0);

        // Replay from beat 1 with no sidechain at all
        let play = EngineConfig {
            ghost_play: true,
            ..EngineConfig::default()
        };
        let offset = 1.0;
        let mut transport =
            |b: usize| TransportSnapshot::playing(120.0, offset + b as f64 * bps * BLOCK as f64);
        run(&mut e, 100, &mut transport, &play, &|_: usize| vec![0.1f32; BLOCK], None);

        assert_eq!(e.meters().get_ghost_status(), GhostStatus::Playing);
        assert!(e.meters().play_led());
        assert!((e.meters().get_ghost_target() - 0.25).abs() < 1e-3);
        // 0.25 / 0.1 = 2.5, inside the +-12 dB band
        let gain = e.channel(0).map(|c| c.fader_gain()).unwrap_or(0.0);
        assert!((gain - 2.5).abs() < 0.05, "gain {}", gain);
    }

    #[test]
    fn test_ghost_playback_exhausted_fades_out_and_stopped_holds() {
        let mut e = engine(2);
        let bps = 2.0 / SR as f64;
        let record = EngineConfig {
            ghost_record: true,
            ..EngineConfig::default()
        };
        let mut transport = |b: usize| TransportSnapshot::playing(120.0, b as f64 * bps * BLOCK as f64);
        run(
            &mut e,
            20,
            &mut transport,
            &record,
            &|_: usize| vec![0.1f32; BLOCK],
            Some(&|_: usize| vec![0.25f32; BLOCK]),
        );

        let play = EngineConfig {
            ghost_play: true,
            ..EngineConfig::default()
        };

        // far past the recording: fade to silence
        let mut transport =
            |b: usize| TransportSnapshot::playing(120.0, 100.0 + b as f64 * bps * BLOCK as f64);
        let out = run(&mut e, 300, &mut transport, &play, &|_: usize| vec![0.1f32; BLOCK], None);
        assert!(out.iter().all(|&y| y.abs() < 1e-4));

        // transport stopped: hold at unity
        let out = run(&mut e, 300, &mut stopped, &play, &|_: usize| vec![0.1f32; BLOCK], None);
        assert!(out.iter().all(|&y| (y - 0.1).abs() < 1e-4));
    }

    #[test]
    fn test_gate_zeroes_quiet_guide_samples() {
        let mut e = engine(2);
        let config = EngineConfig {
            mode: Mode::Expand,
            gate: true,
            gate_threshold: 0.5,
            ..EngineConfig::default()
        };
        // loud guide for 40 blocks, then silence
        let guide = |b: usize| {
            if b < 40 {
                sine(200.0, 0.5, b * BLOCK, BLOCK)
            } else {
                vec![0.0; BLOCK]
            }
        };
        let out = run(
            &mut e,
            60,
            &mut stopped,
            &config,
            &|b: usize| sine(300.0, 0.2, b * BLOCK, BLOCK),
            Some(&guide),
        );
        assert!(out.iter().all(|&y| y == 0.0));

        // same material without the gate keeps playing (Expand never ducks)
        let mut e = engine(2);
        let config = EngineConfig {
            gate: false,
            ..config
        };
        let out = run(
            &mut e,
            60,
            &mut stopped,
            &config,
            &|b: usize| sine(300.0, 0.2, b * BLOCK, BLOCK),
            Some(&guide),
        );
        assert!(out.iter().any(|&y| y.abs() > 0.05));
    }

    #[test]
    fn test_invert_applies_reciprocal() {
        let mut e = engine(2);
        let config = EngineConfig {
            invert: true,
            ..EngineConfig::default()
        };
        let out = run(
            &mut e,
            100,
            &mut stopped,
            &config,
            &|_: usize| vec![0.1f32; BLOCK],
            Some(&|_: usize| vec![0.2f32; BLOCK]),
        );
        // fader settles at 2.0, inverted to 0.5
        assert!((out[BLOCK - 1] - 0.05).abs() < 1e-4);
        let applied = e.channel(0).map(|c| c.last_applied()).unwrap_or(0.0);
        assert!((applied - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_shred_output_is_bounded() {
        for variant in [ShredVariant::Fold, ShredVariant::Crush, ShredVariant::Fuzz] {
            let mut e = engine(2);
            let config = EngineConfig {
                mode: Mode::Ride,
                ratio: 8,
                shred: true,
                shred_variant: variant,
                ..EngineConfig::default()
            };
            let out = run(
                &mut e,
                50,
                &mut stopped,
                &config,
                &|b: usize| sine(100.0, 0.9, b * BLOCK, BLOCK),
                Some(&|b: usize| sine(100.0, 0.9, b * BLOCK, BLOCK).iter().map(|x| x * 4.0).collect::<Vec<f32>>()),
            );
            assert!(out.iter().all(|y| y.abs() <= 1.0 && y.is_finite()), "{:?}", variant);
        }
    }

    #[test]
    fn test_process_block_does_not_allocate() {
        let mut e = engine(2);
        let config = EngineConfig {
            mode: Mode::Punch,
            shred: true,
            shred_variant: ShredVariant::Crush,
            gate: true,
            ghost_record: true,
            ..EngineConfig::default()
        };
        let mut l = sine(440.0, 0.5, 0, BLOCK);
        let mut r = sine(440.0, 0.5, 0, BLOCK);
        let guide = [sine(110.0, 0.5, 0, BLOCK), sine(110.0, 0.5, 0, BLOCK)];
        let transport = TransportSnapshot::playing(128.0, 0.0);
        assert_no_alloc::assert_no_alloc(|| {
            let mut bufs: [&mut [f32]; 2] = [&mut l, &mut r];
            e.process_block(&mut bufs, Some(&guide[..]), &transport, &config);
        });
        assert!(l.iter().all(|y| y.is_finite()));
    }

    /// Records a constant 0.25 guide for `blocks` blocks from beat 0.
    fn record_constant_guide(e: &mut Engine, blocks: usize) {
        let bps = 2.0 / SR as f64;
        let record = EngineConfig {
            ghost_record: true,
            ..EngineConfig::default()
        };
        let mut transport =
            |b: usize| TransportSnapshot::playing(120.0, b as f64 * bps * BLOCK as f64);
        run(
            e,
            blocks,
            &mut transport,
            &record,
            &|_: usize| vec![0.1f32; BLOCK],
            Some(&|_: usize| vec![0.25f32; BLOCK]),
        );
    }

    #[test]
    fn test_reset_keeps_recorded_timeline() {
        let mut e = engine(2);
        record_constant_guide(&mut e, 200);
        assert!(!e.ghost().timeline().is_empty());

        e.reset();
        assert!(!e.ghost().timeline().is_empty());
        assert_eq!(e.meters().get_ghost_status(), GhostStatus::Idle);

        let play = EngineConfig {
            ghost_play: true,
            ..EngineConfig::default()
        };
        let bps = 2.0 / SR as f64;
        let mut transport =
            |b: usize| TransportSnapshot::playing(120.0, 1.0 + b as f64 * bps * BLOCK as f64);
        run(&mut e, 100, &mut transport, &play, &|_: usize| vec![0.1f32; BLOCK], None);

        assert_eq!(e.meters().get_ghost_status(), GhostStatus::Playing);
        assert!((e.meters().get_ghost_target() - 0.25).abs() < 1e-3);
        let gain = e.channel(0).map(|c| c.fader_gain()).unwrap_or(0.0);
        assert!((gain - 2.5).abs() < 0.05, "gain {}", gain);
    }

    #[test]
    fn test_restart_clears_crush_hold() {
        let mut e = engine(1);
        let config = EngineConfig {
            shred: true,
            shred_variant: ShredVariant::Crush,
            ..EngineConfig::default()
        };
        let guide = [vec![0.3f32; 100]];

        // Stopped: hold picks up a 0.3-ish value and keeps counting down
        let mut l = vec![0.3f32; 100];
        {
            let mut bufs: [&mut [f32]; 1] = [&mut l];
            e.process_block(&mut bufs, Some(&guide[..]), &stopped(0), &config);
        }

        // Transport starts on a negative sample: the hold must resample it
        let mut l = vec![-0.5f32; 1];
        let guide = [vec![0.3f32; 1]];
        {
            let mut bufs: [&mut [f32]; 1] = [&mut l];
            e.process_block(
                &mut bufs,
                Some(&guide[..]),
                &TransportSnapshot::playing(120.0, 0.0),
                &config,
            );
        }
        let applied = e.channel(0).map(|c| c.last_applied()).unwrap_or(0.0);
        let hold = crush_hold_samples(SR, 0.5);
        let expected = SampleHold::default().crush(-0.5 * applied, hold);
        assert!(expected < 0.0);
        assert!((l[0] - expected).abs() < 1e-6, "{} vs {}", l[0], expected);
    }

    #[test]
    fn test_clip_flag_and_output_level() {
        let mut e = engine(2);
        let config = EngineConfig::default();

        // 1.2 / 0.4 = 3x gain pushes 0.4 to 1.2: clipped to 1.0
        run(
            &mut e,
            100,
            &mut stopped,
            &config,
            &|_: usize| vec![0.4f32; BLOCK],
            Some(&|_: usize| vec![1.2f32; BLOCK]),
        );
        assert!(e.meters().is_clipping());
        assert!((e.meters().get_output_level() - 1.0).abs() < 1e-4);

        // 0.2 / 0.4 = 0.5x: output settles at 0.2, no clipping
        run(
            &mut e,
            100,
            &mut stopped,
            &config,
            &|_: usize| vec![0.4f32; BLOCK],
            Some(&|_: usize| vec![0.2f32; BLOCK]),
        );
        assert!(!e.meters().is_clipping());
        assert!((e.meters().get_output_level() - 0.2).abs() < 1e-3);
        assert!(e.meters().is_guide_active());
    }

    #[test]
    fn test_gate_does_not_silence_held_replay() {
        let mut e = engine(2);
        record_constant_guide(&mut e, 20);

        let play = EngineConfig {
            ghost_play: true,
            gate: true,
            gate_threshold: 0.5,
            ..EngineConfig::default()
        };
        // Transport stopped and no sidechain: hold at unity
        let out = run(&mut e, 300, &mut stopped, &play, &|_: usize| vec![0.1f32; BLOCK], None);
        assert!(out.iter().all(|&y| (y - 0.1).abs() < 1e-4));
    }

    #[test]
    fn test_punch_replay_adds_no_crest_boost() {
        let mut e = engine(2);
        record_constant_guide(&mut e, 200);

        let play = EngineConfig {
            mode: Mode::Punch,
            ghost_play: true,
            ..EngineConfig::default()
        };
        // Spiky live material: crest factor well above 2
        let spikes = |b: usize| {
            (0..BLOCK)
                .map(|i| if (b * BLOCK + i) % 100 == 0 { 0.9 } else { 0.05 })
                .collect::<Vec<f32>>()
        };
        let bps = 2.0 / SR as f64;
        let mut transport =
            |b: usize| TransportSnapshot::playing(120.0, 1.0 + b as f64 * bps * BLOCK as f64);
        run(&mut e, 100, &mut transport, &play, &spikes, None);

        let ch = e.channel(0).expect("channel");
        let live = ch.live_env.reading();
        assert!(live.crest_factor() > 2.0);
        let level_match = (0.25 / live.rms).clamp(0.251_188_64, 3.981_071_7);
        assert!(
            (ch.last_target() - level_match).abs() <= level_match * 1e-3,
            "{} vs {}",
            ch.last_target(),
            level_match
        );
    }
}
