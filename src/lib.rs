mod config;
mod debug;
pub mod dsp;
pub mod engine;
pub mod meters;
pub mod modes;
pub mod transport;

pub use crate::config::EngineConfig;
pub use crate::engine::Engine;

use crate::dsp::GhostCapacity;
use crate::modes::{GuideSource, Mode, ShredVariant};
use crate::transport::TransportSnapshot;
use nih_plug::prelude::*;
use std::sync::Arc;

// -----------------------------------------------------------------------------
// PARAMETERS
// -----------------------------------------------------------------------------
#[derive(Params)]
pub struct GhostParams {
    #[id = "mode"]
    pub mode: EnumParam<Mode>,

    /// Ratio / intensity selector
    #[id = "ratio"]
    pub ratio: IntParam,

    #[id = "invert"]
    pub invert: BoolParam,

    #[id = "shred"]
    pub shred: BoolParam,

    #[id = "shred_variant"]
    pub shred_variant: EnumParam<ShredVariant>,

    #[id = "gate"]
    pub gate: BoolParam,

    #[id = "gate_threshold"]
    pub gate_threshold: FloatParam,

    #[id = "guide_source"]
    pub guide_source: EnumParam<GuideSource>,

    // -------------------------------------------------------------------------
    // GHOST
    // -------------------------------------------------------------------------
    #[id = "ghost_record"]
    pub ghost_record: BoolParam,

    #[id = "ghost_play"]
    pub ghost_play: BoolParam,
}

fn format_percent(v: f32) -> String {
    format!("{:.0}%", v * 100.0)
}

impl Default for GhostParams {
    fn default() -> Self {
        let defaults = EngineConfig::default();
        Self {
            mode: EnumParam::new("Mode", defaults.mode),
            ratio: IntParam::new(
                "Ratio",
                defaults.ratio as i32,
                IntRange::Linear {
                    min: config::MIN_RATIO as i32,
                    max: config::MAX_RATIO as i32,
                },
            ),
            invert: BoolParam::new("Invert", defaults.invert),
            shred: BoolParam::new("Shred", defaults.shred),
            shred_variant: EnumParam::new("Shred Type", defaults.shred_variant),
            gate: BoolParam::new("Gate", defaults.gate),
            gate_threshold: FloatParam::new(
                "Gate Threshold",
                defaults.gate_threshold,
                FloatRange::Linear { min: 0.0, max: 1.0 },
            )
            .with_value_to_string(Arc::new(format_percent)),
            guide_source: EnumParam::new("Guide", defaults.guide_source),
            ghost_record: BoolParam::new("Ghost Record", false).non_automatable(),
            ghost_play: BoolParam::new("Ghost Play", false),
        }
    }
}

impl EngineConfig {
    /// Snapshot the parameter atomics for one callback.
    pub fn from_params(params: &GhostParams) -> Self {
        Self {
            mode: params.mode.value(),
            ratio: params.ratio.value().max(0) as u32,
            invert: params.invert.value(),
            shred: params.shred.value(),
            shred_variant: params.shred_variant.value(),
            gate: params.gate.value(),
            gate_threshold: params.gate_threshold.value(),
            guide_source: params.guide_source.value(),
            ghost_record: params.ghost_record.value(),
            ghost_play: params.ghost_play.value(),
        }
        .sanitized()
    }
}

// -----------------------------------------------------------------------------
// PLUGIN STRUCT
// -----------------------------------------------------------------------------
struct GhostFaderPlugin {
    params: Arc<GhostParams>,
    /// Owns the metering surface (`Engine::meters`).
    engine: Engine,
}

impl Default for GhostFaderPlugin {
    fn default() -> Self {
        Self {
            params: Arc::new(GhostParams::default()),
            engine: Engine::new(GhostCapacity::PLUGIN_DEFAULT),
        }
    }
}

const GUIDE_PORT: &[&str] = &["Guide"];

impl Plugin for GhostFaderPlugin {
    const NAME: &'static str = "GhostFader";
    const VENDOR: &'static str = "Andrzej Marczewski";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            aux_input_ports: &[new_nonzero_u32(2)],
            names: PortNames {
                layout: Some("Stereo"),
                aux_inputs: GUIDE_PORT,
                ..PortNames::const_default()
            },
            ..AudioIOLayout::const_default()
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            aux_input_ports: &[new_nonzero_u32(1)],
            names: PortNames {
                layout: Some("Mono"),
                aux_inputs: GUIDE_PORT,
                ..PortNames::const_default()
            },
            ..AudioIOLayout::const_default()
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            ..AudioIOLayout::const_default()
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            ..AudioIOLayout::const_default()
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;
    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        #[cfg(feature = "debug")]
        crate::debug::logger::init_logger();

        let channels = audio_io_layout
            .main_output_channels
            .map(NonZeroU32::get)
            .unwrap_or(2) as usize;

        let ok = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            match self.engine.setup(
                buffer_config.sample_rate,
                buffer_config.max_buffer_size as usize,
                channels,
            ) {
                Ok(()) => true,
                Err(err) => {
                    log::error!("ghostfader setup failed: {:#}", err);
                    false
                }
            }
        }))
        .unwrap_or(false);

        #[cfg(feature = "debug")]
        crate::debug::logger::drain_to_file();

        ok
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        aux: &mut AuxiliaryBuffers,
        context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.process_internal(buffer, aux, context)
        }))
        .unwrap_or(ProcessStatus::Normal)
    }

    fn reset(&mut self) {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.engine.reset();
            crate::gf_log!("reset: envelopes and faders cleared, timeline kept");
        }))
        .unwrap_or(());
    }
}

impl GhostFaderPlugin {
    fn process_internal(
        &mut self,
        buffer: &mut Buffer,
        aux: &mut AuxiliaryBuffers,
        context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        let config = EngineConfig::from_params(&self.params);

        let host = context.transport();
        let transport = TransportSnapshot::from_host(host.tempo, host.pos_beats(), host.playing);

        let guide = aux
            .inputs
            .first()
            .map(|bus| bus.as_slice_immutable())
            .filter(|channels| channels.iter().any(|c| !c.is_empty()));

        self.engine
            .process_block(buffer.as_slice(), guide, &transport, &config);

        ProcessStatus::Normal
    }
}

impl ClapPlugin for GhostFaderPlugin {
    const CLAP_ID: &'static str = "com.andrzej.ghostfader";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("Guide-following gain rider with timeline record and replay");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Compressor,
        ClapFeature::Stereo,
        ClapFeature::Mono,
    ];
}

impl Vst3Plugin for GhostFaderPlugin {
    const VST3_CLASS_ID: [u8; 16] = *b"GhostFaderRider1";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] = &[
        Vst3SubCategory::Fx,
        Vst3SubCategory::Dynamics,
    ];
}

nih_export_clap!(GhostFaderPlugin);
nih_export_vst3!(GhostFaderPlugin);
