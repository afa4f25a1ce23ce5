//! Renders a few seconds of granular sine clouds into a wav file, changing the stream's
//! distributions and modes on the fly via the player.

use std::{path::PathBuf, time::Duration};

use arg::{parse_args, Args};

use grainfield::{
    effects::ReverbEffect, Component, Distribution, DistributionType, EngineConfig,
    EnvelopeType, Error, GrainModel, GrainPlayer, GrainSource, GrainStream, MixerEffect,
    ModelParameter, Polarity, RateMode, SineSynth, SpatialMode, TriggerMode, WavOutput,
};

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

const DEFAULT_LOG_LEVEL: log::Level = if cfg!(debug_assertions) {
    log::Level::Debug
} else {
    log::Level::Warn
};

/// Program arguments of the grain renderer.
#[derive(Args, Debug, Default)]
struct Arguments {
    #[arg(short = "o", long = "output")]
    /// Wav file to write. Defaults to \"grains.wav\".
    output_path: Option<PathBuf>,
    #[arg(short = "d", long = "duration")]
    /// Length of each rendered section in seconds. Defaults to 3.
    duration: Option<f32>,
    #[arg(short = "l", long = "log-level")]
    /// Set logging level to \"debug\", \"info\", \"warn\" or \"error\".
    log_level: Option<log::Level>,
}

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Error> {
    let args = parse_args::<Arguments>();

    simple_logger::SimpleLogger::new()
        .with_level(args.log_level.unwrap_or(DEFAULT_LOG_LEVEL).to_level_filter())
        .init()
        .expect("Failed to set logger");

    let output_path = args
        .output_path
        .unwrap_or_else(|| PathBuf::from("grains.wav"));
    let section = Duration::from_secs_f32(args.duration.unwrap_or(3.0).max(0.1));

    let config = EngineConfig::default();
    let (mut player, mut mixer) = GrainPlayer::new(config.clone())?;

    // A cloud of short sine grains: gaussian frequencies around A4, randomly panned.
    let mut model = GrainModel::new();
    model.rate_mut().set_constant(40.0);
    model.duration_mut().set_single_component(
        Component::new(DistributionType::Uniform, 0.08, 0.04).with_polarity(Polarity::Positive),
    );
    model.amplitude_mut().set_single_component(
        Component::new(DistributionType::Uniform, -18.0, 6.0).with_polarity(Polarity::Negative),
    );
    model
        .frequency_mut()
        .set_single_component(Component::new(DistributionType::Gaussian, 440.0, 60.0));
    model
        .distribution_mut(ModelParameter::Azimuth)
        .set_single_component(
            Component::new(DistributionType::Uniform, 0.0, 60.0)
                .with_polarity(Polarity::RandomSymmetric),
        );
    model.set_rate_mode(RateMode::Stochastic);
    model.set_envelope_type(EnvelopeType::Exp);
    model.set_spatial_mode(SpatialMode::Polar);

    let mut synth = SineSynth::new();
    synth
        .detune_mut()
        .set_single_component(Component::new(DistributionType::Gaussian, 0.0, 0.1));

    let mut stream = GrainStream::with_model(config.clone(), model)?;
    stream.add_source(GrainSource::with_synth(synth))?;
    stream.add_effect(ReverbEffect::new())?;
    let cloud = player.add_stream(stream)?;

    // A second, manually triggered stream for the closing burst.
    let mut burst_model = GrainModel::with_seed(0x5eed);
    burst_model.set_rate_mode(RateMode::Triggered);
    burst_model.frequency_mut().set_constant(880.0);
    let mut burst_stream = GrainStream::with_model(config.clone(), burst_model)?;
    burst_stream.add_source(GrainSource::with_synth(SineSynth::new()))?;
    let burst = player.add_stream(burst_stream)?;

    player.set_effect_enabled(MixerEffect::Compressor, true)?;
    player.set_reverb_level_db(-12.0)?;

    let mut output = WavOutput::open(&output_path, config.sample_rate)?;

    log::info!("Rendering stochastic cloud...");
    output.render_for(&mut mixer, section)?;

    log::info!("Lowering the cloud's pitch and density...");
    let mut frequency = Distribution::new();
    frequency.add_component(Component::new(DistributionType::Uniform, 220.0, 20.0))?;
    frequency.add_component(
        Component::new(DistributionType::Uniform, 330.0, 20.0).with_weight(0.5),
    )?;
    player.set_distribution(cloud, ModelParameter::Frequency, frequency)?;
    player.set_distribution(cloud, ModelParameter::Rate, Distribution::from_constant(15.0))?;
    player.set_envelope_type(cloud, EnvelopeType::Gaussian)?;
    output.render_for(&mut mixer, section * 2)?;
    player.collect_garbage();

    log::info!("Fading out the cloud, triggering a burst...");
    player.fade_stream_gain_db(cloud, -96.0, section.as_secs_f32())?;
    player.trigger_many(
        burst,
        32,
        section.as_secs_f64() / 2.0,
        0.0,
        TriggerMode::Stochastic,
    )?;
    output.render_for(&mut mixer, section * 3)?;
    player.collect_garbage();

    if let Some(err) = player.last_error() {
        log::warn!("Player reported an error while rendering: {err}");
    }

    log::info!(
        "Wrote {:.2} seconds to '{}'",
        output.duration().as_secs_f32(),
        output_path.display()
    );
    output.finalize()
}
