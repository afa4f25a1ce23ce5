//! Grain scheduler and synthesizer of a single logical sound source.

use four_cc::FourCC;
use rand::{rngs::SmallRng, SeedableRng};
use strum::{Display, EnumString, VariantNames};

use crate::{
    config::{EngineConfig, RenderTime, CHANNEL_COUNT, MAX_OFFSET_FRAMES},
    distribution::random,
    effect::{Effect, EffectChain, EffectId},
    model::GrainModel,
    source::{GrainSource, VoiceStatus},
    spatializer::{Spatializer, StereoSpatializer},
    trigger::{LiveTrigger, TriggerOnset},
    utils::{
        buffer::{add_buffers_with_gain, clear_buffer},
        db_to_linear,
        fader::GainFader,
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

pub(crate) mod pool;

use pool::GrainPool;

// -------------------------------------------------------------------------------------------------

/// Placement of manually triggered grain batches within their time window.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, VariantNames)]
pub enum TriggerMode {
    /// Evenly spaced grains.
    #[default]
    Regular,
    /// Independently, uniformly distributed grains.
    Stochastic,
}

// -------------------------------------------------------------------------------------------------

/// Owns the grains of one logical sound source: decides when new grains fire, renders them
/// through their sources' voices, applies envelopes and spatialization, and recycles finished
/// grains and voices.
///
/// Streams get configured in the main thread, then are moved into a
/// [`GrainPlayer`](crate::GrainPlayer), which renders them in the real-time thread. Rendering
/// does not allocate once the stream's grain pool and its sources' voice pools have grown to
/// the number of concurrently playing grains.
pub struct GrainStream {
    config: EngineConfig,
    model: GrainModel,
    sources: Vec<GrainSource>,
    pool: GrainPool,
    spatializer: Box<dyn Spatializer>,
    effects: EffectChain,
    gain: GainFader,
    next_grain_offset: f64,
    triggers: Vec<LiveTrigger>,
    onsets: Vec<TriggerOnset>,
    rng: SmallRng,
    scratch: Vec<f32>,
    output: Vec<f32>,
    diffuse: Vec<f32>,
}

impl GrainStream {
    const SOURCES_CAPACITY: usize = 16;
    const TRIGGERS_CAPACITY: usize = 4;

    /// Create a new stream with a default grain model.
    pub fn new(config: EngineConfig) -> Result<Self, Error> {
        Self::with_model(config, GrainModel::new())
    }

    /// Create a new stream with the given grain model.
    pub fn with_model(config: EngineConfig, model: GrainModel) -> Result<Self, Error> {
        config.validate()?;
        let mut spatializer = StereoSpatializer::new();
        spatializer.initialize(config.sample_rate);
        let gain_step_rate = config.sample_rate as f32 / config.quantum_frames as f32;
        Ok(Self {
            config,
            model,
            sources: Vec::with_capacity(Self::SOURCES_CAPACITY),
            pool: GrainPool::with_capacity(config.initial_grain_capacity),
            spatializer: Box::new(spatializer),
            effects: EffectChain::new(),
            gain: GainFader::new(1.0, gain_step_rate),
            next_grain_offset: 0.0,
            triggers: Vec::with_capacity(Self::TRIGGERS_CAPACITY),
            onsets: Vec::with_capacity(config.quantum_frames),
            rng: SmallRng::from_os_rng(),
            scratch: vec![0.0; config.quantum_frames],
            output: vec![0.0; config.quantum_samples()],
            diffuse: vec![0.0; config.quantum_frames],
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model(&self) -> &GrainModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut GrainModel {
        &mut self.model
    }

    /// Number of grain sources. Grain models select sources by index.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn source(&self, index: usize) -> Option<&GrainSource> {
        self.sources.get(index)
    }

    /// Append a new source and return its index.
    pub fn add_source(&mut self, mut source: GrainSource) -> Result<usize, Error> {
        if source.is_valid() {
            source.initialize(self.config.sample_rate)?;
        }
        log::debug!(
            "Adding grain source '{}' with index {}",
            source.synth_name().unwrap_or("none"),
            self.sources.len()
        );
        self.sources.push(source);
        Ok(self.sources.len() - 1)
    }

    /// Replace the source at the given index. Grains which currently play on the old source
    /// get stopped. Returns the old source.
    pub fn replace_source(
        &mut self,
        index: usize,
        mut source: GrainSource,
    ) -> Result<GrainSource, Error> {
        if source.is_valid() {
            source.initialize(self.config.sample_rate)?;
        }
        self.swap_source(index, &mut source)?;
        Ok(source)
    }

    /// Swap the source at the given index with the given, already initialized source.
    pub(crate) fn swap_source(
        &mut self,
        index: usize,
        source: &mut GrainSource,
    ) -> Result<(), Error> {
        if index >= self.sources.len() {
            return Err(Error::SourceNotFoundError(index));
        }
        let old_source = &mut self.sources[index];
        self.pool.retain(|grain| {
            if grain.source_index != index {
                return true;
            }
            if let Some(voice) = grain.voice.take() {
                old_source.kill(voice);
            }
            false
        });
        std::mem::swap(old_source, source);
        Ok(())
    }

    /// Replace the default [`StereoSpatializer`].
    pub fn set_spatializer<S: Spatializer>(&mut self, mut spatializer: S) {
        spatializer.initialize(self.config.sample_rate);
        log::debug!("Using spatializer '{}'", spatializer.name());
        self.spatializer = Box::new(spatializer);
    }

    /// Add an effect to the stream's effect chain, which processes the stream's stereo output.
    pub fn add_effect<E: Effect>(&mut self, effect: E) -> Result<EffectId, Error> {
        self.effects.add(
            Box::new(effect),
            self.config.sample_rate,
            CHANNEL_COUNT,
            self.config.quantum_frames,
        )
    }

    /// Remove an effect from the stream's effect chain.
    pub fn remove_effect(&mut self, effect_id: EffectId) -> Result<(), Error> {
        let effect = self.effects.remove(effect_id)?;
        log::debug!("Removed effect '{}' with id {effect_id}", effect.name());
        Ok(())
    }

    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    /// Name of the stream effect with the given id.
    pub fn effect_name(&self, effect_id: EffectId) -> Option<&'static str> {
        self.effects.effect_name(effect_id)
    }

    pub(crate) fn process_effect_parameter_update(
        &mut self,
        effect_id: EffectId,
        parameter_id: FourCC,
        value: f32,
    ) -> Result<(), Error> {
        self.effects
            .process_parameter_update(effect_id, parameter_id, value)
    }

    /// Attach a live trigger, which creates grains at the onsets it detects.
    pub fn add_live_trigger(&mut self, mut trigger: LiveTrigger) -> Result<(), Error> {
        trigger.initialize(self.config.sample_rate, self.config.quantum_frames)?;
        log::debug!("Adding live trigger '{}'", trigger.processor_name());
        self.triggers.push(trigger);
        Ok(())
    }

    /// Current, possibly fading, linear gain.
    pub fn gain(&self) -> f32 {
        self.gain.current()
    }

    /// Set the stream's gain in dB immediately.
    pub fn set_gain_db(&mut self, gain_db: f32) {
        self.gain.set_gain_db(gain_db);
    }

    /// Fade the stream's gain to the given dB value in `time` seconds.
    pub fn fade_gain_db(&mut self, gain_db: f32, time: f32) {
        self.gain.fade_gain_db(gain_db, time);
    }

    /// Number of currently playing or pending grains.
    pub fn active_grain_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Number of pooled, unused grains.
    pub fn dead_grain_count(&self) -> usize {
        self.pool.dead_count()
    }

    /// Total number of voices all sources created so far.
    pub fn voice_count(&self) -> usize {
        self.sources.iter().map(GrainSource::voice_count).sum()
    }

    /// Add a single grain, which starts `when` seconds after the start of the next rendered
    /// quantum.
    pub fn trigger_single(&mut self, when: f64) {
        let start_offset = self.config.seconds_to_frames(when);
        self.add_grain(start_offset, None);
    }

    /// Add `count` grains within a time window of `window` seconds, starting `after` seconds
    /// after the start of the next rendered quantum.
    pub fn trigger_many(&mut self, count: usize, window: f64, after: f64, mode: TriggerMode) {
        if count == 0 {
            return;
        }
        let spacing = window / count as f64 + after;
        for index in 0..count {
            let when = match mode {
                TriggerMode::Regular => index as f64 * spacing,
                TriggerMode::Stochastic => after + random::uniform(&mut self.rng) * window,
            };
            self.trigger_single(when);
        }
    }

    /// Render one quantum and add it with the stream's gain to the given interleaved stereo
    /// `output` and mono `diffuse` send buffers.
    pub fn render(&mut self, output: &mut [f32], diffuse: &mut [f32], time: &RenderTime) {
        debug_assert_eq!(output.len(), self.config.quantum_samples());
        debug_assert_eq!(diffuse.len(), self.config.quantum_frames);

        let gain = self.gain.step();
        clear_buffer(&mut self.output);
        clear_buffer(&mut self.diffuse);

        self.process_live_triggers();
        self.process_auto_triggers();
        self.render_grains();

        self.effects.process(&mut self.output, time);
        add_buffers_with_gain(output, &self.output, gain);
        add_buffers_with_gain(diffuse, &self.diffuse, gain);
    }

    /// Acquire and instantiate a grain. Grains with an invalid source are released again
    /// immediately.
    fn add_grain(&mut self, start_offset: usize, amplitude_db: Option<f32>) -> bool {
        let index = self.pool.acquire();
        let grain = self.pool.grain_mut(index);
        if !self.model.instantiate(
            &mut self.sources,
            start_offset,
            self.config.sample_rate,
            grain,
        ) {
            self.pool.release_last();
            return false;
        }
        if let Some(amplitude_db) = amplitude_db {
            grain.amplitude = db_to_linear(amplitude_db);
        }
        let delay = self.spatializer.sample_delay(grain.location.distance());
        grain.elapsed = grain
            .elapsed
            .saturating_sub(delay.min(MAX_OFFSET_FRAMES) as i64);
        true
    }

    fn process_live_triggers(&mut self) {
        let last_frame = self.config.quantum_frames - 1;
        for trigger_index in 0..self.triggers.len() {
            self.onsets.clear();
            if self.triggers[trigger_index].process(&mut self.onsets) {
                for onset_index in 0..self.onsets.len() {
                    let onset = self.onsets[onset_index];
                    self.add_grain(onset.frame.min(last_frame), onset.level_db);
                }
            }
        }
        self.onsets.clear();
    }

    fn process_auto_triggers(&mut self) {
        let quantum_frames = self.config.quantum_frames as f64;
        let sample_rate = self.config.sample_rate as f64;
        let mut grain_count = 0;
        while self.next_grain_offset < quantum_frames
            && grain_count < self.config.max_grains_per_quantum
        {
            let Some(interval) = self.model.next_fire_time() else {
                // the grain pending at next_grain_offset is dropped and the countdown restarts
                // at the next quantum's start
                break;
            };
            self.add_grain(self.next_grain_offset as usize, None);
            self.next_grain_offset += (interval * sample_rate).max(0.0);
            grain_count += 1;
        }
        self.next_grain_offset = (self.next_grain_offset - quantum_frames).max(0.0);
    }

    fn render_grains(&mut self) {
        let quantum_frames = self.config.quantum_frames as i64;
        let sources = &mut self.sources;
        let spatializer = &mut self.spatializer;
        let scratch = &mut self.scratch;
        let output = &mut self.output;
        let diffuse = &mut self.diffuse;
        self.pool.retain(|grain| {
            if grain.elapsed <= -quantum_frames {
                grain.elapsed += quantum_frames;
                return true;
            }
            let offset = (-grain.elapsed).max(0);
            let remaining = grain.duration_samples as i64 - grain.elapsed.max(0);
            let length = (quantum_frames - offset).min(remaining).max(0) as usize;
            let offset = offset as usize;
            if length > 0 {
                let buffer = &mut scratch[offset..offset + length];
                let status = match (grain.voice, sources.get_mut(grain.source_index)) {
                    (Some(voice), Some(source)) => source.fill(voice, buffer),
                    _ => {
                        buffer.fill(0.0);
                        VoiceStatus::Finished
                    }
                };
                grain.envelope.process(buffer);
                spatializer.spatialize(
                    &grain.location,
                    grain.amplitude,
                    buffer,
                    offset,
                    output,
                    diffuse,
                );
                if status == VoiceStatus::Finished {
                    grain.stop();
                }
            }
            grain.elapsed += quantum_frames;
            if !grain.is_finished() {
                return true;
            }
            if let Some(voice) = grain.voice.take() {
                if let Some(source) = sources.get_mut(grain.source_index) {
                    source.kill(voice);
                }
            }
            false
        });
    }
}

impl Drop for GrainStream {
    fn drop(&mut self) {
        log::debug!(
            "Dropping grain stream with {} active grains",
            self.pool.active_count()
        );
        // release voices while their sources are still alive
        let sources = &mut self.sources;
        self.pool.retain(|grain| {
            if let Some(voice) = grain.voice.take() {
                if let Some(source) = sources.get_mut(grain.source_index) {
                    source.kill(voice);
                }
            }
            false
        });
        self.sources.clear();
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::{
        effect::widener::WidenerEffect,
        envelope::EnvelopeType,
        model::{ModelParameter, RateMode},
        source::tests::CountingSynth,
        trigger::ImpulseTrigger,
    };

    const SAMPLE_RATE: u32 = 8192;
    const QUANTUM_FRAMES: usize = 128;

    /// Exact time in seconds of the given number of frames.
    fn frames(count: usize) -> f64 {
        count as f64 / SAMPLE_RATE as f64
    }

    fn test_config() -> EngineConfig {
        EngineConfig::default()
            .with_sample_rate(SAMPLE_RATE)
            .with_quantum_frames(QUANTUM_FRAMES)
    }

    /// Stream with a constant synth, unit amplitude, no envelope and no distance delay.
    fn test_stream(config: EngineConfig, synth: CountingSynth) -> GrainStream {
        let mut model = GrainModel::with_seed(1);
        model.set_envelope_type(EnvelopeType::None);
        model.amplitude_mut().set_constant(0.0);
        model
            .distribution_mut(ModelParameter::Distance)
            .set_constant(0.0);
        let mut stream = GrainStream::with_model(config, model).unwrap();
        stream.add_source(GrainSource::with_synth(synth)).unwrap();
        stream
    }

    fn triggered_stream() -> GrainStream {
        let mut stream = test_stream(test_config(), CountingSynth::new(1.0));
        stream.model_mut().set_rate_mode(RateMode::Triggered);
        stream
    }

    fn render(stream: &mut GrainStream) -> (Vec<f32>, Vec<f32>) {
        let config = *stream.config();
        let mut output = vec![0.0; config.quantum_samples()];
        let mut diffuse = vec![0.0; config.quantum_frames];
        stream.render(&mut output, &mut diffuse, &RenderTime::default());
        (output, diffuse)
    }

    fn sounding_frames(output: &[f32]) -> Vec<usize> {
        output
            .chunks_exact(2)
            .enumerate()
            .filter(|(_, frame)| frame[0] != 0.0)
            .map(|(index, _)| index)
            .collect()
    }

    fn first_sounding_frame(output: &[f32]) -> Option<usize> {
        sounding_frames(output).first().copied()
    }

    const CENTER: f32 = std::f32::consts::FRAC_1_SQRT_2;

    #[test]
    fn sample_accurate_placement() {
        let mut stream = triggered_stream();
        stream.model_mut().duration_mut().set_constant(1.0);
        stream.trigger_single(frames(37));
        let (output, diffuse) = render(&mut stream);
        assert_eq!(first_sounding_frame(&output), Some(37));
        assert_eq!(diffuse.iter().position(|s| *s != 0.0), Some(37));
        assert!((output[2 * 37] - CENTER).abs() < 1e-5);
        assert!((output[2 * (QUANTUM_FRAMES - 1) + 1] - CENTER).abs() < 1e-5);

        // grains starting in a later quantum stay silent until they are reached
        let mut stream = triggered_stream();
        stream.model_mut().duration_mut().set_constant(1.0);
        stream.trigger_single(frames(300));
        assert_eq!(first_sounding_frame(&render(&mut stream).0), None);
        assert_eq!(first_sounding_frame(&render(&mut stream).0), None);
        assert_eq!(first_sounding_frame(&render(&mut stream).0), Some(44));
    }

    #[test]
    fn grain_duration() {
        let mut stream = triggered_stream();
        stream.model_mut().duration_mut().set_constant(frames(50));
        stream.trigger_single(frames(20));

        let (output, _) = render(&mut stream);
        assert_eq!(sounding_frames(&output), (20..70).collect::<Vec<_>>());
        assert_eq!(stream.active_grain_count(), 0);
        assert_eq!(stream.source(0).unwrap().live_voice_count(), 0);
    }

    #[test]
    fn pool_conservation() {
        let synth = CountingSynth::new(0.5);
        let created = synth.created.clone();
        let destroyed = synth.destroyed.clone();
        let mut stream = test_stream(test_config().with_initial_grain_capacity(0), synth);
        stream.model_mut().rate_mut().set_constant(10.0);
        stream.model_mut().duration_mut().set_constant(0.25);

        for _ in 0..50 {
            render(&mut stream);
        }
        let created_after_warmup = created.load(Ordering::Relaxed);
        let grains_after_warmup = stream.pool.grain_count();
        assert!(created_after_warmup <= 4, "{created_after_warmup}");
        for _ in 0..200 {
            render(&mut stream);
            assert_eq!(
                stream.active_grain_count() + stream.dead_grain_count(),
                stream.pool.grain_count()
            );
        }
        assert_eq!(created.load(Ordering::Relaxed), created_after_warmup);
        assert_eq!(stream.pool.grain_count(), grains_after_warmup);

        drop(stream);
        assert_eq!(destroyed.load(Ordering::Relaxed), created_after_warmup);
    }

    #[test]
    fn regular_rate_scenario() {
        let config = EngineConfig::default()
            .with_sample_rate(44100)
            .with_quantum_frames(512);
        let synth = CountingSynth::new(0.25);
        let initialized = synth.initialized.clone();
        let mut stream = test_stream(config, synth);
        stream.model_mut().set_rate_mode(RateMode::Regular);
        stream.model_mut().rate_mut().set_constant(10.0);
        stream.model_mut().time_mut().set_constant(0.0);
        stream.model_mut().duration_mut().set_constant(0.2);

        // one grain every 4410 frames: 0, 4410, ..., 44100
        let quanta = 44100 / 512 + 1;
        let mut max_active = 0;
        for quantum in 0..quanta {
            render(&mut stream);
            let rendered_frames = (quantum + 1) * 512;
            let expected = (rendered_frames - 1) / 4410 + 1;
            assert_eq!(initialized.load(Ordering::Relaxed), expected);
            max_active = max_active.max(stream.active_grain_count());
        }
        assert_eq!(initialized.load(Ordering::Relaxed), 11);
        assert_eq!(max_active, 2);
    }

    #[test]
    fn trigger_sentinel() {
        let mut stream = test_stream(test_config(), CountingSynth::new(1.0));
        stream.model_mut().rate_mut().set_constant(0.0);
        let (output, _) = render(&mut stream);
        assert!(output.iter().all(|s| *s == 0.0));
        assert_eq!(stream.active_grain_count(), 0);

        stream.model_mut().rate_mut().clear_constant();
        render(&mut stream);
        assert_eq!(stream.active_grain_count(), 0);

        // triggering resumes at the start of the next quantum
        stream.model_mut().rate_mut().set_constant(10.0);
        stream.model_mut().duration_mut().set_constant(1.0);
        let (output, _) = render(&mut stream);
        assert_eq!(first_sounding_frame(&output), Some(0));
        assert_eq!(stream.active_grain_count(), 1);
    }

    #[test]
    fn far_future_triggers() {
        let mut stream = triggered_stream();
        stream.model_mut().duration_mut().set_constant(1.0);
        stream.trigger_single(1.0e300);
        stream.trigger_single((1u64 << 63) as f64 / SAMPLE_RATE as f64);
        for _ in 0..4 {
            let (output, _) = render(&mut stream);
            assert_eq!(first_sounding_frame(&output), None);
        }
        assert_eq!(stream.active_grain_count(), 2);
    }

    #[test]
    fn finished_voices_get_reaped() {
        let mut synth = CountingSynth::new(1.0);
        synth.finish_after = Some(QUANTUM_FRAMES + QUANTUM_FRAMES / 2);
        let created = synth.created.clone();
        let mut stream = test_stream(test_config(), synth);
        stream.model_mut().set_rate_mode(RateMode::Triggered);
        stream.model_mut().duration_mut().set_constant(10.0);

        stream.trigger_single(0.0);
        let (output, _) = render(&mut stream);
        assert_eq!(first_sounding_frame(&output), Some(0));
        assert_eq!(stream.active_grain_count(), 1);
        assert_eq!(stream.source(0).unwrap().live_voice_count(), 1);

        // the voice finishes within the second quantum
        let (output, _) = render(&mut stream);
        assert_eq!(first_sounding_frame(&output), Some(0));
        assert_eq!(stream.active_grain_count(), 0);
        assert_eq!(stream.dead_grain_count(), 1);
        assert_eq!(stream.source(0).unwrap().live_voice_count(), 0);
        assert_eq!(stream.source(0).unwrap().dead_voice_count(), 1);

        let (output, _) = render(&mut stream);
        assert_eq!(first_sounding_frame(&output), None);

        // the finished voice gets recycled
        stream.trigger_single(0.0);
        render(&mut stream);
        assert_eq!(created.load(Ordering::Relaxed), 1);
        assert_eq!(stream.source(0).unwrap().live_voice_count(), 1);
    }

    #[test]
    fn grain_cap() {
        let config = test_config().with_max_grains_per_quantum(8);
        let mut stream = test_stream(config, CountingSynth::new(1.0));
        // negative intervals are clamped to zero
        stream.model_mut().time_mut().set_constant(-1.0);
        render(&mut stream);
        assert_eq!(stream.active_grain_count(), 8);
    }

    #[test]
    fn invalid_sources() {
        let mut stream = test_stream(test_config(), CountingSynth::new(1.0));
        stream.model_mut().source_mut().set_constant(5.0);
        let (output, _) = render(&mut stream);
        assert!(output.iter().all(|s| *s == 0.0));
        assert_eq!(stream.active_grain_count(), 0);
        assert_eq!(stream.dead_grain_count(), stream.pool.grain_count());
        assert_eq!(stream.voice_count(), 0);

        // unbound sources are silent as well
        assert_eq!(stream.add_source(GrainSource::new()).unwrap(), 1);
        stream.model_mut().source_mut().set_constant(1.0);
        let (output, _) = render(&mut stream);
        assert!(output.iter().all(|s| *s == 0.0));
        assert!(stream.replace_source(7, GrainSource::new()).is_err());
    }

    #[test]
    fn replace_source() {
        let synth = CountingSynth::new(1.0);
        let destroyed = synth.destroyed.clone();
        let mut stream = test_stream(test_config(), synth);
        stream.model_mut().set_rate_mode(RateMode::Triggered);
        stream.model_mut().duration_mut().set_constant(10.0);
        stream.trigger_single(0.0);
        render(&mut stream);
        assert_eq!(stream.active_grain_count(), 1);

        let old_source = stream
            .replace_source(0, GrainSource::with_synth(CountingSynth::new(0.5)))
            .unwrap();
        assert_eq!(stream.active_grain_count(), 0);
        assert_eq!(old_source.live_voice_count(), 0);
        drop(old_source);
        assert_eq!(destroyed.load(Ordering::Relaxed), 1);

        stream.trigger_single(0.0);
        let (output, _) = render(&mut stream);
        assert_eq!(stream.active_grain_count(), 1);
        assert!((output[0] - 0.5 * CENTER).abs() < 1e-5);
    }

    #[test]
    fn trigger_many() {
        let mut stream = triggered_stream();
        stream.model_mut().duration_mut().set_constant(frames(1));

        stream.trigger_many(4, frames(40), 0.0, TriggerMode::Regular);
        let (output, _) = render(&mut stream);
        assert_eq!(sounding_frames(&output), vec![0, 10, 20, 30]);

        stream.trigger_many(16, frames(50), frames(20), TriggerMode::Stochastic);
        let (output, _) = render(&mut stream);
        let sounding = sounding_frames(&output);
        assert!(!sounding.is_empty());
        assert!(sounding.iter().all(|index| (20..70).contains(index)));
        assert_eq!(stream.active_grain_count(), 0);
    }

    #[test]
    fn gain_fade() {
        let mut stream = test_stream(test_config(), CountingSynth::new(1.0));
        stream.model_mut().duration_mut().set_constant(10.0);

        stream.set_gain_db(-6.0);
        let (output, _) = render(&mut stream);
        assert!((output[0] - CENTER * db_to_linear(-6.0)).abs() < 1e-5);

        // stepped once per quantum: 64 steps per second
        stream.set_gain_db(0.0);
        stream.fade_gain_db(-20.0, 1.0);
        for _ in 0..64 {
            render(&mut stream);
        }
        assert!((stream.gain() - 0.1).abs() < 1e-3, "{}", stream.gain());
    }

    #[test]
    fn stream_effects() {
        let mut stream = test_stream(test_config(), CountingSynth::new(1.0));
        stream.model_mut().duration_mut().set_constant(10.0);
        let effect_id = stream
            .add_effect(WidenerEffect::with_parameters(1.0, 0.0))
            .unwrap();
        assert_eq!(
            stream.effect_name(effect_id),
            Some(WidenerEffect::EFFECT_NAME)
        );
        stream
            .process_effect_parameter_update(effect_id, WidenerEffect::MIX_ID, 1.0)
            .unwrap();
        let (output, _) = render(&mut stream);
        // fully mixed widener: the inverted, delayed opposite channel only
        assert_eq!(output[0], 0.0);
        assert!((output[2 * 20] + CENTER).abs() < 1e-5);

        assert_eq!(stream.effect_count(), 1);
        stream.remove_effect(effect_id).unwrap();
        assert_eq!(stream.effect_count(), 0);
        assert!(matches!(
            stream.remove_effect(effect_id),
            Err(Error::EffectNotFoundError(_))
        ));
    }

    #[test]
    fn live_trigger_onsets() {
        let config = EngineConfig::default()
            .with_sample_rate(44100)
            .with_quantum_frames(512);
        let mut stream = test_stream(config, CountingSynth::new(1.0));
        stream.model_mut().set_rate_mode(RateMode::Triggered);
        stream.model_mut().duration_mut().set_constant(1.0);

        let mut wave = vec![0.0; 300];
        wave.extend((0..64).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }));
        stream
            .add_live_trigger(LiveTrigger::with_wave(ImpulseTrigger::new(), wave, false))
            .unwrap();

        let (output, _) = render(&mut stream);
        assert_eq!(stream.active_grain_count(), 1);
        let onset = first_sounding_frame(&output).unwrap();
        assert!((300..364).contains(&onset), "{onset}");

        render(&mut stream);
        assert_eq!(stream.active_grain_count(), 1);
    }
}
