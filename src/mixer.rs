//! Real-time mixer: sums all grain streams and applies the global effects.

use std::sync::Arc;

use basedrop::Owned;
use crossbeam_queue::ArrayQueue;
use four_cc::FourCC;
use strum::{Display, EnumCount, EnumIter, EnumString, VariantNames};

use crate::{
    config::{EngineConfig, RenderTime, CHANNEL_COUNT},
    distribution::Distribution,
    effect::{
        compressor::CompressorEffect, eq::EqEffect, reverb::ReverbEffect, widener::WidenerEffect,
        Effect, EffectId,
    },
    envelope::EnvelopeType,
    location::SpatialMode,
    model::{ModelParameter, RateMode},
    parameter::FloatParameter,
    source::GrainSource,
    stream::{GrainStream, TriggerMode},
    utils::{
        buffer::{add_buffers_with_gain, clear_buffer, clip_buffer, StereoFramesMut},
        db_to_linear,
        dsp::filters::biquad::{BiquadFilter, BiquadFilterCoefficients, BiquadFilterType},
        fader::GainFader,
        panning_factors,
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Unique id of a grain stream within a [`GrainPlayer`](crate::GrainPlayer).
pub type StreamId = usize;

// -------------------------------------------------------------------------------------------------

/// The mixer's global effect units, applied in this order to the summed streams.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
    VariantNames,
)]
pub enum MixerEffect {
    Eq,
    Compressor,
    Widener,
    Reverb,
}

impl MixerEffect {
    /// Parameter descriptors of the effect unit.
    pub fn parameters(&self) -> Vec<FloatParameter> {
        fn cloned(effect: &dyn Effect) -> Vec<FloatParameter> {
            effect.parameters().into_iter().cloned().collect()
        }
        match self {
            Self::Eq => cloned(&EqEffect::new()),
            Self::Compressor => cloned(&CompressorEffect::new()),
            Self::Widener => cloned(&WidenerEffect::new()),
            Self::Reverb => cloned(&ReverbEffect::new()),
        }
    }

    /// Whether the effect unit is enabled in new mixers.
    pub fn enabled_by_default(&self) -> bool {
        matches!(self, Self::Eq)
    }
}

// -------------------------------------------------------------------------------------------------

/// Messages sent from the player to the mixer, applied at the start of the next quantum.
pub(crate) enum MixerMessage {
    AddStream {
        id: StreamId,
        stream: Owned<Box<GrainStream>>,
    },
    RemoveStream {
        id: StreamId,
    },
    SetStreamGain {
        id: StreamId,
        gain_db: f32,
        fade_time: Option<f32>,
    },
    TriggerSingle {
        id: StreamId,
        when: f64,
    },
    TriggerMany {
        id: StreamId,
        count: usize,
        window: f64,
        after: f64,
        mode: TriggerMode,
    },
    SwapDistribution {
        id: StreamId,
        parameter: ModelParameter,
        distribution: Owned<Distribution>,
    },
    SwapSource {
        id: StreamId,
        index: usize,
        source: Owned<GrainSource>,
    },
    SetRateMode {
        id: StreamId,
        mode: RateMode,
    },
    SetEnvelopeType {
        id: StreamId,
        envelope_type: EnvelopeType,
    },
    SetSpatialMode {
        id: StreamId,
        mode: SpatialMode,
    },
    SetStreamEffectParameter {
        id: StreamId,
        effect_id: EffectId,
        parameter_id: FourCC,
        value: f32,
    },
    SetGain {
        gain_db: f32,
        fade_time: Option<f32>,
    },
    SetEffectEnabled {
        effect: MixerEffect,
        enabled: bool,
    },
    SetEffectParameter {
        effect: MixerEffect,
        parameter_id: FourCC,
        value: f32,
    },
    SetReverbLevel {
        level_db: f32,
    },
    SetTestTone {
        enabled: bool,
    },
}

// -------------------------------------------------------------------------------------------------

/// Phase continuous diagnostic tone: a 440 Hz sine, amplitude modulated at 8.8 Hz, which
/// pans from left to right once per second.
struct TestTone {
    sample_rate: f64,
    carrier_phase: f64,
    modulator_phase: f64,
    panning_phase: f64,
}

impl TestTone {
    const FREQUENCY: f64 = 440.0;
    const MODULATION_FREQUENCY: f64 = 8.8;
    const PANNING_FREQUENCY: f64 = 1.0;
    const AMPLITUDE: f64 = 0.5;

    fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            carrier_phase: 0.0,
            modulator_phase: 0.0,
            panning_phase: 0.0,
        }
    }

    fn write(&mut self, output: &mut [f32]) {
        use std::f64::consts::TAU;
        for frame in output.stereo_frames_mut() {
            let carrier = (self.carrier_phase * TAU).sin();
            let modulator = 0.5 - 0.5 * (self.modulator_phase * TAU).cos();
            let sample = (Self::AMPLITUDE * carrier * modulator) as f32;
            let (left, right) = panning_factors((2.0 * self.panning_phase - 1.0) as f32);
            frame[0] = sample * left;
            frame[1] = sample * right;

            self.carrier_phase = (self.carrier_phase + Self::FREQUENCY / self.sample_rate).fract();
            self.modulator_phase =
                (self.modulator_phase + Self::MODULATION_FREQUENCY / self.sample_rate).fract();
            self.panning_phase =
                (self.panning_phase + Self::PANNING_FREQUENCY / self.sample_rate).fract();
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Sums all grain streams into an interleaved stereo quantum, applies the global effect units,
/// the master gain and clips the result.
///
/// The mixer lives in the real-time audio thread and gets controlled by its
/// [`GrainPlayer`](crate::GrainPlayer) via a message queue, which is drained at the start of
/// each rendered quantum. Create mixers via [`GrainPlayer::new`](crate::GrainPlayer::new).
pub struct GrainMixer {
    config: EngineConfig,
    streams: Vec<(StreamId, Owned<Box<GrainStream>>)>,
    message_queue: Arc<ArrayQueue<MixerMessage>>,
    event_queue: Arc<ArrayQueue<MixerMessage>>,
    eq: EqEffect,
    compressor: CompressorEffect,
    widener: WidenerEffect,
    reverb: ReverbEffect,
    enabled_effects: [bool; MixerEffect::COUNT],
    reverb_level: f32,
    reverb_filter_coefficients: BiquadFilterCoefficients,
    reverb_filter: BiquadFilter,
    reverb_buffer: Vec<f32>,
    gain: GainFader,
    test_tone: Option<TestTone>,
    output: Vec<f32>,
    diffuse: Vec<f32>,
    time: RenderTime,
}

impl GrainMixer {
    const STREAMS_CAPACITY: usize = 64;

    const REVERB_SEND_DB: f32 = -10.0;
    const REVERB_LOWPASS_FREQUENCY: f32 = 1000.0;
    const REVERB_LOWPASS_Q: f32 = 1.0;
    const DEFAULT_REVERB_LEVEL_DB: f32 = -20.0;

    pub(crate) fn new(config: EngineConfig) -> Result<Self, Error> {
        config.validate()?;
        let sample_rate = config.sample_rate;
        let max_frames = config.quantum_frames;

        let mut eq = EqEffect::new();
        eq.initialize(sample_rate, CHANNEL_COUNT, max_frames)?;
        let mut compressor = CompressorEffect::new();
        compressor.initialize(sample_rate, CHANNEL_COUNT, max_frames)?;
        let mut widener = WidenerEffect::new();
        widener.initialize(sample_rate, CHANNEL_COUNT, max_frames)?;
        let mut reverb = ReverbEffect::new();
        reverb.initialize(sample_rate, CHANNEL_COUNT, max_frames)?;

        let mut enabled_effects = [false; MixerEffect::COUNT];
        for effect in <MixerEffect as strum::IntoEnumIterator>::iter() {
            enabled_effects[effect as usize] = effect.enabled_by_default();
        }

        let reverb_filter_coefficients = BiquadFilterCoefficients::new(
            BiquadFilterType::Lowpass,
            sample_rate,
            Self::REVERB_LOWPASS_FREQUENCY,
            Self::REVERB_LOWPASS_Q,
            0.0,
        )?;

        Ok(Self {
            config,
            streams: Vec::with_capacity(Self::STREAMS_CAPACITY),
            message_queue: Arc::new(ArrayQueue::new(config.message_queue_size)),
            event_queue: Arc::new(ArrayQueue::new(config.message_queue_size)),
            eq,
            compressor,
            widener,
            reverb,
            enabled_effects,
            reverb_level: db_to_linear(Self::DEFAULT_REVERB_LEVEL_DB),
            reverb_filter_coefficients,
            reverb_filter: BiquadFilter::new(),
            reverb_buffer: vec![0.0; config.quantum_samples()],
            gain: GainFader::new(1.0, sample_rate as f32),
            test_tone: None,
            output: vec![0.0; config.quantum_samples()],
            diffuse: vec![0.0; config.quantum_frames],
            time: RenderTime::default(),
        })
    }

    /// Allows controlling the mixer by pushing messages into this queue.
    pub(crate) fn message_queue(&self) -> Arc<ArrayQueue<MixerMessage>> {
        Arc::clone(&self.message_queue)
    }

    /// Queue for gain and trigger messages, which may replace each other when the queue is
    /// full. Drained after the message queue.
    pub(crate) fn event_queue(&self) -> Arc<ArrayQueue<MixerMessage>> {
        Arc::clone(&self.event_queue)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Transport position: the number of rendered frames.
    pub fn time(&self) -> &RenderTime {
        &self.time
    }

    /// Number of streams the mixer currently renders.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn is_effect_enabled(&self, effect: MixerEffect) -> bool {
        self.enabled_effects[effect as usize]
    }

    /// Render the next quantum of `quantum_frames` interleaved stereo frames.
    ///
    /// Called once per audio period by the audio output in the real-time thread.
    pub fn render_quantum(&mut self) -> &[f32] {
        Self::assert_no_alloc(|| self.process_quantum());
        &self.output
    }

    fn process_quantum(&mut self) {
        self.process_messages();

        clear_buffer(&mut self.output);
        clear_buffer(&mut self.diffuse);

        if let Some(test_tone) = self.test_tone.as_mut() {
            test_tone.write(&mut self.output);
        } else {
            for (_, stream) in self.streams.iter_mut() {
                stream.render(&mut self.output, &mut self.diffuse, &self.time);
            }
            self.process_effects();
        }

        self.gain.process_stereo(&mut self.output);
        clip_buffer(&mut self.output);
        self.time.advance(self.config.quantum_frames);
    }

    fn process_effects(&mut self) {
        if self.is_effect_enabled(MixerEffect::Eq) {
            self.eq.process(&mut self.output, &self.time);
        }
        if self.is_effect_enabled(MixerEffect::Compressor) {
            self.compressor.process(&mut self.output, &self.time);
        }
        if self.is_effect_enabled(MixerEffect::Widener) {
            self.widener.process(&mut self.output, &self.time);
        }
        if self.is_effect_enabled(MixerEffect::Reverb) {
            self.reverb_filter
                .process(&self.reverb_filter_coefficients, &mut self.diffuse);
            let send_gain = db_to_linear(Self::REVERB_SEND_DB);
            for (frame, sample) in self
                .reverb_buffer
                .stereo_frames_mut()
                .zip(self.diffuse.iter())
            {
                frame[0] = sample * send_gain;
                frame[1] = sample * send_gain;
            }
            self.reverb.process(&mut self.reverb_buffer, &self.time);
            add_buffers_with_gain(&mut self.output, &self.reverb_buffer, self.reverb_level);
        }
    }

    fn process_messages(&mut self) {
        while let Some(message) = self.message_queue.pop() {
            self.process_message(message);
        }
        while let Some(message) = self.event_queue.pop() {
            self.process_message(message);
        }
    }

    fn process_message(&mut self, message: MixerMessage) {
        match message {
            MixerMessage::AddStream { id, stream } => {
                self.streams.push((id, stream));
            }
            MixerMessage::RemoveStream { id } => {
                // dropped streams get freed by the player's collector
                self.streams.retain(|(stream_id, _)| *stream_id != id);
            }
            MixerMessage::SetStreamGain {
                id,
                gain_db,
                fade_time,
            } => {
                if let Some(stream) = self.stream_mut(id) {
                    match fade_time {
                        Some(time) => stream.fade_gain_db(gain_db, time),
                        None => stream.set_gain_db(gain_db),
                    }
                }
            }
            MixerMessage::TriggerSingle { id, when } => {
                if let Some(stream) = self.stream_mut(id) {
                    stream.trigger_single(when);
                }
            }
            MixerMessage::TriggerMany {
                id,
                count,
                window,
                after,
                mode,
            } => {
                if let Some(stream) = self.stream_mut(id) {
                    stream.trigger_many(count, window, after, mode);
                }
            }
            MixerMessage::SwapDistribution {
                id,
                parameter,
                mut distribution,
            } => {
                if let Some(stream) = self.stream_mut(id) {
                    // the replaced distribution gets freed by the player's collector
                    stream
                        .model_mut()
                        .swap_distribution(parameter, &mut distribution);
                }
            }
            MixerMessage::SwapSource {
                id,
                index,
                mut source,
            } => {
                if let Some(stream) = self.stream_mut(id) {
                    if let Err(err) = stream.swap_source(index, &mut source) {
                        log::warn!("Failed to replace source of stream {id}: {err}");
                    }
                }
            }
            MixerMessage::SetRateMode { id, mode } => {
                if let Some(stream) = self.stream_mut(id) {
                    stream.model_mut().set_rate_mode(mode);
                }
            }
            MixerMessage::SetEnvelopeType { id, envelope_type } => {
                if let Some(stream) = self.stream_mut(id) {
                    stream.model_mut().set_envelope_type(envelope_type);
                }
            }
            MixerMessage::SetSpatialMode { id, mode } => {
                if let Some(stream) = self.stream_mut(id) {
                    stream.model_mut().set_spatial_mode(mode);
                }
            }
            MixerMessage::SetStreamEffectParameter {
                id,
                effect_id,
                parameter_id,
                value,
            } => {
                if let Some(stream) = self.stream_mut(id) {
                    if let Err(err) =
                        stream.process_effect_parameter_update(effect_id, parameter_id, value)
                    {
                        log::warn!("Failed to update stream {id} effect parameter: {err}");
                    }
                }
            }
            MixerMessage::SetGain { gain_db, fade_time } => match fade_time {
                Some(time) => self.gain.fade_gain_db(gain_db, time),
                None => self.gain.set_gain_db(gain_db),
            },
            MixerMessage::SetEffectEnabled { effect, enabled } => {
                self.set_effect_enabled(effect, enabled);
            }
            MixerMessage::SetEffectParameter {
                effect,
                parameter_id,
                value,
            } => {
                if let Err(err) = self
                    .effect_mut(effect)
                    .process_parameter_update(parameter_id, value)
                {
                    log::warn!("Failed to update {effect} parameter: {err}");
                }
            }
            MixerMessage::SetReverbLevel { level_db } => {
                self.reverb_level = db_to_linear(level_db);
            }
            MixerMessage::SetTestTone { enabled } => {
                if enabled != self.test_tone.is_some() {
                    self.test_tone = enabled.then(|| TestTone::new(self.config.sample_rate));
                }
            }
        }
    }

    fn stream_mut(&mut self, id: StreamId) -> Option<&mut GrainStream> {
        let stream = self
            .streams
            .iter_mut()
            .find(|(stream_id, _)| *stream_id == id)
            .map(|(_, stream)| &mut ***stream);
        if stream.is_none() {
            log::warn!("Grain stream with id {id} not found");
        }
        stream
    }

    fn effect_mut(&mut self, effect: MixerEffect) -> &mut dyn Effect {
        match effect {
            MixerEffect::Eq => &mut self.eq,
            MixerEffect::Compressor => &mut self.compressor,
            MixerEffect::Widener => &mut self.widener,
            MixerEffect::Reverb => &mut self.reverb,
        }
    }

    fn set_effect_enabled(&mut self, effect: MixerEffect, enabled: bool) {
        let was_enabled = self.enabled_effects[effect as usize];
        if enabled && !was_enabled {
            // don't resume with stale delay lines and filter states
            self.effect_mut(effect).process_reset();
            if effect == MixerEffect::Reverb {
                self.reverb_filter.reset();
            }
        }
        self.enabled_effects[effect as usize] = enabled;
    }

    fn assert_no_alloc<T, F: FnOnce() -> T>(func: F) -> T {
        #[cfg(feature = "assert-allocs")]
        return assert_no_alloc::assert_no_alloc::<T, F>(func);

        #[cfg(not(feature = "assert-allocs"))]
        return func();
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_defaults() {
        let mixer = GrainMixer::new(EngineConfig::default()).unwrap();
        assert!(mixer.is_effect_enabled(MixerEffect::Eq));
        assert!(!mixer.is_effect_enabled(MixerEffect::Compressor));
        assert!(!mixer.is_effect_enabled(MixerEffect::Widener));
        assert!(!mixer.is_effect_enabled(MixerEffect::Reverb));
        assert_eq!(MixerEffect::Eq.parameters().len(), 15);
        assert!(MixerEffect::Widener
            .parameters()
            .iter()
            .any(|parameter| parameter.id() == WidenerEffect::MIX_ID));
    }

    #[test]
    fn silence_without_streams() {
        let config = EngineConfig::default().with_quantum_frames(64);
        let mut mixer = GrainMixer::new(config).unwrap();
        let output = mixer.render_quantum();
        assert_eq!(output.len(), 128);
        assert!(output.iter().all(|s| *s == 0.0));
        assert_eq!(mixer.time().pos_in_frames, 64);
    }

    #[test]
    fn test_tone() {
        let config = EngineConfig::default().with_quantum_frames(512);
        let mut mixer = GrainMixer::new(config).unwrap();
        mixer.set_effect_enabled(MixerEffect::Reverb, true);
        mixer.test_tone = Some(TestTone::new(config.sample_rate));
        let mut left = 0.0f32;
        let mut right = 0.0f32;
        // first half second pans left, the second half right
        for _ in 0..43 {
            let output = mixer.render_quantum();
            assert!(output.iter().all(|s| s.abs() <= 0.5));
            for frame in output.chunks_exact(2) {
                left += frame[0].abs();
                right += frame[1].abs();
            }
        }
        assert!(left > 0.0 && left > right, "{left} {right}");
        for _ in 0..43 {
            let output = mixer.render_quantum();
            for frame in output.chunks_exact(2) {
                right += frame[1].abs();
            }
        }
        assert!(right > left, "{left} {right}");
    }
}
