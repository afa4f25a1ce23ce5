//! Control side of the engine: sends streams and parameter changes to the real-time mixer.

use std::{collections::HashSet, sync::Arc};

use basedrop::{Collector, Handle, Owned};
use crossbeam_queue::ArrayQueue;
use four_cc::FourCC;

use crate::{
    config::EngineConfig,
    distribution::Distribution,
    effect::EffectId,
    envelope::EnvelopeType,
    location::SpatialMode,
    mixer::{GrainMixer, MixerEffect, MixerMessage, StreamId},
    model::{ModelParameter, RateMode},
    source::GrainSource,
    stream::{GrainStream, TriggerMode},
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Controls a [`GrainMixer`], which renders in the real-time audio thread.
///
/// All changes are sent as messages to the mixer and get applied at the start of the next
/// rendered quantum. Large payloads, such as streams, distributions and sources, are wrapped
/// into [`basedrop::Owned`] boxes: everything the mixer drops is freed in
/// [`collect_garbage`](Self::collect_garbage), which should be called regularly from the
/// player's thread.
///
/// Failed operations return an error and additionally record it as the player's
/// [`last_error`](Self::last_error).
pub struct GrainPlayer {
    config: EngineConfig,
    collector: Collector,
    collector_handle: Handle,
    message_queue: Arc<ArrayQueue<MixerMessage>>,
    event_queue: Arc<ArrayQueue<MixerMessage>>,
    stream_ids: HashSet<StreamId>,
    next_stream_id: StreamId,
    last_error: Option<String>,
}

impl GrainPlayer {
    /// Create a new player and its mixer. Move the mixer into the audio thread and call
    /// [`GrainMixer::render_quantum`] there to render the mixer's streams.
    pub fn new(config: EngineConfig) -> Result<(Self, GrainMixer), Error> {
        let mixer = GrainMixer::new(config)?;
        let collector = Collector::new();
        let collector_handle = collector.handle();
        let player = Self {
            config,
            collector,
            collector_handle,
            message_queue: mixer.message_queue(),
            event_queue: mixer.event_queue(),
            stream_ids: HashSet::new(),
            next_stream_id: 0,
            last_error: None,
        };
        log::info!(
            "Created grain player with sample rate {} and quantum size {}",
            config.sample_rate,
            config.quantum_frames
        );
        Ok((player, mixer))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The most recent error of a failed player operation.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Free all streams, distributions and sources, which got dropped by the mixer.
    pub fn collect_garbage(&mut self) {
        self.collector.collect();
    }

    /// Ids of all streams which got added to the mixer.
    pub fn stream_ids(&self) -> impl Iterator<Item = StreamId> + '_ {
        self.stream_ids.iter().copied()
    }

    /// Move a fully configured stream into the mixer. Returns the id of the stream.
    pub fn add_stream(&mut self, stream: GrainStream) -> Result<StreamId, Error> {
        let stream_config = stream.config();
        if stream_config.sample_rate != self.config.sample_rate
            || stream_config.quantum_frames != self.config.quantum_frames
        {
            let err = Error::ConfigError(format!(
                "stream renders {} frames at {} Hz, but the mixer renders {} frames at {} Hz",
                stream_config.quantum_frames,
                stream_config.sample_rate,
                self.config.quantum_frames,
                self.config.sample_rate
            ));
            return Err(self.record_error(err));
        }
        let id = self.next_stream_id;
        let stream = Owned::new(&self.collector_handle, Box::new(stream));
        self.send(
            "add_stream",
            MixerMessage::AddStream { id, stream },
            false,
        )?;
        self.next_stream_id += 1;
        self.stream_ids.insert(id);
        log::debug!("Added grain stream with id {id}");
        Ok(id)
    }

    /// Remove a stream from the mixer. The stream gets freed in the next garbage collection
    /// after the mixer processed the removal.
    pub fn remove_stream(&mut self, id: StreamId) -> Result<(), Error> {
        self.check_stream(id)?;
        self.send("remove_stream", MixerMessage::RemoveStream { id }, false)?;
        self.stream_ids.remove(&id);
        log::debug!("Removed grain stream with id {id}");
        Ok(())
    }

    /// Set a stream's gain in dB immediately.
    pub fn set_stream_gain_db(&mut self, id: StreamId, gain_db: f32) -> Result<(), Error> {
        self.send_stream_gain(id, gain_db, None)
    }

    /// Fade a stream's gain to the given dB value within `time` seconds.
    pub fn fade_stream_gain_db(
        &mut self,
        id: StreamId,
        gain_db: f32,
        time: f32,
    ) -> Result<(), Error> {
        self.send_stream_gain(id, gain_db, Some(time))
    }

    /// Set the mixer's master gain in dB immediately.
    pub fn set_gain_db(&mut self, gain_db: f32) -> Result<(), Error> {
        self.check_finite("gain", gain_db as f64)?;
        self.send(
            "set_gain",
            MixerMessage::SetGain {
                gain_db,
                fade_time: None,
            },
            true,
        )
    }

    /// Fade the mixer's master gain to the given dB value within `time` seconds.
    pub fn fade_gain_db(&mut self, gain_db: f32, time: f32) -> Result<(), Error> {
        self.check_finite("gain", gain_db as f64)?;
        self.send(
            "fade_gain",
            MixerMessage::SetGain {
                gain_db,
                fade_time: Some(time),
            },
            true,
        )
    }

    /// Trigger a single grain in the given stream, `when` seconds after the start of the next
    /// rendered quantum.
    pub fn trigger_single(&mut self, id: StreamId, when: f64) -> Result<(), Error> {
        self.check_stream(id)?;
        self.send("trigger_single", MixerMessage::TriggerSingle { id, when }, true)
    }

    /// Trigger `count` grains in the given stream within a window of `window` seconds, which
    /// starts `after` seconds after the start of the next rendered quantum.
    pub fn trigger_many(
        &mut self,
        id: StreamId,
        count: usize,
        window: f64,
        after: f64,
        mode: TriggerMode,
    ) -> Result<(), Error> {
        self.check_stream(id)?;
        self.send(
            "trigger_many",
            MixerMessage::TriggerMany {
                id,
                count,
                window,
                after,
                mode,
            },
            true,
        )
    }

    /// Replace the distribution of a stream's grain model parameter.
    pub fn set_distribution(
        &mut self,
        id: StreamId,
        parameter: ModelParameter,
        distribution: Distribution,
    ) -> Result<(), Error> {
        self.check_stream(id)?;
        let distribution = Owned::new(&self.collector_handle, distribution);
        self.send(
            "set_distribution",
            MixerMessage::SwapDistribution {
                id,
                parameter,
                distribution,
            },
            false,
        )
    }

    /// Replace the source at the given index of a stream.
    pub fn replace_source(
        &mut self,
        id: StreamId,
        index: usize,
        mut source: GrainSource,
    ) -> Result<(), Error> {
        self.check_stream(id)?;
        if source.is_valid() {
            if let Err(err) = source.initialize(self.config.sample_rate) {
                return Err(self.record_error(err));
            }
        }
        let source = Owned::new(&self.collector_handle, source);
        self.send(
            "replace_source",
            MixerMessage::SwapSource { id, index, source },
            false,
        )
    }

    pub fn set_rate_mode(&mut self, id: StreamId, mode: RateMode) -> Result<(), Error> {
        self.check_stream(id)?;
        self.send("set_rate_mode", MixerMessage::SetRateMode { id, mode }, false)
    }

    pub fn set_envelope_type(
        &mut self,
        id: StreamId,
        envelope_type: EnvelopeType,
    ) -> Result<(), Error> {
        self.check_stream(id)?;
        self.send(
            "set_envelope_type",
            MixerMessage::SetEnvelopeType { id, envelope_type },
            false,
        )
    }

    pub fn set_spatial_mode(&mut self, id: StreamId, mode: SpatialMode) -> Result<(), Error> {
        self.check_stream(id)?;
        self.send(
            "set_spatial_mode",
            MixerMessage::SetSpatialMode { id, mode },
            false,
        )
    }

    /// Set a parameter of an effect, which got added to the stream before the stream got
    /// added to the player.
    pub fn set_stream_effect_parameter(
        &mut self,
        id: StreamId,
        effect_id: EffectId,
        parameter_id: FourCC,
        value: f32,
    ) -> Result<(), Error> {
        self.check_stream(id)?;
        self.check_finite("effect parameter", value as f64)?;
        self.send(
            "set_stream_effect_parameter",
            MixerMessage::SetStreamEffectParameter {
                id,
                effect_id,
                parameter_id,
                value,
            },
            false,
        )
    }

    /// Enable or bypass one of the mixer's global effect units.
    pub fn set_effect_enabled(&mut self, effect: MixerEffect, enabled: bool) -> Result<(), Error> {
        self.send(
            "set_effect_enabled",
            MixerMessage::SetEffectEnabled { effect, enabled },
            false,
        )?;
        log::info!(
            "{} mixer effect '{effect}'",
            if enabled { "Enabling" } else { "Bypassing" }
        );
        Ok(())
    }

    /// Set a parameter of one of the mixer's global effect units.
    pub fn set_effect_parameter(
        &mut self,
        effect: MixerEffect,
        parameter_id: FourCC,
        value: f32,
    ) -> Result<(), Error> {
        let parameters = effect.parameters();
        let Some(parameter) = parameters
            .iter()
            .find(|parameter| parameter.id() == parameter_id)
        else {
            let err = Error::ParameterError(format!(
                "Unknown parameter: '{parameter_id}' for effect '{effect}'"
            ));
            return Err(self.record_error(err));
        };
        if !value.is_finite() || !parameter.range().contains(&value) {
            let err = Error::ParameterError(format!(
                "Value {value} of parameter '{}' is out of range {:?}",
                parameter.name(),
                parameter.range()
            ));
            return Err(self.record_error(err));
        }
        self.send(
            "set_effect_parameter",
            MixerMessage::SetEffectParameter {
                effect,
                parameter_id,
                value,
            },
            false,
        )
    }

    /// Set the level of the reverb's output in dB.
    pub fn set_reverb_level_db(&mut self, level_db: f32) -> Result<(), Error> {
        self.check_finite("reverb level", level_db as f64)?;
        self.send(
            "set_reverb_level",
            MixerMessage::SetReverbLevel { level_db },
            false,
        )
    }

    /// Replace all stream output with a diagnostic tone.
    pub fn set_test_tone(&mut self, enabled: bool) -> Result<(), Error> {
        self.send("set_test_tone", MixerMessage::SetTestTone { enabled }, false)
    }

    fn send_stream_gain(
        &mut self,
        id: StreamId,
        gain_db: f32,
        fade_time: Option<f32>,
    ) -> Result<(), Error> {
        self.check_stream(id)?;
        self.check_finite("gain", gain_db as f64)?;
        self.send(
            "set_stream_gain",
            MixerMessage::SetStreamGain {
                id,
                gain_db,
                fade_time,
            },
            true,
        )
    }

    /// Push a message into one of the mixer's queues. Forced gain and trigger messages go into
    /// the event queue, where they replace the oldest pending event when the queue is full.
    /// All other messages fail when the message queue is full, so they never get lost.
    fn send(&mut self, name: &str, message: MixerMessage, force: bool) -> Result<(), Error> {
        if force {
            if self.event_queue.force_push(message).is_some() {
                log::warn!("Mixer's event queue is full. Dropped the oldest event for a {name} message.");
            }
            Ok(())
        } else if self.message_queue.push(message).is_err() {
            log::warn!("Mixer's message queue is full. Failed to send a {name} message.");
            log::warn!("Increase the message queue size to prevent this from happening...");
            Err(self.record_error(Error::SendError("Mixer queue is full".to_string())))
        } else {
            Ok(())
        }
    }

    fn check_stream(&mut self, id: StreamId) -> Result<(), Error> {
        if self.stream_ids.contains(&id) {
            Ok(())
        } else {
            Err(self.record_error(Error::StreamNotFoundError(id)))
        }
    }

    fn check_finite(&mut self, name: &str, value: f64) -> Result<(), Error> {
        if value.is_finite() {
            Ok(())
        } else {
            let err = Error::ParameterError(format!("{name} must be finite, but is {value}"));
            Err(self.record_error(err))
        }
    }

    fn record_error(&mut self, err: Error) -> Error {
        log::warn!("{err}");
        self.last_error = Some(err.to_string());
        err
    }
}

// -------------------------------------------------------------------------------------------------
