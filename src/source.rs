//! Grain synthesis algorithms and their voice pools.

use crate::{grain::Grain, Error};

// -------------------------------------------------------------------------------------------------

pub mod sine;

// -------------------------------------------------------------------------------------------------

/// Handle of a voice instance within a [`GrainSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(usize);

impl VoiceId {
    pub fn index(&self) -> usize {
        self.0
    }
}

// -------------------------------------------------------------------------------------------------

/// Returned by [`GrainSynth::fill_buffer`] to signal if a voice still produces sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceStatus {
    Playing,
    /// The voice finished before the grain's duration elapsed: the grain gets reaped.
    Finished,
}

// -------------------------------------------------------------------------------------------------

/// A grain synthesis algorithm, rendering raw mono signals for grains.
///
/// Synths create voices, the per grain runtime state (phase accumulators, filter states),
/// which are recycled by the owning [`GrainSource`]: voices get created only when no unused
/// voice is available and are destroyed only when the source gets dropped.
///
/// Synths own their own parameters, usually [`Distribution`](crate::Distribution)s, which get
/// sampled when initializing a voice for a new grain.
///
/// NB: all functions except `initialize` are called in the real-time audio thread, so they
/// must not block. Apart from `create_voice`, they also should not allocate.
pub trait GrainSynth: Send + 'static {
    /// Per grain runtime state.
    type Voice: Send + 'static;

    /// A static name for the synth, used for logging.
    fn name(&self) -> &'static str;

    /// Called once with the stream's sample rate, when the source gets added to a stream.
    fn initialize(&mut self, _sample_rate: u32) -> Result<(), Error> {
        Ok(())
    }

    /// Create a new voice. Called only when the source's pool has no unused voices.
    fn create_voice(&mut self) -> Self::Voice;

    /// Configure a new or recycled voice for the given grain. Must fully reset the voice, so
    /// that no state from a previous grain persists.
    fn init_voice(&mut self, voice: &mut Self::Voice, grain: &Grain);

    /// Render exactly `buffer.len()` samples of raw, unenveloped and unspatialized signal.
    fn fill_buffer(&mut self, voice: &mut Self::Voice, buffer: &mut [f32]) -> VoiceStatus;

    /// Release private resources of a voice. Called when the owning source gets dropped.
    fn destroy_voice(&mut self, voice: Self::Voice) {
        drop(voice);
    }
}

// -------------------------------------------------------------------------------------------------

/// Type erased voice pool of a bound synth.
trait SourceVoices: Send {
    fn synth_name(&self) -> &'static str;
    fn initialize(&mut self, sample_rate: u32) -> Result<(), Error>;
    fn reserve(&mut self, voice_count: usize);
    fn revive(&mut self, grain: &Grain) -> VoiceId;
    fn fill(&mut self, voice: VoiceId, buffer: &mut [f32]) -> VoiceStatus;
    fn kill(&mut self, voice: VoiceId);
    fn voice_count(&self) -> usize;
    fn live_voice_count(&self) -> usize;
}

// -------------------------------------------------------------------------------------------------

struct BoundSynth<S: GrainSynth> {
    synth: S,
    voices: Vec<S::Voice>,
    live: Vec<bool>,
    dead: Vec<usize>,
    live_count: usize,
}

impl<S: GrainSynth> BoundSynth<S> {
    fn new(synth: S) -> Self {
        Self {
            synth,
            voices: Vec::new(),
            live: Vec::new(),
            dead: Vec::new(),
            live_count: 0,
        }
    }

    fn create_voice(&mut self) -> usize {
        let index = self.voices.len();
        self.voices.push(self.synth.create_voice());
        self.live.push(false);
        if self.dead.capacity() < self.voices.len() {
            self.dead.reserve(self.voices.len() - self.dead.len());
        }
        index
    }
}

impl<S: GrainSynth> SourceVoices for BoundSynth<S> {
    fn synth_name(&self) -> &'static str {
        self.synth.name()
    }

    fn initialize(&mut self, sample_rate: u32) -> Result<(), Error> {
        self.synth.initialize(sample_rate)
    }

    fn reserve(&mut self, voice_count: usize) {
        while self.voices.len() < voice_count {
            let index = self.create_voice();
            self.dead.push(index);
        }
    }

    fn revive(&mut self, grain: &Grain) -> VoiceId {
        let index = match self.dead.pop() {
            Some(index) => index,
            None => self.create_voice(),
        };
        debug_assert!(!self.live[index], "Voice is already live");
        self.live[index] = true;
        self.live_count += 1;
        self.synth.init_voice(&mut self.voices[index], grain);
        VoiceId(index)
    }

    fn fill(&mut self, voice: VoiceId, buffer: &mut [f32]) -> VoiceStatus {
        debug_assert!(self.live[voice.0], "Filling a dead voice");
        self.synth.fill_buffer(&mut self.voices[voice.0], buffer)
    }

    fn kill(&mut self, voice: VoiceId) {
        if self.live[voice.0] {
            self.live[voice.0] = false;
            self.live_count -= 1;
            self.dead.push(voice.0);
        } else {
            debug_assert!(false, "Voice got killed twice");
        }
    }

    fn voice_count(&self) -> usize {
        self.voices.len()
    }

    fn live_voice_count(&self) -> usize {
        self.live_count
    }
}

impl<S: GrainSynth> Drop for BoundSynth<S> {
    fn drop(&mut self) {
        log::debug!(
            "Destroying {} voices of grain synth '{}'",
            self.voices.len(),
            self.synth.name()
        );
        for voice in self.voices.drain(..) {
            self.synth.destroy_voice(voice);
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Binds a [`GrainSynth`] to a pool of live and unused voices.
///
/// A source is valid once a synth got bound to it. Sources are owned by a
/// [`GrainStream`](crate::GrainStream), which selects sources by index when creating grains.
#[derive(Default)]
pub struct GrainSource {
    binding: Option<Box<dyn SourceVoices>>,
}

impl GrainSource {
    /// Create a new, unbound and thus invalid source.
    pub fn new() -> Self {
        Self { binding: None }
    }

    /// Create a new source, bound to the given synth.
    pub fn with_synth<S: GrainSynth>(synth: S) -> Self {
        let mut source = Self::new();
        source.bind(synth);
        source
    }

    /// Bind the given synth to the source. Voices of a previously bound synth get destroyed.
    pub fn bind<S: GrainSynth>(&mut self, synth: S) {
        self.binding = Some(Box::new(BoundSynth::new(synth)));
    }

    /// True when a synth got bound.
    pub fn is_valid(&self) -> bool {
        self.binding.is_some()
    }

    /// Name of the bound synth, if any.
    pub fn synth_name(&self) -> Option<&'static str> {
        self.binding.as_ref().map(|b| b.synth_name())
    }

    /// Total number of voices the synth created so far.
    pub fn voice_count(&self) -> usize {
        self.binding.as_ref().map_or(0, |b| b.voice_count())
    }

    /// Number of voices currently in use by grains.
    pub fn live_voice_count(&self) -> usize {
        self.binding.as_ref().map_or(0, |b| b.live_voice_count())
    }

    /// Number of voices currently unused.
    pub fn dead_voice_count(&self) -> usize {
        self.voice_count() - self.live_voice_count()
    }

    /// Create unused voices up to the given count, to avoid creating them in the real-time
    /// thread later on.
    pub fn reserve_voices(&mut self, voice_count: usize) -> Result<(), Error> {
        let binding = self.binding_mut()?;
        binding.reserve(voice_count);
        Ok(())
    }

    pub(crate) fn initialize(&mut self, sample_rate: u32) -> Result<(), Error> {
        self.binding_mut()?.initialize(sample_rate)
    }

    /// Acquire a voice for the given grain. Returns None for unbound sources.
    pub(crate) fn revive(&mut self, grain: &Grain) -> Option<VoiceId> {
        self.binding.as_mut().map(|binding| binding.revive(grain))
    }

    pub(crate) fn fill(&mut self, voice: VoiceId, buffer: &mut [f32]) -> VoiceStatus {
        match self.binding.as_mut() {
            Some(binding) => binding.fill(voice, buffer),
            None => {
                buffer.fill(0.0);
                VoiceStatus::Finished
            }
        }
    }

    /// Move a voice back into the unused voice pool.
    pub(crate) fn kill(&mut self, voice: VoiceId) {
        if let Some(binding) = self.binding.as_mut() {
            binding.kill(voice);
        }
    }

    fn binding_mut(&mut self) -> Result<&mut Box<dyn SourceVoices>, Error> {
        self.binding
            .as_mut()
            .ok_or_else(|| Error::ParameterError("grain source has no bound synth".to_string()))
    }
}

// -------------------------------------------------------------------------------------------------
