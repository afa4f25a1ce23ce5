//! A single sounding grain event.

use crate::{envelope::GrainEnvelope, location::Location, source::VoiceId};

// -------------------------------------------------------------------------------------------------

/// One short enveloped sound event, placed at a specific time and location.
///
/// Grains are owned by a stream's grain pool and get recycled when they finished playing.
/// Synths read the grain's properties when (re)initializing a voice for it.
#[derive(Debug, Clone, Default)]
pub struct Grain {
    pub(crate) envelope: GrainEnvelope,
    pub(crate) amplitude: f32,
    pub(crate) duration: f32,
    pub(crate) duration_samples: usize,
    pub(crate) elapsed: i64,
    pub(crate) location: Location,
    pub(crate) frequency: f32,
    pub(crate) source_index: usize,
    pub(crate) voice: Option<VoiceId>,
    pub(crate) finished: bool,
}

impl Grain {
    /// Linear gain of the grain.
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Duration in sample frames.
    pub fn duration_samples(&self) -> usize {
        self.duration_samples
    }

    /// Signed number of sample frames the grain has been playing. Negative values count the
    /// frames until the grain starts.
    pub fn elapsed(&self) -> i64 {
        self.elapsed
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Carrier frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Index of the stream's source, which renders the grain's voice.
    pub fn source_index(&self) -> usize {
        self.source_index
    }

    pub fn envelope(&self) -> &GrainEnvelope {
        &self.envelope
    }

    /// True when the grain played its full duration or its voice finished.
    pub fn is_finished(&self) -> bool {
        self.finished || self.elapsed >= self.duration_samples as i64
    }

    /// Stop the grain: it gets reaped in the next render pass.
    pub fn stop(&mut self) {
        self.finished = true;
    }

    /// Reset progress counters before reusing the grain for a new event.
    pub(crate) fn reset(&mut self) {
        self.elapsed = 0;
        self.finished = false;
        self.voice = None;
    }
}
