//! Engine wide configuration and render transport.

use std::time::Duration;

use crate::Error;

// -------------------------------------------------------------------------------------------------

/// Number of output channels rendered by streams and the mixer: grainfield always renders
/// interleaved stereo plus a separate mono diffuse (reverb) send.
pub const CHANNEL_COUNT: usize = 2;

/// Largest grain start offset, duration or delay in frames. Longer times get clamped to it, so
/// sample counters always fit into signed 64 bit integers.
pub const MAX_OFFSET_FRAMES: usize = if usize::BITS >= 64 {
    ((1u64 << 52) - 1) as usize
} else {
    usize::MAX
};

// -------------------------------------------------------------------------------------------------

/// Immutable engine configuration, passed to all streams, the mixer and the player when they
/// get created.
///
/// Use the `with_XXX` functions to customize the defaults, then `validate` the result before
/// creating any engine objects from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Fixed number of sample frames rendered per `render_quantum` call.
    pub quantum_frames: usize,
    /// Max number of grains a stream may auto-trigger in a single quantum. Limits render time
    /// when grain models produce zero or very small fire intervals.
    pub max_grains_per_quantum: usize,
    /// Capacity of the player to mixer message queue.
    pub message_queue_size: usize,
    /// Number of grain slots every stream preallocates.
    pub initial_grain_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            quantum_frames: 512,
            max_grains_per_quantum: 256,
            message_queue_size: 1024,
            initial_grain_capacity: 64,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(self, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..self
        }
    }

    pub fn with_quantum_frames(self, quantum_frames: usize) -> Self {
        Self {
            quantum_frames,
            ..self
        }
    }

    pub fn with_max_grains_per_quantum(self, max_grains_per_quantum: usize) -> Self {
        Self {
            max_grains_per_quantum,
            ..self
        }
    }

    pub fn with_message_queue_size(self, message_queue_size: usize) -> Self {
        Self {
            message_queue_size,
            ..self
        }
    }

    pub fn with_initial_grain_capacity(self, initial_grain_capacity: usize) -> Self {
        Self {
            initial_grain_capacity,
            ..self
        }
    }

    /// Number of interleaved output samples per quantum.
    pub fn quantum_samples(&self) -> usize {
        self.quantum_frames * CHANNEL_COUNT
    }

    /// Duration of a single render quantum.
    pub fn quantum_duration(&self) -> Duration {
        Duration::from_secs_f64(self.quantum_frames as f64 / self.sample_rate as f64)
    }

    /// Convert a time in seconds into sample frames. Negative or non finite times map to 0,
    /// huge times to [`MAX_OFFSET_FRAMES`].
    pub fn seconds_to_frames(&self, seconds: f64) -> usize {
        let frames = seconds * self.sample_rate as f64;
        if frames.is_finite() && frames > 0.0 {
            frames.min(MAX_OFFSET_FRAMES as f64) as usize
        } else {
            0
        }
    }

    /// Check if the configuration can be used to create engine objects.
    pub fn validate(&self) -> Result<(), Error> {
        if !(8000..=384000).contains(&self.sample_rate) {
            return Err(Error::ConfigError(format!(
                "sample rate must be in range [8000, 384000], but is {}",
                self.sample_rate
            )));
        }
        if self.quantum_frames == 0 || self.quantum_frames > 16384 {
            return Err(Error::ConfigError(format!(
                "quantum size must be in range [1, 16384], but is {}",
                self.quantum_frames
            )));
        }
        if self.max_grains_per_quantum == 0 {
            return Err(Error::ConfigError(
                "max grains per quantum must be > 0".to_string(),
            ));
        }
        if self.message_queue_size == 0 {
            return Err(Error::ConfigError(
                "message queue size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// Mutable render transport, advanced by the mixer after each rendered quantum and passed by
/// reference into streams and effects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderTime {
    /// Number of sample frames rendered so far.
    pub pos_in_frames: u64,
}

impl RenderTime {
    /// Rendered time in seconds at the given sample rate.
    pub fn pos_in_seconds(&self, sample_rate: u32) -> f64 {
        self.pos_in_frames as f64 / sample_rate as f64
    }

    /// Move transport forward by the given number of frames.
    pub fn advance(&mut self, frames: usize) {
        self.pos_in_frames += frames as u64;
    }
}

// -------------------------------------------------------------------------------------------------
