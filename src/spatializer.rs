//! Grain spatialization: maps mono grain signals onto the stereo output and diffuse send.

use crate::{
    location::Location,
    utils::{buffer::StereoFramesMut, panning_factors},
};

// -------------------------------------------------------------------------------------------------

/// Speed of sound in m/s, used to calculate distance delays.
pub const SPEED_OF_SOUND: f32 = 343.0;

// -------------------------------------------------------------------------------------------------

/// Places the mono signal of a grain in the stereo field and feeds the diffuse (reverb) send.
///
/// NB: spatializers run in the real-time audio thread, so they must not block or allocate.
pub trait Spatializer: Send + 'static {
    /// A static name for the spatializer, used for logging.
    fn name(&self) -> &'static str;

    /// Called once with the stream's sample rate, when the spatializer gets set.
    fn initialize(&mut self, sample_rate: u32);

    /// Add the given mono `input` signal, which starts at frame `offset` of the quantum, into
    /// the interleaved stereo `output` and the mono `diffuse` buffers of the whole quantum.
    fn spatialize(
        &mut self,
        location: &Location,
        amplitude: f32,
        input: &[f32],
        offset: usize,
        output: &mut [f32],
        diffuse: &mut [f32],
    );

    /// Propagation delay in sample frames for grains at the given distance.
    fn sample_delay(&self, distance: f32) -> usize;
}

// -------------------------------------------------------------------------------------------------

/// Default spatializer: equal power stereo panning from the azimuth, inverse distance
/// attenuation of the direct signal, and a diffuse send which attenuates slower with distance,
/// so far away grains sound more reverberant.
///
/// Distances are interpreted as meters to calculate propagation delays.
#[derive(Debug, Clone)]
pub struct StereoSpatializer {
    sample_rate: u32,
    diffuse_level: f32,
    distance_delay: bool,
}

impl Default for StereoSpatializer {
    fn default() -> Self {
        Self::new()
    }
}

impl StereoSpatializer {
    pub const NAME: &'static str = "StereoSpatializer";

    pub fn new() -> Self {
        Self {
            sample_rate: 44100,
            diffuse_level: 1.0,
            distance_delay: true,
        }
    }

    /// Linear gain of the diffuse send at distance 1.
    pub fn diffuse_level(&self) -> f32 {
        self.diffuse_level
    }

    pub fn set_diffuse_level(&mut self, level: f32) {
        self.diffuse_level = level.max(0.0);
    }

    /// True when grains get delayed by their distance.
    pub fn distance_delay(&self) -> bool {
        self.distance_delay
    }

    pub fn set_distance_delay(&mut self, enabled: bool) {
        self.distance_delay = enabled;
    }
}

impl Spatializer for StereoSpatializer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initialize(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    fn spatialize(
        &mut self,
        location: &Location,
        amplitude: f32,
        input: &[f32],
        offset: usize,
        output: &mut [f32],
        diffuse: &mut [f32],
    ) {
        let azimuth = location.azimuth().to_radians();
        let elevation = location.elevation().to_radians();
        let panning = azimuth.sin() * elevation.cos();
        let (left_factor, right_factor) = panning_factors(panning);

        let distance = location.distance().max(1.0);
        let direct_gain = amplitude / distance;
        let diffuse_gain = amplitude * self.diffuse_level / distance.sqrt();
        let (left_gain, right_gain) = (direct_gain * left_factor, direct_gain * right_factor);

        let frames = output.stereo_frames_mut().skip(offset);
        for (frame, sample) in frames.zip(input) {
            frame[0] += sample * left_gain;
            frame[1] += sample * right_gain;
        }
        if diffuse_gain > 0.0 {
            for (d, sample) in diffuse.iter_mut().skip(offset).zip(input) {
                *d += sample * diffuse_gain;
            }
        }
    }

    fn sample_delay(&self, distance: f32) -> usize {
        if self.distance_delay && distance.is_finite() && distance > 0.0 {
            (distance / SPEED_OF_SOUND * self.sample_rate as f32).round() as usize
        } else {
            0
        }
    }
}

// -------------------------------------------------------------------------------------------------
