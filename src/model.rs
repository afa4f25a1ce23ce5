//! Stochastic grain parameter model of a stream.

use rand::{rngs::SmallRng, SeedableRng};
use strum::{Display, EnumCount, EnumIter, EnumString, FromRepr, VariantNames};

use crate::{
    config::MAX_OFFSET_FRAMES,
    distribution::{random, Distribution},
    envelope::EnvelopeType,
    grain::Grain,
    location::{Location, SpatialMode},
    source::GrainSource,
    utils::db_to_linear,
};

// -------------------------------------------------------------------------------------------------

/// How a stream's grain model schedules new grains.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumCount, VariantNames,
)]
pub enum RateMode {
    /// Grains fire at `1 / rate` second intervals, plus time jitter.
    #[default]
    Regular,
    /// Grains fire at exponentially distributed intervals with a mean of `1 / rate` seconds
    /// (a poisson process), plus time jitter.
    Stochastic,
    /// Grains fire on manual and live triggers only.
    Triggered,
}

// -------------------------------------------------------------------------------------------------

/// Stochastic grain parameters of a [`GrainModel`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumCount,
    EnumIter,
    FromRepr,
    VariantNames,
)]
#[repr(usize)]
pub enum ModelParameter {
    /// Time jitter in seconds, added to each fire interval.
    Time,
    /// Grain rate in Hz.
    Rate,
    /// Index of the stream's source that renders the grain.
    Source,
    /// Amplitude in dB.
    Amplitude,
    /// Azimuth in degrees, used in polar spatial mode.
    Azimuth,
    /// Elevation in degrees, used in polar spatial mode.
    Elevation,
    /// Distance, used in polar spatial mode.
    Distance,
    /// Right coordinate, used in cartesian spatial mode.
    X,
    /// Front coordinate, used in cartesian spatial mode.
    Y,
    /// Up coordinate, used in cartesian spatial mode.
    Z,
    /// Duration in seconds.
    Duration,
    /// Envelope attack: > 0 fraction of the duration, < 0 absolute time in seconds.
    Attack,
    /// Envelope decay: > 0 fraction of the duration, < 0 absolute time in seconds.
    Decay,
    /// Envelope type specific shape.
    Shape,
    /// Carrier frequency in Hz, passed to the source's synth.
    Frequency,
}

impl ModelParameter {
    /// Value the parameter's distribution is pinned to in new models.
    pub fn default_value(&self) -> f64 {
        match self {
            Self::Time => 0.0,
            Self::Rate => 10.0,
            Self::Source => 0.0,
            Self::Amplitude => -6.0,
            Self::Azimuth => 0.0,
            Self::Elevation => 0.0,
            Self::Distance => 1.0,
            Self::X => 0.0,
            Self::Y => 1.0,
            Self::Z => 0.0,
            Self::Duration => 0.1,
            Self::Attack => 0.25,
            Self::Decay => 0.25,
            Self::Shape => 1.0,
            Self::Frequency => 440.0,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Describes how a stream creates grains: one [`Distribution`] per grain parameter, plus the
/// rate, envelope and spatial modes.
///
/// All distributions initially are pinned to the parameter's default value.
pub struct GrainModel {
    distributions: [Distribution; ModelParameter::COUNT],
    rate_mode: RateMode,
    envelope_type: EnvelopeType,
    spatial_mode: SpatialMode,
    rng: SmallRng,
}

impl Default for GrainModel {
    fn default() -> Self {
        Self::new()
    }
}

impl GrainModel {
    /// Create a new model with randomly seeded distributions.
    pub fn new() -> Self {
        Self::with_distributions(
            std::array::from_fn(|index| {
                Distribution::from_constant(Self::parameter(index).default_value())
            }),
            SmallRng::from_os_rng(),
        )
    }

    /// Create a new model with deterministically seeded distributions.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_distributions(
            std::array::from_fn(|index| {
                let mut distribution = Distribution::with_seed(seed.wrapping_add(index as u64));
                distribution.set_constant(Self::parameter(index).default_value());
                distribution
            }),
            SmallRng::seed_from_u64(seed),
        )
    }

    fn with_distributions(
        distributions: [Distribution; ModelParameter::COUNT],
        rng: SmallRng,
    ) -> Self {
        Self {
            distributions,
            rate_mode: RateMode::default(),
            envelope_type: EnvelopeType::default(),
            spatial_mode: SpatialMode::default(),
            rng,
        }
    }

    fn parameter(index: usize) -> ModelParameter {
        ModelParameter::from_repr(index).unwrap_or(ModelParameter::Time)
    }

    pub fn distribution(&self, parameter: ModelParameter) -> &Distribution {
        &self.distributions[parameter as usize]
    }

    pub fn distribution_mut(&mut self, parameter: ModelParameter) -> &mut Distribution {
        &mut self.distributions[parameter as usize]
    }

    /// Replace a parameter's distribution. Returns the replaced distribution.
    pub fn set_distribution(
        &mut self,
        parameter: ModelParameter,
        distribution: Distribution,
    ) -> Distribution {
        std::mem::replace(self.distribution_mut(parameter), distribution)
    }

    /// Swap a parameter's distribution with the given one, without dropping anything.
    pub fn swap_distribution(&mut self, parameter: ModelParameter, distribution: &mut Distribution) {
        std::mem::swap(self.distribution_mut(parameter), distribution);
    }

    pub fn time_mut(&mut self) -> &mut Distribution {
        self.distribution_mut(ModelParameter::Time)
    }

    pub fn rate_mut(&mut self) -> &mut Distribution {
        self.distribution_mut(ModelParameter::Rate)
    }

    pub fn source_mut(&mut self) -> &mut Distribution {
        self.distribution_mut(ModelParameter::Source)
    }

    pub fn amplitude_mut(&mut self) -> &mut Distribution {
        self.distribution_mut(ModelParameter::Amplitude)
    }

    pub fn duration_mut(&mut self) -> &mut Distribution {
        self.distribution_mut(ModelParameter::Duration)
    }

    pub fn frequency_mut(&mut self) -> &mut Distribution {
        self.distribution_mut(ModelParameter::Frequency)
    }

    pub fn rate_mode(&self) -> RateMode {
        self.rate_mode
    }

    pub fn set_rate_mode(&mut self, rate_mode: RateMode) {
        self.rate_mode = rate_mode;
    }

    pub fn envelope_type(&self) -> EnvelopeType {
        self.envelope_type
    }

    pub fn set_envelope_type(&mut self, envelope_type: EnvelopeType) {
        self.envelope_type = envelope_type;
    }

    pub fn spatial_mode(&self) -> SpatialMode {
        self.spatial_mode
    }

    pub fn set_spatial_mode(&mut self, spatial_mode: SpatialMode) {
        self.spatial_mode = spatial_mode;
    }

    #[inline]
    fn sample(&mut self, parameter: ModelParameter) -> f64 {
        self.distributions[parameter as usize].sample()
    }

    /// Sample fresh parameters into the given (already acquired) grain and revive a voice for
    /// it from the selected source. The grain starts `start_offset` frames into the next
    /// rendered quantum.
    ///
    /// Returns false when the sampled source index is invalid or the source has no synth: the
    /// grain then must be released again without playing.
    pub(crate) fn instantiate(
        &mut self,
        sources: &mut [GrainSource],
        start_offset: usize,
        sample_rate: u32,
        grain: &mut Grain,
    ) -> bool {
        // indices get truncated toward zero, so (-1, 0) still selects the first source
        let source_index = self.sample(ModelParameter::Source).trunc();
        if !source_index.is_finite() || source_index < 0.0 {
            return false;
        }
        let source_index = source_index as usize;
        let Some(source) = sources.get_mut(source_index) else {
            return false;
        };
        if !source.is_valid() {
            return false;
        }

        let amplitude_db = self.sample(ModelParameter::Amplitude) as f32;
        let amplitude = db_to_linear(amplitude_db);
        grain.amplitude = if amplitude.is_finite() { amplitude } else { 0.0 };

        grain.location = match self.spatial_mode {
            SpatialMode::Polar => {
                let azimuth = self.sample(ModelParameter::Azimuth) as f32;
                let elevation = self.sample(ModelParameter::Elevation) as f32;
                let distance = self.sample(ModelParameter::Distance) as f32;
                Location::from_polar(azimuth, elevation, distance)
            }
            SpatialMode::Cartesian => {
                let x = self.sample(ModelParameter::X) as f32;
                let y = self.sample(ModelParameter::Y) as f32;
                let z = self.sample(ModelParameter::Z) as f32;
                Location::from_cartesian(x, y, z)
            }
        };

        let duration = self.sample(ModelParameter::Duration);
        let duration = if duration.is_finite() {
            duration.max(0.0)
        } else {
            0.0
        };
        grain.duration = duration as f32;
        grain.duration_samples =
            (duration * sample_rate as f64).round().min(MAX_OFFSET_FRAMES as f64) as usize;

        let attack = self.sample(ModelParameter::Attack) as f32;
        let decay = self.sample(ModelParameter::Decay) as f32;
        let shape = self.sample(ModelParameter::Shape) as f32;
        grain.envelope.configure(
            self.envelope_type,
            attack,
            decay,
            shape,
            grain.duration_samples,
            sample_rate,
        );

        let frequency = self.sample(ModelParameter::Frequency) as f32;
        grain.frequency = if frequency.is_finite() { frequency } else { 0.0 };
        grain.source_index = source_index;

        grain.reset();
        grain.voice = source.revive(grain);
        grain.elapsed = -(start_offset.min(MAX_OFFSET_FRAMES) as i64);
        true
    }

    /// Sample the interval in seconds until the next grain should fire.
    ///
    /// Returns None in triggered rate mode or when rate or time distributions produce
    /// non-finite values. Negative intervals are returned as they are.
    pub(crate) fn next_fire_time(&mut self) -> Option<f64> {
        let base = match self.rate_mode {
            RateMode::Triggered => return None,
            RateMode::Regular => 1.0 / self.sample(ModelParameter::Rate),
            RateMode::Stochastic => {
                random::exponential(&mut self.rng) / self.sample(ModelParameter::Rate)
            }
        };
        let interval = base + self.sample(ModelParameter::Time);
        if interval.is_finite() {
            Some(interval)
        } else {
            None
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::{
        distribution::{Component, DistributionType},
        source::sine::SineSynth,
    };

    #[test]
    fn defaults() {
        let model = GrainModel::with_seed(1);
        for parameter in ModelParameter::iter() {
            assert_eq!(
                model.distribution(parameter).constant(),
                Some(parameter.default_value()),
                "{parameter}"
            );
        }
        assert_eq!(model.rate_mode(), RateMode::Regular);
        assert_eq!(model.envelope_type(), EnvelopeType::Linear);
        assert_eq!(model.spatial_mode(), SpatialMode::Polar);
    }

    #[test]
    fn fire_times() {
        let mut model = GrainModel::with_seed(1);
        assert_eq!(model.next_fire_time(), Some(0.1));

        model.time_mut().set_constant(-0.5);
        let interval = model.next_fire_time().unwrap();
        assert!((interval + 0.4).abs() < 1e-9, "{interval}");
        model.time_mut().set_constant(0.0);

        model.rate_mut().remove_all_components();
        model.rate_mut().clear_constant();
        assert_eq!(model.next_fire_time(), None);

        model.rate_mut().set_constant(0.0);
        assert_eq!(model.next_fire_time(), None);

        model.rate_mut().set_constant(10.0);
        model.set_rate_mode(RateMode::Triggered);
        assert_eq!(model.next_fire_time(), None);

        model.set_rate_mode(RateMode::Stochastic);
        let count = 20000;
        let mean = (0..count)
            .map(|_| model.next_fire_time().unwrap())
            .sum::<f64>()
            / count as f64;
        assert!((mean - 0.1).abs() < 0.005, "{mean}");
    }

    #[test]
    fn instantiate() {
        let mut model = GrainModel::with_seed(1);
        model.amplitude_mut().set_constant(0.0);
        model.duration_mut().set_constant(0.5);
        model.frequency_mut().set_constant(220.0);
        model
            .distribution_mut(ModelParameter::Azimuth)
            .set_constant(90.0);

        let mut sources = vec![GrainSource::with_synth(SineSynth::new())];
        let mut grain = Grain::default();
        assert!(model.instantiate(&mut sources, 100, 1000, &mut grain));
        assert_eq!(grain.amplitude(), 1.0);
        assert_eq!(grain.duration_samples(), 500);
        assert_eq!(grain.frequency(), 220.0);
        assert_eq!(grain.elapsed(), -100);
        assert_eq!(grain.source_index(), 0);
        assert!((grain.location().x() - 1.0).abs() < 1e-5);
        assert!(grain.voice.is_some());
        assert!(!grain.is_finished());
        assert_eq!(sources[0].live_voice_count(), 1);

        model.set_spatial_mode(SpatialMode::Cartesian);
        assert!(model.instantiate(&mut sources, 0, 1000, &mut grain));
        assert!((grain.location().y() - 1.0).abs() < 1e-5);
        assert!((grain.location().azimuth()).abs() < 1e-5);
    }

    #[test]
    fn invalid_sources() {
        let mut model = GrainModel::with_seed(1);
        let mut grain = Grain::default();

        let mut sources = vec![GrainSource::new()];
        assert!(!model.instantiate(&mut sources, 0, 1000, &mut grain));

        let mut sources = vec![GrainSource::with_synth(SineSynth::new())];
        for index in [f64::NAN, -1.0, 1.0, f64::INFINITY] {
            model.source_mut().set_constant(index);
            assert!(!model.instantiate(&mut sources, 0, 1000, &mut grain));
        }
        assert_eq!(sources[0].voice_count(), 0);

        // fractional indices get truncated toward zero
        model.source_mut().set_constant(0.9);
        assert!(model.instantiate(&mut sources, 0, 1000, &mut grain));
        model.source_mut().set_constant(-0.5);
        assert!(model.instantiate(&mut sources, 0, 1000, &mut grain));
        assert_eq!(grain.source_index(), 0);
    }

    #[test]
    fn huge_offsets_and_durations() {
        let mut model = GrainModel::with_seed(1);
        model.duration_mut().set_constant(1.0e300);
        let mut sources = vec![GrainSource::with_synth(SineSynth::new())];
        let mut grain = Grain::default();
        for start_offset in [usize::MAX, usize::MAX / 2 + 1, MAX_OFFSET_FRAMES] {
            assert!(model.instantiate(&mut sources, start_offset, 1000, &mut grain));
            assert_eq!(grain.elapsed(), -(MAX_OFFSET_FRAMES as i64));
            assert_eq!(grain.duration_samples(), MAX_OFFSET_FRAMES);
        }
    }

    #[test]
    fn swap_distribution() {
        let mut model = GrainModel::with_seed(1);
        let mut rate = Distribution::from_component(Component::new(
            DistributionType::Uniform,
            20.0,
            0.0,
        ));
        model.swap_distribution(ModelParameter::Rate, &mut rate);
        assert_eq!(rate.constant(), Some(10.0));
        assert_eq!(model.next_fire_time(), Some(0.05));

        let old = model.set_distribution(ModelParameter::Rate, Distribution::from_constant(5.0));
        assert_eq!(old.components().len(), 1);
        assert_eq!(model.next_fire_time(), Some(0.2));
    }
}
