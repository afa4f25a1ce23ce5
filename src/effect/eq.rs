use four_cc::FourCC;

use crate::{
    config::RenderTime,
    effect::Effect,
    parameter::{FloatParameter, FloatParameterValue},
    utils::{
        buffer::StereoFramesMut,
        dsp::filters::biquad::{BiquadFilter, BiquadFilterCoefficients, BiquadFilterType},
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Single band of the [`EqEffect`].
struct EqBand {
    filter_type: BiquadFilterType,
    frequency: FloatParameterValue,
    gain: FloatParameterValue,
    q: FloatParameterValue,
    coefficients: BiquadFilterCoefficients,
    filters: [BiquadFilter; 2],
}

impl EqBand {
    fn new(
        filter_type: BiquadFilterType,
        ids: [FourCC; 3],
        names: [&'static str; 3],
        frequency: f32,
        q: f32,
    ) -> Self {
        Self {
            filter_type,
            frequency: FloatParameterValue::from_description(
                FloatParameter::new(ids[0], names[0], 20.0..=20000.0, frequency).with_unit("Hz"),
            ),
            gain: FloatParameterValue::from_description(
                FloatParameter::new(ids[1], names[1], -24.0..=24.0, 0.0).with_unit("dB"),
            ),
            q: FloatParameterValue::from_description(FloatParameter::new(
                ids[2], names[2], 0.1..=10.0, q,
            )),
            coefficients: BiquadFilterCoefficients::default(),
            filters: [BiquadFilter::new(), BiquadFilter::new()],
        }
    }

    /// Bands with zero gain are bypassed.
    fn is_active(&self) -> bool {
        self.gain.value() != 0.0
    }

    fn update_coefficients(&mut self, sample_rate: u32) -> Result<(), Error> {
        // keep cutoff frequencies below nyquist for low sample rates
        let frequency = self.frequency.value().min(sample_rate as f32 * 0.45);
        self.coefficients.set(
            self.filter_type,
            sample_rate,
            frequency,
            self.q.value(),
            self.gain.value(),
        )
    }
}

// -------------------------------------------------------------------------------------------------

/// Stereo 5-band equalizer with a low shelf, three bell and a high shelf band.
///
/// All bands are initially flat, which bypasses their processing.
pub struct EqEffect {
    sample_rate: u32,
    bands: [EqBand; 5],
}

impl EqEffect {
    pub const EFFECT_NAME: &'static str = "EqEffect";

    pub const LOW_FREQUENCY_ID: FourCC = FourCC(*b"lfrq");
    pub const LOW_GAIN_ID: FourCC = FourCC(*b"lgai");
    pub const LOW_Q_ID: FourCC = FourCC(*b"lq__");
    pub const PEAK1_FREQUENCY_ID: FourCC = FourCC(*b"1frq");
    pub const PEAK1_GAIN_ID: FourCC = FourCC(*b"1gai");
    pub const PEAK1_Q_ID: FourCC = FourCC(*b"1q__");
    pub const PEAK2_FREQUENCY_ID: FourCC = FourCC(*b"2frq");
    pub const PEAK2_GAIN_ID: FourCC = FourCC(*b"2gai");
    pub const PEAK2_Q_ID: FourCC = FourCC(*b"2q__");
    pub const PEAK3_FREQUENCY_ID: FourCC = FourCC(*b"3frq");
    pub const PEAK3_GAIN_ID: FourCC = FourCC(*b"3gai");
    pub const PEAK3_Q_ID: FourCC = FourCC(*b"3q__");
    pub const HIGH_FREQUENCY_ID: FourCC = FourCC(*b"hfrq");
    pub const HIGH_GAIN_ID: FourCC = FourCC(*b"hgai");
    pub const HIGH_Q_ID: FourCC = FourCC(*b"hq__");

    const SHELF_Q: f32 = 0.5;
    const BELL_Q: f32 = 1.0;

    pub fn new() -> Self {
        Self {
            sample_rate: 0,
            bands: [
                EqBand::new(
                    BiquadFilterType::Lowshelf,
                    [Self::LOW_FREQUENCY_ID, Self::LOW_GAIN_ID, Self::LOW_Q_ID],
                    ["Low Frequency", "Low Gain", "Low Q"],
                    100.0,
                    Self::SHELF_Q,
                ),
                EqBand::new(
                    BiquadFilterType::Bell,
                    [Self::PEAK1_FREQUENCY_ID, Self::PEAK1_GAIN_ID, Self::PEAK1_Q_ID],
                    ["Peak 1 Frequency", "Peak 1 Gain", "Peak 1 Q"],
                    500.0,
                    Self::BELL_Q,
                ),
                EqBand::new(
                    BiquadFilterType::Bell,
                    [Self::PEAK2_FREQUENCY_ID, Self::PEAK2_GAIN_ID, Self::PEAK2_Q_ID],
                    ["Peak 2 Frequency", "Peak 2 Gain", "Peak 2 Q"],
                    1500.0,
                    Self::BELL_Q,
                ),
                EqBand::new(
                    BiquadFilterType::Bell,
                    [Self::PEAK3_FREQUENCY_ID, Self::PEAK3_GAIN_ID, Self::PEAK3_Q_ID],
                    ["Peak 3 Frequency", "Peak 3 Gain", "Peak 3 Q"],
                    4000.0,
                    Self::BELL_Q,
                ),
                EqBand::new(
                    BiquadFilterType::Highshelf,
                    [Self::HIGH_FREQUENCY_ID, Self::HIGH_GAIN_ID, Self::HIGH_Q_ID],
                    ["High Frequency", "High Gain", "High Q"],
                    8000.0,
                    Self::SHELF_Q,
                ),
            ],
        }
    }
}

impl Default for EqEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for EqEffect {
    fn name(&self) -> &'static str {
        Self::EFFECT_NAME
    }

    fn parameters(&self) -> Vec<&FloatParameter> {
        self.bands
            .iter()
            .flat_map(|band| {
                [
                    band.frequency.description(),
                    band.gain.description(),
                    band.q.description(),
                ]
            })
            .collect()
    }

    fn initialize(
        &mut self,
        sample_rate: u32,
        channel_count: usize,
        _max_frames: usize,
    ) -> Result<(), Error> {
        if channel_count != 2 {
            return Err(Error::ParameterError(
                "EqEffect only supports stereo I/O".to_string(),
            ));
        }
        self.sample_rate = sample_rate;
        for band in self.bands.iter_mut() {
            band.update_coefficients(sample_rate)?;
        }
        Ok(())
    }

    fn process(&mut self, output: &mut [f32], _time: &RenderTime) {
        for band in self.bands.iter_mut().filter(|band| band.is_active()) {
            let [left, right] = &mut band.filters;
            for frame in output.stereo_frames_mut() {
                frame[0] = left.process_sample(&band.coefficients, frame[0] as f64) as f32;
                frame[1] = right.process_sample(&band.coefficients, frame[1] as f64) as f32;
            }
        }
    }

    fn process_parameter_update(&mut self, id: FourCC, value: f32) -> Result<(), Error> {
        let sample_rate = self.sample_rate;
        let band = self
            .bands
            .iter_mut()
            .find(|band| {
                band.frequency.description().id() == id
                    || band.gain.description().id() == id
                    || band.q.description().id() == id
            })
            .ok_or_else(|| {
                Error::ParameterError(format!(
                    "Unknown parameter: '{id}' for effect '{}'",
                    Self::EFFECT_NAME
                ))
            })?;
        if band.frequency.description().id() == id {
            band.frequency.apply_update(value)?;
        } else if band.gain.description().id() == id {
            let was_active = band.is_active();
            band.gain.apply_update(value)?;
            if !was_active && band.is_active() {
                // avoid clicks from stale filter states when re-enabling a band
                band.filters.iter_mut().for_each(BiquadFilter::reset);
            }
        } else {
            band.q.apply_update(value)?;
        }
        if sample_rate > 0 {
            band.update_coefficients(sample_rate)?;
        }
        Ok(())
    }

    fn process_reset(&mut self) {
        for band in self.bands.iter_mut() {
            band.filters.iter_mut().for_each(BiquadFilter::reset);
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_is_transparent() {
        let mut eq = EqEffect::new();
        eq.initialize(44100, 2, 64).unwrap();
        assert_eq!(eq.parameters().len(), 15);
        let mut buffer = (0..128).map(|i| (i as f32 * 0.1).sin()).collect::<Vec<_>>();
        let expected = buffer.clone();
        eq.process(&mut buffer, &RenderTime::default());
        assert_eq!(buffer, expected);
    }

    #[test]
    fn low_shelf_boosts_dc() {
        let mut eq = EqEffect::new();
        eq.initialize(44100, 2, 64).unwrap();
        eq.process_parameter_update(EqEffect::LOW_GAIN_ID, 12.0)
            .unwrap();
        assert!(eq
            .process_parameter_update(FourCC(*b"nope"), 1.0)
            .is_err());

        let mut buffer = vec![0.1; 2 * 8192];
        eq.process(&mut buffer, &RenderTime::default());
        let gain = buffer[buffer.len() - 1] / 0.1;
        // +12 dB
        assert!((gain - 3.98).abs() < 0.05, "{gain}");
    }
}
