use four_cc::FourCC;

use crate::{
    config::RenderTime,
    effect::Effect,
    parameter::{FloatParameter, FloatParameterValue},
    utils::{
        buffer::StereoFramesMut, db_to_linear, dsp::envelope::EnvelopeFollower, linear_to_db,
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Stereo linked RMS compressor.
///
/// The level detector averages the squared mean of both channels with the `speed` time
/// constant, then follows the level in dB with the attack and release times.
pub struct CompressorEffect {
    sample_rate: u32,
    threshold: FloatParameterValue,
    ratio: FloatParameterValue,
    attack_time: FloatParameterValue,
    release_time: FloatParameterValue,
    makeup_gain: FloatParameterValue,
    speed: FloatParameterValue,
    mean_square: f32,
    mean_square_coeff: f32,
    envelope_follower: EnvelopeFollower,
}

impl CompressorEffect {
    pub const EFFECT_NAME: &'static str = "CompressorEffect";
    pub const THRESHOLD_ID: FourCC = FourCC(*b"thrs");
    pub const RATIO_ID: FourCC = FourCC(*b"rato");
    pub const ATTACK_ID: FourCC = FourCC(*b"attk");
    pub const RELEASE_ID: FourCC = FourCC(*b"rels");
    pub const MAKEUP_GAIN_ID: FourCC = FourCC(*b"gain");
    pub const SPEED_ID: FourCC = FourCC(*b"sped");

    const SILENCE_DB: f32 = -120.0;

    pub fn new() -> Self {
        Self {
            sample_rate: 0,
            threshold: FloatParameterValue::from_description(
                FloatParameter::new(Self::THRESHOLD_ID, "Threshold", -60.0..=0.0, -20.0)
                    .with_unit("dB"),
            ),
            ratio: FloatParameterValue::from_description(FloatParameter::new(
                Self::RATIO_ID,
                "Ratio",
                1.0..=20.0,
                4.0,
            )),
            attack_time: FloatParameterValue::from_description(
                FloatParameter::new(Self::ATTACK_ID, "Attack", 0.0001..=0.5, 0.01).with_unit("s"),
            ),
            release_time: FloatParameterValue::from_description(
                FloatParameter::new(Self::RELEASE_ID, "Release", 0.001..=2.0, 0.1).with_unit("s"),
            ),
            makeup_gain: FloatParameterValue::from_description(
                FloatParameter::new(Self::MAKEUP_GAIN_ID, "Makeup Gain", -24.0..=24.0, 0.0)
                    .with_unit("dB"),
            ),
            speed: FloatParameterValue::from_description(
                FloatParameter::new(Self::SPEED_ID, "Speed", 0.0001..=0.1, 0.005).with_unit("s"),
            ),
            mean_square: 0.0,
            mean_square_coeff: 0.0,
            envelope_follower: EnvelopeFollower::default(),
        }
    }

    /// Creates a new compressor with the given threshold (dB), ratio, attack and release
    /// times (seconds) and makeup gain (dB).
    pub fn with_parameters(
        threshold: f32,
        ratio: f32,
        attack_time: f32,
        release_time: f32,
        makeup_gain: f32,
    ) -> Self {
        let mut compressor = Self::new();
        compressor.threshold.set_value(threshold);
        compressor.ratio.set_value(ratio);
        compressor.attack_time.set_value(attack_time);
        compressor.release_time.set_value(release_time);
        compressor.makeup_gain.set_value(makeup_gain);
        compressor
    }

    fn update_time_constants(&mut self) {
        if self.sample_rate > 0 {
            self.envelope_follower
                .set_attack_time(self.attack_time.value());
            self.envelope_follower
                .set_release_time(self.release_time.value());
            self.mean_square_coeff =
                (-1.0 / (self.speed.value() * self.sample_rate as f32)).exp();
        }
    }
}

impl Default for CompressorEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for CompressorEffect {
    fn name(&self) -> &'static str {
        Self::EFFECT_NAME
    }

    fn parameters(&self) -> Vec<&FloatParameter> {
        vec![
            self.threshold.description(),
            self.ratio.description(),
            self.attack_time.description(),
            self.release_time.description(),
            self.makeup_gain.description(),
            self.speed.description(),
        ]
    }

    fn initialize(
        &mut self,
        sample_rate: u32,
        channel_count: usize,
        _max_frames: usize,
    ) -> Result<(), Error> {
        if channel_count != 2 {
            return Err(Error::ParameterError(
                "CompressorEffect only supports stereo I/O".to_string(),
            ));
        }
        self.sample_rate = sample_rate;
        self.envelope_follower = EnvelopeFollower::new(
            sample_rate,
            self.attack_time.value(),
            self.release_time.value(),
        );
        self.update_time_constants();
        self.process_reset();
        Ok(())
    }

    fn process(&mut self, output: &mut [f32], _time: &RenderTime) {
        let threshold = self.threshold.value();
        let slope = 1.0 - 1.0 / self.ratio.value();
        let makeup_gain = self.makeup_gain.value();
        let coeff = self.mean_square_coeff;
        for frame in output.stereo_frames_mut() {
            let square = 0.5 * (frame[0] * frame[0] + frame[1] * frame[1]);
            self.mean_square = square + coeff * (self.mean_square - square);
            let level_db = if self.mean_square > 1e-12 {
                // 10 * log10 of the mean square is the RMS level in dB
                0.5 * linear_to_db(self.mean_square)
            } else {
                Self::SILENCE_DB
            };
            let envelope = self.envelope_follower.process(level_db);
            let reduction = if envelope > threshold {
                (envelope - threshold) * slope
            } else {
                0.0
            };
            let gain = db_to_linear(makeup_gain - reduction);
            frame[0] *= gain;
            frame[1] *= gain;
        }
    }

    fn process_parameter_update(&mut self, id: FourCC, value: f32) -> Result<(), Error> {
        match id {
            Self::THRESHOLD_ID => self.threshold.apply_update(value)?,
            Self::RATIO_ID => self.ratio.apply_update(value)?,
            Self::ATTACK_ID => self.attack_time.apply_update(value)?,
            Self::RELEASE_ID => self.release_time.apply_update(value)?,
            Self::MAKEUP_GAIN_ID => self.makeup_gain.apply_update(value)?,
            Self::SPEED_ID => self.speed.apply_update(value)?,
            _ => {
                return Err(Error::ParameterError(format!(
                    "Unknown parameter: '{id}' for effect '{}'",
                    self.name()
                )))
            }
        }
        self.update_time_constants();
        Ok(())
    }

    fn process_reset(&mut self) {
        self.mean_square = 0.0;
        self.envelope_follower.reset(Self::SILENCE_DB);
    }
}

// -------------------------------------------------------------------------------------------------
