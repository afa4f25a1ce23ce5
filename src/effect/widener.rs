use four_cc::FourCC;

use crate::{
    config::RenderTime,
    effect::Effect,
    parameter::{FloatParameter, FloatParameterValue},
    utils::{buffer::StereoFramesMut, dsp::delay::DelayLine},
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Stereo widener, which subtracts a slightly delayed copy of each channel from the opposite
/// channel.
pub struct WidenerEffect {
    sample_rate: u32,
    delay: FloatParameterValue,
    mix: FloatParameterValue,
    delay_line: DelayLine<2>,
}

impl WidenerEffect {
    pub const EFFECT_NAME: &'static str = "WidenerEffect";
    pub const DELAY_ID: FourCC = FourCC(*b"dlay");
    pub const MIX_ID: FourCC = FourCC(*b"mix_");

    const MAX_DELAY_MS: f32 = 20.0;

    pub fn new() -> Self {
        Self {
            sample_rate: 0,
            delay: FloatParameterValue::from_description(
                FloatParameter::new(Self::DELAY_ID, "Delay", 0.0..=Self::MAX_DELAY_MS, 0.3)
                    .with_unit("ms"),
            ),
            mix: FloatParameterValue::from_description(FloatParameter::new(
                Self::MIX_ID,
                "Mix",
                0.0..=1.0,
                0.02,
            )),
            delay_line: DelayLine::default(),
        }
    }

    /// Creates a new widener with the given delay time in ms and mix amount.
    pub fn with_parameters(delay_ms: f32, mix: f32) -> Self {
        let mut widener = Self::new();
        widener.delay.set_value(delay_ms);
        widener.mix.set_value(mix);
        widener
    }

    fn delay_frames(&self) -> f32 {
        (self.delay.value() / 1000.0 * self.sample_rate as f32).max(1.0)
    }
}

impl Default for WidenerEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for WidenerEffect {
    fn name(&self) -> &'static str {
        Self::EFFECT_NAME
    }

    fn parameters(&self) -> Vec<&FloatParameter> {
        vec![self.delay.description(), self.mix.description()]
    }

    fn initialize(
        &mut self,
        sample_rate: u32,
        channel_count: usize,
        _max_frames: usize,
    ) -> Result<(), Error> {
        if channel_count != 2 {
            return Err(Error::ParameterError(
                "WidenerEffect only supports stereo I/O".to_string(),
            ));
        }
        self.sample_rate = sample_rate;
        let max_delay_frames = (Self::MAX_DELAY_MS / 1000.0 * sample_rate as f32).ceil() as usize;
        self.delay_line = DelayLine::new(max_delay_frames + 1);
        Ok(())
    }

    fn process(&mut self, output: &mut [f32], _time: &RenderTime) {
        let mix = self.mix.value();
        if mix <= 0.0 {
            return;
        }
        let delay_frames = self.delay_frames();
        for frame in output.stereo_frames_mut() {
            let (left, right) = (frame[0], frame[1]);
            let [delayed_left, delayed_right] = self.delay_line.read(delay_frames);
            self.delay_line.write([left, right]);
            frame[0] = left * (1.0 - mix) - mix * delayed_right;
            frame[1] = right * (1.0 - mix) - mix * delayed_left;
        }
    }

    fn process_parameter_update(&mut self, id: FourCC, value: f32) -> Result<(), Error> {
        match id {
            Self::DELAY_ID => self.delay.apply_update(value),
            Self::MIX_ID => self.mix.apply_update(value),
            _ => Err(Error::ParameterError(format!(
                "Unknown parameter: '{id}' for effect '{}'",
                self.name()
            ))),
        }
    }

    fn process_reset(&mut self) {
        self.delay_line.flush();
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_feeds_delayed_channels() {
        let mut widener = WidenerEffect::with_parameters(1.0, 0.5);
        widener.initialize(1000, 2, 8).unwrap();
        // impulse on the left channel only
        let mut buffer = vec![0.0; 8];
        buffer[0] = 1.0;
        widener.process(&mut buffer, &RenderTime::default());
        assert_eq!(buffer[0], 0.5);
        assert_eq!(buffer[1], 0.0);
        // one frame later, the inverted left impulse appears on the right
        assert_eq!(buffer[2], 0.0);
        assert_eq!(buffer[3], -0.5);
    }

    #[test]
    fn dry_without_mix() {
        let mut widener = WidenerEffect::with_parameters(0.3, 0.0);
        widener.initialize(44100, 2, 8).unwrap();
        let mut buffer = vec![0.25; 8];
        widener.process(&mut buffer, &RenderTime::default());
        assert_eq!(buffer, vec![0.25; 8]);
    }
}
