use std::f32::consts::TAU;

use four_cc::FourCC;

use crate::{
    config::RenderTime,
    effect::Effect,
    parameter::{FloatParameter, FloatParameterValue},
    utils::{buffer::StereoFramesMut, dsp::delay::DelayLine},
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Plain delay of the reverb's network.
struct Delay {
    line: DelayLine<1>,
    base_length: f32,
    length: f32,
}

impl Delay {
    fn new(base_length: f32, max_scale: f32, extra: f32) -> Self {
        let max_frames = (base_length * max_scale + extra).ceil() as usize + 2;
        Self {
            line: DelayLine::new(max_frames),
            base_length,
            length: base_length,
        }
    }

    fn set_scale(&mut self, scale: f32) {
        self.length = (self.base_length * scale).max(1.0);
    }

    #[inline]
    fn tap(&self, base_position: f32, scale: f32) -> f32 {
        self.line.read((base_position * scale).max(1.0))[0]
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.line.read(self.length)[0];
        self.line.write([input]);
        output
    }

    /// Schroeder allpass with the given gain and extra (modulated) delay time.
    #[inline]
    fn process_allpass(&mut self, input: f32, gain: f32, modulation: f32) -> f32 {
        let delayed = self.line.read(self.length + modulation)[0];
        let feed = input - gain * delayed;
        self.line.write([feed]);
        delayed + gain * feed
    }

    fn flush(&mut self) {
        self.line.flush();
    }
}

// -------------------------------------------------------------------------------------------------

/// Stereo plate reverb after Jon Dattorro's "Effect Design, Part 1" figure-of-eight tank.
///
/// The reverb sums its input to mono and produces the wet signal only: the input gets
/// replaced by the reverb's output.
pub struct ReverbEffect {
    sample_rate: u32,
    decay: FloatParameterValue,
    damping: FloatParameterValue,
    bandwidth: FloatParameterValue,
    predelay: FloatParameterValue,
    size: FloatParameterValue,
    scale: f32,
    predelay_line: DelayLine<1>,
    bandwidth_state: f32,
    input_diffusers: Vec<Delay>,
    // left and right tank halves
    modulated_allpasses: [Delay; 2],
    first_delays: [Delay; 2],
    damping_states: [f32; 2],
    decay_allpasses: [Delay; 2],
    second_delays: [Delay; 2],
    tank_feedback: [f32; 2],
    lfo_phase: f32,
}

impl ReverbEffect {
    pub const EFFECT_NAME: &'static str = "ReverbEffect";
    pub const DECAY_ID: FourCC = FourCC(*b"dcay");
    pub const DAMPING_ID: FourCC = FourCC(*b"damp");
    pub const BANDWIDTH_ID: FourCC = FourCC(*b"band");
    pub const PREDELAY_ID: FourCC = FourCC(*b"pred");
    pub const SIZE_ID: FourCC = FourCC(*b"size");

    /// Sample rate the delay lengths of the network are specified in.
    const BASE_SAMPLE_RATE: f32 = 29761.0;
    const MAX_SIZE: f32 = 2.0;
    const MAX_PREDELAY: f32 = 0.5;

    const INPUT_DIFFUSERS: [(f32, f32); 4] = [
        (142.0, 0.75),
        (107.0, 0.75),
        (379.0, 0.625),
        (277.0, 0.625),
    ];
    const MODULATED_ALLPASSES: [f32; 2] = [672.0, 908.0];
    const FIRST_DELAYS: [f32; 2] = [4453.0, 4217.0];
    const DECAY_ALLPASSES: [f32; 2] = [1800.0, 2656.0];
    const SECOND_DELAYS: [f32; 2] = [3720.0, 3163.0];

    const DECAY_DIFFUSION_1: f32 = -0.7;
    const DECAY_DIFFUSION_2: f32 = 0.5;
    const EXCURSION: f32 = 8.0;
    const LFO_RATE: f32 = 1.0;
    const OUTPUT_GAIN: f32 = 0.6;

    pub fn new() -> Self {
        Self {
            sample_rate: 0,
            decay: FloatParameterValue::from_description(FloatParameter::new(
                Self::DECAY_ID,
                "Decay",
                0.0..=0.99,
                0.5,
            )),
            damping: FloatParameterValue::from_description(FloatParameter::new(
                Self::DAMPING_ID,
                "Damping",
                0.0..=1.0,
                0.0005,
            )),
            bandwidth: FloatParameterValue::from_description(FloatParameter::new(
                Self::BANDWIDTH_ID,
                "Bandwidth",
                0.0..=1.0,
                0.9995,
            )),
            predelay: FloatParameterValue::from_description(
                FloatParameter::new(Self::PREDELAY_ID, "Predelay", 0.0..=Self::MAX_PREDELAY, 0.0)
                    .with_unit("s"),
            ),
            size: FloatParameterValue::from_description(FloatParameter::new(
                Self::SIZE_ID,
                "Size",
                0.1..=Self::MAX_SIZE,
                1.0,
            )),
            scale: 1.0,
            predelay_line: DelayLine::default(),
            bandwidth_state: 0.0,
            input_diffusers: Vec::new(),
            modulated_allpasses: Self::delays(Self::MODULATED_ALLPASSES, 1.0, 0.0),
            first_delays: Self::delays(Self::FIRST_DELAYS, 1.0, 0.0),
            damping_states: [0.0; 2],
            decay_allpasses: Self::delays(Self::DECAY_ALLPASSES, 1.0, 0.0),
            second_delays: Self::delays(Self::SECOND_DELAYS, 1.0, 0.0),
            tank_feedback: [0.0; 2],
            lfo_phase: 0.0,
        }
    }

    /// Creates a new reverb with the given decay (0..1) and size (0.1..2).
    pub fn with_parameters(decay: f32, size: f32) -> Self {
        let mut reverb = Self::new();
        reverb.decay.set_value(decay);
        reverb.size.set_value(size);
        reverb
    }

    fn delays(lengths: [f32; 2], max_scale: f32, extra: f32) -> [Delay; 2] {
        lengths.map(|length| Delay::new(length, max_scale, extra))
    }

    fn update_scale(&mut self) {
        self.scale = self.sample_rate as f32 / Self::BASE_SAMPLE_RATE * self.size.value();
        let scale = self.scale;
        for delay in self
            .input_diffusers
            .iter_mut()
            .chain(self.modulated_allpasses.iter_mut())
            .chain(self.first_delays.iter_mut())
            .chain(self.decay_allpasses.iter_mut())
            .chain(self.second_delays.iter_mut())
        {
            delay.set_scale(scale);
        }
    }

    #[inline]
    fn process_frame(&mut self, input: f32) -> [f32; 2] {
        let scale = self.scale;
        let decay = self.decay.value();
        let damping = self.damping.value();
        let bandwidth = self.bandwidth.value();

        let predelay_frames = self.predelay.value() * self.sample_rate as f32;
        let predelayed = self.predelay_line.read(predelay_frames.max(1.0))[0];
        self.predelay_line.write([input]);

        self.bandwidth_state += bandwidth * (predelayed - self.bandwidth_state);
        let mut diffused = self.bandwidth_state;
        for (delay, (_, gain)) in self.input_diffusers.iter_mut().zip(Self::INPUT_DIFFUSERS) {
            diffused = delay.process_allpass(diffused, gain, 0.0);
        }

        self.lfo_phase += TAU * Self::LFO_RATE / self.sample_rate as f32;
        if self.lfo_phase >= TAU {
            self.lfo_phase -= TAU;
        }
        let excursion = Self::EXCURSION * scale;
        let modulations = [
            excursion * (1.0 + self.lfo_phase.sin()),
            excursion * (1.0 + self.lfo_phase.cos()),
        ];

        let feedback = self.tank_feedback;
        for side in 0..2 {
            let tank_input = diffused + feedback[1 - side];
            let a = self.modulated_allpasses[side].process_allpass(
                tank_input,
                Self::DECAY_DIFFUSION_1,
                modulations[side],
            );
            let b = self.first_delays[side].process(a);
            self.damping_states[side] += (1.0 - damping) * (b - self.damping_states[side]);
            let c = self.damping_states[side] * decay;
            let d = self.decay_allpasses[side].process_allpass(c, Self::DECAY_DIFFUSION_2, 0.0);
            self.tank_feedback[side] = self.second_delays[side].process(d) * decay;
        }

        let [first_l, first_r] = &self.first_delays;
        let [allpass_l, allpass_r] = &self.decay_allpasses;
        let [second_l, second_r] = &self.second_delays;
        let left = first_r.tap(266.0, scale) + first_r.tap(2974.0, scale)
            - allpass_r.tap(1913.0, scale)
            + second_r.tap(1996.0, scale)
            - first_l.tap(1990.0, scale)
            - allpass_l.tap(187.0, scale)
            - second_l.tap(1066.0, scale);
        let right = first_l.tap(353.0, scale) + first_l.tap(3627.0, scale)
            - allpass_l.tap(1228.0, scale)
            + second_l.tap(2673.0, scale)
            - first_r.tap(2111.0, scale)
            - allpass_r.tap(335.0, scale)
            - second_r.tap(121.0, scale);
        [left * Self::OUTPUT_GAIN, right * Self::OUTPUT_GAIN]
    }
}

impl Default for ReverbEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for ReverbEffect {
    fn name(&self) -> &'static str {
        Self::EFFECT_NAME
    }

    fn parameters(&self) -> Vec<&FloatParameter> {
        vec![
            self.decay.description(),
            self.damping.description(),
            self.bandwidth.description(),
            self.predelay.description(),
            self.size.description(),
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
                "ReverbEffect only supports stereo I/O".to_string(),
            ));
        }
        self.sample_rate = sample_rate;
        let max_scale = sample_rate as f32 / Self::BASE_SAMPLE_RATE * Self::MAX_SIZE;
        let max_excursion = 2.0 * Self::EXCURSION * max_scale;
        self.predelay_line =
            DelayLine::new((Self::MAX_PREDELAY * sample_rate as f32).ceil() as usize + 2);
        self.input_diffusers = Self::INPUT_DIFFUSERS
            .iter()
            .map(|(length, _)| Delay::new(*length, max_scale, 0.0))
            .collect();
        self.modulated_allpasses =
            Self::delays(Self::MODULATED_ALLPASSES, max_scale, max_excursion);
        self.first_delays = Self::delays(Self::FIRST_DELAYS, max_scale, 0.0);
        self.decay_allpasses = Self::delays(Self::DECAY_ALLPASSES, max_scale, 0.0);
        self.second_delays = Self::delays(Self::SECOND_DELAYS, max_scale, 0.0);
        self.update_scale();
        self.process_reset();
        Ok(())
    }

    fn process(&mut self, output: &mut [f32], _time: &RenderTime) {
        for frame in output.stereo_frames_mut() {
            let input = 0.5 * (frame[0] + frame[1]);
            let [left, right] = self.process_frame(input);
            frame[0] = left;
            frame[1] = right;
        }
    }

    fn process_parameter_update(&mut self, id: FourCC, value: f32) -> Result<(), Error> {
        match id {
            Self::DECAY_ID => self.decay.apply_update(value),
            Self::DAMPING_ID => self.damping.apply_update(value),
            Self::BANDWIDTH_ID => self.bandwidth.apply_update(value),
            Self::PREDELAY_ID => self.predelay.apply_update(value),
            Self::SIZE_ID => {
                self.size.apply_update(value)?;
                self.update_scale();
                Ok(())
            }
            _ => Err(Error::ParameterError(format!(
                "Unknown parameter: '{id}' for effect '{}'",
                self.name()
            ))),
        }
    }

    fn process_reset(&mut self) {
        self.predelay_line.flush();
        for delay in self
            .input_diffusers
            .iter_mut()
            .chain(self.modulated_allpasses.iter_mut())
            .chain(self.first_delays.iter_mut())
            .chain(self.decay_allpasses.iter_mut())
            .chain(self.second_delays.iter_mut())
        {
            delay.flush();
        }
        self.bandwidth_state = 0.0;
        self.damping_states = [0.0; 2];
        self.tank_feedback = [0.0; 2];
        self.lfo_phase = 0.0;
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse_response(reverb: &mut ReverbEffect, frames: usize) -> Vec<f32> {
        let mut buffer = vec![0.0; frames * 2];
        buffer[0] = 1.0;
        buffer[1] = 1.0;
        reverb.process(&mut buffer, &RenderTime::default());
        buffer
    }

    fn energy(buffer: &[f32]) -> f32 {
        buffer.iter().map(|v| v * v).sum()
    }

    #[test]
    fn produces_decaying_tail() {
        let mut reverb = ReverbEffect::new();
        reverb.initialize(44100, 2, 512).unwrap();
        let response = impulse_response(&mut reverb, 44100 * 2);
        assert!(response.iter().all(|v| v.is_finite()));
        // wet only: nothing passes through directly
        assert_eq!(response[0], 0.0);
        let first_second = energy(&response[..88200]);
        let second_second = energy(&response[88200..]);
        assert!(first_second > 0.0);
        assert!(second_second < first_second);
        // stereo decorrelated output
        let left = response.iter().step_by(2).collect::<Vec<_>>();
        let right = response.iter().skip(1).step_by(2).collect::<Vec<_>>();
        assert_ne!(left, right);
    }

    #[test]
    fn parameters_and_reset() {
        let mut reverb = ReverbEffect::with_parameters(0.8, 0.5);
        reverb.initialize(48000, 2, 512).unwrap();
        assert!(reverb
            .process_parameter_update(ReverbEffect::SIZE_ID, 2.0)
            .is_ok());
        assert!(reverb
            .process_parameter_update(ReverbEffect::PREDELAY_ID, 0.1)
            .is_ok());
        assert!(reverb
            .process_parameter_update(FourCC(*b"xxxx"), 0.1)
            .is_err());
        let response = impulse_response(&mut reverb, 24000);
        assert!(response.iter().all(|v| v.is_finite()));
        // predelayed
        assert!(response[..2 * 4800].iter().all(|v| *v == 0.0));

        reverb.process_reset();
        let mut silence = vec![0.0; 1024];
        reverb.process(&mut silence, &RenderTime::default());
        assert!(silence.iter().all(|v| *v == 0.0));
    }
}
