use std::f64::consts::TAU;

use crate::{
    distribution::Distribution,
    grain::Grain,
    source::{GrainSynth, VoiceStatus},
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Reference grain synth, which plays a plain sine wave at the grain's carrier frequency.
///
/// The detune (in semitones) and the start phase (in cycles, 0..1) of each grain are sampled
/// from the synth's own distributions when a voice gets initialized.
pub struct SineSynth {
    sample_rate: u32,
    detune: Distribution,
    phase: Distribution,
}

impl Default for SineSynth {
    fn default() -> Self {
        Self::new()
    }
}

impl SineSynth {
    pub const SYNTH_NAME: &'static str = "SineSynth";

    pub fn new() -> Self {
        Self {
            sample_rate: 44100,
            detune: Distribution::from_constant(0.0),
            phase: Distribution::from_constant(0.0),
        }
    }

    /// Detune distribution in semitones.
    pub fn detune_mut(&mut self) -> &mut Distribution {
        &mut self.detune
    }

    /// Start phase distribution in cycles.
    pub fn phase_mut(&mut self) -> &mut Distribution {
        &mut self.phase
    }
}

pub struct SineVoice {
    phase: f64,
    phase_increment: f64,
}

impl GrainSynth for SineSynth {
    type Voice = SineVoice;

    fn name(&self) -> &'static str {
        Self::SYNTH_NAME
    }

    fn initialize(&mut self, sample_rate: u32) -> Result<(), Error> {
        if sample_rate == 0 {
            return Err(Error::ParameterError(
                "sine synth needs a valid sample rate".to_string(),
            ));
        }
        self.sample_rate = sample_rate;
        Ok(())
    }

    fn create_voice(&mut self) -> Self::Voice {
        SineVoice {
            phase: 0.0,
            phase_increment: 0.0,
        }
    }

    fn init_voice(&mut self, voice: &mut Self::Voice, grain: &Grain) {
        let detune = self.detune.sample();
        let ratio = if detune.is_finite() {
            2.0f64.powf(detune / 12.0)
        } else {
            1.0
        };
        let frequency = grain.frequency() as f64 * ratio;
        voice.phase_increment = if frequency.is_finite() {
            TAU * frequency / self.sample_rate as f64
        } else {
            0.0
        };
        let phase = self.phase.sample();
        voice.phase = if phase.is_finite() {
            TAU * phase.rem_euclid(1.0)
        } else {
            0.0
        };
    }

    fn fill_buffer(&mut self, voice: &mut Self::Voice, buffer: &mut [f32]) -> VoiceStatus {
        for sample in buffer.iter_mut() {
            *sample = voice.phase.sin() as f32;
            voice.phase += voice.phase_increment;
            if voice.phase >= TAU {
                voice.phase -= TAU;
            }
        }
        VoiceStatus::Playing
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_carrier_frequency() {
        let mut synth = SineSynth::new();
        synth.initialize(1000).unwrap();
        let mut grain = Grain::default();
        grain.frequency = 250.0;

        let mut voice = synth.create_voice();
        synth.init_voice(&mut voice, &grain);
        let mut buffer = [0.0; 8];
        assert_eq!(synth.fill_buffer(&mut voice, &mut buffer), VoiceStatus::Playing);
        // a quarter cycle per sample
        let expected = [0.0, 1.0, 0.0, -1.0, 0.0, 1.0, 0.0, -1.0];
        for (value, expected) in buffer.iter().zip(expected) {
            assert!((value - expected).abs() < 1e-5, "{value} != {expected}");
        }
    }

    #[test]
    fn detune_and_phase() {
        let mut synth = SineSynth::new();
        synth.initialize(1000).unwrap();
        synth.detune_mut().set_constant(12.0);
        synth.phase_mut().set_constant(0.25);
        let mut grain = Grain::default();
        grain.frequency = 125.0;

        let mut voice = synth.create_voice();
        synth.init_voice(&mut voice, &grain);
        let mut buffer = [0.0; 2];
        synth.fill_buffer(&mut voice, &mut buffer);
        // starts at the top of the cycle, detuned up an octave
        assert!((buffer[0] - 1.0).abs() < 1e-5);
        assert!(buffer[1].abs() < 1e-5);
    }
}
