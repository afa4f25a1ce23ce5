//! Amplitude envelopes of single grains.

use std::f32::consts::{PI, TAU};

use strum::{Display, EnumCount, EnumString, VariantNames};

// -------------------------------------------------------------------------------------------------

/// Shape of a grain's amplitude envelope.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumCount, VariantNames,
)]
pub enum EnvelopeType {
    /// No envelope: constant unity gain.
    None,
    /// Exponential attack and decay curves. Shape sets the curvature.
    Exp,
    /// Linear attack and decay ramps with a flat sustain in between.
    #[default]
    Linear,
    /// Hann windowed sinc pulse. Shape sets the number of side lobes.
    Sinc,
    /// Gaussian bell. Shape sets the width.
    Gaussian,
    /// Hamming window over the whole grain.
    Hamming,
    /// FOF (formant wave function) envelope: a smooth attack, exponential decay in between and
    /// a smooth release. Shape sets the decay rate.
    Fof,
    /// Beta distribution window, which peaks at `attack / (attack + decay)`. Shape sets
    /// the concentration around the peak.
    Beta,
}

// -------------------------------------------------------------------------------------------------

/// Envelope state of a single grain.
///
/// Attack and decay values > 0 are fractions of the grain duration, values < 0 are absolute
/// times in seconds. Attack and decay get scaled down when they exceed the duration.
#[derive(Debug, Clone, Default)]
pub struct GrainEnvelope {
    envelope_type: EnvelopeType,
    shape: f32,
    duration_samples: usize,
    attack_samples: f32,
    decay_samples: f32,
    // precalculated curve parameters
    exp_norm: f32,
    beta_alpha: f32,
    beta_beta: f32,
    beta_norm: f32,
    position: usize,
}

impl GrainEnvelope {
    /// Curvature factor for exponential curves at shape 1.
    const EXP_CURVATURE: f32 = 5.0;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn envelope_type(&self) -> EnvelopeType {
        self.envelope_type
    }

    pub fn duration_samples(&self) -> usize {
        self.duration_samples
    }

    pub fn attack_samples(&self) -> f32 {
        self.attack_samples
    }

    pub fn decay_samples(&self) -> f32 {
        self.decay_samples
    }

    /// Number of envelope samples processed since the last (re)configuration.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Configure the envelope for a new grain and rewind it.
    pub fn configure(
        &mut self,
        envelope_type: EnvelopeType,
        attack: f32,
        decay: f32,
        shape: f32,
        duration_samples: usize,
        sample_rate: u32,
    ) {
        let to_samples = |value: f32| {
            if !value.is_finite() {
                0.0
            } else if value > 0.0 {
                value * duration_samples as f32
            } else {
                -value * sample_rate as f32
            }
        };
        let mut attack_samples = to_samples(attack);
        let mut decay_samples = to_samples(decay);
        let total = attack_samples + decay_samples;
        if total > duration_samples as f32 {
            let scale = duration_samples as f32 / total;
            attack_samples *= scale;
            decay_samples *= scale;
        }

        self.envelope_type = envelope_type;
        self.shape = if shape.is_finite() { shape.max(0.0) } else { 1.0 };
        self.duration_samples = duration_samples;
        self.attack_samples = attack_samples;
        self.decay_samples = decay_samples;

        let curvature = self.shape * Self::EXP_CURVATURE;
        self.exp_norm = if curvature > 1e-3 {
            1.0 / (curvature.exp() - 1.0)
        } else {
            0.0
        };

        let sum = attack_samples + decay_samples;
        let peak = if sum > 0.0 { attack_samples / sum } else { 0.5 };
        let concentration = 4.0 * self.shape;
        self.beta_alpha = 1.0 + concentration * peak;
        self.beta_beta = 1.0 + concentration * (1.0 - peak);
        let peak_value = Self::beta_kernel(peak, self.beta_alpha, self.beta_beta);
        self.beta_norm = if peak_value > 0.0 {
            1.0 / peak_value
        } else {
            1.0
        };

        self.position = 0;
    }

    /// Rewind the envelope without changing its configuration.
    pub fn retrigger(&mut self) {
        self.position = 0;
    }

    /// Multiply the given mono buffer with the envelope and advance the envelope position.
    pub fn process(&mut self, buffer: &mut [f32]) {
        if self.envelope_type == EnvelopeType::None {
            self.position += buffer.len();
            return;
        }
        for sample in buffer.iter_mut() {
            *sample *= self.value_at(self.position);
            self.position += 1;
        }
    }

    /// Envelope gain at the given sample position.
    pub fn value_at(&self, position: usize) -> f32 {
        if self.envelope_type == EnvelopeType::None {
            return 1.0;
        }
        if position >= self.duration_samples {
            return 0.0;
        }
        let pos = position as f32;
        let duration = self.duration_samples as f32;
        let phase = pos / duration;
        match self.envelope_type {
            EnvelopeType::None => 1.0,
            EnvelopeType::Linear => {
                let attack = Self::ramp(pos, self.attack_samples);
                let decay = Self::ramp(duration - pos, self.decay_samples);
                attack.min(decay)
            }
            EnvelopeType::Exp => {
                let attack = self.exp_curve(Self::ramp(pos, self.attack_samples));
                let decay = self.exp_curve(Self::ramp(duration - pos, self.decay_samples));
                attack.min(decay)
            }
            EnvelopeType::Sinc => {
                let x = (2.0 * phase - 1.0) * self.shape.max(0.5);
                let sinc = if x.abs() < 1e-6 {
                    1.0
                } else {
                    (PI * x).sin() / (PI * x)
                };
                sinc * Self::hann(phase)
            }
            EnvelopeType::Gaussian => {
                let sigma = (0.25 * self.shape).max(1e-3);
                let x = (2.0 * phase - 1.0) / sigma;
                (-0.5 * x * x).exp()
            }
            EnvelopeType::Hamming => 0.54 - 0.46 * (TAU * phase).cos(),
            EnvelopeType::Fof => {
                let release_start = duration - self.decay_samples;
                if pos < self.attack_samples {
                    0.5 * (1.0 - (PI * pos / self.attack_samples).cos())
                } else {
                    let sustain = release_start - self.attack_samples;
                    let decay_pos = (pos - self.attack_samples).min(sustain.max(0.0));
                    let decay_phase = if sustain > 0.0 {
                        decay_pos / sustain
                    } else {
                        0.0
                    };
                    let level = (-self.shape * Self::EXP_CURVATURE * decay_phase).exp();
                    if pos >= release_start && self.decay_samples > 0.0 {
                        let release = (duration - pos) / self.decay_samples;
                        level * 0.5 * (1.0 - (PI * release).cos())
                    } else {
                        level
                    }
                }
            }
            EnvelopeType::Beta => {
                Self::beta_kernel(phase, self.beta_alpha, self.beta_beta) * self.beta_norm
            }
        }
    }

    /// Linear ramp from 0 to 1 within `length` samples.
    #[inline]
    fn ramp(pos: f32, length: f32) -> f32 {
        if length > 0.0 {
            (pos / length).min(1.0)
        } else {
            1.0
        }
    }

    /// Exponential curve through (0, 0) and (1, 1).
    #[inline]
    fn exp_curve(&self, x: f32) -> f32 {
        if self.exp_norm > 0.0 {
            ((self.shape * Self::EXP_CURVATURE * x).exp() - 1.0) * self.exp_norm
        } else {
            x
        }
    }

    #[inline]
    fn hann(phase: f32) -> f32 {
        0.5 - 0.5 * (TAU * phase).cos()
    }

    #[inline]
    fn beta_kernel(x: f32, alpha: f32, beta: f32) -> f32 {
        x.powf(alpha - 1.0) * (1.0 - x).powf(beta - 1.0)
    }
}

// -------------------------------------------------------------------------------------------------
