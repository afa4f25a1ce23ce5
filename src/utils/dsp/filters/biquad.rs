use std::f64;

use strum::{Display, EnumIter, EnumString};

use crate::Error;

// -------------------------------------------------------------------------------------------------

/// Available filter types for the state variable filter.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug, Display, EnumIter, EnumString)]
pub enum BiquadFilterType {
    #[default]
    Lowpass,
    Highpass,
    Bandpass,
    Bell,
    Lowshelf,
    Highshelf,
}

// -------------------------------------------------------------------------------------------------

/// Filter parameters and the derived coefficients. Coefficients can be shared by multiple
/// [`BiquadFilter`] states, e.g. for the left and right channel of a stereo signal.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct BiquadFilterCoefficients {
    filter_type: BiquadFilterType,
    sample_rate: u32,
    cutoff: f32,
    q: f32,
    gain: f32,
    a1: f64,
    a2: f64,
    a3: f64,
    m0: f64,
    m1: f64,
    m2: f64,
}

impl BiquadFilterCoefficients {
    pub fn new(
        filter_type: BiquadFilterType,
        sample_rate: u32,
        cutoff: f32,
        q: f32,
        gain: f32,
    ) -> Result<Self, Error> {
        let mut coefficients = Self::default();
        coefficients.set(filter_type, sample_rate, cutoff, q, gain)?;
        Ok(coefficients)
    }

    pub fn filter_type(&self) -> BiquadFilterType {
        self.filter_type
    }

    /// The frequency in Hz where the cutoff of the filter should be.
    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    /// The steepness of the filter.
    pub fn q(&self) -> f32 {
        self.q
    }

    /// Gain in dB. Only used by Bell, Lowshelf and Highshelf filters.
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Set a new batch of filter parameters and recalculate the coefficients if they changed.
    /// On errors, the previous parameters and coefficients are kept.
    pub fn set(
        &mut self,
        filter_type: BiquadFilterType,
        sample_rate: u32,
        cutoff: f32,
        q: f32,
        gain: f32,
    ) -> Result<(), Error> {
        if self.filter_type == filter_type
            && self.sample_rate == sample_rate
            && self.cutoff == cutoff
            && self.q == q
            && self.gain == gain
        {
            return Ok(());
        }
        if sample_rate == 0 {
            return Err(Error::ParameterError(
                "Invalid filter sample-rate: must be > 0".to_string(),
            ));
        }
        if q <= 0.0 {
            return Err(Error::ParameterError(format!(
                "Invalid filter Q: must be > 0, but is {q}"
            )));
        }
        if cutoff <= 0.0 || cutoff >= sample_rate as f32 / 2.0 {
            return Err(Error::ParameterError(format!(
                "Invalid filter frequency: must be in range (0, {n}), but is {cutoff}",
                n = sample_rate as f32 / 2.0,
            )));
        }
        self.filter_type = filter_type;
        self.sample_rate = sample_rate;
        self.cutoff = cutoff;
        self.q = q;
        self.gain = gain;
        self.apply();
        Ok(())
    }

    fn apply(&mut self) {
        let a = f64::powf(10.0, self.gain as f64 / 40.0);
        let mut g = f64::tan(f64::consts::PI * self.cutoff as f64 / self.sample_rate as f64);
        let mut k = 1.0 / self.q as f64;
        match self.filter_type {
            BiquadFilterType::Lowshelf => g /= a.sqrt(),
            BiquadFilterType::Highshelf => g *= a.sqrt(),
            BiquadFilterType::Bell => k /= a,
            _ => {}
        }
        self.a1 = 1.0 / (1.0 + g * (g + k));
        self.a2 = g * self.a1;
        self.a3 = g * self.a2;
        (self.m0, self.m1, self.m2) = match self.filter_type {
            BiquadFilterType::Lowpass => (0.0, 0.0, 1.0),
            BiquadFilterType::Highpass => (1.0, -k, -1.0),
            BiquadFilterType::Bandpass => (0.0, 1.0, 0.0),
            BiquadFilterType::Bell => (1.0, k * (a * a - 1.0), 0.0),
            BiquadFilterType::Lowshelf => (1.0, k * (a - 1.0), a * a - 1.0),
            BiquadFilterType::Highshelf => (a * a, k * (1.0 - a) * a, 1.0 - a * a),
        };
    }
}

// -------------------------------------------------------------------------------------------------

/// State variable biquad filter, designed by Andrew Simper of Cytomic.
/// See <http://cytomic.com/files/dsp/SvfLinearTrapOptimised2.pdf>
///
/// Second-order filter with a 12 dB/octave slope, stable when modulated at high rates.
#[derive(Default, Debug, Clone)]
pub struct BiquadFilter {
    ic1eq: f64,
    ic2eq: f64,
}

impl BiquadFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter all samples of a mono buffer in place.
    #[inline]
    pub fn process(&mut self, coefficients: &BiquadFilterCoefficients, buffer: &mut [f32]) {
        for sample in buffer {
            *sample = self.process_sample(coefficients, *sample as f64) as f32;
        }
    }

    /// Apply the filter on a single sample.
    #[inline]
    pub fn process_sample(&mut self, coefficients: &BiquadFilterCoefficients, input: f64) -> f64 {
        let v3 = input - self.ic2eq;
        let v1 = coefficients.a1 * self.ic1eq + coefficients.a2 * v3;
        let v2 = self.ic2eq + coefficients.a2 * self.ic1eq + coefficients.a3 * v3;
        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;
        coefficients.m0 * input + coefficients.m1 * v1 + coefficients.m2 * v2
    }

    /// Reset filter state.
    #[inline]
    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_rms(coefficients: &BiquadFilterCoefficients, frequency: f32) -> f32 {
        let sample_rate = coefficients.sample_rate as f32;
        let mut filter = BiquadFilter::new();
        let mut buffer = (0..8192)
            .map(|i| (std::f32::consts::TAU * frequency * i as f32 / sample_rate).sin())
            .collect::<Vec<_>>();
        filter.process(coefficients, &mut buffer);
        // skip transients
        let tail = &buffer[4096..];
        (tail.iter().map(|s| s * s).sum::<f32>() / tail.len() as f32).sqrt()
    }

    #[test]
    fn parameter_validation() {
        assert!(BiquadFilterCoefficients::new(BiquadFilterType::Lowpass, 0, 1000.0, 1.0, 0.0)
            .is_err());
        assert!(
            BiquadFilterCoefficients::new(BiquadFilterType::Lowpass, 44100, 1000.0, 0.0, 0.0)
                .is_err()
        );
        assert!(
            BiquadFilterCoefficients::new(BiquadFilterType::Lowpass, 44100, 30000.0, 1.0, 0.0)
                .is_err()
        );
        let mut coefficients =
            BiquadFilterCoefficients::new(BiquadFilterType::Lowpass, 44100, 1000.0, 1.0, 0.0)
                .unwrap();
        assert!(coefficients
            .set(BiquadFilterType::Lowpass, 44100, -1.0, 1.0, 0.0)
            .is_err());
        assert_eq!(coefficients.cutoff(), 1000.0);
    }

    #[test]
    fn lowpass_response() {
        let coefficients =
            BiquadFilterCoefficients::new(BiquadFilterType::Lowpass, 44100, 1000.0, 0.707, 0.0)
                .unwrap();
        let pass = sine_rms(&coefficients, 100.0);
        let stop = sine_rms(&coefficients, 10000.0);
        assert!(pass > 0.6, "{pass}");
        assert!(stop < 0.05, "{stop}");
    }

    #[test]
    fn flat_bell_is_transparent() {
        let coefficients =
            BiquadFilterCoefficients::new(BiquadFilterType::Bell, 44100, 1000.0, 1.0, 0.0)
                .unwrap();
        let rms = sine_rms(&coefficients, 1000.0);
        assert!((rms - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.01, "{rms}");
    }
}
