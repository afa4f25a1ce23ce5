//! Post-sample transforms of distribution values.

use std::fmt;

use super::Distribution;

// -------------------------------------------------------------------------------------------------

/// Stateful transform, which gets the owning distribution passed along with the sampled value.
pub type ExtendedTransformFn = dyn FnMut(f64, &Distribution) -> f64 + Send;

// -------------------------------------------------------------------------------------------------

/// A transform, applied to every sampled value as the very last step of `Distribution::sample`.
pub enum Transform {
    /// A pure value to value function, e.g. decibels to linear gain.
    Plain(fn(f64) -> f64),
    /// A stateful function, which also gets the owning distribution passed.
    Extended(Box<ExtendedTransformFn>),
}

impl Transform {
    #[inline]
    pub(crate) fn apply(&mut self, value: f64, distribution: &Distribution) -> f64 {
        match self {
            Self::Plain(func) => func(value),
            Self::Extended(func) => func(value, distribution),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => write!(f, "Transform::Plain"),
            Self::Extended(_) => write!(f, "Transform::Extended"),
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Convert decibels to a linear gain factor.
pub fn db_to_gain(value: f64) -> f64 {
    10.0f64.powf(value / 20.0)
}

/// Convert a linear gain factor to decibels.
pub fn gain_to_db(value: f64) -> f64 {
    20.0 * value.log10()
}

/// Convert a MIDI note number to a frequency in Hz.
pub fn note_to_frequency(value: f64) -> f64 {
    440.0 * 2.0f64.powf((value - 69.0) / 12.0)
}

/// Convert degrees to radians.
pub fn degrees_to_radians(value: f64) -> f64 {
    value.to_radians()
}

/// Exponent base 2: converts octaves to a frequency ratio.
pub fn octaves_to_ratio(value: f64) -> f64 {
    2.0f64.powf(value)
}

// -------------------------------------------------------------------------------------------------
