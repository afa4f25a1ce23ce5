//! Effect parameter descriptions and values.

use std::ops::RangeInclusive;

use four_cc::FourCC;

use crate::Error;

// -------------------------------------------------------------------------------------------------

/// A continuous (float) effect parameter descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatParameter {
    id: FourCC,
    name: &'static str,
    range: RangeInclusive<f32>,
    default: f32,
    unit: &'static str,
}

impl FloatParameter {
    /// Create a new float parameter descriptor.
    pub const fn new(
        id: FourCC,
        name: &'static str,
        range: RangeInclusive<f32>,
        default: f32,
    ) -> Self {
        assert!(
            default >= *range.start() && default <= *range.end(),
            "Invalid parameter default value"
        );
        Self {
            id,
            name,
            range,
            default,
            unit: "",
        }
    }

    /// Optional unit for string displays.
    pub const fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = unit;
        self
    }

    pub fn id(&self) -> FourCC {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn unit(&self) -> &'static str {
        self.unit
    }

    /// The parameter's value range.
    pub fn range(&self) -> &RangeInclusive<f32> {
        &self.range
    }

    /// The parameter's default value.
    pub fn default_value(&self) -> f32 {
        self.default
    }

    /// Clamp the given plain value to the parameter's range.
    pub fn clamp_value(&self, value: f32) -> f32 {
        value.clamp(*self.range.start(), *self.range.end())
    }

    /// Convert the given plain value to a string, including the unit when set.
    pub fn value_to_string(&self, value: f32) -> String {
        if self.unit.is_empty() {
            format!("{:.2}", value)
        } else {
            format!("{:.2} {}", value, self.unit)
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Holds a float parameter value and its description.
#[derive(Debug, Clone)]
pub struct FloatParameterValue {
    description: FloatParameter,
    value: f32,
}

impl FloatParameterValue {
    /// Create a new parameter value, initialized to the parameter's default value.
    pub fn from_description(description: FloatParameter) -> Self {
        let value = description.default_value();
        Self { description, value }
    }

    /// Access the parameter value's description.
    pub fn description(&self) -> &FloatParameter {
        &self.description
    }

    #[inline(always)]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Set a new value, clamped to the parameter's range.
    pub fn set_value(&mut self, value: f32) {
        self.value = self.description.clamp_value(value);
    }

    /// Apply a parameter update from the real-time thread. Non finite values get rejected,
    /// all others clamped.
    pub fn apply_update(&mut self, value: f32) -> Result<(), Error> {
        if !value.is_finite() {
            return Err(Error::ParameterError(format!(
                "Invalid value '{value}' for parameter '{}'",
                self.description.name()
            )));
        }
        self.set_value(value);
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values() {
        let description =
            FloatParameter::new(FourCC(*b"gain"), "Gain", -24.0..=24.0, 0.0).with_unit("dB");
        assert_eq!(description.value_to_string(1.5), "1.50 dB");

        let mut value = FloatParameterValue::from_description(description);
        assert_eq!(value.value(), 0.0);
        value.set_value(48.0);
        assert_eq!(value.value(), 24.0);
        assert!(value.apply_update(f32::NAN).is_err());
        assert_eq!(value.value(), 24.0);
        assert!(value.apply_update(-6.0).is_ok());
        assert_eq!(value.value(), -6.0);
    }
}
