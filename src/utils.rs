//! Various common DSP and buffer helpers.

pub mod buffer;
pub mod dsp;
pub mod fader;

// -------------------------------------------------------------------------------------------------

/// Lowest dB value: everything at or below is treated as silence.
pub const MINUS_INF_IN_DB: f32 = -200.0f32;

/// Level at which exponential fades are considered to be settled (-80 dB).
const FADE_SETTLE_LEVEL: f32 = 1e-4;

// -------------------------------------------------------------------------------------------------

/// Convert a linear gain into decibels.
pub fn linear_to_db(value: f32) -> f32 {
    const LIN_TO_DB_FACTOR: f32 = 20.0f32 / std::f32::consts::LN_10;
    if value == 1.0 {
        return 0.0; // avoid rounding errors at exactly 0 dB
    } else if value > 1e-10f32 {
        return value.ln() * LIN_TO_DB_FACTOR;
    }
    MINUS_INF_IN_DB
}

/// Convert decibels into a linear gain.
pub fn db_to_linear(value: f32) -> f32 {
    const DB_TO_LIN_FACTOR: f32 = std::f32::consts::LN_10 / 20.0f32;
    if value == 0.0f32 {
        return 1.0f32; // avoid rounding errors at exactly 0 dB
    } else if value > MINUS_INF_IN_DB {
        return (value * DB_TO_LIN_FACTOR).exp();
    }
    0.0f32
}

// -------------------------------------------------------------------------------------------------

/// Calculate a one-pole smoothing coefficient, which lets `y = c * y + (1 - c) * x` settle
/// within -80 dB of its target after `time` seconds, when applied at the given `rate` in Hz.
///
/// Returns 0.0 (jump to target immediately) for zero, negative or non finite times.
pub fn rc_coefficient(time: f32, rate: f32) -> f32 {
    let steps = time * rate;
    if steps.is_finite() && steps > 0.0 {
        (FADE_SETTLE_LEVEL.ln() / steps).exp()
    } else {
        0.0
    }
}

// -------------------------------------------------------------------------------------------------

/// Equal power panning gains for a panning position in range [-1, 1] (left to right).
pub fn panning_factors(panning: f32) -> (f32, f32) {
    let position = (panning.clamp(-1.0, 1.0) + 1.0) * std::f32::consts::FRAC_PI_4;
    (position.cos(), position.sin())
}

// -------------------------------------------------------------------------------------------------
