//! Exponential gain fading.

use crate::utils::{buffer::StereoFramesMut, db_to_linear, rc_coefficient};

// -------------------------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum FaderState {
    /// Fader reached its target gain.
    Settled,
    /// Fader is actively approaching its target gain.
    IsRunning,
}

// -------------------------------------------------------------------------------------------------

/// A one-pole gain follower, approaching a target gain exponentially.
///
/// Fades are specified in dB with a duration, after which the gain has settled within -80 dB
/// of the target. The fader can be stepped once per quantum (streams) or once per sample frame
/// (mixer), so it needs to know the rate it gets stepped with.
#[derive(Debug, Clone, Copy)]
pub struct GainFader {
    current_gain: f32,
    target_gain: f32,
    coefficient: f32,
    step_rate: f32,
}

impl GainFader {
    /// Settle threshold of the current gain.
    const EPSILON: f32 = 1e-6;

    /// Create a new settled fader with the given linear gain, stepped at the given rate in Hz.
    pub fn new(gain: f32, step_rate: f32) -> Self {
        debug_assert!(step_rate > 0.0, "Invalid step rate");
        Self {
            current_gain: gain,
            target_gain: gain,
            coefficient: 0.0,
            step_rate,
        }
    }

    /// Get actual fader state.
    pub fn state(&self) -> FaderState {
        if (self.current_gain - self.target_gain).abs() > Self::EPSILON {
            FaderState::IsRunning
        } else {
            FaderState::Settled
        }
    }

    /// The current, possibly fading, linear gain.
    pub fn current(&self) -> f32 {
        self.current_gain
    }

    /// The linear gain we're fading to.
    pub fn target(&self) -> f32 {
        self.target_gain
    }

    /// Jump to the given gain in dB immediately.
    pub fn set_gain_db(&mut self, gain_db: f32) {
        let gain = db_to_linear(gain_db);
        self.current_gain = gain;
        self.target_gain = gain;
        self.coefficient = 0.0;
    }

    /// Start fading to the given gain in dB within `time` seconds. Zero or negative
    /// times jump on the next step.
    pub fn fade_gain_db(&mut self, gain_db: f32, time: f32) {
        self.target_gain = db_to_linear(gain_db);
        self.coefficient = rc_coefficient(time, self.step_rate);
    }

    /// Advance the fader by one step and return the new gain.
    #[inline]
    pub fn step(&mut self) -> f32 {
        self.current_gain =
            self.coefficient * self.current_gain + (1.0 - self.coefficient) * self.target_gain;
        self.current_gain
    }

    /// Apply the fader per frame to the given interleaved stereo buffer.
    pub fn process_stereo(&mut self, output: &mut [f32]) {
        if self.state() == FaderState::Settled {
            self.current_gain = self.target_gain;
            if self.target_gain != 1.0 {
                for sample in output.iter_mut() {
                    *sample *= self.target_gain;
                }
            }
        } else {
            for frame in output.stereo_frames_mut() {
                let gain = self.step();
                frame[0] *= gain;
                frame[1] *= gain;
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate() {
        let mut fader = GainFader::new(1.0, 100.0);
        assert_eq!(fader.state(), FaderState::Settled);
        fader.set_gain_db(-6.0);
        assert_eq!(fader.current(), db_to_linear(-6.0));
        assert_eq!(fader.state(), FaderState::Settled);

        fader.fade_gain_db(0.0, 0.0);
        assert_eq!(fader.step(), 1.0);
    }

    #[test]
    fn settles_at_fade_time() {
        // 1 second fade, stepped at 100 Hz
        let mut fader = GainFader::new(0.0, 100.0);
        fader.fade_gain_db(0.0, 1.0);
        assert_eq!(fader.state(), FaderState::IsRunning);
        for _ in 0..50 {
            fader.step();
        }
        assert!(fader.current() > 0.5 && fader.current() < 1.0);
        for _ in 50..100 {
            fader.step();
        }
        // within -80 dB of the target
        assert!((1.0 - fader.current()).abs() < 1.5e-4);
    }

    #[test]
    fn stereo_processing() {
        let mut fader = GainFader::new(1.0, 44100.0);
        fader.set_gain_db(-200.0);
        let mut buffer = vec![1.0; 8];
        fader.process_stereo(&mut buffer);
        assert!(buffer.iter().all(|s| *s == 0.0));

        let mut fader = GainFader::new(0.0, 44100.0);
        fader.fade_gain_db(0.0, 0.001);
        let mut buffer = vec![1.0; 8];
        fader.process_stereo(&mut buffer);
        // ramp up per frame, equal in both channels
        assert!(buffer[0] > 0.0 && buffer[2] > buffer[0]);
        assert_eq!(buffer[0], buffer[1]);
    }
}
