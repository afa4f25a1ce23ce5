//! Envelope follower for detecting signal levels.

/// An envelope follower that tracks the level of a signal using attack and release times.
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    current_value: f32,
    attack_coeff: f32,
    release_coeff: f32,
    sample_rate: u32,
}

impl EnvelopeFollower {
    /// Create a new envelope follower with the given sample rate and time constants in seconds.
    pub fn new(sample_rate: u32, attack_time: f32, release_time: f32) -> Self {
        let mut follower = Self {
            current_value: 0.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            sample_rate,
        };
        follower.set_attack_time(attack_time);
        follower.set_release_time(release_time);
        follower
    }

    pub fn set_attack_time(&mut self, time: f32) {
        self.attack_coeff = Self::time_coefficient(time, self.sample_rate);
    }

    pub fn set_release_time(&mut self, time: f32) {
        self.release_coeff = Self::time_coefficient(time, self.sample_rate);
    }

    /// Current envelope value.
    pub fn value(&self) -> f32 {
        self.current_value
    }

    /// Process a single input value (usually a level in dB or a rectified sample) and
    /// return the new envelope value.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let coeff = if input > self.current_value {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.current_value = input + coeff * (self.current_value - input);
        self.current_value
    }

    /// Reset the envelope follower to the given value.
    pub fn reset(&mut self, value: f32) {
        self.current_value = value;
    }

    fn time_coefficient(time: f32, sample_rate: u32) -> f32 {
        if time > 0.0 {
            (-1.0 / (time * sample_rate as f32)).exp()
        } else {
            0.0
        }
    }
}

impl Default for EnvelopeFollower {
    fn default() -> Self {
        Self::new(44100, 0.01, 0.1)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attack_and_release() {
        let mut follower = EnvelopeFollower::new(1000, 0.001, 0.1);
        // fast attack
        for _ in 0..10 {
            follower.process(1.0);
        }
        assert!(follower.value() > 0.99);
        // slow release
        for _ in 0..10 {
            follower.process(0.0);
        }
        assert!(follower.value() > 0.8);

        let mut instant = EnvelopeFollower::new(1000, 0.0, 0.0);
        assert_eq!(instant.process(0.5), 0.5);
        assert_eq!(instant.process(0.0), 0.0);
    }
}
