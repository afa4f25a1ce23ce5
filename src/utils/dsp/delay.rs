//! Delay buffers to delay signals.

// -------------------------------------------------------------------------------------------------

/// Multi channel delay line buffer with fractional delay time support.
///
/// The buffer size is rounded up to the next power of two, so reads and writes can wrap with
/// a simple bit mask.
#[derive(Debug, Default, Clone)]
pub struct DelayLine<const CHANNELS: usize> {
    buffer: Vec<f32>,
    buffer_mask: usize,
    write_pos: usize,
}

impl<const CHANNELS: usize> DelayLine<CHANNELS> {
    /// Create a new delay buffer with the given max delay time in sample frames.
    pub fn new(max_delay_frames: usize) -> Self {
        let buffer_frames = (max_delay_frames + 1).next_power_of_two();
        Self {
            buffer: vec![0.0; buffer_frames * CHANNELS],
            buffer_mask: buffer_frames - 1,
            write_pos: 0,
        }
    }

    /// Max delay in frames, which can be read from the delay line.
    pub fn max_delay_frames(&self) -> usize {
        self.buffer_mask
    }

    /// Reset the delay buffer and write position.
    pub fn flush(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    /// Read a frame, which got written `delay_frames` writes ago. Fractional delays are
    /// linearly interpolated. Delays of less than one frame read the most recent frame.
    #[inline]
    pub fn read(&self, delay_frames: f32) -> [f32; CHANNELS] {
        debug_assert!(
            delay_frames >= 0.0 && (delay_frames.ceil() as usize) <= self.max_delay_frames(),
            "Delay time out of bounds"
        );
        let delay_frames = delay_frames.clamp(1.0, self.buffer_mask as f32);
        let delay_floor = delay_frames.floor();
        let fraction = delay_frames - delay_floor;

        let index1 = self.write_pos.wrapping_sub(delay_floor as usize) & self.buffer_mask;
        let index2 = index1.wrapping_sub(1) & self.buffer_mask;

        let mut output = [0.0; CHANNELS];
        for (ch, out) in output.iter_mut().enumerate() {
            let value1 = self.buffer[index1 * CHANNELS + ch];
            let value2 = self.buffer[index2 * CHANNELS + ch];
            *out = value1 + (value2 - value1) * fraction;
        }
        output
    }

    /// Write a new frame and move the write position.
    #[inline]
    pub fn write(&mut self, input: [f32; CHANNELS]) {
        let write_index = self.write_pos * CHANNELS;
        self.buffer[write_index..write_index + CHANNELS].copy_from_slice(&input);
        self.write_pos = (self.write_pos + 1) & self.buffer_mask;
    }

    /// Read the delayed frame, then write the input frame plus the delayed frame scaled by the
    /// given feedback amount. Returns the delayed frame.
    #[inline]
    pub fn process_sample(
        &mut self,
        input: [f32; CHANNELS],
        feedback: f32,
        delay_frames: f32,
    ) -> [f32; CHANNELS] {
        let output = self.read(delay_frames);
        let mut feedback_input = input;
        for (i, o) in feedback_input.iter_mut().zip(output) {
            *i += o * feedback;
        }
        self.write(feedback_input);
        output
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_delay() {
        let mut delay = DelayLine::<1>::new(4);
        assert!(delay.max_delay_frames() >= 4);
        let mut output = Vec::new();
        for input in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0] {
            output.push(delay.process_sample([input], 0.0, 3.0)[0]);
        }
        assert_eq!(output, vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn fractional_delay() {
        let mut delay = DelayLine::<2>::new(8);
        delay.write([1.0, -1.0]);
        delay.write([2.0, -2.0]);
        assert_eq!(delay.read(1.0), [2.0, -2.0]);
        assert_eq!(delay.read(2.0), [1.0, -1.0]);
        assert_eq!(delay.read(1.5), [1.5, -1.5]);
        delay.flush();
        assert_eq!(delay.read(1.0), [0.0, 0.0]);
    }

    #[test]
    fn feedback() {
        let mut delay = DelayLine::<1>::new(2);
        let mut output = Vec::new();
        for input in [1.0, 0.0, 0.0, 0.0, 0.0] {
            output.push(delay.process_sample([input], 0.5, 2.0)[0]);
        }
        assert_eq!(output, vec![0.0, 0.0, 1.0, 0.0, 0.5]);
    }
}
