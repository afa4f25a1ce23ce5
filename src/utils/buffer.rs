//! Interleaved and mono buffer helpers.

// -------------------------------------------------------------------------------------------------

/// Set all samples in the given buffer to zero.
#[inline]
pub fn clear_buffer(buffer: &mut [f32]) {
    buffer.fill(0.0);
}

/// Multiply all samples in the given buffer with the given gain.
#[inline]
pub fn scale_buffer(buffer: &mut [f32], gain: f32) {
    if gain == 0.0 {
        clear_buffer(buffer);
    } else if gain != 1.0 {
        for sample in buffer.iter_mut() {
            *sample *= gain;
        }
    }
}

/// Add `source` into `dest`, scaled by `gain`. Both buffers must have the same layout.
#[inline]
pub fn add_buffers_with_gain(dest: &mut [f32], source: &[f32], gain: f32) {
    debug_assert_eq!(dest.len(), source.len(), "Buffer layouts must match");
    if gain == 1.0 {
        for (d, s) in dest.iter_mut().zip(source) {
            *d += *s;
        }
    } else if gain != 0.0 {
        for (d, s) in dest.iter_mut().zip(source) {
            *d += *s * gain;
        }
    }
}

/// Hard-clip all samples to the range [-1, 1]. NaN values are replaced with silence.
#[inline]
pub fn clip_buffer(buffer: &mut [f32]) {
    for sample in buffer.iter_mut() {
        *sample = if sample.is_nan() {
            0.0
        } else {
            sample.clamp(-1.0, 1.0)
        };
    }
}

// -------------------------------------------------------------------------------------------------

/// Access an interleaved stereo buffer as frames.
pub trait StereoFrames {
    fn stereo_frames(&self) -> std::slice::ChunksExact<'_, f32>;
}

/// Access a mutable interleaved stereo buffer as frames.
pub trait StereoFramesMut {
    fn stereo_frames_mut(&mut self) -> std::slice::ChunksExactMut<'_, f32>;
}

impl StereoFrames for [f32] {
    fn stereo_frames(&self) -> std::slice::ChunksExact<'_, f32> {
        debug_assert!(self.len() % 2 == 0, "Expecting an interleaved stereo buffer");
        self.chunks_exact(2)
    }
}

impl StereoFramesMut for [f32] {
    fn stereo_frames_mut(&mut self) -> std::slice::ChunksExactMut<'_, f32> {
        debug_assert!(self.len() % 2 == 0, "Expecting an interleaved stereo buffer");
        self.chunks_exact_mut(2)
    }
}

// -------------------------------------------------------------------------------------------------
