//! Live triggers: grain onsets detected in an external input signal.

use rb::{Consumer, Producer, RbConsumer, RbProducer, SpscRb, RB};

use crate::{
    utils::{
        dsp::filters::biquad::{BiquadFilter, BiquadFilterCoefficients, BiquadFilterType},
        linear_to_db,
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

/// A grain onset, detected by a [`TriggerProcessor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerOnset {
    /// Sample frame offset of the onset in the processed block.
    pub frame: usize,
    /// Optional amplitude in dB, which overrides the next grain's sampled amplitude.
    pub level_db: Option<f32>,
}

// -------------------------------------------------------------------------------------------------

/// Detects grain onsets in blocks of a mono input signal.
///
/// NB: `process` is called in the real-time audio thread, so it must not block or allocate.
/// The onsets vector has a capacity of at least the block size.
pub trait TriggerProcessor: Send + 'static {
    /// A static name for the processor, used for logging.
    fn name(&self) -> &'static str;

    /// Called once, before the processor is used, in a non real-time thread.
    fn initialize(&mut self, sample_rate: u32, max_frames: usize) -> Result<(), Error>;

    /// Analyze the given input block and push detected onsets.
    fn process(&mut self, input: &[f32], onsets: &mut Vec<TriggerOnset>);
}

// -------------------------------------------------------------------------------------------------

/// Detects impulses by looking at a signal's level and the slope of the level.
///
/// An onset is reported when the level (in dB) is above the threshold and rises faster than the
/// slope threshold (in dB per ms). After an onset, further onsets are inhibited for the inhibit
/// time. The input can optionally be band-pass filtered before the level gets measured.
pub struct ImpulseTrigger {
    sample_rate: u32,
    threshold_db: f32,
    level_speed: f32,
    slope_threshold: f32,
    slope_speed: f32,
    inhibit_time: f32,
    copy_amplitude: bool,
    amplitude_boost_db: f32,
    bandpass: Option<(f32, f32)>,
    // runtime state
    filter_coefficients: BiquadFilterCoefficients,
    filter: BiquadFilter,
    level: f32,
    level_db: f32,
    slope: f32,
    level_coeff: f32,
    slope_coeff: f32,
    inhibit_frames: usize,
    inhibit_countdown: usize,
}

impl Default for ImpulseTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl ImpulseTrigger {
    pub const NAME: &'static str = "ImpulseTrigger";

    const LEVEL_FLOOR_DB: f32 = -120.0;

    pub fn new() -> Self {
        Self {
            sample_rate: 44100,
            threshold_db: -30.0,
            level_speed: 0.005,
            slope_threshold: 0.5,
            slope_speed: 0.002,
            inhibit_time: 0.05,
            copy_amplitude: false,
            amplitude_boost_db: 0.0,
            bandpass: None,
            filter_coefficients: BiquadFilterCoefficients::default(),
            filter: BiquadFilter::new(),
            level: 0.0,
            level_db: Self::LEVEL_FLOOR_DB,
            slope: 0.0,
            level_coeff: 0.0,
            slope_coeff: 0.0,
            inhibit_frames: 0,
            inhibit_countdown: 0,
        }
    }

    /// Level threshold in dB and the level follower's time constant in seconds.
    pub fn with_threshold(mut self, threshold_db: f32, speed: f32) -> Self {
        self.threshold_db = threshold_db;
        self.level_speed = speed.max(0.0);
        self
    }

    /// Slope threshold in dB/ms and the slope follower's time constant in seconds.
    pub fn with_slope_threshold(mut self, threshold: f32, speed: f32) -> Self {
        self.slope_threshold = threshold;
        self.slope_speed = speed.max(0.0);
        self
    }

    /// Minimum time in seconds between two onsets.
    pub fn with_inhibit_time(mut self, inhibit_time: f32) -> Self {
        self.inhibit_time = inhibit_time.max(0.0);
        self
    }

    /// Pass the detected level plus the given boost in dB as grain amplitude.
    pub fn with_copy_amplitude(mut self, boost_db: f32) -> Self {
        self.copy_amplitude = true;
        self.amplitude_boost_db = boost_db;
        self
    }

    /// Band-pass filter the input with the given center frequency (Hz) and Q.
    pub fn with_bandpass(mut self, frequency: f32, q: f32) -> Self {
        self.bandpass = Some((frequency, q));
        self
    }

    fn time_coefficient(time: f32, sample_rate: u32) -> f32 {
        if time > 0.0 {
            (-1.0 / (time * sample_rate as f32)).exp()
        } else {
            0.0
        }
    }
}

impl TriggerProcessor for ImpulseTrigger {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initialize(&mut self, sample_rate: u32, _max_frames: usize) -> Result<(), Error> {
        self.sample_rate = sample_rate;
        if let Some((frequency, q)) = self.bandpass {
            self.filter_coefficients.set(
                BiquadFilterType::Bandpass,
                sample_rate,
                frequency,
                q,
                0.0,
            )?;
        }
        self.filter.reset();
        self.level_coeff = Self::time_coefficient(self.level_speed, sample_rate);
        self.slope_coeff = Self::time_coefficient(self.slope_speed, sample_rate);
        self.inhibit_frames = (self.inhibit_time * sample_rate as f32) as usize;
        self.level = 0.0;
        self.level_db = Self::LEVEL_FLOOR_DB;
        self.slope = 0.0;
        self.inhibit_countdown = 0;
        Ok(())
    }

    fn process(&mut self, input: &[f32], onsets: &mut Vec<TriggerOnset>) {
        let frames_per_ms = self.sample_rate as f32 / 1000.0;
        for (frame, sample) in input.iter().enumerate() {
            let sample = if self.bandpass.is_some() {
                self.filter
                    .process_sample(&self.filter_coefficients, *sample as f64) as f32
            } else {
                *sample
            };
            let rectified = sample.abs();
            self.level = rectified + self.level_coeff * (self.level - rectified);
            let level_db = linear_to_db(self.level).max(Self::LEVEL_FLOOR_DB);
            let slope = (level_db - self.level_db) * frames_per_ms;
            self.level_db = level_db;
            self.slope = slope + self.slope_coeff * (self.slope - slope);

            if self.inhibit_countdown > 0 {
                self.inhibit_countdown -= 1;
            } else if level_db > self.threshold_db && self.slope > self.slope_threshold {
                let level_db = self
                    .copy_amplitude
                    .then_some(level_db + self.amplitude_boost_db);
                if onsets.len() < onsets.capacity() {
                    onsets.push(TriggerOnset { frame, level_db });
                }
                self.inhibit_countdown = self.inhibit_frames;
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Control side of a ring buffer fed [`LiveTrigger`]: pushes mono input samples from
/// e.g. an audio input callback into the trigger.
pub struct LiveInput {
    producer: Producer<f32>,
}

impl LiveInput {
    /// Write as many of the given samples as fit into the ring buffer. Samples which don't fit
    /// get dropped. Returns the number of written samples.
    pub fn write(&self, samples: &[f32]) -> usize {
        if samples.is_empty() {
            return 0;
        }
        self.producer.write(samples).unwrap_or(0)
    }
}

// -------------------------------------------------------------------------------------------------

enum TriggerInput {
    RingBuffer(Consumer<f32>),
    Wave {
        samples: Vec<f32>,
        position: usize,
        looping: bool,
    },
}

/// Feeds blocks of an input signal into a [`TriggerProcessor`].
///
/// The input either comes from a ring buffer, filled via a [`LiveInput`], or from a wave
/// buffer which is played once or looped. Input is collected until a full block of the
/// stream's quantum size is available, then the processor runs on the block.
pub struct LiveTrigger {
    input: TriggerInput,
    processor: Box<dyn TriggerProcessor>,
    buffer: Vec<f32>,
    filled: usize,
}

impl LiveTrigger {
    /// Create a new trigger, which reads its input from a new ring buffer with the given
    /// capacity in samples. Returns the trigger and the ring buffer's producer.
    pub fn with_ring_buffer<P: TriggerProcessor>(
        processor: P,
        capacity: usize,
    ) -> (Self, LiveInput) {
        let ring_buffer = SpscRb::new(capacity.max(1));
        let producer = ring_buffer.producer();
        let consumer = ring_buffer.consumer();
        (
            Self::new(TriggerInput::RingBuffer(consumer), processor),
            LiveInput { producer },
        )
    }

    /// Create a new trigger, which reads its input from the given wave samples.
    pub fn with_wave<P: TriggerProcessor>(processor: P, samples: Vec<f32>, looping: bool) -> Self {
        Self::new(
            TriggerInput::Wave {
                samples,
                position: 0,
                looping,
            },
            processor,
        )
    }

    fn new<P: TriggerProcessor>(input: TriggerInput, processor: P) -> Self {
        Self {
            input,
            processor: Box::new(processor),
            buffer: Vec::new(),
            filled: 0,
        }
    }

    pub fn processor_name(&self) -> &'static str {
        self.processor.name()
    }

    /// Allocate the block buffer and initialize the processor.
    pub(crate) fn initialize(&mut self, sample_rate: u32, block_frames: usize) -> Result<(), Error> {
        self.processor.initialize(sample_rate, block_frames)?;
        self.buffer = vec![0.0; block_frames];
        self.filled = 0;
        Ok(())
    }

    /// Pull available input. When a full block got collected, run the processor on it and
    /// return true.
    pub(crate) fn process(&mut self, onsets: &mut Vec<TriggerOnset>) -> bool {
        if self.buffer.is_empty() {
            return false;
        }
        let target = &mut self.buffer[self.filled..];
        let read = match &mut self.input {
            TriggerInput::RingBuffer(consumer) => consumer.read(target).unwrap_or(0),
            TriggerInput::Wave {
                samples,
                position,
                looping,
            } => {
                let mut read = 0;
                while read < target.len() {
                    if *position >= samples.len() {
                        if *looping && !samples.is_empty() {
                            *position = 0;
                        } else {
                            // one-shot waves continue with silence
                            target[read..].fill(0.0);
                            read = target.len();
                            break;
                        }
                    }
                    let count = (samples.len() - *position).min(target.len() - read);
                    target[read..read + count]
                        .copy_from_slice(&samples[*position..*position + count]);
                    *position += count;
                    read += count;
                }
                read
            }
        };
        self.filled += read;
        if self.filled < self.buffer.len() {
            return false;
        }
        self.filled = 0;
        self.processor.process(&self.buffer, onsets);
        true
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn burst(silence: usize, length: usize, level: f32) -> Vec<f32> {
        let mut samples = vec![0.0; silence];
        samples.extend((0..length).map(|i| if i % 2 == 0 { level } else { -level }));
        samples
    }

    #[test]
    fn impulse_detection() {
        let mut trigger = ImpulseTrigger::new().with_copy_amplitude(6.0);
        trigger.initialize(44100, 1024).unwrap();
        let mut onsets = Vec::with_capacity(1024);
        trigger.process(&burst(256, 768, 0.5), &mut onsets);
        assert_eq!(onsets.len(), 1, "{onsets:?}");
        assert!((256..256 + 64).contains(&onsets[0].frame), "{onsets:?}");
        let level_db = onsets[0].level_db.unwrap();
        assert!(level_db > -30.0 + 6.0 && level_db <= 0.0, "{level_db}");

        // a sustained signal does not retrigger
        onsets.clear();
        trigger.process(&burst(0, 1024, 0.5), &mut onsets);
        assert!(onsets.is_empty(), "{onsets:?}");

        // quiet signals do not trigger
        let mut trigger = ImpulseTrigger::new();
        trigger.initialize(44100, 1024).unwrap();
        trigger.process(&burst(256, 768, 0.001), &mut onsets);
        assert!(onsets.is_empty());
    }

    #[test]
    fn inhibit_time() {
        let mut trigger = ImpulseTrigger::new().with_inhibit_time(0.0);
        trigger.initialize(1000, 1024).unwrap();
        let mut onsets = Vec::with_capacity(1024);
        let mut input = burst(100, 10, 1.0);
        input.extend(burst(400, 10, 1.0));
        trigger.process(&input, &mut onsets);
        assert!(onsets.len() >= 2, "{onsets:?}");
        assert!(onsets.iter().all(|onset| onset.level_db.is_none()));
    }

    #[test]
    fn ring_buffer_input() {
        let (mut trigger, input) = LiveTrigger::with_ring_buffer(ImpulseTrigger::new(), 4096);
        trigger.initialize(44100, 512).unwrap();
        let mut onsets = Vec::with_capacity(512);

        // not enough input yet
        assert_eq!(input.write(&burst(300, 0, 0.0)), 300);
        assert!(!trigger.process(&mut onsets));
        // completes the block
        assert_eq!(input.write(&burst(0, 212, 0.5)), 212);
        assert!(trigger.process(&mut onsets));
        assert_eq!(onsets.len(), 1);
        assert!(onsets[0].frame >= 300);
    }

    #[test]
    fn wave_input() {
        let wave = burst(100, 28, 0.8);
        let mut trigger = LiveTrigger::with_wave(
            ImpulseTrigger::new().with_inhibit_time(0.001),
            wave.clone(),
            true,
        );
        trigger.initialize(44100, 256).unwrap();
        let mut onsets = Vec::with_capacity(256);
        assert!(trigger.process(&mut onsets));
        // looped twice through the 128 samples long wave
        assert_eq!(onsets.len(), 2, "{onsets:?}");

        let mut trigger = LiveTrigger::with_wave(ImpulseTrigger::new(), wave, false);
        trigger.initialize(44100, 256).unwrap();
        onsets.clear();
        assert!(trigger.process(&mut onsets));
        assert_eq!(onsets.len(), 1);
        onsets.clear();
        assert!(trigger.process(&mut onsets));
        assert!(onsets.is_empty());
    }
}
