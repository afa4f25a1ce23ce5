use std::{fs::File, io::BufWriter, path::Path, time::Duration};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::{config::CHANNEL_COUNT, error::Error, mixer::GrainMixer};

// -------------------------------------------------------------------------------------------------

/// Offline output which renders a [`GrainMixer`] into a wav file instead of playing it back.
///
/// The mixer is pulled quantum by quantum on the calling thread, so rendering runs as fast as
/// the engine can produce audio. Wav file contents are always saved as 32bit float stereo.
pub struct WavOutput {
    writer: Option<WavWriter<BufWriter<File>>>,
    sample_rate: u32,
    frames_written: u64,
}

impl WavOutput {
    /// Create a new wav file at the given path, using the given sample rate.
    ///
    /// * `file_path`: Target file path. Should end with ".wav" extension.
    /// * `sample_rate`: Should match the sample rate of the mixer that gets rendered.
    pub fn open<P: AsRef<Path>>(file_path: P, sample_rate: u32) -> Result<Self, Error> {
        let spec = WavSpec {
            channels: CHANNEL_COUNT as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(file_path, spec)
            .map_err(|err| Error::OutputDeviceError(Box::new(err)))?;
        Ok(Self {
            writer: Some(writer),
            sample_rate,
            frames_written: 0,
        })
    }

    /// Sample rate of the written file.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of stereo frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Duration of the audio written so far.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames_written as f64 / self.sample_rate as f64)
    }

    /// Render the given number of quanta from the mixer and append them to the file.
    pub fn render(&mut self, mixer: &mut GrainMixer, quantum_count: usize) -> Result<(), Error> {
        if mixer.config().sample_rate != self.sample_rate {
            return Err(Error::ConfigError(format!(
                "Mixer sample rate {} does not match the wav file's sample rate {}",
                mixer.config().sample_rate,
                self.sample_rate
            )));
        }
        for _ in 0..quantum_count {
            let output = mixer.render_quantum();
            Self::write_samples(&mut self.writer, output)?;
            self.frames_written += (output.len() / CHANNEL_COUNT) as u64;
        }
        Ok(())
    }

    /// Render the mixer until at least the given duration got written.
    pub fn render_for(&mut self, mixer: &mut GrainMixer, duration: Duration) -> Result<(), Error> {
        let quantum_seconds = mixer.config().quantum_duration().as_secs_f64();
        let remaining = duration.saturating_sub(self.duration()).as_secs_f64();
        let quantum_count = (remaining / quantum_seconds).ceil() as usize;
        self.render(mixer, quantum_count)
    }

    /// Flush and close the file. Called automatically on drop, but errors are then only logged.
    pub fn finalize(mut self) -> Result<(), Error> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .map_err(|err| Error::OutputDeviceError(Box::new(err)))?;
        }
        Ok(())
    }

    fn write_samples(
        writer: &mut Option<WavWriter<BufWriter<File>>>,
        samples: &[f32],
    ) -> Result<(), Error> {
        let writer = writer.as_mut().ok_or_else(|| {
            Error::OutputDeviceError("Wav file got already finalized".to_string().into())
        })?;
        for sample in samples {
            writer
                .write_sample(*sample)
                .map_err(|err| Error::OutputDeviceError(Box::new(err)))?;
        }
        Ok(())
    }
}

impl Drop for WavOutput {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(err) = writer.finalize() {
                log::error!("Failed to finalize WAV file: {err}");
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
