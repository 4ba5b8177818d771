//! Fixed-size planar audio frames from opportunistically sized chunks.

use log::warn;

use crate::error::{Error, Result};
use crate::source::{AudioChunk, AudioFormat, AudioSource, SampleFormat};

/// Encoders always receive stereo
pub const OUTPUT_CHANNELS: usize = 2;

const I16_TO_F32: f32 = 1.0 / 32_768.0;
const I32_TO_F32: f32 = 1.0 / 2_147_483_648.0;

/// Planar f32 stereo block of exactly `samples()` samples per channel.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub planes: [Vec<f32>; OUTPUT_CHANNELS],
    pub sample_rate: u32,
    /// Presentation timestamp in samples
    pub pts: i64,
}

impl AudioFrame {
    pub fn new(samples: usize, sample_rate: u32) -> Self {
        Self {
            planes: [vec![0.0; samples], vec![0.0; samples]],
            sample_rate,
            pts: 0,
        }
    }

    pub fn samples(&self) -> usize {
        self.planes[0].len()
    }
}

/// Outcome of filling one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    /// Samples per channel taken from the source
    pub from_source: usize,
    /// Whether the source ran dry and the rest of the frame is silence
    pub underrun: bool,
}

/// Turns one interleaved chunk into a plane of f32 samples per source channel.
pub trait SampleConverter: Send {
    /// Replace the contents of `planes`, one entry per source channel, with
    /// the `chunk.frames` samples of `chunk`.
    fn convert(&mut self, chunk: &AudioChunk, planes: &mut [Vec<f32>]) -> Result<()>;
}

/// Decodes interleaved PCM without any native library.
pub struct PcmConverter {
    format: AudioFormat,
}

impl PcmConverter {
    pub fn new(format: AudioFormat) -> Self {
        Self { format }
    }
}

impl SampleConverter for PcmConverter {
    fn convert(&mut self, chunk: &AudioChunk, planes: &mut [Vec<f32>]) -> Result<()> {
        let channels = planes.len();
        let width = self.format.sample_format.bytes_per_sample();
        for plane in planes.iter_mut() {
            plane.clear();
        }

        let samples = chunk.data.chunks_exact(width).take(chunk.frames * channels);
        for (i, bytes) in samples.enumerate() {
            planes[i % channels].push(decode(self.format.sample_format, bytes));
        }
        Ok(())
    }
}

#[inline]
fn decode(format: SampleFormat, b: &[u8]) -> f32 {
    match format {
        SampleFormat::F32 => f32::from_ne_bytes([b[0], b[1], b[2], b[3]]),
        SampleFormat::S32 => i32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as f32 * I32_TO_F32,
        SampleFormat::S16 => i16::from_ne_bytes([b[0], b[1]]) as f32 * I16_TO_F32,
    }
}

/// Cuts interleaved source chunks into encoder-sized planar frames.
///
/// A chunk can span several frames and a frame several chunks; the framer
/// remembers how far into the current chunk it got. Mono is duplicated to
/// both sides and anything past the first two channels is dropped.
pub struct AudioFramer {
    format: AudioFormat,
    converter: Box<dyn SampleConverter>,
    /// Current chunk, one plane per source channel
    planes: Vec<Vec<f32>>,
    used: usize,
}

impl AudioFramer {
    pub fn new(format: AudioFormat, converter: Box<dyn SampleConverter>) -> Result<Self> {
        format.check()?;
        Ok(Self {
            planes: vec![Vec::new(); format.channels as usize],
            format,
            converter,
            used: 0,
        })
    }

    fn available(&self) -> usize {
        self.planes[0].len()
    }

    /// Overwrite every sample of `frame`, pulling new chunks as needed.
    pub fn fill(&mut self, source: &mut dyn AudioSource, frame: &mut AudioFrame) -> Result<Fill> {
        let needed = frame.samples();
        let mut filled = 0;

        while filled < needed {
            if self.used >= self.available() {
                self.used = 0;
                let chunk = source.pull_samples()?;
                if chunk.is_underrun() {
                    for plane in self.planes.iter_mut() {
                        plane.clear();
                    }
                    for plane in frame.planes.iter_mut() {
                        plane[filled..].fill(0.0);
                    }
                    return Ok(Fill {
                        from_source: filled,
                        underrun: true,
                    });
                }
                self.check_chunk(&chunk)?;
                self.converter.convert(&chunk, &mut self.planes)?;
                if self.available() == 0 {
                    continue;
                }
            }

            let take = (self.available() - self.used).min(needed - filled);
            self.copy_planar(frame, filled, take);
            filled += take;
            self.used += take;
        }

        Ok(Fill {
            from_source: filled,
            underrun: false,
        })
    }

    fn check_chunk(&self, chunk: &AudioChunk) -> Result<()> {
        let expected = chunk.frames * self.format.bytes_per_frame();
        if chunk.data.len() < expected {
            warn!(
                "Audio chunk claims {} samples but carries {} bytes",
                chunk.frames,
                chunk.data.len()
            );
            return Err(Error::AudioSource(format!(
                "chunk of {} bytes is too small for {} samples",
                chunk.data.len(),
                chunk.frames
            )));
        }
        Ok(())
    }

    fn copy_planar(&self, frame: &mut AudioFrame, at: usize, count: usize) {
        let right = if self.planes.len() >= 2 { 1 } else { 0 };
        let range = self.used..self.used + count;
        frame.planes[0][at..at + count].copy_from_slice(&self.planes[0][range.clone()]);
        frame.planes[1][at..at + count].copy_from_slice(&self.planes[right][range]);
    }
}
