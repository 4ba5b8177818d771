//! Collaborator contracts for the capture side.
//!
//! The recorder never talks to a graphics API or an audio device directly;
//! it pulls raw pixels and samples through these traits.

pub mod synthetic;

use bytes::Bytes;

use crate::error::{Error, Result};

pub use synthetic::{TestPatternSource, ToneSource};

/// Result of a single frame pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePull {
    /// Bytes written into the caller's buffer. Fewer than the buffer's
    /// capacity marks the final read.
    pub bytes_filled: usize,
    /// Capture timestamp in microseconds since capture start
    pub timestamp: i64,
}

/// Source of raw packed RGBA/BGRA frames.
pub trait FrameSource: Send {
    /// Resolution of every frame this source will deliver.
    fn resolution(&mut self) -> Result<(u32, u32)>;

    /// Block until the next frame is available and copy it into `buffer`.
    fn pull_frame(&mut self, buffer: &mut [u8]) -> Result<FramePull>;
}

/// Sample encoding of interleaved source audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    S16,
    S32,
    F32,
}

impl SampleFormat {
    /// Width of one sample in bits
    pub fn sample_width(&self) -> u32 {
        match self {
            SampleFormat::S16 => 16,
            SampleFormat::S32 | SampleFormat::F32 => 32,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.sample_width() as usize / 8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub sample_format: SampleFormat,
}

impl AudioFormat {
    /// Bytes taken by one sample of every channel
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.sample_format.bytes_per_sample()
    }

    pub fn check(&self) -> Result<()> {
        if self.channels == 0 || self.sample_rate == 0 {
            return Err(Error::AudioSource(format!(
                "unusable audio format: {} channels at {} Hz",
                self.channels, self.sample_rate
            )));
        }
        Ok(())
    }
}

/// A batch of interleaved samples as delivered by the audio source.
#[derive(Debug, Clone, Default)]
pub struct AudioChunk {
    pub data: Bytes,
    /// Samples per channel; zero means the source had nothing ready
    pub frames: usize,
}

impl AudioChunk {
    pub fn new(data: Bytes, frames: usize) -> Self {
        Self { data, frames }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_f32(samples: &[f32], channels: u16) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 4);
        for sample in samples {
            data.extend_from_slice(&sample.to_ne_bytes());
        }
        Self::new(Bytes::from(data), samples.len() / channels.max(1) as usize)
    }

    pub fn is_underrun(&self) -> bool {
        self.frames == 0
    }
}

/// Source of raw interleaved audio.
pub trait AudioSource: Send {
    fn format(&mut self) -> Result<AudioFormat>;

    /// Take whatever samples are ready. An empty chunk is an underrun, not
    /// the end of the stream.
    fn pull_samples(&mut self) -> Result<AudioChunk>;
}
