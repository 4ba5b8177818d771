//! Self-contained sources for recording without a hooked application.

use log::debug;
use std::f32::consts::PI;
use std::time::Duration;

use super::{AudioChunk, AudioFormat, AudioSource, FramePull, FrameSource, SampleFormat};
use crate::capture::{CaptureSwitch, FramePacer};
use crate::error::Result;
use crate::utils::sos::SignalOfStop;

const COMPONENTS: usize = 4;

/// Animated color bars in packed 32-bit pixels, paced like a hooked
/// swap-buffers call.
///
/// Rows are written bottom-up, the way a GL read-back delivers them.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    /// Frames to deliver before the final short read, `None` for unbounded
    limit: Option<u64>,
    produced: u64,
    pacer: FramePacer,
    switch: CaptureSwitch,
    sos: SignalOfStop,
    poll: Duration,
}

impl TestPatternSource {
    pub fn new(
        width: u32,
        height: u32,
        pacer: FramePacer,
        switch: CaptureSwitch,
        sos: SignalOfStop,
    ) -> Self {
        let poll = (pacer.interval() / 4).max(Duration::from_micros(250));
        Self {
            width,
            height,
            limit: None,
            produced: 0,
            pacer,
            switch,
            sos,
            poll,
        }
    }

    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    fn render(&self, buffer: &mut [u8]) {
        let w = self.width as usize;
        let h = self.height as usize;
        let shift = (self.produced as usize * 4) % w.max(1);
        for (row, line) in buffer.chunks_exact_mut(w * COMPONENTS).take(h).enumerate() {
            // bottom-up: first row in memory is the bottom of the picture
            let y = h - 1 - row;
            for (x, px) in line.chunks_exact_mut(COMPONENTS).enumerate() {
                let bar = ((x + shift) % w) * 8 / w.max(1);
                px[0] = if bar & 1 != 0 { 0xff } else { 0x10 };
                px[1] = if bar & 2 != 0 { 0xff } else { 0x10 };
                px[2] = if bar & 4 != 0 { 0xff } else { 0x10 };
                px[3] = (y * 255 / h.max(1)) as u8;
            }
        }
    }
}

impl FrameSource for TestPatternSource {
    fn resolution(&mut self) -> Result<(u32, u32)> {
        Ok((self.width, self.height))
    }

    fn pull_frame(&mut self, buffer: &mut [u8]) -> Result<FramePull> {
        let exhausted = self.limit.is_some_and(|limit| self.produced >= limit);
        if exhausted {
            return Ok(FramePull {
                bytes_filled: 0,
                timestamp: self.pacer.now(),
            });
        }

        while !self.pacer.capture_ready(&self.switch) {
            if self.sos.wait_timeout(self.poll) {
                debug!("Test pattern stopped after {} frames", self.produced);
                return Ok(FramePull {
                    bytes_filled: 0,
                    timestamp: self.pacer.now(),
                });
            }
        }

        let timestamp = self.pacer.now();
        let size = self.width as usize * self.height as usize * COMPONENTS;
        let filled = size.min(buffer.len());
        self.render(&mut buffer[..filled]);
        self.produced += 1;

        Ok(FramePull {
            bytes_filled: filled,
            timestamp,
        })
    }
}

/// Endless 440 Hz stereo sine tone.
pub struct ToneSource {
    sample_rate: u32,
    chunk_frames: usize,
    t: f32,
    tincr: f32,
}

impl ToneSource {
    pub fn new(sample_rate: u32, chunk_frames: usize) -> Self {
        Self {
            sample_rate,
            chunk_frames,
            t: 0.0,
            tincr: 2.0 * PI * 440.0 / sample_rate as f32,
        }
    }
}

impl AudioSource for ToneSource {
    fn format(&mut self) -> Result<AudioFormat> {
        Ok(AudioFormat {
            channels: 2,
            sample_rate: self.sample_rate,
            sample_format: SampleFormat::F32,
        })
    }

    fn pull_samples(&mut self) -> Result<AudioChunk> {
        let mut samples = Vec::with_capacity(self.chunk_frames * 2);
        for _ in 0..self.chunk_frames {
            let v = self.t.sin() * 0.5;
            samples.push(v);
            samples.push(v);
            self.t += self.tincr;
            if self.t > 2.0 * PI {
                self.t -= 2.0 * PI;
            }
        }
        Ok(AudioChunk::from_f32(&samples, 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_ends_with_short_read() {
        let pacer = FramePacer::with_interval(Duration::from_micros(500));
        let mut source = TestPatternSource::new(
            16,
            8,
            pacer,
            CaptureSwitch::new(true),
            SignalOfStop::new(),
        )
        .with_limit(3);

        let mut buffer = vec![0u8; 16 * 8 * 4];
        let mut last = -1;
        for _ in 0..3 {
            let pull = source.pull_frame(&mut buffer).unwrap();
            assert_eq!(pull.bytes_filled, buffer.len());
            assert!(pull.timestamp >= last);
            last = pull.timestamp;
        }
        let pull = source.pull_frame(&mut buffer).unwrap();
        assert!(pull.bytes_filled < buffer.len());
    }

    #[test]
    fn test_pattern_stops_on_signal() {
        let sos = SignalOfStop::new();
        // capture switched off: the source would wait forever
        let mut source = TestPatternSource::new(
            4,
            4,
            FramePacer::new(60),
            CaptureSwitch::new(false),
            sos.clone(),
        );
        sos.cancel();
        let mut buffer = vec![0u8; 4 * 4 * 4];
        assert_eq!(source.pull_frame(&mut buffer).unwrap().bytes_filled, 0);
    }

    #[test]
    fn test_tone_is_continuous_stereo() {
        let mut tone = ToneSource::new(48_000, 256);
        let format = tone.format().unwrap();
        assert_eq!(format.channels, 2);
        let chunk = tone.pull_samples().unwrap();
        assert_eq!(chunk.frames, 256);
        assert_eq!(chunk.data.len(), 256 * format.bytes_per_frame());

        let left = f32::from_ne_bytes(chunk.data[0..4].try_into().unwrap());
        let right = f32::from_ne_bytes(chunk.data[4..8].try_into().unwrap());
        assert_eq!(left, right);
        assert_eq!(left, 0.0);
    }
}
