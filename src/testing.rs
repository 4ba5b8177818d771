//! Deterministic collaborators for exercising sessions without native codecs.

use bytes::Bytes;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::config::{AudioSettings, VideoSettings};
use crate::convert::{AudioFrame, VideoFrame};
use crate::encoder::{AudioEncoder, Backend, Encoder, Received, VideoEncoder};
use crate::error::{Error, Result};
use crate::mux::Muxer;
use crate::pipeline::types::{EncodedPacket, MediaKind, TimeBase, compare_ts};
use crate::source::{AudioChunk, AudioFormat, AudioSource, FramePull, FrameSource, SampleFormat};

/// Everything the fakes observed, shared with the test after the session is
/// consumed.
#[derive(Debug, Default)]
pub struct Trace {
    pub video_sent: Vec<i64>,
    /// Top-left luma sample of every video frame sent
    pub video_luma: Vec<u8>,
    /// (pts, samples, trailing silent samples)
    pub audio_sent: Vec<(i64, usize, usize)>,
    pub flushes: Vec<MediaKind>,
    pub headers: usize,
    pub trailers: usize,
    pub packets: Vec<EncodedPacket>,
    /// Release order of encoders and muxer
    pub released: Vec<&'static str>,
}

pub type SharedTrace = Arc<Mutex<Trace>>;

pub fn trace() -> SharedTrace {
    Arc::new(Mutex::new(Trace::default()))
}

impl Trace {
    pub fn packets_of(&self, stream_index: usize) -> Vec<&EncodedPacket> {
        self.packets
            .iter()
            .filter(|p| p.stream_index == stream_index)
            .collect()
    }
}

/// Frame source yielding `frames` full frames at `fps`, then a half-filled
/// buffer. Frames are flat gray unless `pixel` is set.
pub struct ScriptedFrames {
    pub resolution: Option<(u32, u32)>,
    pub pixel: Option<[u8; 4]>,
    /// Pull index from which timestamps restart at zero
    pub rewind_at: Option<u64>,
    pub frames: u64,
    pub fps: i64,
    pulled: u64,
}

impl ScriptedFrames {
    pub fn new(width: u32, height: u32, frames: u64, fps: i64) -> Self {
        Self {
            resolution: Some((width, height)),
            pixel: None,
            rewind_at: None,
            frames,
            fps,
            pulled: 0,
        }
    }
}

impl FrameSource for ScriptedFrames {
    fn resolution(&mut self) -> Result<(u32, u32)> {
        self.resolution
            .ok_or_else(|| Error::FrameSource("no resolution reported".into()))
    }

    fn pull_frame(&mut self, buffer: &mut [u8]) -> Result<FramePull> {
        let i = self.pulled as i64;
        let clock = match self.rewind_at {
            Some(at) if self.pulled >= at => i - at as i64,
            _ => i,
        };
        self.pulled += 1;
        let bytes_filled = if self.pulled <= self.frames {
            match self.pixel {
                Some(px) => buffer
                    .chunks_exact_mut(4)
                    .for_each(|dst| dst.copy_from_slice(&px)),
                None => buffer.fill((i % 256) as u8),
            }
            buffer.len()
        } else {
            buffer.len() / 2
        };
        Ok(FramePull {
            bytes_filled,
            timestamp: clock * 1_000_000 / self.fps,
        })
    }
}

/// Stereo f32 source returning fixed-size chunks of a constant level.
/// With `underrun_every = Some(n)`, every n-th pull comes back empty.
pub struct ScriptedAudio {
    pub sample_rate: u32,
    pub chunk_frames: usize,
    pub underrun_every: Option<usize>,
    pub fail_format: bool,
    pulls: usize,
}

impl ScriptedAudio {
    pub fn new(sample_rate: u32, chunk_frames: usize) -> Self {
        Self {
            sample_rate,
            chunk_frames,
            underrun_every: None,
            fail_format: false,
            pulls: 0,
        }
    }
}

impl AudioSource for ScriptedAudio {
    fn format(&mut self) -> Result<AudioFormat> {
        if self.fail_format {
            return Err(Error::AudioSource("device disconnected".into()));
        }
        Ok(AudioFormat {
            channels: 2,
            sample_rate: self.sample_rate,
            sample_format: SampleFormat::F32,
        })
    }

    fn pull_samples(&mut self) -> Result<AudioChunk> {
        self.pulls += 1;
        if self.underrun_every.is_some_and(|n| self.pulls % n == 0) {
            return Ok(AudioChunk::empty());
        }
        Ok(AudioChunk::from_f32(&vec![0.25; self.chunk_frames * 2], 2))
    }
}

/// Encoder core holding back `latency` packets until flushed.
struct Delay {
    kind: MediaKind,
    latency: usize,
    time_base: TimeBase,
    queue: VecDeque<i64>,
    flushed: bool,
    emitted: usize,
    fail_on_frame: Option<usize>,
    received: usize,
}

impl Delay {
    fn new(kind: MediaKind, latency: usize, time_base: TimeBase) -> Self {
        Self {
            kind,
            latency,
            time_base,
            queue: VecDeque::new(),
            flushed: false,
            emitted: 0,
            fail_on_frame: None,
            received: 0,
        }
    }

    fn push(&mut self, pts: Option<i64>) -> Result<()> {
        if self.flushed {
            return Err(Error::Encode {
                kind: self.kind,
                reason: "input after flush".into(),
            });
        }
        match pts {
            Some(pts) => {
                self.received += 1;
                if self.fail_on_frame == Some(self.received) {
                    return Err(Error::Encode {
                        kind: self.kind,
                        reason: "injected failure".into(),
                    });
                }
                self.queue.push_back(pts);
            }
            None => self.flushed = true,
        }
        Ok(())
    }

    fn receive(&mut self) -> Received {
        if self.queue.len() > self.latency || (self.flushed && !self.queue.is_empty()) {
            let pts = self.queue.pop_front().unwrap_or_default();
            self.emitted += 1;
            let packet = EncodedPacket::new(
                Bytes::copy_from_slice(&pts.to_le_bytes()),
                Some(pts),
                Some(pts),
                self.time_base,
            )
            .with_key_flag(self.emitted == 1);
            Received::Packet(packet)
        } else if self.flushed {
            Received::EndOfStream
        } else {
            Received::NotReady
        }
    }
}

pub struct FakeVideoEncoder {
    inner: Delay,
    trace: SharedTrace,
}

impl Encoder for FakeVideoEncoder {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn time_base(&self) -> TimeBase {
        self.inner.time_base
    }

    fn try_receive(&mut self) -> Result<Received> {
        Ok(self.inner.receive())
    }
}

impl VideoEncoder for FakeVideoEncoder {
    fn send(&mut self, frame: Option<&VideoFrame>) -> Result<()> {
        let mut trace = self.trace.lock().unwrap();
        match frame {
            Some(frame) => {
                trace.video_sent.push(frame.pts);
                trace.video_luma.push(frame.planes[0][0]);
            }
            None => trace.flushes.push(MediaKind::Video),
        }
        self.inner.push(frame.map(|f| f.pts))
    }
}

impl Drop for FakeVideoEncoder {
    fn drop(&mut self) {
        self.trace.lock().unwrap().released.push("video");
    }
}

pub struct FakeAudioEncoder {
    inner: Delay,
    frame_size: usize,
    trace: SharedTrace,
}

impl Encoder for FakeAudioEncoder {
    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    fn time_base(&self) -> TimeBase {
        self.inner.time_base
    }

    fn try_receive(&mut self) -> Result<Received> {
        Ok(self.inner.receive())
    }
}

impl AudioEncoder for FakeAudioEncoder {
    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn send(&mut self, frame: Option<&AudioFrame>) -> Result<()> {
        let mut trace = self.trace.lock().unwrap();
        match frame {
            Some(frame) => {
                let silent_tail = frame.planes[0]
                    .iter()
                    .zip(frame.planes[1].iter())
                    .rev()
                    .take_while(|(l, r)| **l == 0.0 && **r == 0.0)
                    .count();
                trace
                    .audio_sent
                    .push((frame.pts, frame.samples(), silent_tail));
            }
            None => trace.flushes.push(MediaKind::Audio),
        }
        self.inner.push(frame.map(|f| f.pts))
    }
}

impl Drop for FakeAudioEncoder {
    fn drop(&mut self) {
        self.trace.lock().unwrap().released.push("audio");
    }
}

/// Muxer recording packets and enforcing header/packet/trailer order and
/// dts order across streams.
pub struct MemoryMuxer {
    streams: Vec<TimeBase>,
    last_written: Option<(i64, TimeBase)>,
    header: bool,
    trailer: bool,
    fail_header: bool,
    fail_trailer: bool,
    trace: SharedTrace,
}

impl Muxer for MemoryMuxer {
    fn stream_count(&self) -> usize {
        self.streams.len()
    }

    fn write_header(&mut self) -> Result<()> {
        if self.fail_header {
            return Err(Error::Header("injected failure".into()));
        }
        if self.header {
            return Err(Error::Header("header written twice".into()));
        }
        self.header = true;
        self.trace.lock().unwrap().headers += 1;
        Ok(())
    }

    fn stream_time_base(&self, stream_index: usize) -> Result<TimeBase> {
        if !self.header {
            return Err(Error::ContainerSetup("time base queried before header".into()));
        }
        self.streams
            .get(stream_index)
            .copied()
            .ok_or_else(|| Error::ContainerSetup(format!("no stream {}", stream_index)))
    }

    fn write_packet(&mut self, packet: EncodedPacket) -> Result<()> {
        if !self.header || self.trailer {
            return Err(Error::Mux("packet outside header/trailer".into()));
        }
        if self.streams.get(packet.stream_index) != Some(&packet.time_base) {
            return Err(Error::Mux("packet not in its stream time base".into()));
        }
        if let Some(ts) = packet.ordering_ts() {
            if let Some((last, last_tb)) = self.last_written
                && compare_ts(ts, packet.time_base, last, last_tb) == Ordering::Less
            {
                return Err(Error::Mux(format!(
                    "stream {} packet at {} {} written after {} {}",
                    packet.stream_index, ts, packet.time_base, last, last_tb
                )));
            }
            self.last_written = Some((ts, packet.time_base));
        }
        self.trace.lock().unwrap().packets.push(packet);
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<()> {
        if !self.header || self.trailer {
            return Err(Error::Trailer("trailer out of order".into()));
        }
        if self.fail_trailer {
            return Err(Error::Trailer("injected failure".into()));
        }
        self.trailer = true;
        self.trace.lock().unwrap().trailers += 1;
        Ok(())
    }
}

impl Drop for MemoryMuxer {
    fn drop(&mut self) {
        self.trace.lock().unwrap().released.push("muxer");
    }
}

/// Backend handing out the fakes above.
pub struct FakeBackend {
    pub trace: SharedTrace,
    pub video_latency: usize,
    pub audio_latency: usize,
    pub audio_frame_size: usize,
    /// Container time base of the video stream
    pub video_stream_tb: TimeBase,
    pub fail_video_open: bool,
    pub fail_header: bool,
    pub fail_trailer: bool,
    pub fail_video_frame: Option<usize>,
    opened: Vec<TimeBase>,
}

impl FakeBackend {
    pub fn new(trace: SharedTrace) -> Self {
        Self {
            trace,
            video_latency: 3,
            audio_latency: 2,
            audio_frame_size: 1024,
            video_stream_tb: TimeBase::new(1, 90_000),
            fail_video_open: false,
            fail_header: false,
            fail_trailer: false,
            fail_video_frame: None,
            opened: Vec::new(),
        }
    }
}

impl Backend for FakeBackend {
    fn open_video(
        &mut self,
        _settings: &VideoSettings,
        _width: u32,
        _height: u32,
    ) -> Result<Box<dyn VideoEncoder>> {
        if self.fail_video_open {
            return Err(Error::CodecOpen {
                kind: MediaKind::Video,
                reason: "injected failure".into(),
            });
        }
        self.opened.push(self.video_stream_tb);
        let mut inner = Delay::new(MediaKind::Video, self.video_latency, TimeBase::MICROSECONDS);
        inner.fail_on_frame = self.fail_video_frame;
        Ok(Box::new(FakeVideoEncoder {
            inner,
            trace: self.trace.clone(),
        }))
    }

    fn open_audio(
        &mut self,
        _settings: &AudioSettings,
        format: &AudioFormat,
    ) -> Result<Box<dyn AudioEncoder>> {
        let tb = TimeBase::from_sample_rate(format.sample_rate);
        self.opened.push(tb);
        Ok(Box::new(FakeAudioEncoder {
            inner: Delay::new(MediaKind::Audio, self.audio_latency, tb),
            frame_size: self.audio_frame_size,
            trace: self.trace.clone(),
        }))
    }

    fn open_muxer(&mut self, _path: &Path, _container: &str) -> Result<Box<dyn Muxer>> {
        Ok(Box::new(MemoryMuxer {
            streams: std::mem::take(&mut self.opened),
            last_written: None,
            header: false,
            trailer: false,
            fail_header: self.fail_header,
            fail_trailer: self.fail_trailer,
            trace: self.trace.clone(),
        }))
    }
}
