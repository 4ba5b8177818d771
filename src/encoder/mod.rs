//! Encoder capability interface.
//!
//! Codecs are opaque, stateful transforms driven through a send/receive
//! protocol. Native adapters live behind the `ffmpeg` feature.

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
#[cfg(feature = "ffmpeg")]
pub(crate) mod frame_pool;

use std::path::Path;

use crate::config::{AudioSettings, VideoSettings};
use crate::convert::{AudioFrame, PcmConverter, SampleConverter, VideoFrame};
use crate::error::Result;
use crate::mux::Muxer;
use crate::pipeline::types::{EncodedPacket, MediaKind, TimeBase};
use crate::source::AudioFormat;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegBackend;

/// Outcome of asking an encoder for output.
#[derive(Debug)]
pub enum Received {
    /// A packet stamped in the encoder's time base
    Packet(EncodedPacket),
    /// Nothing ready until more input arrives
    NotReady,
    /// Flushed and fully drained
    EndOfStream,
}

/// Common half of the send/receive protocol.
pub trait Encoder: Send {
    fn kind(&self) -> MediaKind;

    /// Time base packets are stamped in when they leave the encoder
    fn time_base(&self) -> TimeBase;

    fn try_receive(&mut self) -> Result<Received>;
}

pub trait VideoEncoder: Encoder {
    /// Queue a frame, or signal end of input with `None`.
    fn send(&mut self, frame: Option<&VideoFrame>) -> Result<()>;
}

pub trait AudioEncoder: Encoder {
    /// Samples per channel every frame must carry
    fn frame_size(&self) -> usize;

    /// Queue a frame, or signal end of input with `None`.
    fn send(&mut self, frame: Option<&AudioFrame>) -> Result<()>;
}

/// Factory for the native side of a session.
///
/// Streams are registered with the muxer in the order the encoders were
/// opened.
pub trait Backend {
    fn open_video(
        &mut self,
        settings: &VideoSettings,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn VideoEncoder>>;

    fn open_audio(
        &mut self,
        settings: &AudioSettings,
        format: &AudioFormat,
    ) -> Result<Box<dyn AudioEncoder>>;

    fn open_muxer(&mut self, path: &Path, container: &str) -> Result<Box<dyn Muxer>>;

    /// Converter from the source's interleaved samples to planar f32.
    fn sample_converter(&mut self, format: &AudioFormat) -> Result<Box<dyn SampleConverter>> {
        Ok(Box::new(PcmConverter::new(*format)))
    }
}
