//! Container writing.

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod interleave;

use crate::error::Result;
use crate::pipeline::types::{EncodedPacket, TimeBase};

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegMuxer;
pub use interleave::Interleaver;

/// Container writer.
///
/// Lifecycle is header, packets, trailer. Stream time bases may be adjusted
/// by the container while writing the header and are only final afterwards.
pub trait Muxer: Send {
    fn stream_count(&self) -> usize;

    fn write_header(&mut self) -> Result<()>;

    /// Time base of `stream_index`, valid after the header is written.
    fn stream_time_base(&self, stream_index: usize) -> Result<TimeBase>;

    /// Write a packet already rescaled into its stream's time base.
    fn write_packet(&mut self, packet: EncodedPacket) -> Result<()>;

    fn write_trailer(&mut self) -> Result<()>;
}
