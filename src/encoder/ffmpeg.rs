//! FFmpeg adapters for the encoder interface.

use ac_ffmpeg::codec::audio::{self, AudioFrameMut, ChannelLayout};
use ac_ffmpeg::codec::{CodecParameters, Encoder as _, video};
use ac_ffmpeg::packet::Packet;
use ac_ffmpeg::time::{self, Timestamp};
use bytes::Bytes;
use std::path::Path;

use super::frame_pool::PlanarFramePool;
use super::{AudioEncoder, Backend, Encoder, Received, VideoEncoder};
use crate::config::{AudioSettings, VideoSettings};
use crate::convert::audio::OUTPUT_CHANNELS;
use crate::convert::{AudioFrame, ResampleConverter, SampleConverter, VideoFrame};
use crate::error::{Error, Result};
use crate::mux::{FfmpegMuxer, Muxer};
use crate::pipeline::types::{EncodedPacket, MediaKind, TimeBase};
use crate::source::AudioFormat;

fn ff_time_base(tb: TimeBase) -> time::TimeBase {
    time::TimeBase::new(tb.num(), tb.den())
}

fn ts(value: Timestamp) -> Option<i64> {
    (!value.is_null()).then(|| value.timestamp())
}

fn packet_out(packet: Packet, time_base: TimeBase) -> EncodedPacket {
    EncodedPacket::new(
        Bytes::copy_from_slice(packet.data()),
        ts(packet.pts()),
        ts(packet.dts()),
        time_base,
    )
    .with_key_flag(packet.is_key())
}

/// Map the outcome of `take()` given whether input has ended.
fn received(packet: Option<Packet>, time_base: TimeBase, flushed: bool) -> Received {
    match packet {
        Some(packet) => Received::Packet(packet_out(packet, time_base)),
        None if flushed => Received::EndOfStream,
        None => Received::NotReady,
    }
}

/// H.264 (or any yuv420p) encoder.
pub struct FfmpegVideoEncoder {
    encoder: video::VideoEncoder,
    frame_pool: PlanarFramePool,
    flushed: bool,
}

unsafe impl Send for FfmpegVideoEncoder {}

impl FfmpegVideoEncoder {
    pub fn new(settings: &VideoSettings, width: u32, height: u32) -> Result<Self> {
        let open_err = |reason: String| Error::CodecOpen {
            kind: MediaKind::Video,
            reason,
        };

        // the encoder keeps up to its b-frame look-ahead plus the frame in
        // flight
        let frame_pool = PlanarFramePool::new(
            width,
            height,
            ff_time_base(TimeBase::MICROSECONDS),
            settings.max_b_frames as usize + 2,
        );
        let (w, h) = frame_pool.dimensions();

        let encoder = video::VideoEncoder::builder(&settings.codec)
            .map_err(|e| open_err(format!("codec '{}' not found: {}", settings.codec, e)))?
            .pixel_format(frame_pool.pixel_format())
            .width(w)
            .height(h)
            .time_base(ff_time_base(TimeBase::MICROSECONDS))
            .bit_rate(settings.bit_rate)
            .set_option("g", settings.gop_size)
            .set_option("bf", settings.max_b_frames)
            .set_option("qmin", settings.qmin)
            .set_option("qmax", settings.qmax)
            .set_option("preset", &settings.preset)
            .set_option("flags", "+global_header")
            .build()
            .map_err(|e| open_err(e.to_string()))?;
        log::info!("Using video encoder: {} ({}x{})", settings.codec, w, h);

        Ok(Self {
            encoder,
            frame_pool,
            flushed: false,
        })
    }

    pub fn codec_parameters(&self) -> CodecParameters {
        self.encoder.codec_parameters().into()
    }

    fn encode_err(&self, reason: impl ToString) -> Error {
        Error::Encode {
            kind: MediaKind::Video,
            reason: reason.to_string(),
        }
    }
}

impl Encoder for FfmpegVideoEncoder {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn time_base(&self) -> TimeBase {
        TimeBase::MICROSECONDS
    }

    fn try_receive(&mut self) -> Result<Received> {
        let packet = self.encoder.take().map_err(|e| Error::Receive {
            kind: MediaKind::Video,
            reason: e.to_string(),
        })?;
        Ok(received(packet, self.time_base(), self.flushed))
    }
}

impl VideoEncoder for FfmpegVideoEncoder {
    fn send(&mut self, frame: Option<&VideoFrame>) -> Result<()> {
        let Some(src) = frame else {
            self.flushed = true;
            return self.encoder.flush().map_err(|e| self.encode_err(e));
        };

        let frame = self
            .frame_pool
            .fill(src, src.pts)
            .map_err(|e| self.encode_err(e))?;
        self.encoder.push(frame).map_err(|e| self.encode_err(e))
    }
}

/// AAC (or any planar float) encoder.
pub struct FfmpegAudioEncoder {
    encoder: audio::AudioEncoder,
    layout: ChannelLayout,
    sample_format: audio::SampleFormat,
    sample_rate: u32,
    frame_size: usize,
    flushed: bool,
}

unsafe impl Send for FfmpegAudioEncoder {}

impl FfmpegAudioEncoder {
    pub fn new(settings: &AudioSettings, format: &AudioFormat) -> Result<Self> {
        let open_err = |reason: String| Error::CodecOpen {
            kind: MediaKind::Audio,
            reason,
        };

        let layout = ChannelLayout::from_channels(OUTPUT_CHANNELS as u32)
            .ok_or_else(|| open_err("no stereo channel layout".into()))?;
        let sample_format = audio::frame::get_sample_format("fltp");
        let time_base = ff_time_base(TimeBase::from_sample_rate(format.sample_rate));

        let encoder = audio::AudioEncoder::builder(&settings.codec)
            .map_err(|e| open_err(format!("codec '{}' not found: {}", settings.codec, e)))?
            .sample_rate(format.sample_rate)
            .sample_format(sample_format)
            .channel_layout(layout.clone())
            .bit_rate(settings.bit_rate)
            .time_base(time_base)
            .set_option("flags", "+global_header")
            .build()
            .map_err(|e| open_err(e.to_string()))?;

        // codecs accepting any frame length report none
        let frame_size = encoder.samples_per_frame().unwrap_or(1024);
        log::info!(
            "Using audio encoder: {} ({} Hz, {} samples per frame)",
            settings.codec,
            format.sample_rate,
            frame_size
        );

        Ok(Self {
            encoder,
            layout,
            sample_format,
            sample_rate: format.sample_rate,
            frame_size,
            flushed: false,
        })
    }

    pub fn codec_parameters(&self) -> CodecParameters {
        self.encoder.codec_parameters().into()
    }

    fn encode_err(&self, reason: impl ToString) -> Error {
        Error::Encode {
            kind: MediaKind::Audio,
            reason: reason.to_string(),
        }
    }
}

impl Encoder for FfmpegAudioEncoder {
    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    fn time_base(&self) -> TimeBase {
        TimeBase::from_sample_rate(self.sample_rate)
    }

    fn try_receive(&mut self) -> Result<Received> {
        let packet = self.encoder.take().map_err(|e| Error::Receive {
            kind: MediaKind::Audio,
            reason: e.to_string(),
        })?;
        Ok(received(packet, self.time_base(), self.flushed))
    }
}

impl AudioEncoder for FfmpegAudioEncoder {
    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn send(&mut self, frame: Option<&AudioFrame>) -> Result<()> {
        let Some(src) = frame else {
            self.flushed = true;
            return self.encoder.flush().map_err(|e| self.encode_err(e));
        };

        let mut frame = AudioFrameMut::silence(
            &self.layout,
            self.sample_format,
            self.sample_rate,
            src.samples(),
        );
        {
            let mut planes = frame.planes_mut();
            for (i, samples) in src.planes.iter().enumerate() {
                for (dst, sample) in planes[i].data_mut().chunks_exact_mut(4).zip(samples) {
                    dst.copy_from_slice(&sample.to_ne_bytes());
                }
            }
        }

        let time_base = ff_time_base(self.time_base());
        let frame = frame
            .with_time_base(time_base)
            .with_pts(Timestamp::new(src.pts, time_base))
            .freeze();
        self.encoder.push(frame).map_err(|e| self.encode_err(e))
    }
}

/// Opens FFmpeg encoders and an FFmpeg muxer carrying their streams.
#[derive(Default)]
pub struct FfmpegBackend {
    streams: Vec<CodecParameters>,
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for FfmpegBackend {
    fn open_video(
        &mut self,
        settings: &VideoSettings,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn VideoEncoder>> {
        let encoder = FfmpegVideoEncoder::new(settings, width, height)?;
        self.streams.push(encoder.codec_parameters());
        Ok(Box::new(encoder))
    }

    fn open_audio(
        &mut self,
        settings: &AudioSettings,
        format: &AudioFormat,
    ) -> Result<Box<dyn AudioEncoder>> {
        let encoder = FfmpegAudioEncoder::new(settings, format)?;
        self.streams.push(encoder.codec_parameters());
        Ok(Box::new(encoder))
    }

    fn open_muxer(&mut self, path: &Path, container: &str) -> Result<Box<dyn Muxer>> {
        let streams = std::mem::take(&mut self.streams);
        Ok(Box::new(FfmpegMuxer::create(path, container, &streams)?))
    }

    fn sample_converter(&mut self, format: &AudioFormat) -> Result<Box<dyn SampleConverter>> {
        Ok(Box::new(ResampleConverter::new(format)?))
    }
}
