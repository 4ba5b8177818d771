//! FFmpeg container writer.

use ac_ffmpeg::codec::CodecParameters;
use ac_ffmpeg::format::io::IO;
use ac_ffmpeg::format::muxer::{self, OutputFormat};
use ac_ffmpeg::packet::PacketMut;
use ac_ffmpeg::time::{self, Timestamp};
use std::fs::File;
use std::path::{Path, PathBuf};

use super::Muxer;
use crate::error::{Error, Result};
use crate::pipeline::types::{EncodedPacket, TimeBase};

enum Stage {
    /// Streams registered, header not yet written
    Pending {
        builder: muxer::MuxerBuilder,
        io: IO<File>,
        format: OutputFormat,
    },
    Writing(muxer::Muxer<File>),
    Closed,
}

pub struct FfmpegMuxer {
    stage: Stage,
    stream_count: usize,
    path: PathBuf,
}

unsafe impl Send for FfmpegMuxer {}

impl FfmpegMuxer {
    /// Create the output file and register one stream per codec.
    pub fn create(path: &Path, container: &str, streams: &[CodecParameters]) -> Result<Self> {
        let format = OutputFormat::find_by_name(container)
            .or_else(|| OutputFormat::guess_from_file_name(&path.to_string_lossy()))
            .ok_or_else(|| {
                Error::ContainerSetup(format!("unknown container format '{}'", container))
            })?;

        let mut builder = muxer::Muxer::builder().interleaved(true);
        for params in streams {
            builder
                .add_stream(params)
                .map_err(|e| Error::ContainerSetup(e.to_string()))?;
        }

        let file = File::create(path)?;
        log::debug!(
            "Opened '{}' as {} with {} streams",
            path.display(),
            container,
            streams.len()
        );

        Ok(Self {
            stage: Stage::Pending {
                builder,
                io: IO::from_seekable_write_stream(file),
                format,
            },
            stream_count: streams.len(),
            path: path.to_path_buf(),
        })
    }

    fn writer(&mut self) -> Result<&mut muxer::Muxer<File>> {
        match &mut self.stage {
            Stage::Writing(muxer) => Ok(muxer),
            _ => Err(Error::Mux(format!(
                "'{}' is not accepting packets",
                self.path.display()
            ))),
        }
    }
}

impl Muxer for FfmpegMuxer {
    fn stream_count(&self) -> usize {
        self.stream_count
    }

    fn write_header(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.stage, Stage::Closed) {
            Stage::Pending {
                builder,
                io,
                format,
            } => {
                let muxer = builder
                    .build(io, format)
                    .map_err(|e| Error::Header(e.to_string()))?;
                self.stage = Stage::Writing(muxer);
                Ok(())
            }
            other => {
                self.stage = other;
                Err(Error::Header("header already written".into()))
            }
        }
    }

    fn stream_time_base(&self, stream_index: usize) -> Result<TimeBase> {
        let Stage::Writing(muxer) = &self.stage else {
            return Err(Error::ContainerSetup(
                "stream time base queried before header".into(),
            ));
        };
        let tb = muxer
            .streams()
            .get(stream_index)
            .ok_or_else(|| Error::ContainerSetup(format!("no stream {}", stream_index)))?
            .time_base();
        Ok(TimeBase::new(tb.num(), tb.den()))
    }

    fn write_packet(&mut self, packet: EncodedPacket) -> Result<()> {
        let time_base = time::TimeBase::new(packet.time_base.num(), packet.time_base.den());
        let stamp = |value: Option<i64>| match value {
            Some(v) => Timestamp::new(v, time_base),
            None => Timestamp::null(),
        };

        let out = PacketMut::from(&packet.data[..])
            .with_stream_index(packet.stream_index)
            .with_time_base(time_base)
            .with_pts(stamp(packet.pts))
            .with_dts(stamp(packet.dts))
            .with_key_flag(packet.is_key)
            .freeze();

        self.writer()?
            .push(out)
            .map_err(|e| Error::Mux(e.to_string()))
    }

    fn write_trailer(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.stage, Stage::Closed) {
            Stage::Writing(mut muxer) => {
                muxer.flush().map_err(|e| Error::Trailer(e.to_string()))?;
                muxer.close().map_err(|e| Error::Trailer(e.to_string()))?;
                log::debug!("Trailer written to '{}'", self.path.display());
                Ok(())
            }
            _ => Err(Error::Trailer("header was never written".into())),
        }
    }
}
