//! Sample format conversion through libswresample.

use ac_ffmpeg::codec::audio::{self, AudioFrameMut, AudioResampler, ChannelLayout};
use ac_ffmpeg::time::{TimeBase as FfmpegTimeBase, Timestamp};

use super::audio::SampleConverter;
use crate::error::{Error, Result};
use crate::pipeline::types::MediaKind;
use crate::source::{AudioChunk, AudioFormat, SampleFormat};

/// Converts interleaved source samples to planar f32 with `AudioResampler`.
///
/// The channel layout and rate are left alone so the resampler never mixes
/// channels; picking the stereo pair is the framer's job.
pub struct ResampleConverter {
    resampler: AudioResampler,
    layout: ChannelLayout,
    source_format: audio::SampleFormat,
    sample_rate: u32,
    bytes_per_frame: usize,
    /// Samples pushed so far, used as the pts of the next frame
    position: i64,
}

unsafe impl Send for ResampleConverter {}

impl ResampleConverter {
    pub fn new(format: &AudioFormat) -> Result<Self> {
        let open_err = |reason: String| Error::CodecOpen {
            kind: MediaKind::Audio,
            reason,
        };

        let layout = ChannelLayout::from_channels(format.channels as u32)
            .ok_or_else(|| open_err(format!("no channel layout for {} channels", format.channels)))?;
        let source_format = audio::frame::get_sample_format(match format.sample_format {
            SampleFormat::S16 => "s16",
            SampleFormat::S32 => "s32",
            SampleFormat::F32 => "flt",
        });

        let resampler = AudioResampler::builder()
            .source_channel_layout(layout.clone())
            .source_sample_format(source_format)
            .source_sample_rate(format.sample_rate)
            .target_channel_layout(layout.clone())
            .target_sample_format(audio::frame::get_sample_format("fltp"))
            .target_sample_rate(format.sample_rate)
            .build()
            .map_err(|e| open_err(format!("audio resampler: {}", e)))?;

        log::debug!(
            "Converting {} channel {:?} audio to planar f32",
            format.channels,
            format.sample_format
        );

        Ok(Self {
            resampler,
            layout,
            source_format,
            sample_rate: format.sample_rate,
            bytes_per_frame: format.bytes_per_frame(),
            position: 0,
        })
    }

    fn convert_err(reason: impl ToString) -> Error {
        Error::AudioSource(format!("sample conversion failed: {}", reason.to_string()))
    }
}

impl SampleConverter for ResampleConverter {
    fn convert(&mut self, chunk: &AudioChunk, planes: &mut [Vec<f32>]) -> Result<()> {
        for plane in planes.iter_mut() {
            plane.clear();
        }

        let len = chunk.frames * self.bytes_per_frame;
        let mut frame =
            AudioFrameMut::silence(&self.layout, self.source_format, self.sample_rate, chunk.frames);
        frame.planes_mut()[0].data_mut()[..len].copy_from_slice(&chunk.data[..len]);

        let time_base = FfmpegTimeBase::new(1, self.sample_rate as i32);
        let frame = frame
            .with_time_base(time_base)
            .with_pts(Timestamp::new(self.position, time_base))
            .freeze();
        self.position += chunk.frames as i64;
        self.resampler.push(frame).map_err(Self::convert_err)?;

        while let Some(converted) = self.resampler.take().map_err(Self::convert_err)? {
            let bytes = converted.samples() * 4;
            for (plane, src) in planes.iter_mut().zip(converted.planes().iter()) {
                plane.extend(
                    src.data()[..bytes]
                        .chunks_exact(4)
                        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]])),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_s16_stereo_to_planar() {
        let format = AudioFormat {
            channels: 2,
            sample_rate: 48_000,
            sample_format: SampleFormat::S16,
        };
        let mut converter = ResampleConverter::new(&format).unwrap();
        let mut data = Vec::new();
        for s in [16_384i16, -16_384, -32_768, 0] {
            data.extend_from_slice(&s.to_ne_bytes());
        }
        let mut planes = vec![Vec::new(); 2];

        converter
            .convert(&AudioChunk::new(Bytes::from(data), 2), &mut planes)
            .unwrap();
        assert_eq!(planes[0], vec![0.5, -1.0]);
        assert_eq!(planes[1], vec![-0.5, 0.0]);
    }
}
