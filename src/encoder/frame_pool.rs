use ac_ffmpeg::codec::video::{PixelFormat, VideoFrame as FfmpegFrame, VideoFrameMut, frame};
use ac_ffmpeg::time::{TimeBase, Timestamp};

use crate::convert::VideoFrame;

/// yuv420p frames for the video encoder, padded to even dimensions.
///
/// Frames are allocated black and only the picture area is ever written, so
/// the padding row and column stay black across reuse. A frame is reused
/// once the encoder has dropped its reference to it; the encoder holds at
/// most `depth` frames at a time.
pub(crate) struct PlanarFramePool {
    frames: Vec<FfmpegFrame>,
    width: usize,
    height: usize,
    depth: usize,
    time_base: TimeBase,
    pixel_format: PixelFormat,
}

impl PlanarFramePool {
    pub fn new(width: u32, height: u32, time_base: TimeBase, depth: usize) -> Self {
        Self {
            frames: Vec::with_capacity(depth),
            width: width.next_multiple_of(2) as usize,
            height: height.next_multiple_of(2) as usize,
            depth: depth.max(1),
            time_base,
            pixel_format: frame::get_pixel_format("yuv420p"),
        }
    }

    /// Encoder geometry after padding
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Copy `src` into a free frame stamped with `pts`.
    pub fn fill(&mut self, src: &VideoFrame, pts: i64) -> Result<FfmpegFrame, String> {
        if src.width > self.width || src.height > self.height {
            return Err(format!(
                "frame {}x{} larger than encoder {}x{}",
                src.width, src.height, self.width, self.height
            ));
        }

        let mut dst = self.acquire();
        let (cw, ch) = src.chroma_size();
        let picture = [(src.width, src.height), (cw, ch), (cw, ch)];
        let padded_rows = [self.height, self.height / 2, self.height / 2];
        {
            let mut planes = dst.planes_mut();
            for (i, ((width, rows), plane_rows)) in picture.into_iter().zip(padded_rows).enumerate()
            {
                let data = planes[i].data_mut();
                let line_size = data.len() / plane_rows;
                copy_plane(&src.planes[i], src.strides[i], data, line_size, width, rows);
            }
        }

        let frame = dst
            .with_pts(Timestamp::new(pts, self.time_base))
            .freeze();
        if self.frames.len() < self.depth {
            self.frames.push(frame.clone());
        }
        Ok(frame)
    }

    /// A frame nobody else references, or a new black one.
    fn acquire(&mut self) -> VideoFrameMut {
        let mut free = None;
        for frame in std::mem::take(&mut self.frames) {
            if free.is_some() {
                self.frames.push(frame);
                continue;
            }
            match frame.try_into_mut() {
                Ok(frame) => free = Some(frame),
                Err(frame) => self.frames.push(frame),
            }
        }

        free.unwrap_or_else(|| {
            log::debug!(
                "Allocating {}x{} frame ({} held by encoder)",
                self.width,
                self.height,
                self.frames.len()
            );
            VideoFrameMut::black(self.pixel_format, self.width, self.height)
                .with_time_base(self.time_base)
        })
    }
}

/// Copy `rows` rows of `width` bytes between planes of different strides.
fn copy_plane(
    source: &[u8],
    stride: usize,
    destination: &mut [u8],
    line_size: usize,
    width: usize,
    rows: usize,
) {
    if stride == line_size && width == stride {
        let len = (rows * stride).min(source.len()).min(destination.len());
        destination[..len].copy_from_slice(&source[..len]);
        return;
    }

    let width = width.min(stride).min(line_size);
    for (src_row, dst_row) in source
        .chunks(stride)
        .zip(destination.chunks_mut(line_size))
        .take(rows)
    {
        dst_row[..width].copy_from_slice(&src_row[..width]);
    }
}
