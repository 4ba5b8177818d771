//! Packed RGBA/BGRA to planar YUV 4:2:0 conversion.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const COMPONENTS: usize = 4;

/// Byte order of a packed 32-bit pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackedFormat {
    Rgba,
    Bgra,
}

impl PackedFormat {
    #[inline]
    fn rgb(&self, px: &[u8]) -> (i32, i32, i32) {
        match self {
            PackedFormat::Rgba => (px[0] as i32, px[1] as i32, px[2] as i32),
            PackedFormat::Bgra => (px[2] as i32, px[1] as i32, px[0] as i32),
        }
    }
}

/// Read-only window over a packed buffer with a signed row stride.
///
/// A bottom-up image is viewed top-down by starting at its last row and
/// walking backwards, without touching the pixels.
#[derive(Debug, Clone, Copy)]
pub struct PackedView<'a> {
    data: &'a [u8],
    origin: usize,
    stride: isize,
    width: usize,
}

impl<'a> PackedView<'a> {
    pub fn new(data: &'a [u8], width: usize, height: usize, flip: bool) -> Result<Self> {
        let linesize = width * COMPONENTS;
        if data.len() < linesize * height {
            return Err(Error::FrameSource(format!(
                "buffer of {} bytes is too small for {}x{} packed pixels",
                data.len(),
                width,
                height
            )));
        }

        let (origin, stride) = if flip && height > 0 {
            (linesize * (height - 1), -(linesize as isize))
        } else {
            (0, linesize as isize)
        };

        Ok(Self {
            data,
            origin,
            stride,
            width,
        })
    }

    pub fn stride(&self) -> isize {
        self.stride
    }

    #[inline]
    pub fn row(&self, y: usize) -> &'a [u8] {
        let start = (self.origin as isize + y as isize * self.stride) as usize;
        &self.data[start..start + self.width * COMPONENTS]
    }
}

/// Planar YUV 4:2:0 picture, allocated once per session and overwritten.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: usize,
    pub height: usize,
    /// Y, U and V planes
    pub planes: [Vec<u8>; 3],
    /// Bytes per row of each plane
    pub strides: [usize; 3],
    /// Presentation timestamp in microseconds
    pub pts: i64,
}

impl VideoFrame {
    pub fn new(width: usize, height: usize) -> Self {
        let chroma_w = width.div_ceil(2);
        let chroma_h = height.div_ceil(2);
        Self {
            width,
            height,
            planes: [
                vec![0u8; width * height],
                vec![128u8; chroma_w * chroma_h],
                vec![128u8; chroma_w * chroma_h],
            ],
            strides: [width, chroma_w, chroma_w],
            pts: 0,
        }
    }

    pub fn chroma_size(&self) -> (usize, usize) {
        (self.width.div_ceil(2), self.height.div_ceil(2))
    }
}

/// Converts packed frames of one fixed resolution into a reused planar frame.
pub struct ColorConverter {
    width: usize,
    height: usize,
    format: PackedFormat,
    flip: bool,
}

impl ColorConverter {
    pub fn new(width: usize, height: usize, format: PackedFormat, flip: bool) -> Self {
        Self {
            width,
            height,
            format,
            flip,
        }
    }

    /// Size of one packed input frame in bytes
    pub fn input_size(&self) -> usize {
        self.width * self.height * COMPONENTS
    }

    pub fn convert(&self, src: &[u8], dst: &mut VideoFrame) -> Result<()> {
        if dst.width != self.width || dst.height != self.height {
            return Err(Error::Config(format!(
                "converter is {}x{} but output frame is {}x{}",
                self.width, self.height, dst.width, dst.height
            )));
        }
        let view = PackedView::new(src, self.width, self.height, self.flip)?;
        self.convert_view(&view, dst);
        Ok(())
    }

    fn convert_view(&self, view: &PackedView<'_>, dst: &mut VideoFrame) {
        let [y_plane, u_plane, v_plane] = &mut dst.planes;
        let [y_stride, c_stride, _] = dst.strides;

        for y in 0..self.height {
            let row = view.row(y);
            let out = &mut y_plane[y * y_stride..y * y_stride + self.width];
            for (px, luma) in row.chunks_exact(COMPONENTS).zip(out.iter_mut()) {
                let (r, g, b) = self.format.rgb(px);
                *luma = (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16) as u8;
            }
        }

        // each chroma sample averages its 2x2 block, clamped at odd edges
        for cy in 0..self.height.div_ceil(2) {
            let top = view.row(cy * 2);
            let bottom = view.row((cy * 2 + 1).min(self.height - 1));
            for cx in 0..self.width.div_ceil(2) {
                let x0 = cx * 2;
                let x1 = (x0 + 1).min(self.width - 1);
                let (mut r, mut g, mut b) = (0, 0, 0);
                for (line, x) in [(top, x0), (top, x1), (bottom, x0), (bottom, x1)] {
                    let (pr, pg, pb) = self.format.rgb(&line[x * COMPONENTS..]);
                    r += pr;
                    g += pg;
                    b += pb;
                }
                let (r, g, b) = ((r + 2) / 4, (g + 2) / 4, (b + 2) / 4);
                let at = cy * c_stride + cx;
                u_plane[at] = (((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128) as u8;
                v_plane[at] = (((112 * r - 94 * g - 18 * b + 128) >> 8) + 128) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: usize, height: usize, px: [u8; 4]) -> Vec<u8> {
        px.iter().copied().cycle().take(width * height * 4).collect()
    }

    #[test]
    fn test_white_and_black() {
        let conv = ColorConverter::new(4, 2, PackedFormat::Rgba, false);
        let mut frame = VideoFrame::new(4, 2);

        conv.convert(&solid(4, 2, [255, 255, 255, 255]), &mut frame).unwrap();
        assert!(frame.planes[0].iter().all(|&y| y == 235));
        assert!(frame.planes[1].iter().all(|&u| u == 128));
        assert!(frame.planes[2].iter().all(|&v| v == 128));

        conv.convert(&solid(4, 2, [0, 0, 0, 255]), &mut frame).unwrap();
        assert!(frame.planes[0].iter().all(|&y| y == 16));
    }

    #[test]
    fn test_bgra_swaps_channels() {
        let rgba = ColorConverter::new(2, 2, PackedFormat::Rgba, false);
        let bgra = ColorConverter::new(2, 2, PackedFormat::Bgra, false);
        let mut a = VideoFrame::new(2, 2);
        let mut b = VideoFrame::new(2, 2);

        rgba.convert(&solid(2, 2, [255, 0, 0, 255]), &mut a).unwrap();
        bgra.convert(&solid(2, 2, [0, 0, 255, 255]), &mut b).unwrap();
        assert_eq!(a.planes, b.planes);
        // red has a high V
        assert!(a.planes[2][0] > 200);
    }

    #[test]
    fn test_flip_uses_negative_stride() {
        let src = vec![0u8; 3 * 2 * 4];
        let view = PackedView::new(&src, 3, 2, true).unwrap();
        assert_eq!(view.stride(), -12);
        assert!(std::ptr::eq(view.row(0).as_ptr(), src[12..].as_ptr()));
        assert!(std::ptr::eq(view.row(1).as_ptr(), src.as_ptr()));
    }

    #[test]
    fn test_flip_reverses_rows() {
        // bottom row white, top row black in memory order
        let mut src = solid(2, 2, [0, 0, 0, 255]);
        src[8..].copy_from_slice(&[255; 8]);

        let mut straight = VideoFrame::new(2, 2);
        ColorConverter::new(2, 2, PackedFormat::Rgba, false)
            .convert(&src, &mut straight)
            .unwrap();
        assert_eq!(straight.planes[0], vec![16, 16, 235, 235]);

        let mut flipped = VideoFrame::new(2, 2);
        ColorConverter::new(2, 2, PackedFormat::Rgba, true)
            .convert(&src, &mut flipped)
            .unwrap();
        assert_eq!(flipped.planes[0], vec![235, 235, 16, 16]);
    }

    #[test]
    fn test_odd_dimensions() {
        let conv = ColorConverter::new(3, 3, PackedFormat::Rgba, true);
        let mut frame = VideoFrame::new(3, 3);
        assert_eq!(frame.chroma_size(), (2, 2));
        conv.convert(&solid(3, 3, [255, 255, 255, 255]), &mut frame).unwrap();
        assert_eq!(frame.planes[1].len(), 4);
        assert!(frame.planes[1].iter().all(|&u| u == 128));
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let conv = ColorConverter::new(4, 4, PackedFormat::Rgba, false);
        let mut frame = VideoFrame::new(4, 4);
        assert!(conv.convert(&[0u8; 10], &mut frame).is_err());
    }
}
