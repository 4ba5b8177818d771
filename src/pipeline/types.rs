//! Core types for the pipeline system

use bytes::Bytes;
use std::cmp::Ordering;

/// Stream index the muxer assigns to the video stream.
pub const VIDEO_STREAM_INDEX: usize = 0;

/// Stream index the muxer assigns to the audio stream, when present.
pub const AUDIO_STREAM_INDEX: usize = 1;

/// Unit fraction of a second in which timestamps are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeBase {
    num: i32,
    den: i32,
}

impl TimeBase {
    /// One microsecond, the time base of frame source timestamps.
    pub const MICROSECONDS: TimeBase = TimeBase::new(1, 1_000_000);

    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Time base counting single samples at the given rate.
    pub fn from_sample_rate(sample_rate: u32) -> Self {
        Self::new(1, sample_rate as i32)
    }

    pub fn num(&self) -> i32 {
        self.num
    }

    pub fn den(&self) -> i32 {
        self.den
    }

    /// Rescale `value` counted in `self` into `target`.
    ///
    /// Rounds to the nearest integer, halfway cases away from zero.
    pub fn rescale(&self, value: i64, target: TimeBase) -> i64 {
        let numerator = value as i128 * self.num as i128 * target.den as i128;
        let denominator = self.den as i128 * target.num as i128;
        div_round_nearest(numerator, denominator) as i64
    }
}

impl std::fmt::Display for TimeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

fn div_round_nearest(numerator: i128, denominator: i128) -> i128 {
    let (numerator, denominator) = if denominator < 0 {
        (-numerator, -denominator)
    } else {
        (numerator, denominator)
    };
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        -((-numerator + half) / denominator)
    }
}

/// Compare two timestamps expressed in different time bases, exactly.
pub fn compare_ts(a: i64, a_tb: TimeBase, b: i64, b_tb: TimeBase) -> Ordering {
    let lhs = a as i128 * a_tb.num as i128 * b_tb.den as i128;
    let rhs = b as i128 * b_tb.num as i128 * a_tb.den as i128;
    lhs.cmp(&rhs)
}

/// Kind of media data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Video frame data
    Video,
    /// Audio sample data
    Audio,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// Compressed packet emitted by an encoder.
///
/// Timestamps are counted in `time_base`. Packets leave an encoder in the
/// encoder's own time base and must be moved into the stream's time base with
/// [`EncodedPacket::rescale_ts`] before they reach the muxer.
#[derive(Clone)]
pub struct EncodedPacket {
    pub stream_index: usize,

    /// Presentation timestamp
    pub pts: Option<i64>,

    /// Decode timestamp, lower than `pts` for reordered video frames
    pub dts: Option<i64>,

    pub time_base: TimeBase,

    pub is_key: bool,

    pub data: Bytes,
}

impl EncodedPacket {
    pub fn new(data: Bytes, pts: Option<i64>, dts: Option<i64>, time_base: TimeBase) -> Self {
        Self {
            stream_index: 0,
            pts,
            dts,
            time_base,
            is_key: false,
            data,
        }
    }

    pub fn with_stream_index(mut self, stream_index: usize) -> Self {
        self.stream_index = stream_index;
        self
    }

    pub fn with_key_flag(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    /// Move both timestamps into `target` and re-tag the packet.
    pub fn rescale_ts(mut self, target: TimeBase) -> Self {
        if self.time_base != target {
            self.pts = self.pts.map(|pts| self.time_base.rescale(pts, target));
            self.dts = self.dts.map(|dts| self.time_base.rescale(dts, target));
            self.time_base = target;
        }
        self
    }

    /// Decode timestamp falling back to the presentation timestamp.
    pub fn ordering_ts(&self) -> Option<i64> {
        self.dts.or(self.pts)
    }

    /// Get the size of the payload in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for EncodedPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedPacket")
            .field("stream_index", &self.stream_index)
            .field("pts", &self.pts)
            .field("dts", &self.dts)
            .field("time_base", &self.time_base)
            .field("is_key", &self.is_key)
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_micros_to_90k() {
        let tb = TimeBase::new(1, 90_000);
        // 1/60 s
        assert_eq!(TimeBase::MICROSECONDS.rescale(16_667, tb), 1_500);
        assert_eq!(TimeBase::MICROSECONDS.rescale(1_000_000, tb), 90_000);
    }

    #[test]
    fn test_rescale_rounds_half_away_from_zero() {
        let from = TimeBase::new(1, 2);
        let to = TimeBase::new(1, 1);
        assert_eq!(from.rescale(1, to), 1);
        assert_eq!(from.rescale(3, to), 2);
        assert_eq!(from.rescale(-1, to), -1);
        assert_eq!(from.rescale(-3, to), -2);
    }

    #[test]
    fn test_compare_ts_across_time_bases() {
        let audio = TimeBase::from_sample_rate(48_000);
        // 1024 samples at 48 kHz = 21333.33us
        assert_eq!(
            compare_ts(21_333, TimeBase::MICROSECONDS, 1024, audio),
            Ordering::Less
        );
        assert_eq!(
            compare_ts(21_334, TimeBase::MICROSECONDS, 1024, audio),
            Ordering::Greater
        );
        assert_eq!(
            compare_ts(1_000_000, TimeBase::MICROSECONDS, 48_000, audio),
            Ordering::Equal
        );
    }

    #[test]
    fn test_packet_rescale_keeps_missing_timestamps() {
        let packet = EncodedPacket::new(
            Bytes::from_static(b"x"),
            Some(2_000_000),
            None,
            TimeBase::MICROSECONDS,
        )
        .rescale_ts(TimeBase::new(1, 1000));

        assert_eq!(packet.pts, Some(2_000));
        assert_eq!(packet.dts, None);
        assert_eq!(packet.time_base, TimeBase::new(1, 1000));
        assert_eq!(packet.ordering_ts(), Some(2_000));
    }
}
