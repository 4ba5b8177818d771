//! Audio-to-video synchronization
//!
//! Video is the master clock. After each video frame the session asks the
//! synchronizer how far audio has to be advanced; audio frames are produced
//! one at a time until the last one starts after the video frame does.

use std::cmp::Ordering;

use super::types::{TimeBase, compare_ts};

#[derive(Debug, Clone)]
pub struct Synchronizer {
    video_tb: TimeBase,
    audio_tb: TimeBase,
    /// Samples per audio frame
    frame_size: i64,
    /// Timestamp of the last audio frame built, none before the first
    last_audio_pts: Option<i64>,
    next_audio_pts: i64,
}

impl Synchronizer {
    pub fn new(video_tb: TimeBase, audio_tb: TimeBase, frame_size: usize) -> Self {
        Self {
            video_tb,
            audio_tb,
            frame_size: frame_size as i64,
            last_audio_pts: None,
            next_audio_pts: 0,
        }
    }

    /// Whether audio is still at or behind the video frame at `video_pts`.
    pub fn audio_due(&self, video_pts: i64) -> bool {
        match self.last_audio_pts {
            None => true,
            Some(audio_pts) => {
                compare_ts(video_pts, self.video_tb, audio_pts, self.audio_tb) != Ordering::Less
            }
        }
    }

    /// Claim the timestamp for the next audio frame.
    pub fn next_audio_pts(&mut self) -> i64 {
        let pts = self.next_audio_pts;
        self.last_audio_pts = Some(pts);
        self.next_audio_pts += self.frame_size;
        pts
    }

    pub fn last_audio_pts(&self) -> Option<i64> {
        self.last_audio_pts
    }

    /// Timestamps of every audio frame needed to catch up with `video_pts`.
    pub fn catch_up(&mut self, video_pts: i64) -> CatchUp<'_> {
        CatchUp {
            sync: self,
            video_pts,
        }
    }
}

/// Iterator over the audio timestamps owed to one video frame.
pub struct CatchUp<'a> {
    sync: &'a mut Synchronizer,
    video_pts: i64,
}

impl Iterator for CatchUp<'_> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.sync.audio_due(self.video_pts) {
            Some(self.sync.next_audio_pts())
        } else {
            None
        }
    }
}
