//! Counters describing a recording session

use std::sync::atomic::{AtomicU64, Ordering};

use super::types::MediaKind;

/// Live counters for a session
///
/// Updated by the pipeline thread and readable from any other thread.
/// All fields use atomic operations for thread-safe access.
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Video frames handed to the video encoder
    pub video_frames: AtomicU64,

    /// Audio frames handed to the audio encoder
    pub audio_frames: AtomicU64,

    /// Video packets written to the container
    pub video_packets: AtomicU64,

    /// Audio packets written to the container
    pub audio_packets: AtomicU64,

    /// Packets that only emerged after the null-frame flush
    pub flush_packets: AtomicU64,

    /// Total payload bytes written
    pub bytes_written: AtomicU64,

    /// Number of times the audio source had no samples available
    pub underruns: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw frame sent to an encoder
    pub fn record_frame(&self, kind: MediaKind) {
        match kind {
            MediaKind::Video => self.video_frames.fetch_add(1, Ordering::Relaxed),
            MediaKind::Audio => self.audio_frames.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Record a packet written to the container
    pub fn record_packet(&self, kind: MediaKind, size: usize, flushing: bool) {
        match kind {
            MediaKind::Video => self.video_packets.fetch_add(1, Ordering::Relaxed),
            MediaKind::Audio => self.audio_packets.fetch_add(1, Ordering::Relaxed),
        };
        if flushing {
            self.flush_packets.fetch_add(1, Ordering::Relaxed);
        }
        self.bytes_written.fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Record an audio underrun
    pub fn record_underrun(&self) -> u64 {
        self.underruns.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn video_frames(&self) -> u64 {
        self.video_frames.load(Ordering::Relaxed)
    }

    pub fn audio_frames(&self) -> u64 {
        self.audio_frames.load(Ordering::Relaxed)
    }

    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Get a summary of the counters
    pub fn summary(&self) -> SessionReport {
        SessionReport {
            video_frames: self.video_frames(),
            audio_frames: self.audio_frames(),
            video_packets: self.video_packets.load(Ordering::Relaxed),
            audio_packets: self.audio_packets.load(Ordering::Relaxed),
            flush_packets: self.flush_packets.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            underruns: self.underruns(),
        }
    }
}

/// Snapshot of session counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub video_frames: u64,
    pub audio_frames: u64,
    pub video_packets: u64,
    pub audio_packets: u64,
    pub flush_packets: u64,
    pub bytes_written: u64,
    pub underruns: u64,
}

impl std::fmt::Display for SessionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} video frames ({} packets), {} audio frames ({} packets), {} flushed, {} bytes, {} underruns",
            self.video_frames,
            self.video_packets,
            self.audio_frames,
            self.audio_packets,
            self.flush_packets,
            self.bytes_written,
            self.underruns
        )
    }
}
