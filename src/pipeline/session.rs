//! Recording session
//!
//! Owns the encoders, the muxer and the conversion buffers, and drives them
//! through `Configuring → Writing → Flushing → Finalized`.

use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use super::drive::{StreamTarget, drain};
use super::health::{SessionReport, SessionStats};
use super::state::SessionState;
use super::sync::Synchronizer;
use super::types::{AUDIO_STREAM_INDEX, MediaKind, VIDEO_STREAM_INDEX};
use crate::capture::CaptureSwitch;
use crate::config::SessionConfig;
use crate::convert::{AudioFrame, AudioFramer, ColorConverter, VideoFrame};
use crate::encoder::{AudioEncoder, Backend, VideoEncoder};
use crate::error::{Error, Result};
use crate::mux::{Interleaver, Muxer};
use crate::source::{AudioSource, FrameSource};
use crate::utils::sos::SignalOfStop;

/// Frames between progress log lines
const LOG_EVERY: u64 = 60;

/// Handles shared with the capture side: the capture-enabled switch and the
/// stop request.
#[derive(Debug, Clone)]
pub struct SessionControls {
    pub switch: CaptureSwitch,
    pub stop: SignalOfStop,
}

impl Default for SessionControls {
    fn default() -> Self {
        Self {
            switch: CaptureSwitch::new(true),
            stop: SignalOfStop::new(),
        }
    }
}

/// Startup query failures abort setup like a codec that fails to open.
fn query_failed(kind: MediaKind, err: Error) -> Error {
    let reason = match err {
        Error::FrameSource(reason) | Error::AudioSource(reason) => reason,
        other => other.to_string(),
    };
    Error::SourceQuery { kind, reason }
}

/// Outcome of one writing iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    EndOfStream,
}

struct VideoPath {
    encoder: Box<dyn VideoEncoder>,
    target: StreamTarget,
    converter: ColorConverter,
    frame: VideoFrame,
    /// Packed pixels, overwritten by every pull
    buffer: Vec<u8>,
    pulled: u64,
    last_pts: Option<i64>,
}

struct AudioPath {
    encoder: Box<dyn AudioEncoder>,
    target: StreamTarget,
    framer: AudioFramer,
    frame: AudioFrame,
    sync: Synchronizer,
    source: Box<dyn AudioSource>,
}

impl AudioPath {
    /// Encode audio frames until audio starts after `video_pts`.
    fn catch_up(
        &mut self,
        video_pts: i64,
        muxer: &mut dyn Muxer,
        stats: &SessionStats,
        state: SessionState,
    ) -> Result<usize> {
        let mut built = 0;
        for pts in self.sync.catch_up(video_pts) {
            let fill = self.framer.fill(&mut *self.source, &mut self.frame)?;
            if fill.underrun {
                let total = stats.record_underrun();
                warn!(
                    "Audio buffer underrun ({} so far), padding {} samples with silence",
                    total,
                    self.frame.samples() - fill.from_source
                );
            }

            self.frame.pts = pts;
            self.encoder.send(Some(&self.frame))?;
            stats.record_frame(MediaKind::Audio);
            drain(
                &mut *self.encoder,
                &mut self.target,
                muxer,
                stats,
                state,
            )?;
            built += 1;
        }
        Ok(built)
    }
}

/// Single-use recording session.
pub struct Session {
    state: SessionState,
    // Fields drop in declaration order: muxer, audio, video, which releases
    // them in reverse order of opening.
    muxer: Box<dyn Muxer>,
    audio: Option<AudioPath>,
    video: VideoPath,
    frames: Box<dyn FrameSource>,
    stats: Arc<SessionStats>,
    controls: SessionControls,
    output: PathBuf,
    end_of_stream: bool,
}

impl Session {
    /// Open encoders and the container and write the header.
    pub fn configure(
        config: &SessionConfig,
        backend: &mut dyn Backend,
        frames: Box<dyn FrameSource>,
        audio: Option<Box<dyn AudioSource>>,
    ) -> Result<Self> {
        Self::configure_with(config, backend, frames, audio, SessionControls::default())
    }

    pub fn configure_with(
        config: &SessionConfig,
        backend: &mut dyn Backend,
        mut frames: Box<dyn FrameSource>,
        audio: Option<Box<dyn AudioSource>>,
        controls: SessionControls,
    ) -> Result<Self> {
        config.validate()?;

        let (width, height) = frames
            .resolution()
            .map_err(|e| query_failed(MediaKind::Video, e))?;
        if width == 0 || height == 0 {
            return Err(Error::SourceQuery {
                kind: MediaKind::Video,
                reason: format!("unusable resolution {}x{}", width, height),
            });
        }
        info!("Video resolution: {}x{}", width, height);

        let audio = match audio {
            Some(mut source) if config.audio.enabled => {
                let format = source
                    .format()
                    .and_then(|format| format.check().map(|_| format))
                    .map_err(|e| query_failed(MediaKind::Audio, e))?;
                info!(
                    "Audio format: {} channels, {} Hz, {} bit",
                    format.channels,
                    format.sample_rate,
                    format.sample_format.sample_width()
                );
                Some((source, format))
            }
            Some(_) => {
                debug!("Audio source supplied but audio is disabled");
                None
            }
            None => None,
        };

        let video_encoder = backend.open_video(&config.video, width, height)?;
        let audio_encoder = match &audio {
            Some((_, format)) => Some(backend.open_audio(&config.audio, format)?),
            None => None,
        };

        let muxer = backend.open_muxer(&config.output_path, &config.container)?;
        let expected = 1 + audio_encoder.is_some() as usize;
        if muxer.stream_count() != expected {
            return Err(Error::ContainerSetup(format!(
                "container has {} streams, expected {}",
                muxer.stream_count(),
                expected
            )));
        }

        let mut muxer: Box<dyn Muxer> = Box::new(Interleaver::new(muxer));
        muxer.write_header()?;

        let (w, h) = (width as usize, height as usize);
        let converter = ColorConverter::new(w, h, config.pixel_format, config.vflip);
        let video_tb = muxer.stream_time_base(VIDEO_STREAM_INDEX)?;
        info!(
            "Output '{}': stream #{} video {}x{}, time base {}",
            config.output_path.display(),
            VIDEO_STREAM_INDEX,
            width,
            height,
            video_tb
        );
        let video = VideoPath {
            buffer: vec![0u8; converter.input_size()],
            converter,
            frame: VideoFrame::new(w, h),
            target: StreamTarget::new(MediaKind::Video, VIDEO_STREAM_INDEX, video_tb),
            pulled: 0,
            last_pts: None,
            encoder: video_encoder,
        };

        let audio = match (audio, audio_encoder) {
            (Some((source, format)), Some(encoder)) => {
                let frame_size = encoder.frame_size();
                if frame_size == 0 {
                    return Err(Error::CodecOpen {
                        kind: MediaKind::Audio,
                        reason: "encoder reports no frame size".into(),
                    });
                }
                let audio_tb = muxer.stream_time_base(AUDIO_STREAM_INDEX)?;
                info!(
                    "Output '{}': stream #{} audio {} Hz, {} samples per frame, time base {}",
                    config.output_path.display(),
                    AUDIO_STREAM_INDEX,
                    format.sample_rate,
                    frame_size,
                    audio_tb
                );
                Some(AudioPath {
                    target: StreamTarget::new(MediaKind::Audio, AUDIO_STREAM_INDEX, audio_tb),
                    framer: AudioFramer::new(format, backend.sample_converter(&format)?)?,
                    frame: AudioFrame::new(frame_size, format.sample_rate),
                    sync: Synchronizer::new(
                        video.encoder.time_base(),
                        encoder.time_base(),
                        frame_size,
                    ),
                    encoder,
                    source,
                })
            }
            _ => None,
        };

        let mut session = Session {
            state: SessionState::Configuring,
            muxer,
            audio,
            video,
            frames,
            stats: Arc::new(SessionStats::new()),
            controls,
            output: config.output_path.clone(),
            end_of_stream: false,
        };
        session.transition(SessionState::Writing)?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> Arc<SessionStats> {
        self.stats.clone()
    }

    pub fn capture_switch(&self) -> CaptureSwitch {
        self.controls.switch.clone()
    }

    pub fn stop_handle(&self) -> SignalOfStop {
        self.controls.stop.clone()
    }

    pub fn end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// Frames pulled from the source, including the final short read
    pub fn frames_pulled(&self) -> u64 {
        self.video.pulled
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    fn transition(&mut self, to: SessionState) -> Result<()> {
        if !self.state.can_transition_to(&to) {
            return Err(Error::InvalidState {
                from: self.state,
                to,
            });
        }
        debug!("Session {} -> {}", self.state, to);
        self.state = to;
        Ok(())
    }

    /// Pull, encode and mux one video frame, then bring audio up to it.
    pub fn step(&mut self) -> Result<Step> {
        if self.state != SessionState::Writing {
            return Err(Error::InvalidState {
                from: self.state,
                to: SessionState::Writing,
            });
        }
        if self.end_of_stream {
            return Ok(Step::EndOfStream);
        }

        let video = &mut self.video;
        let pull = self.frames.pull_frame(&mut video.buffer)?;
        video.pulled += 1;

        if pull.bytes_filled < video.buffer.len() {
            info!(
                "Frame source finished after {} frames ({} of {} bytes in last read)",
                video.pulled - 1,
                pull.bytes_filled,
                video.buffer.len()
            );
            self.end_of_stream = true;
            return Ok(Step::EndOfStream);
        }

        if let Some(last) = video.last_pts
            && pull.timestamp < last
        {
            return Err(Error::FrameSource(format!(
                "frame timestamp went backwards: {} after {}",
                pull.timestamp, last
            )));
        }
        video.last_pts = Some(pull.timestamp);

        video.converter.convert(&video.buffer, &mut video.frame)?;
        video.frame.pts = pull.timestamp;
        video.encoder.send(Some(&video.frame))?;
        self.stats.record_frame(MediaKind::Video);
        drain(
            &mut *video.encoder,
            &mut video.target,
            &mut *self.muxer,
            &self.stats,
            self.state,
        )?;

        if let Some(audio) = self.audio.as_mut() {
            audio.catch_up(pull.timestamp, &mut *self.muxer, &self.stats, self.state)?;
        }

        let sent = self.stats.video_frames();
        if sent % LOG_EVERY == 0 {
            info!(
                "Encoded {} frames, {} audio frames, {} underruns",
                sent,
                self.stats.audio_frames(),
                self.stats.underruns()
            );
        }
        Ok(Step::Continue)
    }

    /// Record until the frame source ends or a stop is requested, then flush
    /// and finalize.
    pub fn run(mut self) -> Result<SessionReport> {
        info!("Recording to '{}'", self.output.display());
        loop {
            if self.controls.stop.cancelled() {
                info!("Stop requested, finishing recording");
                break;
            }
            if self.step()? == Step::EndOfStream {
                break;
            }
        }
        self.finish()
    }

    /// Drain both encoders and write the trailer without taking more input.
    pub fn finish(mut self) -> Result<SessionReport> {
        self.flush()?;
        self.finalize()
    }

    fn flush(&mut self) -> Result<()> {
        self.transition(SessionState::Flushing)?;

        // video first: it is the master clock
        self.video.encoder.send(None)?;
        let delayed = drain(
            &mut *self.video.encoder,
            &mut self.video.target,
            &mut *self.muxer,
            &self.stats,
            self.state,
        )?;
        debug!("Flushed {} delayed video packets", delayed);

        if let Some(audio) = self.audio.as_mut() {
            audio.encoder.send(None)?;
            let delayed = drain(
                &mut *audio.encoder,
                &mut audio.target,
                &mut *self.muxer,
                &self.stats,
                self.state,
            )?;
            debug!("Flushed {} delayed audio packets", delayed);
        }
        Ok(())
    }

    fn finalize(mut self) -> Result<SessionReport> {
        self.muxer.write_trailer()?;
        self.transition(SessionState::Finalized)?;

        let report = self.stats.summary();
        info!("Finished '{}': {}", self.output.display(), report);

        let Session {
            muxer,
            audio,
            video,
            ..
        } = self;
        drop(muxer);
        drop(audio);
        drop(video);
        Ok(report)
    }
}
