use crate::convert::PackedFormat;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for the H.264 video stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub codec: String,
    pub bit_rate: u64,
    pub gop_size: u32,
    pub max_b_frames: u32,
    pub qmin: u32,
    pub qmax: u32,
    pub preset: String,
}

impl Default for VideoSettings {
    fn default() -> Self {
        VideoSettings {
            codec: String::from("libx264"),
            bit_rate: 5_000_000,
            gop_size: 120,
            max_b_frames: 16,
            qmin: 10,
            qmax: 51,
            preset: String::from("veryfast"),
        }
    }
}

/// Settings for the AAC audio stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub enabled: bool,
    pub codec: String,
    pub bit_rate: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        AudioSettings {
            enabled: true,
            codec: String::from("aac"),
            bit_rate: 128_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub output_path: PathBuf,
    pub container: String,
    /// Capture pacing target in frames per second
    pub frame_rate: u32,
    /// Byte order of the packed pixels the frame source delivers
    pub pixel_format: PackedFormat,
    /// Source rows arrive bottom-up and must be flipped
    pub vflip: bool,
    pub video: VideoSettings,
    pub audio: AudioSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            output_path: PathBuf::from("capsule.mp4"),
            container: String::from("mp4"),
            frame_rate: 60,
            pixel_format: PackedFormat::Bgra,
            vflip: true,
            video: VideoSettings::default(),
            audio: AudioSettings::default(),
        }
    }
}

impl SessionConfig {
    /// Load a configuration from a JSON file; missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let conf: SessionConfig = serde_json::from_str(&raw)?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_rate == 0 {
            return Err(Error::Config("frame_rate must be positive".into()));
        }
        if self.video.qmin > self.video.qmax {
            return Err(Error::Config(format!(
                "qmin {} exceeds qmax {}",
                self.video.qmin, self.video.qmax
            )));
        }
        if self.video.bit_rate == 0 {
            return Err(Error::Config("video bit_rate must be positive".into()));
        }
        Ok(())
    }
}

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_recorder_constants() {
        let conf = SessionConfig::default();
        assert_eq!(conf.output_path, PathBuf::from("capsule.mp4"));
        assert_eq!(conf.frame_rate, 60);
        assert_eq!(conf.pixel_format, PackedFormat::Bgra);
        assert_eq!(conf.video.bit_rate, 5_000_000);
        assert_eq!(conf.video.gop_size, 120);
        assert_eq!(conf.video.max_b_frames, 16);
        assert_eq!((conf.video.qmin, conf.video.qmax), (10, 51));
        assert!(conf.audio.enabled);
        assert!(conf.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let conf: SessionConfig =
            serde_json::from_str(r#"{ "frame_rate": 30, "pixel_format": "rgba", "audio": { "enabled": false } }"#)
                .unwrap();
        assert_eq!(conf.frame_rate, 30);
        assert_eq!(conf.pixel_format, PackedFormat::Rgba);
        assert!(conf.vflip);
        assert!(!conf.audio.enabled);
        assert_eq!(conf.audio.codec, "aac");
        assert_eq!(conf.video, VideoSettings::default());
    }

    #[test]
    fn test_from_json_file_rejects_bad_quantizers() {
        let path = std::env::temp_dir().join(format!("capsule-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "video": { "qmin": 40, "qmax": 20 } }"#).unwrap();

        let err = SessionConfig::from_json_file(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
