//! Error types for the capsule recorder

use thiserror::Error;

use crate::pipeline::state::SessionState;
use crate::pipeline::types::MediaKind;

/// Result type alias for recorder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the recording pipeline.
///
/// None of these are retried: the session stops at the first one and hands it
/// to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// The frame source could not report a resolution or deliver a frame
    #[error("Frame source error: {0}")]
    FrameSource(String),

    /// The audio source could not report its format or deliver samples
    #[error("Audio source error: {0}")]
    AudioSource(String),

    /// The resolution or audio format could not be obtained at startup
    #[error("Could not query {kind} source: {reason}")]
    SourceQuery { kind: MediaKind, reason: String },

    /// Codec lookup, allocation or open failed
    #[error("Could not open {kind} encoder: {reason}")]
    CodecOpen { kind: MediaKind, reason: String },

    /// An established encoder rejected a frame or a flush request
    #[error("{kind} encoder rejected input: {reason}")]
    Encode { kind: MediaKind, reason: String },

    /// An established encoder failed while producing packets
    #[error("{kind} encoder failed to produce packet: {reason}")]
    Receive { kind: MediaKind, reason: String },

    /// Container allocation or stream registration failed
    #[error("Container setup error: {0}")]
    ContainerSetup(String),

    /// Container header could not be written
    #[error("Failed to write container header: {0}")]
    Header(String),

    /// A packet could not be written
    #[error("Failed to write packet: {0}")]
    Mux(String),

    /// Container trailer could not be written
    #[error("Failed to write container trailer: {0}")]
    Trailer(String),

    /// Operation attempted in the wrong session state
    #[error("Invalid session transition from {from} to {to}")]
    InvalidState { from: SessionState, to: SessionState },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error belongs to opening or closing the container, as
    /// opposed to encoding and writing packets.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            Error::SourceQuery { .. }
                | Error::CodecOpen { .. }
                | Error::ContainerSetup(_)
                | Error::Header(_)
                | Error::Trailer(_)
                | Error::Config(_)
                | Error::Serialization(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_classification() {
        let open = Error::CodecOpen {
            kind: MediaKind::Video,
            reason: "no libx264".into(),
        };
        assert!(open.is_setup());
        assert_eq!(open.to_string(), "Could not open video encoder: no libx264");

        let encode = Error::Encode {
            kind: MediaKind::Audio,
            reason: "bad frame".into(),
        };
        assert!(!encode.is_setup());
        assert!(!Error::Mux("disk full".into()).is_setup());
        assert!(Error::Trailer("disk full".into()).is_setup());

        let query = Error::SourceQuery {
            kind: MediaKind::Audio,
            reason: "device gone".into(),
        };
        assert!(query.is_setup());
        assert_eq!(query.to_string(), "Could not query audio source: device gone");
    }
}
