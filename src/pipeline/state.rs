//! Session state management

/// Session state machine
///
/// A session moves strictly forward through these states and is never
/// re-entered once finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Streams and encoders are being opened, header not yet written
    Configuring,

    /// Header written, frames are being encoded and muxed
    Writing,

    /// Encoders are being drained after end of input
    Flushing,

    /// Trailer written and all resources released
    Finalized,
}

impl SessionState {
    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        use SessionState::*;

        matches!(
            (self, target),
            (Configuring, Writing) | (Writing, Flushing) | (Flushing, Finalized)
        )
    }

    /// Get a human-readable description of this state
    pub fn description(&self) -> &'static str {
        match self {
            SessionState::Configuring => "Configuring",
            SessionState::Writing => "Writing",
            SessionState::Flushing => "Flushing",
            SessionState::Finalized => "Finalized",
        }
    }

    /// Check if packets may be handed to the muxer in this state
    pub fn accepts_packets(&self) -> bool {
        matches!(self, SessionState::Writing | SessionState::Flushing)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
