//! Recording pipeline
//!
//! A single-threaded, pull-driven loop: video is the master clock, every
//! video frame is encoded as soon as it is pulled and audio is then encoded
//! until it runs just ahead of the video.
//!
//! - `types`: time bases and encoded packets
//! - `state`: session lifecycle
//! - `sync`: audio-behind-video decisions
//! - `drive`: moving packets from an encoder into the container
//! - `health`: frame, packet and underrun counters
//! - `session`: the owner of all of the above

pub mod drive;
pub mod health;
pub mod session;
pub mod state;
pub mod sync;
pub mod types;

pub use health::{SessionReport, SessionStats};
pub use session::{Session, SessionControls, Step};
pub use state::SessionState;
pub use sync::Synchronizer;
pub use types::{EncodedPacket, MediaKind, TimeBase};
