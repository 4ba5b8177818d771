//! Capsule: capture-to-file recorder
//!
//! Pulls raw frames and samples from capture collaborators, converts them,
//! feeds them to a video and an audio encoder and interleaves the packets
//! into a single container file.

pub mod capture;
pub mod config;
pub mod convert;
pub mod encoder;
pub mod error;
pub mod mux;
pub mod pipeline;
pub mod source;
pub mod utils;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use pipeline::{Session, SessionControls, SessionReport, SessionState};
