//! Capture-side gating: the capture-enabled switch and the frame pacer.

pub mod pacer;
pub mod switch;

pub use pacer::FramePacer;
pub use switch::CaptureSwitch;
