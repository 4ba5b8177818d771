//! Raw media conversion ahead of the encoders.

pub mod audio;
#[cfg(feature = "ffmpeg")]
pub mod resample;
pub mod yuv;

pub use audio::{AudioFrame, AudioFramer, Fill, PcmConverter, SampleConverter};
#[cfg(feature = "ffmpeg")]
pub use resample::ResampleConverter;
pub use yuv::{ColorConverter, PackedFormat, PackedView, VideoFrame};
