mod encoder;

pub use encoder::{EncodeSettings, VideoEncoder, AUDIO_CODEC};

use crate::segmentation::Frame;
use anyhow::Result;

/// Trait for output destinations
pub trait OutputSink {
    /// Write a frame to the output
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Get the expected output resolution
    fn resolution(&self) -> (u32, u32);
}
