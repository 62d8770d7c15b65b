mod decoder;
pub mod probe;

pub use decoder::VideoDecoder;
pub use probe::{probe_video, AudioTrack};

use crate::segmentation::Frame;
use anyhow::Result;

/// Trait for frame sources
pub trait FrameSource {
    /// Next frame in presentation order, `None` once the source is exhausted
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Get the resolution of produced frames
    fn resolution(&self) -> (u32, u32);
}
