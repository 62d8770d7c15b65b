use anyhow::Result;
use image::RgbImage;

/// One decoded video frame, 8-bit RGB, height x width x 3
pub type Frame = RgbImage;

/// Confidence at or above which a pixel counts as foreground
pub const FOREGROUND_THRESHOLD: f32 = 0.8;

/// Per-pixel foreground confidence: 0.0 = background, 1.0 = foreground
/// Dimensions match the frame it was computed for
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMask {
    width: u32,
    height: u32,
    confidence: Vec<f32>,
}

impl SegmentationMask {
    /// Build a mask from row-major confidences
    pub fn new(width: u32, height: u32, confidence: Vec<f32>) -> Result<Self> {
        let expected = width as usize * height as usize;
        anyhow::ensure!(
            confidence.len() == expected,
            "Mask has {} values, expected {} for {}x{}",
            confidence.len(),
            expected,
            width,
            height
        );
        Ok(Self {
            width,
            height,
            confidence,
        })
    }

    /// Mask with the same confidence everywhere
    #[cfg(test)]
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            confidence: vec![value; width as usize * height as usize],
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn confidence(&self, x: u32, y: u32) -> f32 {
        self.confidence[(y * self.width + x) as usize]
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.confidence(x, y) >= FOREGROUND_THRESHOLD
    }

    #[cfg(test)]
    pub fn as_slice(&self) -> &[f32] {
        &self.confidence
    }
}

/// Trait for segmentation models
/// Allows swapping between different backends
pub trait SegmentationModel {
    /// Process a frame and return a foreground mask of the same dimensions
    fn segment(&mut self, frame: &Frame) -> Result<SegmentationMask>;

    /// Get the model's input dimensions
    ///
    /// Returns (width, height)
    fn input_size(&self) -> (u32, u32);
}
