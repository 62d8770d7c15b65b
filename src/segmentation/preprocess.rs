use super::types::{Frame, SegmentationMask};
use anyhow::Result;
use image::{imageops, ImageBuffer, Luma};
use ndarray::Array4;

/// Preprocessor for converting RGB frames to channels-last model input tensors
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Shape of the tensor produced by [`Preprocessor::preprocess`]: [1, height, width, 3]
    pub fn tensor_shape(&self) -> [usize; 4] {
        [
            1,
            self.target_height as usize,
            self.target_width as usize,
            3,
        ]
    }

    /// Preprocess an RGB frame into a normalized tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions
    /// 2. Convert to float and normalize to [0, 1]
    /// 3. Lay out as NHWC
    pub fn preprocess(&self, frame: &Frame) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        anyhow::ensure!(
            frame.width() > 0 && frame.height() > 0,
            "Cannot segment an empty frame"
        );

        let resized;
        let source = if frame.dimensions() != (self.target_width, self.target_height) {
            resized = imageops::resize(
                frame,
                self.target_width,
                self.target_height,
                imageops::FilterType::Triangle,
            );
            &resized
        } else {
            frame
        };

        let mut tensor = Array4::<f32>::zeros(self.tensor_shape());

        for (x, y, pixel) in source.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                tensor[[0, y, x, c]] = pixel[c] as f32 / 255.0;
            }
        }

        Ok(tensor)
    }

    /// Resize a model-resolution mask back to frame dimensions
    ///
    /// `mask` is row-major at `mask_width` x `mask_height`; values are clamped to [0, 1].
    pub fn postprocess_mask(
        mask: &[f32],
        mask_width: u32,
        mask_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> Result<SegmentationMask> {
        let _span = tracing::debug_span!("postprocess").entered();

        let clamped: Vec<f32> = mask.iter().map(|v| v.clamp(0.0, 1.0)).collect();

        if mask_width == target_width && mask_height == target_height {
            return SegmentationMask::new(target_width, target_height, clamped);
        }

        let small: ImageBuffer<Luma<f32>, Vec<f32>> =
            ImageBuffer::from_raw(mask_width, mask_height, clamped).ok_or_else(|| {
                anyhow::anyhow!(
                    "Model mask has {} values, expected {}x{}",
                    mask.len(),
                    mask_width,
                    mask_height
                )
            })?;

        let resized = imageops::resize(
            &small,
            target_width,
            target_height,
            imageops::FilterType::Triangle,
        );

        let values = resized
            .into_raw()
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0))
            .collect();

        SegmentationMask::new(target_width, target_height, values)
    }

    /// Render the thresholded mask as a black/white frame for visualization
    pub fn mask_to_rgb(mask: &SegmentationMask) -> Frame {
        let (width, height) = mask.dimensions();
        Frame::from_fn(width, height, |x, y| {
            let value = if mask.is_foreground(x, y) { 255 } else { 0 };
            image::Rgb([value, value, value])
        })
    }
}
