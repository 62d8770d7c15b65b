mod blur;

pub use blur::{gaussian_blur, gaussian_kernel};

use crate::segmentation::{Frame, Preprocessor, SegmentationMask, SegmentationModel};
use anyhow::{Context, Result};
use ndarray::Array3;

/// Floating-point frame, shape (height, width, 3)
pub type FloatFrame = Array3<f32>;

/// Background blur kernel size (square)
pub const BLUR_KERNEL_SIZE: usize = 99;

/// Background blur standard deviation
pub const BLUR_SIGMA: f32 = 30.0;

/// Trait for per-frame transforms driven by the transcoder
pub trait FrameProcessor {
    /// Produce a new frame; the input is left untouched
    fn process(&mut self, frame: &Frame) -> Result<Frame>;
}

/// Keeps the segmented subject sharp and blurs everything else
pub struct BackgroundBlur {
    model: Box<dyn SegmentationModel>,
    kernel: Vec<f32>,
    show_mask: bool,
}

impl BackgroundBlur {
    /// The model is owned and reused for every frame
    pub fn new(model: Box<dyn SegmentationModel>) -> Self {
        tracing::debug!("Segmentation input size: {:?}", model.input_size());
        Self {
            model,
            kernel: gaussian_kernel(BLUR_KERNEL_SIZE, BLUR_SIGMA),
            show_mask: false,
        }
    }

    /// Emit the thresholded mask instead of the composite
    pub fn with_mask_preview(mut self, show_mask: bool) -> Self {
        self.show_mask = show_mask;
        self
    }

    pub fn blur_frame(&mut self, frame: &Frame) -> Result<Frame> {
        let (width, height) = frame.dimensions();
        anyhow::ensure!(width > 0 && height > 0, "Cannot process an empty frame");

        let mask = self
            .model
            .segment(frame)
            .context("Failed to segment frame")?;

        if self.show_mask {
            return Ok(Preprocessor::mask_to_rgb(&mask));
        }

        let blurred = gaussian_blur(frame, &self.kernel);
        composite(frame, &blurred, &mask)
    }
}

impl FrameProcessor for BackgroundBlur {
    fn process(&mut self, frame: &Frame) -> Result<Frame> {
        self.blur_frame(frame)
    }
}

/// `mask * original + (1 - mask) * blurred`, with the mask thresholded per pixel
pub fn composite(original: &Frame, blurred: &FloatFrame, mask: &SegmentationMask) -> Result<Frame> {
    let (width, height) = original.dimensions();
    anyhow::ensure!(
        mask.dimensions() == (width, height),
        "Mask is {:?}, frame is {}x{}",
        mask.dimensions(),
        width,
        height
    );
    anyhow::ensure!(
        blurred.dim() == (height as usize, width as usize, 3),
        "Blurred frame has shape {:?}, frame is {}x{}",
        blurred.dim(),
        width,
        height
    );

    Ok(Frame::from_fn(width, height, |x, y| {
        if mask.is_foreground(x, y) {
            *original.get_pixel(x, y)
        } else {
            let (row, col) = (y as usize, x as usize);
            // Saturating cast truncates toward zero
            image::Rgb([
                blurred[[row, col, 0]].clamp(0.0, 255.0) as u8,
                blurred[[row, col, 1]].clamp(0.0, 255.0) as u8,
                blurred[[row, col, 2]].clamp(0.0, 255.0) as u8,
            ])
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::blur::to_float;
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Returns the same confidence for every pixel
    struct ConstantModel {
        confidence: f32,
        calls: Rc<Cell<usize>>,
    }

    impl SegmentationModel for ConstantModel {
        fn segment(&mut self, frame: &Frame) -> Result<SegmentationMask> {
            self.calls.set(self.calls.get() + 1);
            let (w, h) = frame.dimensions();
            Ok(SegmentationMask::filled(w, h, self.confidence))
        }

        fn input_size(&self) -> (u32, u32) {
            (256, 144)
        }
    }

    fn gradient_frame() -> Frame {
        Frame::from_fn(24, 16, |x, y| {
            image::Rgb([(x * 10) as u8, (y * 15) as u8, ((x + y) * 5) as u8])
        })
    }

    fn blur_with(confidence: f32) -> (BackgroundBlur, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let model = ConstantModel {
            confidence,
            calls: calls.clone(),
        };
        (BackgroundBlur::new(Box::new(model)), calls)
    }

    #[test]
    fn test_all_foreground_returns_original() {
        let frame = gradient_frame();
        let (mut blur, _) = blur_with(0.8);

        let out = blur.blur_frame(&frame).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn test_all_background_returns_blurred() {
        let frame = gradient_frame();
        let (mut blur, _) = blur_with(0.79);

        let out = blur.blur_frame(&frame).unwrap();
        let blurred = gaussian_blur(&frame, &gaussian_kernel(BLUR_KERNEL_SIZE, BLUR_SIGMA));

        assert_eq!(out.dimensions(), frame.dimensions());
        assert_ne!(out, frame);
        for (x, y, pixel) in out.enumerate_pixels() {
            for c in 0..3 {
                let expected = blurred[[y as usize, x as usize, c]] as u8;
                assert_eq!(pixel[c], expected);
            }
        }
    }

    #[test]
    fn test_input_frame_is_not_mutated() {
        let frame = gradient_frame();
        let copy = frame.clone();
        let (mut blur, _) = blur_with(0.0);

        blur.blur_frame(&frame).unwrap();
        assert_eq!(frame, copy);
    }

    #[test]
    fn test_model_is_reused_across_frames() {
        let frame = gradient_frame();
        let (mut blur, calls) = blur_with(1.0);

        for _ in 0..3 {
            blur.process(&frame).unwrap();
        }
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_mixed_mask_splits_pixels() {
        let frame = gradient_frame();
        let (w, h) = frame.dimensions();
        let confidence = (0..w * h)
            .map(|i| if i % w < w / 2 { 1.0 } else { 0.0 })
            .collect();
        let mask = SegmentationMask::new(w, h, confidence).unwrap();
        let blurred = gaussian_blur(&frame, &gaussian_kernel(BLUR_KERNEL_SIZE, BLUR_SIGMA));

        let out = composite(&frame, &blurred, &mask).unwrap();
        assert_eq!(out.get_pixel(0, 5), frame.get_pixel(0, 5));
        assert_eq!(out.get_pixel(w - 1, 5)[0], blurred[[5, (w - 1) as usize, 0]] as u8);
    }

    #[test]
    fn test_composite_rejects_mismatched_mask() {
        let frame = gradient_frame();
        let blurred = to_float(&frame);
        let mask = SegmentationMask::filled(4, 4, 1.0);
        assert!(composite(&frame, &blurred, &mask).is_err());
    }

    #[test]
    fn test_mask_preview() {
        let frame = gradient_frame();
        let (blur, _) = blur_with(0.9);
        let mut blur = blur.with_mask_preview(true);

        let out = blur.process(&frame).unwrap();
        assert!(out.pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn test_empty_frame_is_an_error() {
        let (mut blur, calls) = blur_with(1.0);
        assert!(blur.blur_frame(&Frame::new(0, 0)).is_err());
        assert_eq!(calls.get(), 0);
    }
}
