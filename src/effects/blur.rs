use super::FloatFrame;
use crate::segmentation::Frame;
use ndarray::{Array3, Axis};

/// Build a normalized 1D Gaussian kernel of odd `size`
pub fn gaussian_kernel(size: usize, sigma: f32) -> Vec<f32> {
    debug_assert!(size % 2 == 1, "kernel size must be odd");

    let radius = (size / 2) as f32;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - radius;
            (-(d * d) / denom).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Reflect an out-of-range index back into `0..len`, without repeating the edge
/// (`gfedcb|abcdefgh|gfedcba`)
fn reflect_101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let mut i = index.rem_euclid(period);
    if i >= len as isize {
        i = period - i;
    }
    i as usize
}

pub fn to_float(frame: &Frame) -> FloatFrame {
    let (width, height) = frame.dimensions();
    Array3::from_shape_fn((height as usize, width as usize, 3), |(y, x, c)| {
        frame.get_pixel(x as u32, y as u32)[c] as f32
    })
}

/// Separable Gaussian blur over a float copy of `frame`
pub fn gaussian_blur(frame: &Frame, kernel: &[f32]) -> FloatFrame {
    let _span = tracing::debug_span!("gaussian_blur").entered();

    let source = to_float(frame);
    let horizontal = convolve_axis(&source, kernel, Axis(1));
    convolve_axis(&horizontal, kernel, Axis(0))
}

fn convolve_axis(input: &FloatFrame, kernel: &[f32], axis: Axis) -> FloatFrame {
    let (height, width, channels) = input.dim();
    let radius = (kernel.len() / 2) as isize;
    let len = input.len_of(axis);

    Array3::from_shape_fn((height, width, channels), |(y, x, c)| {
        let center = (if axis == Axis(0) { y } else { x }) as isize;
        kernel
            .iter()
            .enumerate()
            .map(|(k, weight)| {
                let i = reflect_101(center + k as isize - radius, len);
                let value = if axis == Axis(0) {
                    input[[i, x, c]]
                } else {
                    input[[y, i, c]]
                };
                weight * value
            })
            .sum()
    })
}
