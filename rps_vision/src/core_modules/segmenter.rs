// THEORY:
// The `ColorSegmenter` is the first stage of every tick. It turns a color frame
// into one binary presence mask per player, using nothing but that player's HSV
// ranges. It is a pure function of (frame, ranges, kernel): the same inputs always
// give the same mask, and no state survives between calls.
//
// Steps:
// 1.  **HSV conversion**: the frame is converted once per tick and shared by all
//     players (`HsvImage`).
// 2.  **Thresholding**: a pixel is foreground when it falls inside ANY of the
//     player's inclusive ranges.
// 3.  **Cleanup**: an opening (erode -> dilate) drops isolated specks, then a
//     closing (dilate -> erode) seals pinholes and hairline gaps. Both run on
//     `imageproc`'s distance-transform morphology with a square (L-infinity)
//     structuring element.

use crate::config::SegmenterConfig;
use crate::core_modules::frame::Frame;
use crate::core_modules::hsv::{HsvPixel, HsvRange};
use image::GrayImage;
use tracing::trace;

/// Single-channel binary mask; foreground pixels are `FOREGROUND`, the rest 0.
pub type Mask = GrayImage;

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// A frame converted to HSV, shared by every player's thresholding in one tick.
pub struct HsvImage {
    width: u32,
    height: u32,
    pixels: Vec<HsvPixel>,
}

impl HsvImage {
    pub fn from_frame(frame: &Frame<'_>) -> Self {
        Self {
            width: frame.width(),
            height: frame.height(),
            pixels: frame
                .pixels()
                .map(|(r, g, b)| HsvPixel::from_rgb(r, g, b))
                .collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[HsvPixel] {
        &self.pixels
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColorSegmenter {
    kernel_size: u32,
    iterations: u32,
}

impl ColorSegmenter {
    pub fn new(config: &SegmenterConfig) -> Self {
        Self {
            kernel_size: config.kernel_size,
            iterations: config.iterations,
        }
    }

    /// Thresholds and cleans one player's mask.
    pub fn segment(&self, hsv: &HsvImage, ranges: &[HsvRange]) -> Mask {
        let raw = threshold(hsv, ranges);
        let opened = morphology::open(&raw, self.kernel_size, self.iterations);
        let cleaned = morphology::close(&opened, self.kernel_size, self.iterations);
        trace!(
            raw = count_foreground(&raw),
            cleaned = count_foreground(&cleaned),
            "segmented mask"
        );
        cleaned
    }

    /// Convenience for a single player: converts and segments in one call.
    pub fn segment_frame(&self, frame: &Frame<'_>, ranges: &[HsvRange]) -> Mask {
        self.segment(&HsvImage::from_frame(frame), ranges)
    }
}

/// Inclusive in-range test, OR-ed over all ranges.
pub fn threshold(hsv: &HsvImage, ranges: &[HsvRange]) -> Mask {
    let mut mask = GrayImage::new(hsv.width, hsv.height);
    let dst: &mut [u8] = &mut mask;
    for (out, pixel) in dst.iter_mut().zip(hsv.pixels.iter()) {
        if ranges.iter().any(|range| range.contains(*pixel)) {
            *out = FOREGROUND;
        }
    }
    mask
}

pub fn count_foreground(mask: &Mask) -> usize {
    mask.as_raw().iter().filter(|&&v| v == FOREGROUND).count()
}

pub mod morphology {
    use super::Mask;
    use imageproc::distance_transform::Norm;
    use imageproc::morphology as ops;

    /// Chebyshev radius of a `kernel` x `kernel` square, applied `iterations`
    /// times. Repeated square passes compose into one larger square.
    fn radius(kernel: u32, iterations: u32) -> u8 {
        let r = (kernel / 2).saturating_mul(iterations.max(1));
        u8::try_from(r).unwrap_or(u8::MAX)
    }

    /// Erosion with a `kernel` x `kernel` square. Only background pixels inside
    /// the image erode, so blobs touching the frame edge keep their border.
    pub fn erode(mask: &Mask, kernel: u32) -> Mask {
        ops::erode(mask, Norm::LInf, radius(kernel, 1))
    }

    pub fn dilate(mask: &Mask, kernel: u32) -> Mask {
        ops::dilate(mask, Norm::LInf, radius(kernel, 1))
    }

    /// Erode then dilate, `iterations` times each.
    pub fn open(mask: &Mask, kernel: u32, iterations: u32) -> Mask {
        ops::open(mask, Norm::LInf, radius(kernel, iterations))
    }

    /// Dilate then erode, `iterations` times each.
    pub fn close(mask: &Mask, kernel: u32, iterations: u32) -> Mask {
        ops::close(mask, Norm::LInf, radius(kernel, iterations))
    }
}
