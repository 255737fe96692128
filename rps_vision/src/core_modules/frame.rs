// THEORY:
// A `Frame` is a borrowed view over one tick's pixel buffer. The pipeline never
// copies or keeps it: every stage reads through the borrow and the borrow ends
// when the tick returns, so no component can hold on to pixel data across ticks.
//
// The buffer is packed RGB, row-major, 8 bits per channel. Lens correction has
// already been applied by whoever produced the buffer.

use crate::error::FrameError;
use image::RgbImage;

/// Channel count every frame must carry.
pub const FRAME_CHANNELS: u8 = 3;

/// A borrowed, read-only RGB frame for a single tick.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    width: u32,
    height: u32,
    channels: u8,
    data: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Wraps a raw buffer. Only the buffer length is checked here; dimensions and
    /// channel count are checked against the pipeline config by `validate`.
    pub fn new(width: u32, height: u32, channels: u8, data: &'a [u8]) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(FrameError::BufferLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn from_rgb_image(image: &'a RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            channels: FRAME_CHANNELS,
            data: image.as_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Rejects frames that do not match the configured resolution or channel count.
    /// Nothing is reshaped or guessed.
    pub fn validate(&self, expected_width: u32, expected_height: u32) -> Result<(), FrameError> {
        if self.channels != FRAME_CHANNELS {
            return Err(FrameError::Channels {
                expected: FRAME_CHANNELS,
                actual: self.channels,
            });
        }
        if self.width != expected_width || self.height != expected_height {
            return Err(FrameError::Dimensions {
                expected_width,
                expected_height,
                actual_width: self.width,
                actual_height: self.height,
            });
        }
        Ok(())
    }

    /// Iterates over `(r, g, b)` triplets in row-major order.
    pub fn pixels(self) -> impl Iterator<Item = (u8, u8, u8)> + 'a {
        self.data.chunks_exact(3).map(|px| (px[0], px[1], px[2]))
    }

    /// Copies the frame into an owned image, used by the overlay.
    pub fn to_rgb_image(&self) -> RgbImage {
        // Length was checked in `new`/`from_rgb_image`, so this cannot fail for
        // 3-channel frames; other channel counts fall back to a blank canvas.
        RgbImage::from_raw(self.width, self.height, self.data.to_vec())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}
