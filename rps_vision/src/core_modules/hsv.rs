// THEORY (single-pixel HSV):
// Color segmentation happens in hue/saturation/value space because a glove's hue
// survives lighting changes far better than its raw RGB triplet. This module is
// strictly 1D: every function looks at one pixel and nothing else.
//
// Scale convention (matches the calibration tooling that produces the ranges):
// - hue:        0..=179, half-degrees on the color wheel
// - saturation: 0..=255, chroma / max channel
// - value:      0..=255, the max channel
//
// Red straddles the 0/179 seam, which is why a player's color may be several
// ranges OR-ed together rather than one.

use serde::{Deserialize, Serialize};

pub type Channel = u8;
pub type NormalizedChannel = f32;
pub type HueDegrees = f32;

/// Largest representable hue on the half-degree scale.
pub const HUE_MAX: Channel = 179;

/// One pixel in the half-degree HSV space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HsvPixel {
    pub hue: Channel,
    pub saturation: Channel,
    pub value: Channel,
}

impl HsvPixel {
    pub fn from_rgb(red: Channel, green: Channel, blue: Channel) -> Self {
        let red_normalized = red as NormalizedChannel / 255.0;
        let green_normalized = green as NormalizedChannel / 255.0;
        let blue_normalized = blue as NormalizedChannel / 255.0;

        let maximum_channel = red_normalized.max(green_normalized.max(blue_normalized));
        let minimum_channel = red_normalized.min(green_normalized.min(blue_normalized));
        let chroma = maximum_channel - minimum_channel;

        let hue_degrees = hue_degrees(
            red_normalized,
            green_normalized,
            blue_normalized,
            maximum_channel,
            chroma,
        );

        let saturation = if maximum_channel <= 1e-6 {
            0.0
        } else {
            chroma / maximum_channel
        };

        let mut hue = (hue_degrees / 2.0).round() as u16;
        if hue > HUE_MAX as u16 {
            hue = 0;
        }

        Self {
            hue: hue as Channel,
            saturation: (saturation * 255.0).round() as Channel,
            value: red.max(green.max(blue)),
        }
    }
}

/// Hue angle in degrees [0, 360), computed on normalized sRGB without linearization.
fn hue_degrees(
    red: NormalizedChannel,
    green: NormalizedChannel,
    blue: NormalizedChannel,
    maximum_channel: NormalizedChannel,
    chroma: NormalizedChannel,
) -> HueDegrees {
    if chroma <= 1e-6 {
        return 0.0;
    }

    let inverse_chroma = 1.0 / chroma;

    let (base_difference, sector_offset) = if maximum_channel == red {
        (green - blue, 0.0)
    } else if maximum_channel == green {
        (blue - red, 2.0)
    } else {
        (red - green, 4.0)
    };

    let mut hue_degrees = (base_difference * inverse_chroma + sector_offset) * 60.0;
    if hue_degrees < 0.0 {
        hue_degrees += 360.0;
    }
    hue_degrees
}

/// An inclusive HSV box: `[lower, upper]` per channel, in `[h, s, v]` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [Channel; 3],
    pub upper: [Channel; 3],
}

impl HsvRange {
    pub fn new(lower: [Channel; 3], upper: [Channel; 3]) -> Self {
        Self { lower, upper }
    }

    #[inline]
    pub fn contains(&self, pixel: HsvPixel) -> bool {
        let channels = [pixel.hue, pixel.saturation, pixel.value];
        channels
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(c, (lo, hi))| lo <= c && c <= hi)
    }
}
