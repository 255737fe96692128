// THEORY:
// Two failure classes exist in the vision core and they never mix. A `ConfigError`
// can only happen while the pipeline is being built; once `HandTrackingPipeline::new`
// returns `Ok`, no configuration problem can surface again. A `FrameError` is
// raised per tick for a buffer that does not match the configured geometry, and the
// caller decides whether to skip that tick or stop.
//
// "No detection", "lost track" and "unknown gesture" are NOT errors. They are
// regular states carried in the result types.

use thiserror::Error;

/// The HSV channel a range bound refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HsvChannel {
    Hue,
    Saturation,
    Value,
}

impl std::fmt::Display for HsvChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HsvChannel::Hue => "hue",
            HsvChannel::Saturation => "saturation",
            HsvChannel::Value => "value",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("at least one player must be configured")]
    NoPlayers,

    #[error("player name `{0}` is used more than once")]
    DuplicatePlayer(String),

    #[error("player `{player}` has no color ranges")]
    EmptyColorRanges { player: String },

    #[error("player `{player}`: {channel} lower bound {lower} exceeds upper bound {upper}")]
    InvertedRange {
        player: String,
        channel: HsvChannel,
        lower: u8,
        upper: u8,
    },

    #[error("player `{player}`: hue bound {value} is above the maximum of {max}")]
    HueOutOfRange { player: String, value: u8, max: u8 },

    #[error("`{name}` must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("`{name}` must be a finite, non-negative number, got {value}")]
    InvalidNoise { name: &'static str, value: f64 },

    #[error("`{name}` must lie in [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },

    #[error("`{name}`: lower edge {low} is above upper edge {high}")]
    InvertedBand {
        name: &'static str,
        low: f64,
        high: f64,
    },

    #[error("morphology kernel size must be odd and at least 1, got {0}")]
    InvalidKernel(u32),

    #[error("smoother debounce ({debounce}) must be smaller than the window ({window})")]
    DebounceNotBelowWindow { debounce: usize, window: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is {actual_width}x{actual_height}, pipeline expects {expected_width}x{expected_height}")]
    Dimensions {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("frame has {actual} channels, pipeline expects {expected}")]
    Channels { expected: u8, actual: u8 },

    #[error("frame buffer holds {actual} bytes, its header describes {expected}")]
    BufferLength { expected: usize, actual: usize },
}
