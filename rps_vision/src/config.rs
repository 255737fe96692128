// THEORY:
// Everything that was empirically tuned against one camera and one lighting setup
// lives here as a named, overridable value: color ranges, morphology, area floor,
// shape bands, filter noise and smoothing windows. The defaults are a reasonable
// starting point, not ground truth; expect to recalibrate per deployment.
//
// A config is loaded once, validated once, and is immutable for the session.
// `validate` is the single gate between user input and the per-tick path.

use crate::core_modules::hsv::{HUE_MAX, HsvRange};
use crate::error::{ConfigError, HsvChannel};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Top-level configuration for `HandTrackingPipeline`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Resolution every incoming frame must have.
    pub frame: FrameConfig,
    /// One entry per tracked hand. Order defines `PlayerId`s and processing order.
    pub players: Vec<PlayerConfig>,
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    #[serde(default)]
    pub blob: BlobConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub kalman: KalmanConfig,
    #[serde(default)]
    pub smoother: SmootherConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameConfig {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub name: String,
    #[serde(flatten)]
    pub color: ColorSpec,
    /// RGB used by the overlay for this player's annotations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_color: Option<[u8; 3]>,
}

/// A player's glove color: a single HSV box or several OR-ed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Ranges { ranges: Vec<HsvRange> },
    Single(HsvRange),
}

impl PlayerConfig {
    pub fn new(name: impl Into<String>, ranges: Vec<HsvRange>) -> Self {
        Self {
            name: name.into(),
            color: ColorSpec::Ranges { ranges },
            display_color: None,
        }
    }

    pub fn ranges(&self) -> &[HsvRange] {
        match &self.color {
            ColorSpec::Ranges { ranges } => ranges,
            ColorSpec::Single(range) => std::slice::from_ref(range),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Side of the square structuring element. Must be odd.
    pub kernel_size: u32,
    /// How many times opening and closing are each applied.
    pub iterations: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            kernel_size: 5,
            iterations: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Regions with fewer foreground pixels than this are never reported.
    pub min_area: u32,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self { min_area: 1500 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum distance (px) between a contour point and its hull edge for a defect.
    pub defect_min_depth: f32,
    /// Maximum opening angle (degrees) at a defect point; wider dips are not finger gaps.
    pub defect_max_angle_deg: f32,
    /// area / bounding-box area at or above which a blob may be a fist.
    pub rock_min_fill: f32,
    pub rock_max_defects: u32,
    /// Long side / short side of the bounding box at or above which a blob is a flat hand.
    pub paper_min_elongation: f32,
    /// Fill-ratio band of a flat hand seen face on.
    pub paper_fill_low: f32,
    pub paper_fill_high: f32,
    pub scissors_min_defects: u32,
    /// How far above 1.0 the elongation may go and still count as "near square".
    pub scissors_squareness_tolerance: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            defect_min_depth: 10.0,
            defect_max_angle_deg: 90.0,
            rock_min_fill: 0.85,
            rock_max_defects: 1,
            paper_min_elongation: 2.0,
            paper_fill_low: 0.55,
            paper_fill_high: 0.75,
            scissors_min_defects: 2,
            scissors_squareness_tolerance: 0.35,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Tick interval used by the constant-velocity model.
    pub dt: f32,
    /// Diagonal of the process noise covariance Q.
    pub process_noise: f32,
    /// Diagonal of the measurement noise covariance R.
    pub measurement_noise: f32,
    /// Diagonal of the prior covariance used when a track starts or restarts.
    pub initial_covariance: f32,
    /// Consecutive missed ticks after which the track is declared lost.
    pub loss_threshold: u32,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            dt: 1.0,
            process_noise: 1e-2,
            measurement_noise: 1e-1,
            initial_covariance: 10.0,
            loss_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    /// Number of raw samples kept per player (K).
    pub window: usize,
    /// Consecutive ticks a new majority must hold before it becomes stable (M < K).
    pub debounce: usize,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            window: 10,
            debounce: 3,
        }
    }
}

impl PipelineConfig {
    /// Builds a config with default tuning for the given resolution and players.
    pub fn new(width: u32, height: u32, players: Vec<PlayerConfig>) -> Self {
        Self {
            frame: FrameConfig { width, height },
            players,
            segmenter: SegmenterConfig::default(),
            blob: BlobConfig::default(),
            classifier: ClassifierConfig::default(),
            kalman: KalmanConfig::default(),
            smoother: SmootherConfig::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks every invariant the per-tick path relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_u32("frame.width", self.frame.width)?;
        positive_u32("frame.height", self.frame.height)?;

        if self.players.is_empty() {
            return Err(ConfigError::NoPlayers);
        }
        let mut seen = HashSet::new();
        for player in &self.players {
            if !seen.insert(player.name.as_str()) {
                return Err(ConfigError::DuplicatePlayer(player.name.clone()));
            }
            validate_ranges(player)?;
        }

        let kernel = self.segmenter.kernel_size;
        if kernel == 0 || kernel % 2 == 0 {
            return Err(ConfigError::InvalidKernel(kernel));
        }
        positive_u32("blob.min_area", self.blob.min_area)?;

        self.classifier.validate()?;
        self.kalman.validate()?;
        self.smoother.validate()?;
        Ok(())
    }
}

impl ClassifierConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("classifier.defect_min_depth", self.defect_min_depth)?;
        positive("classifier.defect_max_angle_deg", self.defect_max_angle_deg)?;
        unit_interval("classifier.defect_max_angle_deg", self.defect_max_angle_deg / 180.0)?;
        positive("classifier.rock_min_fill", self.rock_min_fill)?;
        unit_interval("classifier.rock_min_fill", self.rock_min_fill)?;
        positive("classifier.paper_min_elongation", self.paper_min_elongation)?;
        positive("classifier.paper_fill_low", self.paper_fill_low)?;
        unit_interval("classifier.paper_fill_high", self.paper_fill_high)?;
        if self.paper_fill_low > self.paper_fill_high {
            return Err(ConfigError::InvertedBand {
                name: "classifier.paper_fill_low/high",
                low: self.paper_fill_low as f64,
                high: self.paper_fill_high as f64,
            });
        }
        positive_u32("classifier.scissors_min_defects", self.scissors_min_defects)?;
        positive(
            "classifier.scissors_squareness_tolerance",
            self.scissors_squareness_tolerance,
        )?;
        Ok(())
    }
}

impl KalmanConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("kalman.dt", self.dt)?;
        if !self.process_noise.is_finite() || self.process_noise < 0.0 {
            return Err(ConfigError::InvalidNoise {
                name: "kalman.process_noise",
                value: self.process_noise as f64,
            });
        }
        if !self.measurement_noise.is_finite() {
            return Err(ConfigError::InvalidNoise {
                name: "kalman.measurement_noise",
                value: self.measurement_noise as f64,
            });
        }
        positive("kalman.measurement_noise", self.measurement_noise)?;
        positive("kalman.initial_covariance", self.initial_covariance)?;
        positive_u32("kalman.loss_threshold", self.loss_threshold)?;
        Ok(())
    }
}

impl SmootherConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive_count("smoother.window", self.window)?;
        positive_count("smoother.debounce", self.debounce)?;
        if self.debounce >= self.window {
            return Err(ConfigError::DebounceNotBelowWindow {
                debounce: self.debounce,
                window: self.window,
            });
        }
        Ok(())
    }
}

fn validate_ranges(player: &PlayerConfig) -> Result<(), ConfigError> {
    let ranges = player.ranges();
    if ranges.is_empty() {
        return Err(ConfigError::EmptyColorRanges {
            player: player.name.clone(),
        });
    }

    const CHANNELS: [HsvChannel; 3] = [HsvChannel::Hue, HsvChannel::Saturation, HsvChannel::Value];
    for range in ranges {
        for (i, channel) in CHANNELS.iter().enumerate() {
            if range.lower[i] > range.upper[i] {
                return Err(ConfigError::InvertedRange {
                    player: player.name.clone(),
                    channel: *channel,
                    lower: range.lower[i],
                    upper: range.upper[i],
                });
            }
        }
        if range.upper[0] > HUE_MAX {
            return Err(ConfigError::HueOutOfRange {
                player: player.name.clone(),
                value: range.upper[0],
                max: HUE_MAX,
            });
        }
    }
    Ok(())
}

fn positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive {
            name,
            value: value as f64,
        })
    }
}

fn positive_u32(name: &'static str, value: u32) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive {
            name,
            value: value as f64,
        })
    }
}

fn positive_count(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive {
            name,
            value: value as f64,
        })
    }
}

fn unit_interval(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange {
            name,
            value: value as f64,
        })
    }
}
