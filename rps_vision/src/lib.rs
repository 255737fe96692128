// THEORY:
// This file is the entry point for the `rps_vision` library crate. It exposes
// `HandTrackingPipeline` and its data structures (`PipelineConfig`,
// `TrackerResult`, `TickReport`, ...) as the high-level interface to the vision
// core. The stage implementations live in `core_modules` and are public so that
// each stage can be driven and tested on its own, but a consumer only ever needs
// the re-exports below.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use config::{
    BlobConfig, ClassifierConfig, ColorSpec, FrameConfig, KalmanConfig, PipelineConfig, PlayerConfig,
    SegmenterConfig, SmootherConfig,
};
pub use core_modules::blob::{Blob, BoundingBox, Point, Position};
pub use core_modules::frame::Frame;
pub use core_modules::hsv::HsvRange;
pub use core_modules::segmenter::Mask;
pub use error::{ConfigError, FrameError};
pub use pipeline::{
    Detection, Gesture, HandTrackingPipeline, PlayerId, PlayerState, TickReport, TrackedPosition, TrackerResult,
};
