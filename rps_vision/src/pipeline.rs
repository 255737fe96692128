// THEORY:
// The `pipeline` module is the top-level API of the vision core. It runs one tick
// at a time, single-threaded and in a strict order:
//
//   Segmenter -> Locator -> Tracker -> Classifier -> Smoother
//
// for every player in ascending `PlayerId` order. The overlay is separate and
// strictly downstream (`annotate`): it consumes a finished `TickReport` and can
// never influence the next tick.
//
// Per-player memory is exactly two plain structs, `TrackState` and
// `SmootherState`, held in a `Vec` indexed by `PlayerId`. Each tick replaces them
// with the output of pure step functions. The frame and the masks live only for
// the duration of `process`.

use crate::config::PipelineConfig;
use crate::core_modules::blob::{BoundingBox, Position};
use crate::core_modules::blob_locator::BlobLocator;
use crate::core_modules::frame::Frame;
use crate::core_modules::gesture::{GestureClassifier, ShapeDescriptors};
use crate::core_modules::overlay::Overlay;
use crate::core_modules::segmenter::{ColorSegmenter, HsvImage, Mask};
use crate::core_modules::smoother::{SmootherState, TemporalSmoother};
use crate::core_modules::tracker::{KalmanTracker, TrackState};
use crate::error::{ConfigError, FrameError};
use image::RgbImage;
use serde::Serialize;
use tracing::{debug, info, warn};

// Re-export the result vocabulary for the public API.
pub use crate::core_modules::gesture::Gesture;
pub use crate::core_modules::tracker::TrackedPosition;

/// Index of a player in config order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PlayerId(pub usize);

impl PlayerId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The located hand for one player in one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    pub centroid: Position,
    pub area: u32,
    pub descriptors: Option<ShapeDescriptors>,
}

/// Per-player output of one tick. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerResult {
    pub player: PlayerId,
    pub name: String,
    pub frame_index: u64,
    /// Filtered position, or why there is none.
    pub position: TrackedPosition,
    /// The motion model's prediction for this tick, before correction.
    pub predicted: Option<Position>,
    pub stable_gesture: Gesture,
    pub raw_gesture: Gesture,
    /// Confidence of `raw_gesture`.
    pub confidence: f32,
    pub detection: Option<Detection>,
    pub ticks_since_change: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub frame_index: u64,
    pub results: Vec<TrackerResult>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerState {
    pub track: TrackState,
    pub smoothing: SmootherState,
}

/// The main, top-level struct for the vision core.
pub struct HandTrackingPipeline {
    config: PipelineConfig,
    segmenter: ColorSegmenter,
    locator: BlobLocator,
    tracker: KalmanTracker,
    classifier: GestureClassifier,
    smoother: TemporalSmoother,
    overlay: Overlay,
    players: Vec<PlayerState>,
    frame_index: u64,
}

impl HandTrackingPipeline {
    /// Validates `config` and builds the pipeline. No frame is ever processed with
    /// an invalid config.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            players = ?config.players.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            width = config.frame.width,
            height = config.frame.height,
            window = config.smoother.window,
            debounce = config.smoother.debounce,
            loss_threshold = config.kalman.loss_threshold,
            "hand tracking pipeline ready"
        );
        Ok(Self {
            segmenter: ColorSegmenter::new(&config.segmenter),
            locator: BlobLocator::new(&config.blob),
            tracker: KalmanTracker::new(&config.kalman),
            classifier: GestureClassifier::new(&config.classifier),
            smoother: TemporalSmoother::new(&config.smoother),
            overlay: Overlay::new(&config.players),
            players: vec![PlayerState::default(); config.players.len()],
            frame_index: 0,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Index of the next frame to be processed.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn player_state(&self, player: PlayerId) -> Option<&PlayerState> {
        self.players.get(player.index())
    }

    /// Back to the state right after construction: every player searching, every
    /// history empty.
    pub fn reset(&mut self) {
        info!("resetting per-player state");
        self.players = vec![PlayerState::default(); self.config.players.len()];
        self.frame_index = 0;
    }

    /// Runs one tick. A malformed frame is rejected before any state changes.
    pub fn process(&mut self, frame: &Frame<'_>) -> Result<TickReport, FrameError> {
        self.run(frame, None)
    }

    /// Same as `process`, and also hands back each player's cleaned mask in
    /// `PlayerId` order. Meant for color calibration and debugging.
    pub fn process_with_masks(&mut self, frame: &Frame<'_>) -> Result<(TickReport, Vec<Mask>), FrameError> {
        let mut masks = Vec::with_capacity(self.players.len());
        let report = self.run(frame, Some(&mut masks))?;
        Ok((report, masks))
    }

    fn run(&mut self, frame: &Frame<'_>, mut masks: Option<&mut Vec<Mask>>) -> Result<TickReport, FrameError> {
        frame.validate(self.config.frame.width, self.config.frame.height)?;

        let frame_index = self.frame_index;
        let hsv = HsvImage::from_frame(frame);
        let mut results = Vec::with_capacity(self.players.len());

        for (index, (player, state)) in self.config.players.iter().zip(self.players.iter_mut()).enumerate() {
            let mask = self.segmenter.segment(&hsv, player.ranges());
            let blob = self.locator.locate(&mask);
            if let Some(masks) = masks.as_deref_mut() {
                masks.push(mask);
            }

            let update = self.tracker.step(&state.track, blob.as_ref().map(|b| b.centroid));
            if update.position.is_lost() && !state.track.is_lost() {
                warn!(player = %player.name, missed_frames = update.state.missed_frames(), "track lost");
            }

            let sample = self.classifier.classify(blob.as_ref(), frame_index);
            let smoothing = self.smoother.step(&state.smoothing, &sample);

            debug!(
                player = %player.name,
                frame_index,
                area = blob.as_ref().map(|b| b.area),
                raw = %sample.gesture,
                confidence = sample.confidence,
                stable = %smoothing.stable(),
                position = ?update.position,
                "tick"
            );

            results.push(TrackerResult {
                player: PlayerId(index),
                name: player.name.clone(),
                frame_index,
                position: update.position,
                predicted: update.predicted,
                stable_gesture: smoothing.stable(),
                raw_gesture: sample.gesture,
                confidence: sample.confidence,
                detection: blob.map(|b| Detection {
                    bounding_box: b.bounding_box,
                    centroid: b.centroid,
                    area: b.area,
                    descriptors: sample.descriptors,
                }),
                ticks_since_change: smoothing.ticks_since_change(),
            });

            *state = PlayerState {
                track: update.state,
                smoothing,
            };
        }

        self.frame_index += 1;
        Ok(TickReport { frame_index, results })
    }

    /// Convenience for owned RGB images.
    pub fn process_image(&mut self, image: &RgbImage) -> Result<TickReport, FrameError> {
        self.process(&Frame::from_rgb_image(image))
    }

    /// Draws `report` onto a copy of `frame`. Has no effect on pipeline state.
    pub fn annotate(&self, frame: &Frame<'_>, report: &TickReport) -> RgbImage {
        self.overlay.render(frame, &report.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlayerConfig;
    use crate::core_modules::hsv::HsvRange;
    use crate::core_modules::segmenter::count_foreground;
    use image::Rgb;

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::new(
            160,
            120,
            vec![
                PlayerConfig::new("red", vec![HsvRange::new([0, 100, 100], [10, 255, 255])]),
                PlayerConfig::new("blue", vec![HsvRange::new([100, 100, 100], [130, 255, 255])]),
            ],
        );
        config.blob.min_area = 200;
        config
    }

    fn frame_with_square(x0: u32, y0: u32, size: u32, color: [u8; 3]) -> RgbImage {
        let mut image = RgbImage::new(160, 120);
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                image.put_pixel(x, y, Rgb(color));
            }
        }
        image
    }

    #[test]
    fn invalid_config_never_builds() {
        let mut bad = config();
        bad.players.clear();
        assert!(matches!(HandTrackingPipeline::new(bad), Err(ConfigError::NoPlayers)));
    }

    #[test]
    fn malformed_frame_is_rejected_without_side_effects() {
        let mut pipeline = HandTrackingPipeline::new(config()).unwrap();
        let wrong = RgbImage::new(80, 60);
        assert!(matches!(
            pipeline.process_image(&wrong),
            Err(FrameError::Dimensions { .. })
        ));
        assert_eq!(pipeline.frame_index(), 0);
        assert_eq!(pipeline.player_state(PlayerId(0)), Some(&PlayerState::default()));
    }

    #[test]
    fn results_come_in_player_order() {
        let mut pipeline = HandTrackingPipeline::new(config()).unwrap();
        let image = frame_with_square(40, 30, 30, [220, 20, 20]);
        let report = pipeline.process_image(&image).unwrap();

        assert_eq!(report.frame_index, 0);
        let ids: Vec<_> = report.results.iter().map(|r| r.player).collect();
        assert_eq!(ids, vec![PlayerId(0), PlayerId(1)]);

        let red = &report.results[0];
        assert!(red.detection.is_some());
        assert!(matches!(red.position, TrackedPosition::Tracking { .. }));

        let blue = &report.results[1];
        assert!(blue.detection.is_none());
        assert_eq!(blue.position, TrackedPosition::Searching);
        assert_eq!(blue.raw_gesture, Gesture::Unknown);
        assert_eq!(blue.confidence, 0.0);
    }

    #[test]
    fn reset_returns_to_the_initial_state() {
        let mut pipeline = HandTrackingPipeline::new(config()).unwrap();
        let image = frame_with_square(40, 30, 30, [220, 20, 20]);
        for _ in 0..4 {
            pipeline.process_image(&image).unwrap();
        }
        assert_ne!(pipeline.player_state(PlayerId(0)), Some(&PlayerState::default()));

        pipeline.reset();
        assert_eq!(pipeline.frame_index(), 0);
        assert_eq!(pipeline.player_state(PlayerId(0)), Some(&PlayerState::default()));
        assert_eq!(pipeline.player_state(PlayerId(2)), None);
    }

    #[test]
    fn annotation_does_not_touch_state() {
        let mut pipeline = HandTrackingPipeline::new(config()).unwrap();
        let image = frame_with_square(40, 30, 30, [220, 20, 20]);
        let report = pipeline.process_image(&image).unwrap();
        let before = pipeline.player_state(PlayerId(0)).cloned();

        let annotated = pipeline.annotate(&Frame::from_rgb_image(&image), &report);
        assert_eq!(annotated.dimensions(), (160, 120));
        assert_ne!(annotated.as_raw(), image.as_raw());
        assert_eq!(pipeline.player_state(PlayerId(0)).cloned(), before);
    }

    #[test]
    fn masks_are_returned_on_request_only() {
        let image = frame_with_square(40, 30, 30, [220, 20, 20]);
        let mut plain = HandTrackingPipeline::new(config()).unwrap();
        let mut debugging = HandTrackingPipeline::new(config()).unwrap();

        let expected = plain.process_image(&image).unwrap();
        let (report, masks) = debugging.process_with_masks(&Frame::from_rgb_image(&image)).unwrap();

        assert_eq!(report, expected);
        assert_eq!(masks.len(), 2);
        assert!(masks.iter().all(|m| m.dimensions() == (160, 120)));
        assert_eq!(count_foreground(&masks[0]), 900);
        assert_eq!(count_foreground(&masks[1]), 0);
        assert_eq!(debugging.player_state(PlayerId(0)), plain.player_state(PlayerId(0)));
    }

    #[test]
    fn results_serialize_to_json() {
        let mut pipeline = HandTrackingPipeline::new(config()).unwrap();
        let report = pipeline.process_image(&frame_with_square(40, 30, 30, [220, 20, 20])).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["results"][0]["name"], "red");
        assert_eq!(json["results"][0]["position"]["state"], "tracking");
        assert_eq!(json["results"][1]["position"]["state"], "searching");
        assert_eq!(json["results"][1]["stable_gesture"], "UNKNOWN");
    }
}
