// THEORY:
// The `tracker` module adds "object permanence" to a single player's hand. The
// blob locator is stateless and may miss the hand for a few ticks (motion blur,
// a sleeve crossing the glove); the tracker bridges those gaps and smooths the
// jittery centroid into a stable position estimate.
//
// Key architectural principles:
// 1.  **Constant-velocity Kalman filter**: state is `[x, y, vx, vy]`. Every tick
//     predicts forward by `dt`; a centroid, when present, is fused through the
//     standard gain update.
// 2.  **Lifecycle**: a track is born on the first detection, coasts on the
//     prediction while detections are missing, and is declared lost once the miss
//     count reaches the loss threshold. A lost track reports no position. The next
//     detection starts a fresh track from a wide prior, so stale velocity from
//     before the occlusion can never bias it.
// 3.  **Explicit state**: `TrackState` is plain data owned by the pipeline. The
//     `KalmanTracker` is immutable after construction and every transition is a
//     pure `(state, observation) -> state` step.

use crate::config::KalmanConfig;
use crate::core_modules::blob::Position;
use nalgebra::{SMatrix, SVector};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

pub type StateVec = SVector<f32, 4>;
pub type CovMat = SMatrix<f32, 4, 4>;
type MeasurementVec = SVector<f32, 2>;
type MeasurementCov = SMatrix<f32, 2, 2>;
type ObservationMat = SMatrix<f32, 2, 4>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("innovation covariance is not invertible")]
    Inversion,
}

/// What the tracker reports for one player in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrackedPosition {
    /// No detection has ever been made this session.
    Searching,
    /// Corrected with a detection this tick.
    Tracking { position: Position },
    /// No detection this tick; the prediction is reported.
    Coasting { position: Position, missed_frames: u32 },
    /// Too many consecutive misses; no position until the next detection.
    Lost { missed_frames: u32 },
}

impl TrackedPosition {
    pub fn position(&self) -> Option<Position> {
        match self {
            TrackedPosition::Tracking { position } | TrackedPosition::Coasting { position, .. } => {
                Some(*position)
            }
            TrackedPosition::Searching | TrackedPosition::Lost { .. } => None,
        }
    }

    pub fn is_lost(&self) -> bool {
        matches!(self, TrackedPosition::Lost { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackPhase {
    Uninitialized,
    Active,
    Lost,
}

/// Per-player filter state. Owned by the pipeline, advanced by `KalmanTracker::step`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackState {
    mean: StateVec,
    covariance: CovMat,
    missed_frames: u32,
    phase: TrackPhase,
}

impl Default for TrackState {
    fn default() -> Self {
        Self {
            mean: StateVec::zeros(),
            covariance: CovMat::zeros(),
            missed_frames: 0,
            phase: TrackPhase::Uninitialized,
        }
    }
}

impl TrackState {
    pub fn position(&self) -> Option<Position> {
        match self.phase {
            TrackPhase::Active => Some(Position::new(self.mean[0], self.mean[1])),
            TrackPhase::Uninitialized | TrackPhase::Lost => None,
        }
    }

    pub fn velocity(&self) -> (f32, f32) {
        (self.mean[2], self.mean[3])
    }

    pub fn covariance(&self) -> &CovMat {
        &self.covariance
    }

    pub fn missed_frames(&self) -> u32 {
        self.missed_frames
    }

    pub fn is_lost(&self) -> bool {
        self.phase == TrackPhase::Lost
    }
}

/// Result of one tracker tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackUpdate {
    pub state: TrackState,
    pub position: TrackedPosition,
    /// The motion model's prediction for this tick, before any correction.
    /// `None` when no track existed going into the tick.
    pub predicted: Option<Position>,
}

#[derive(Debug, Clone)]
pub struct KalmanTracker {
    transition: CovMat,
    process_noise: CovMat,
    observation: ObservationMat,
    measurement_noise: MeasurementCov,
    initial_covariance: CovMat,
    loss_threshold: u32,
}

impl KalmanTracker {
    pub fn new(config: &KalmanConfig) -> Self {
        let dt = config.dt;
        #[rustfmt::skip]
        let transition = CovMat::new(
            1.0, 0.0, dt,  0.0,
            0.0, 1.0, 0.0, dt,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        #[rustfmt::skip]
        let observation = ObservationMat::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        );
        Self {
            transition,
            process_noise: CovMat::identity() * config.process_noise,
            observation,
            measurement_noise: MeasurementCov::identity() * config.measurement_noise,
            initial_covariance: CovMat::identity() * config.initial_covariance,
            loss_threshold: config.loss_threshold,
        }
    }

    /// Advances the mean by one tick and inflates the covariance by process noise.
    pub fn predict(&self, mean: &StateVec, covariance: &CovMat) -> (StateVec, CovMat) {
        let mean = self.transition * mean;
        let covariance = self.transition * covariance * self.transition.transpose() + self.process_noise;
        (mean, covariance)
    }

    /// Fuses a position measurement into a predicted state.
    pub fn correct(
        &self,
        mean: &StateVec,
        covariance: &CovMat,
        measurement: Position,
    ) -> Result<(StateVec, CovMat), FilterError> {
        let z = MeasurementVec::new(measurement.x, measurement.y);
        let innovation = z - self.observation * mean;
        let innovation_cov =
            self.observation * covariance * self.observation.transpose() + self.measurement_noise;
        let innovation_cov_inv = innovation_cov.try_inverse().ok_or(FilterError::Inversion)?;
        let gain = covariance * self.observation.transpose() * innovation_cov_inv;

        let mean = mean + gain * innovation;
        let covariance = (CovMat::identity() - gain * self.observation) * covariance;
        Ok((mean, covariance))
    }

    /// A new track centered on `measurement` with zero velocity and the wide prior,
    /// corrected once with that same measurement.
    fn start_track(&self, measurement: Position) -> TrackState {
        let mean = StateVec::new(measurement.x, measurement.y, 0.0, 0.0);
        let (mean, covariance) = match self.correct(&mean, &self.initial_covariance, measurement) {
            Ok(corrected) => corrected,
            Err(_) => (mean, self.initial_covariance),
        };
        TrackState {
            mean,
            covariance,
            missed_frames: 0,
            phase: TrackPhase::Active,
        }
    }

    /// One tick: predict, then correct or coast.
    pub fn step(&self, state: &TrackState, measurement: Option<Position>) -> TrackUpdate {
        match (state.phase, measurement) {
            (TrackPhase::Uninitialized, None) => TrackUpdate {
                state: state.clone(),
                position: TrackedPosition::Searching,
                predicted: None,
            },
            (TrackPhase::Lost, None) => {
                let missed_frames = state.missed_frames.saturating_add(1);
                TrackUpdate {
                    state: TrackState {
                        missed_frames,
                        ..state.clone()
                    },
                    position: TrackedPosition::Lost { missed_frames },
                    predicted: None,
                }
            }
            (TrackPhase::Uninitialized | TrackPhase::Lost, Some(z)) => {
                let fresh = self.start_track(z);
                TrackUpdate {
                    position: TrackedPosition::Tracking {
                        position: Position::new(fresh.mean[0], fresh.mean[1]),
                    },
                    state: fresh,
                    predicted: None,
                }
            }
            (TrackPhase::Active, observation) => {
                let (mean, covariance) = self.predict(&state.mean, &state.covariance);
                let predicted = Position::new(mean[0], mean[1]);
                match observation {
                    Some(z) => self.corrected(mean, covariance, z, predicted),
                    None => self.coasted(state, mean, covariance, predicted),
                }
            }
        }
    }

    fn corrected(&self, mean: StateVec, covariance: CovMat, z: Position, predicted: Position) -> TrackUpdate {
        let state = match self.correct(&mean, &covariance, z) {
            Ok((mean, covariance)) => TrackState {
                mean,
                covariance,
                missed_frames: 0,
                phase: TrackPhase::Active,
            },
            Err(err) => {
                warn!(%err, "restarting track from the raw measurement");
                self.start_track(z)
            }
        };
        TrackUpdate {
            position: TrackedPosition::Tracking {
                position: Position::new(state.mean[0], state.mean[1]),
            },
            state,
            predicted: Some(predicted),
        }
    }

    fn coasted(&self, previous: &TrackState, mean: StateVec, covariance: CovMat, predicted: Position) -> TrackUpdate {
        let missed_frames = previous.missed_frames.saturating_add(1);
        if missed_frames >= self.loss_threshold {
            return TrackUpdate {
                state: TrackState {
                    mean,
                    covariance,
                    missed_frames,
                    phase: TrackPhase::Lost,
                },
                position: TrackedPosition::Lost { missed_frames },
                predicted: Some(predicted),
            };
        }
        TrackUpdate {
            state: TrackState {
                mean,
                covariance,
                missed_frames,
                phase: TrackPhase::Active,
            },
            position: TrackedPosition::Coasting {
                position: predicted,
                missed_frames,
            },
            predicted: Some(predicted),
        }
    }
}
