// THEORY:
// The `GestureClassifier` turns one tick's blob into a raw gesture label. It is a
// stateless shape heuristic; temporal consistency is the smoother's job.
//
// Shape descriptors:
// - **fill ratio**: blob area / bounding-box area. A fist fills its box.
// - **elongation**: long side / short side of the box, independent of whether
//   the hand is held upright or sideways.
// - **convexity defects**: deep, narrow dips between the contour and its convex
//   hull. Each one is a gap between two extended fingers.
// - **solidity**: blob area / hull area, reported for diagnostics.
//
// Bands are tested in a fixed precedence (ROCK, then PAPER, then SCISSORS), the
// first band that matches wins, and confidence grows with the margin by which the
// measurements clear that band's thresholds. When nothing matches the label is
// UNKNOWN and its confidence shrinks with the relative distance from the closest
// of the three band centers, so an almost-ROCK scores higher than a shapeless
// smear but always below any match.

use crate::config::ClassifierConfig;
use crate::core_modules::blob::Blob;
use crate::core_modules::contour::{convex_hull, convexity_defects, polygon_area};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gesture {
    Rock,
    Paper,
    Scissors,
    #[default]
    Unknown,
}

impl Gesture {
    pub const ALL: [Gesture; 4] = [Gesture::Rock, Gesture::Paper, Gesture::Scissors, Gesture::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gesture::Rock => "ROCK",
            Gesture::Paper => "PAPER",
            Gesture::Scissors => "SCISSORS",
            Gesture::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShapeDescriptors {
    pub fill_ratio: f32,
    pub aspect_ratio: f32,
    pub elongation: f32,
    pub solidity: f32,
    /// Defects deeper than the depth threshold and narrower than the angle limit.
    pub defects: u32,
    /// Rough count of extended fingers: one more than the defect count, at most five.
    pub fingers: u32,
}

/// One raw, per-tick classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GestureSample {
    pub gesture: Gesture,
    /// In [0, 1]. UNKNOWN samples always score below 0.5.
    pub confidence: f32,
    pub frame_index: u64,
    /// `None` when there was no blob or its contour was degenerate.
    pub descriptors: Option<ShapeDescriptors>,
}

impl GestureSample {
    pub fn absent(frame_index: u64) -> Self {
        Self {
            gesture: Gesture::Unknown,
            confidence: 0.0,
            frame_index,
            descriptors: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GestureClassifier {
    config: ClassifierConfig,
}

impl GestureClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self { config: *config }
    }

    pub fn describe(&self, blob: &Blob) -> Option<ShapeDescriptors> {
        let hull = convex_hull(&blob.contour);
        let hull_area = polygon_area(&blob.contour, &hull);
        if hull.len() < 3 || hull_area <= 0.0 {
            return None;
        }

        let defects = convexity_defects(&blob.contour, &hull)
            .iter()
            .filter(|d| d.depth > self.config.defect_min_depth && d.angle_deg < self.config.defect_max_angle_deg)
            .count() as u32;

        let solidity = (blob.area as f32 / hull_area).min(1.0);

        Some(ShapeDescriptors {
            fill_ratio: blob.fill_ratio(),
            aspect_ratio: blob.aspect_ratio(),
            elongation: blob.elongation(),
            solidity,
            defects,
            fingers: if defects > 0 { (defects + 1).min(5) } else { 0 },
        })
    }

    /// Classifies this tick's blob. A missing blob or a degenerate contour is
    /// UNKNOWN with zero confidence.
    pub fn classify(&self, blob: Option<&Blob>, frame_index: u64) -> GestureSample {
        let Some(descriptors) = blob.and_then(|b| self.describe(b)) else {
            return GestureSample::absent(frame_index);
        };
        let (gesture, confidence) = self.decide(&descriptors);
        GestureSample {
            gesture,
            confidence,
            frame_index,
            descriptors: Some(descriptors),
        }
    }

    fn decide(&self, d: &ShapeDescriptors) -> (Gesture, f32) {
        let c = &self.config;

        if d.fill_ratio >= c.rock_min_fill && d.defects <= c.rock_max_defects {
            let margin = (d.fill_ratio - c.rock_min_fill) / (1.0 - c.rock_min_fill).max(f32::EPSILON);
            return (Gesture::Rock, matched(margin));
        }

        let elongated = d.elongation >= c.paper_min_elongation;
        let in_flat_band = (c.paper_fill_low..=c.paper_fill_high).contains(&d.fill_ratio);
        if elongated || in_flat_band {
            let elongation_margin = if elongated {
                (d.elongation - c.paper_min_elongation) / c.paper_min_elongation
            } else {
                0.0
            };
            let band_margin = if in_flat_band {
                let half_width = ((c.paper_fill_high - c.paper_fill_low) / 2.0).max(f32::EPSILON);
                (d.fill_ratio - c.paper_fill_low).min(c.paper_fill_high - d.fill_ratio) / half_width
            } else {
                0.0
            };
            return (Gesture::Paper, matched(elongation_margin.max(band_margin)));
        }

        let squareness = d.elongation - 1.0;
        if d.defects >= c.scissors_min_defects && squareness <= c.scissors_squareness_tolerance {
            let defect_margin =
                ((d.defects - c.scissors_min_defects) as f32 + 1.0) / (c.scissors_min_defects as f32 + 1.0);
            let square_margin = (c.scissors_squareness_tolerance - squareness) / c.scissors_squareness_tolerance;
            return (Gesture::Scissors, matched(defect_margin.min(square_margin)));
        }

        let nearest = self
            .rock_distance(d)
            .min(self.paper_distance(d))
            .min(self.scissors_distance(d));
        (Gesture::Unknown, 0.5 * (1.0 - nearest.clamp(0.0, 1.0)))
    }

    // Distances below are relative offsets from each band's center. Bands that are
    // open on one side (elongation for PAPER, defect count for SCISSORS) use the
    // threshold plus one step as their center.

    fn rock_distance(&self, d: &ShapeDescriptors) -> f32 {
        let c = &self.config;
        let fill_center = (c.rock_min_fill + 1.0) / 2.0;
        let fill_offset = (d.fill_ratio - fill_center).abs() / fill_center;
        let defect_offset = d.defects as f32 / (c.rock_max_defects as f32 + 1.0);
        fill_offset.max(defect_offset)
    }

    fn paper_distance(&self, d: &ShapeDescriptors) -> f32 {
        let c = &self.config;
        let elongation_center = c.paper_min_elongation + 1.0;
        let elongation_offset = (d.elongation - elongation_center).abs() / elongation_center;
        let fill_center = (c.paper_fill_low + c.paper_fill_high) / 2.0;
        let fill_offset = (d.fill_ratio - fill_center).abs() / fill_center;
        elongation_offset.min(fill_offset)
    }

    fn scissors_distance(&self, d: &ShapeDescriptors) -> f32 {
        let c = &self.config;
        let defect_center = c.scissors_min_defects as f32 + 1.0;
        let defect_offset = (d.defects as f32 - defect_center).abs() / defect_center;
        let squareness_center = c.scissors_squareness_tolerance / 2.0;
        let squareness_offset = ((d.elongation - 1.0) - squareness_center).abs() / squareness_center;
        defect_offset.max(squareness_offset)
    }
}

fn matched(margin: f32) -> f32 {
    0.5 + 0.5 * margin.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::blob::{BoundingBox, Point};
    use std::f32::consts::TAU;

    fn ellipse(cx: f32, cy: f32, a: f32, b: f32, n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| {
                let t = TAU * i as f32 / n as f32;
                Point::new((cx + a * t.cos()).round() as i32, (cy + b * t.sin()).round() as i32)
            })
            .collect()
    }

    fn blob(contour: Vec<Point>, x: u32, y: u32, width: u32, height: u32, area: u32) -> Blob {
        let bounding_box = BoundingBox { x, y, width, height };
        Blob {
            contour,
            bounding_box,
            centroid: bounding_box.center(),
            area,
        }
    }

    fn classifier() -> GestureClassifier {
        GestureClassifier::new(&ClassifierConfig::default())
    }

    #[test]
    fn compact_round_blob_is_rock() {
        let fist = blob(ellipse(50.0, 50.0, 40.0, 40.0, 32), 10, 10, 80, 80, 6000);
        let sample = classifier().classify(Some(&fist), 7);
        assert_eq!(sample.gesture, Gesture::Rock);
        assert!(sample.confidence > 0.5 && sample.confidence <= 1.0);
        assert_eq!(sample.frame_index, 7);
        assert_eq!(sample.descriptors.map(|d| d.defects), Some(0));
    }

    #[test]
    fn elongated_blob_is_paper() {
        let hand = blob(ellipse(100.0, 50.0, 80.0, 30.0, 32), 20, 20, 161, 61, 7484);
        let sample = classifier().classify(Some(&hand), 0);
        assert_eq!(sample.gesture, Gesture::Paper);
        assert!(sample.confidence > 0.5);

        // Same hand held upright.
        let upright: Vec<Point> = hand.contour.iter().map(|p| Point::new(p.y, p.x)).collect();
        let hand = blob(upright, 20, 20, 61, 161, 7484);
        assert_eq!(classifier().classify(Some(&hand), 0).gesture, Gesture::Paper);
    }

    #[test]
    fn square_blob_with_finger_gaps_is_scissors() {
        let contour = [
            (0, 100),
            (0, 9),
            (3, 4),
            (6, 9),
            (6, 75),
            (31, 75),
            (31, 5),
            (34, 0),
            (37, 5),
            (37, 75),
            (62, 75),
            (62, 5),
            (65, 0),
            (68, 5),
            (68, 75),
            (94, 75),
            (94, 9),
            (97, 4),
            (100, 9),
            (100, 100),
        ]
        .iter()
        .map(|&(x, y)| Point::new(x, y))
        .collect();
        let prongs = blob(contour, 0, 0, 101, 101, 4000);
        let sample = classifier().classify(Some(&prongs), 0);
        assert_eq!(sample.gesture, Gesture::Scissors);
        let descriptors = sample.descriptors.unwrap();
        assert_eq!(descriptors.defects, 3);
        assert_eq!(descriptors.fingers, 4);
        assert!(sample.confidence > 0.5);
    }

    #[test]
    fn conflicting_signals_are_unknown_with_reduced_confidence() {
        // Convex and fairly full, but neither full enough for a fist nor long
        // enough for a flat hand.
        let smear = blob(ellipse(60.0, 40.0, 40.0, 25.0, 32), 20, 15, 81, 51, 3300);
        let sample = classifier().classify(Some(&smear), 0);
        assert_eq!(sample.gesture, Gesture::Unknown);
        assert!(sample.confidence > 0.0 && sample.confidence < 0.5);
    }

    #[test]
    fn unknown_confidence_falls_off_away_from_every_band() {
        let near_rock = blob(ellipse(60.0, 40.0, 40.0, 25.0, 32), 20, 15, 81, 51, 3300);
        let shapeless = blob(ellipse(60.0, 40.0, 40.0, 25.0, 32), 20, 15, 81, 51, 1300);
        let near = classifier().classify(Some(&near_rock), 0);
        let far = classifier().classify(Some(&shapeless), 0);
        assert_eq!(far.gesture, Gesture::Unknown);
        assert!(far.confidence < near.confidence);
    }

    #[test]
    fn extreme_defect_limits_do_not_overflow() {
        let classifier = GestureClassifier::new(&ClassifierConfig {
            rock_max_defects: u32::MAX,
            scissors_min_defects: u32::MAX,
            ..ClassifierConfig::default()
        });

        let smear = blob(ellipse(60.0, 40.0, 40.0, 25.0, 32), 20, 15, 81, 51, 3300);
        let sample = classifier.classify(Some(&smear), 0);
        assert_eq!(sample.gesture, Gesture::Unknown);
        assert!(sample.confidence.is_finite());
        assert!(sample.confidence > 0.0 && sample.confidence < 0.5);
    }

    #[test]
    fn absent_or_degenerate_blob_is_unknown_with_zero_confidence() {
        let sample = classifier().classify(None, 3);
        assert_eq!(sample, GestureSample::absent(3));

        let line = blob(vec![Point::new(0, 0), Point::new(5, 0), Point::new(9, 0)], 0, 0, 10, 1, 10);
        let sample = classifier().classify(Some(&line), 3);
        assert_eq!(sample.gesture, Gesture::Unknown);
        assert_eq!(sample.confidence, 0.0);
    }

    #[test]
    fn labels_print_in_upper_case() {
        let names: Vec<String> = Gesture::ALL.iter().map(|g| g.to_string()).collect();
        assert_eq!(names, ["ROCK", "PAPER", "SCISSORS", "UNKNOWN"]);
        assert_eq!(serde_json::to_string(&Gesture::Scissors).unwrap(), "\"SCISSORS\"");
    }
}
