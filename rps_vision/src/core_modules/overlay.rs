// THEORY:
// The overlay is a side-effect renderer that sits strictly downstream of the
// decision pipeline. It reads a frame and that tick's results and returns an
// annotated copy. Nothing it does can reach tracking or classification state,
// and the core is fully testable without it.
//
// Per detected player: bounding box, centroid dot, a cross at the filtered
// estimate, and a "NAME GESTURE" label above the box. Players without a detection
// are listed in the top-right corner as "NAME HIDDEN", or "NAME LOST" once their
// track has been dropped.

use crate::config::PlayerConfig;
use crate::core_modules::frame::Frame;
use crate::core_modules::glyphs::{GLYPH_HEIGHT, GLYPH_WIDTH, glyph, lit};
use crate::pipeline::TrackerResult;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

const DEFAULT_PALETTE: [[u8; 3]; 4] = [[255, 64, 64], [64, 128, 255], [64, 220, 64], [255, 200, 0]];
const TEXT_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const ESTIMATE_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const MARGIN: i32 = 4;

#[derive(Debug, Clone)]
pub struct Overlay {
    colors: Vec<Rgb<u8>>,
    text_scale: u32,
}

impl Overlay {
    /// One color per player, in config order: the configured display color or a
    /// palette entry.
    pub fn new(players: &[PlayerConfig]) -> Self {
        let colors = players
            .iter()
            .enumerate()
            .map(|(i, p)| Rgb(p.display_color.unwrap_or(DEFAULT_PALETTE[i % DEFAULT_PALETTE.len()])))
            .collect();
        Self { colors, text_scale: 2 }
    }

    pub fn with_text_scale(mut self, scale: u32) -> Self {
        self.text_scale = scale.max(1);
        self
    }

    fn color(&self, player: usize) -> Rgb<u8> {
        self.colors
            .get(player)
            .copied()
            .unwrap_or(Rgb(DEFAULT_PALETTE[player % DEFAULT_PALETTE.len()]))
    }

    /// Draws `results` onto a copy of `frame`.
    pub fn render(&self, frame: &Frame<'_>, results: &[TrackerResult]) -> RgbImage {
        let mut canvas = frame.to_rgb_image();
        let line_height = ((GLYPH_HEIGHT * self.text_scale) as i32) + MARGIN;
        let mut hidden_row = 0;

        for result in results {
            let color = self.color(result.player.index());
            match &result.detection {
                Some(detection) => {
                    let bbox = detection.bounding_box;
                    let (x, y) = (bbox.x as i32, bbox.y as i32);
                    draw_box(&mut canvas, x, y, bbox.width, bbox.height, color);
                    draw_filled_circle_mut(
                        &mut canvas,
                        (detection.centroid.x.round() as i32, detection.centroid.y.round() as i32),
                        4,
                        color,
                    );
                    if let Some(estimate) = result.position.position() {
                        draw_cross_mut(
                            &mut canvas,
                            ESTIMATE_COLOR,
                            estimate.x.round() as i32,
                            estimate.y.round() as i32,
                        );
                    }
                    let label = format!("{} {}", result.name, result.stable_gesture);
                    let label_y = (y - line_height).max(0);
                    self.draw_text(&mut canvas, x, label_y, &label, color);
                }
                None => {
                    let status = if result.position.is_lost() { "LOST" } else { "HIDDEN" };
                    let label = format!("{} {}", result.name, status);
                    let x = canvas.width() as i32 - self.text_width(&label) as i32 - MARGIN;
                    let y = MARGIN + hidden_row * line_height;
                    self.draw_text(&mut canvas, x.max(0), y, &label, color);
                    hidden_row += 1;
                }
            }
        }
        canvas
    }

    fn text_width(&self, text: &str) -> u32 {
        let chars = text.chars().count() as u32;
        if chars == 0 {
            return 0;
        }
        (chars * (GLYPH_WIDTH + 1) - 1) * self.text_scale
    }

    fn draw_text(&self, canvas: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
        let width = self.text_width(text);
        if width == 0 {
            return;
        }
        let scale = self.text_scale;
        let pad = scale as i32;
        draw_filled_rect_mut(
            canvas,
            Rect::at(x - pad, y - pad).of_size(width + 2 * scale, GLYPH_HEIGHT * scale + 2 * scale),
            TEXT_BACKGROUND,
        );

        for (i, c) in text.chars().enumerate() {
            let g = glyph(c);
            let origin_x = x + (i as u32 * (GLYPH_WIDTH + 1) * scale) as i32;
            for row in 0..GLYPH_HEIGHT {
                for col in 0..GLYPH_WIDTH {
                    if lit(&g, col, row) {
                        draw_filled_rect_mut(
                            canvas,
                            Rect::at(origin_x + (col * scale) as i32, y + (row * scale) as i32).of_size(scale, scale),
                            color,
                        );
                    }
                }
            }
        }
    }
}

/// Two-pixel outline; the inner ring is skipped for boxes too small to hold it.
fn draw_box(canvas: &mut RgbImage, x: i32, y: i32, width: u32, height: u32, color: Rgb<u8>) {
    if width == 0 || height == 0 {
        return;
    }
    draw_hollow_rect_mut(canvas, Rect::at(x, y).of_size(width, height), color);
    if width > 2 && height > 2 {
        draw_hollow_rect_mut(canvas, Rect::at(x + 1, y + 1).of_size(width - 2, height - 2), color);
    }
}
