// THEORY:
// Contour geometry used by the blob locator and the gesture classifier.
//
// 1.  **Boundary tracing**: the region is copied into a scratch mask with a
//     one-pixel background margin and handed to `imageproc`'s border following
//     (Suzuki-Abe). The outer border is an ordered, closed sequence of boundary
//     pixels that starts at the region's first pixel in scan order. Pixels on
//     one-pixel-wide bridges may appear more than once.
// 2.  **Convex hull**: `imageproc`'s hull over the distinct contour points, mapped
//     back to indices into the contour and sorted ascending, so consecutive hull
//     indices delimit the contour spans that lie between two hull vertices.
// 3.  **Convexity defects**: for every span between consecutive hull vertices, the
//     contour point farthest from the hull edge is a candidate dip. Deep, narrow
//     dips are the gaps between extended fingers.

use crate::core_modules::blob::{BoundingBox, Point};
use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry;
use imageproc::point::Point as PixelPoint;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Outer boundary of the region formed by the pixels of `bbox` for which
/// `is_member` holds. The region must be 8-connected; anything else inside
/// `bbox` is treated as background.
pub fn outer_boundary<F>(bbox: BoundingBox, is_member: F) -> Vec<Point>
where
    F: Fn(i32, i32) -> bool,
{
    if bbox.width == 0 || bbox.height == 0 {
        return Vec::new();
    }

    let mut scratch = GrayImage::new(bbox.width + 2, bbox.height + 2);
    for y in 0..bbox.height {
        for x in 0..bbox.width {
            if is_member((bbox.x + x) as i32, (bbox.y + y) as i32) {
                scratch.put_pixel(x + 1, y + 1, Luma([u8::MAX]));
            }
        }
    }

    let (dx, dy) = (bbox.x as i32 - 1, bbox.y as i32 - 1);
    find_contours::<i32>(&scratch)
        .into_iter()
        .find(|c| matches!(c.border_type, BorderType::Outer))
        .map(|c| c.points.iter().map(|p| Point::new(p.x + dx, p.y + dy)).collect())
        .unwrap_or_default()
}

/// Mean of the contour points.
pub fn contour_mean(contour: &[Point]) -> Option<(f32, f32)> {
    if contour.is_empty() {
        return None;
    }
    let n = contour.len() as f64;
    let (sx, sy) = contour.iter().fold((0.0f64, 0.0f64), |(sx, sy), p| {
        (sx + p.x as f64, sy + p.y as f64)
    });
    Some(((sx / n) as f32, (sy / n) as f32))
}

/// Convex hull of `contour` as ascending indices into it. A point that occurs
/// more than once is represented by its first occurrence. Fewer than three
/// distinct points yield whatever distinct points exist.
pub fn convex_hull(contour: &[Point]) -> Vec<usize> {
    let mut first_index: HashMap<(i32, i32), usize> = HashMap::new();
    let mut distinct: Vec<PixelPoint<i32>> = Vec::with_capacity(contour.len());
    for (i, p) in contour.iter().enumerate() {
        if let Entry::Vacant(slot) = first_index.entry((p.x, p.y)) {
            slot.insert(i);
            distinct.push(PixelPoint::new(p.x, p.y));
        }
    }

    let mut hull: Vec<usize> = if distinct.len() < 3 {
        first_index.into_values().collect()
    } else {
        geometry::convex_hull(&distinct[..])
            .iter()
            .filter_map(|p| first_index.get(&(p.x, p.y)).copied())
            .collect()
    };
    hull.sort_unstable();
    hull.dedup();
    hull
}

/// Shoelace area of the polygon through `contour[indices]`, in order.
pub fn polygon_area(contour: &[Point], indices: &[usize]) -> f32 {
    if indices.len() < 3 {
        return 0.0;
    }
    let mut twice = 0i64;
    for (k, &i) in indices.iter().enumerate() {
        let j = indices[(k + 1) % indices.len()];
        twice += contour[i].x as i64 * contour[j].y as i64 - contour[j].x as i64 * contour[i].y as i64;
    }
    (twice.abs() as f32) / 2.0
}

/// The deepest dip between two consecutive hull vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvexityDefect {
    pub start: Point,
    pub end: Point,
    pub farthest: Point,
    /// Distance from `farthest` to the line through `start` and `end`.
    pub depth: f32,
    /// Angle at `farthest` between `start` and `end`, in degrees.
    pub angle_deg: f32,
}

/// One candidate per hull span, unfiltered. Spans without interior points yield
/// nothing.
pub fn convexity_defects(contour: &[Point], hull: &[usize]) -> Vec<ConvexityDefect> {
    let n = contour.len();
    if hull.len() < 3 || n < 4 {
        return Vec::new();
    }

    let mut defects = Vec::new();
    for (k, &from) in hull.iter().enumerate() {
        let to = if k + 1 < hull.len() { hull[k + 1] } else { hull[0] + n };
        if to <= from + 1 {
            continue;
        }

        let start = contour[from];
        let end = contour[to % n];
        let mut best: Option<(Point, f32)> = None;
        for idx in (from + 1)..to {
            let p = contour[idx % n];
            let depth = distance_to_line(p, start, end);
            if best.is_none_or(|(_, d)| depth > d) {
                best = Some((p, depth));
            }
        }

        if let Some((farthest, depth)) = best {
            defects.push(ConvexityDefect {
                start,
                end,
                farthest,
                depth,
                angle_deg: angle_at(farthest, start, end),
            });
        }
    }
    defects
}

fn distance_to_line(p: Point, a: Point, b: Point) -> f32 {
    let (dx, dy) = ((b.x - a.x) as f32, (b.y - a.y) as f32);
    let length = (dx * dx + dy * dy).sqrt();
    if length <= f32::EPSILON {
        return (((p.x - a.x) as f32).powi(2) + ((p.y - a.y) as f32).powi(2)).sqrt();
    }
    (dx * (p.y - a.y) as f32 - dy * (p.x - a.x) as f32).abs() / length
}

fn angle_at(vertex: Point, a: Point, b: Point) -> f32 {
    let (ux, uy) = ((a.x - vertex.x) as f32, (a.y - vertex.y) as f32);
    let (vx, vy) = ((b.x - vertex.x) as f32, (b.y - vertex.y) as f32);
    let norms = (ux * ux + uy * uy).sqrt() * (vx * vx + vy * vy).sqrt();
    if norms <= f32::EPSILON {
        return 180.0;
    }
    ((ux * vx + uy * vy) / norms).clamp(-1.0, 1.0).acos().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(i32, i32)]) -> Vec<Point> {
        raw.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    fn rect(x: u32, y: u32, width: u32, height: u32) -> BoundingBox {
        BoundingBox { x, y, width, height }
    }

    #[test]
    fn traces_rectangle_boundary_only() {
        let (x0, y0, w, h) = (3, 2, 6, 4);
        let inside = |x: i32, y: i32| x >= x0 && x < x0 + w && y >= y0 && y < y0 + h;
        let contour = outer_boundary(rect(3, 2, 6, 4), inside);

        assert_eq!(contour.len() as i32, 2 * w + 2 * h - 4);
        assert_eq!(contour[0], Point::new(x0, y0));
        assert!(contour.iter().all(|p| p.x == x0 || p.x == x0 + w - 1 || p.y == y0 || p.y == y0 + h - 1));

        let (cx, cy) = contour_mean(&contour).unwrap();
        assert!((cx - 5.5).abs() < 1e-5);
        assert!((cy - 3.5).abs() < 1e-5);
    }

    #[test]
    fn traces_degenerate_regions() {
        let single = outer_boundary(rect(4, 4, 1, 1), |x, y| (x, y) == (4, 4));
        assert_eq!(single, pts(&[(4, 4)]));

        let pair = outer_boundary(rect(0, 0, 2, 1), |x, y| y == 0 && (x == 0 || x == 1));
        assert_eq!(pair, pts(&[(0, 0), (1, 0)]));

        assert!(outer_boundary(rect(0, 0, 0, 0), |_, _| true).is_empty());
    }

    #[test]
    fn holes_do_not_contribute_to_the_outer_boundary() {
        let ring = |x: i32, y: i32| {
            (0..10).contains(&x) && (0..10).contains(&y) && !((3..7).contains(&x) && (3..7).contains(&y))
        };
        let contour = outer_boundary(rect(0, 0, 10, 10), ring);
        assert_eq!(contour.len(), 36);
        assert!(contour.iter().all(|p| p.x == 0 || p.x == 9 || p.y == 0 || p.y == 9));
    }

    #[test]
    fn hull_drops_interior_points() {
        let square = pts(&[(0, 0), (5, 0), (10, 0), (10, 10), (5, 5), (0, 10)]);
        let hull = convex_hull(&square);
        assert!([0, 2, 3, 5].iter().all(|i| hull.contains(i)));
        assert!(!hull.contains(&4));
        assert!(hull.windows(2).all(|w| w[0] < w[1]));
        assert!((polygon_area(&square, &hull) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn hull_indices_point_at_first_occurrences() {
        let bridged = pts(&[(0, 0), (4, 0), (4, 4), (2, 2), (4, 4), (0, 4)]);
        assert_eq!(convex_hull(&bridged), vec![0, 1, 2, 5]);
        assert_eq!(convex_hull(&pts(&[(1, 1), (1, 1), (2, 1)])), vec![0, 2]);
    }

    #[test]
    fn finds_one_defect_per_finger_gap() {
        let prongs = pts(&[
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
        ]);
        let hull = convex_hull(&prongs);
        let deep: Vec<_> = convexity_defects(&prongs, &hull)
            .into_iter()
            .filter(|d| d.depth > 10.0 && d.angle_deg < 90.0)
            .collect();
        assert_eq!(deep.len(), 3);
        assert!(deep.iter().all(|d| d.farthest.y == 75));
    }

    #[test]
    fn convex_polygon_has_no_deep_defects() {
        let diamond = pts(&[(10, 0), (20, 10), (10, 20), (0, 10)]);
        let hull = convex_hull(&diamond);
        assert_eq!(hull.len(), 4);
        assert!(convexity_defects(&diamond, &hull).is_empty());
    }
}
