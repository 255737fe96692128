// THEORY:
// The `BlobLocator` reduces a player's mask to at most one hand candidate.
//
// 1.  **Region labeling**: every foreground pixel is assigned to an 8-connected
//     region by breadth-first region growing from the first unlabeled pixel met in
//     row-major scan order. That pixel becomes the region's seed.
// 2.  **Selection**: among regions whose pixel count reaches the minimum area, the
//     largest wins. Equal areas keep the region seeded first in scan order, so the
//     choice is stable from run to run.
// 3.  **Description**: only the winner is traced. Its outer contour starts at the
//     seed, and its centroid is the mean of the contour points.
//
// An empty result is the normal "not in view" outcome, not a failure.

use crate::config::BlobConfig;
use crate::core_modules::blob::{Blob, BoundingBox, Point, Position};
use crate::core_modules::contour::{contour_mean, outer_boundary};
use crate::core_modules::segmenter::{FOREGROUND, Mask};

pub mod labeling {
    use super::*;

    /// Summary of one connected region produced during labeling.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Region {
        /// 1-based label stored in the label map.
        pub label: u32,
        /// First pixel of the region in row-major scan order.
        pub seed: Point,
        pub area: u32,
        pub bounding_box: BoundingBox,
    }

    /// Labels all 8-connected foreground regions. Returns the label map (0 for
    /// background) and the regions in seed order.
    pub fn label_regions(mask: &Mask) -> (Vec<u32>, Vec<Region>) {
        let width = mask.width() as usize;
        let height = mask.height() as usize;
        let pixels = mask.as_raw();
        let mut labels = vec![0u32; width * height];
        let mut regions = Vec::new();

        for y in 0..height {
            for x in 0..width {
                let idx = y * width + x;
                if pixels[idx] != FOREGROUND || labels[idx] != 0 {
                    continue;
                }
                let label = regions.len() as u32 + 1;
                regions.push(grow_region(pixels, &mut labels, width, height, x, y, label));
            }
        }
        (labels, regions)
    }

    fn grow_region(
        pixels: &[u8],
        labels: &mut [u32],
        width: usize,
        height: usize,
        seed_x: usize,
        seed_y: usize,
        label: u32,
    ) -> Region {
        let mut queue = vec![(seed_x, seed_y)];
        labels[seed_y * width + seed_x] = label;

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (seed_x, seed_y, seed_x, seed_y);
        let mut area = 0u32;

        while let Some((x, y)) = queue.pop() {
            area += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);

            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }
                    let n_idx = ny as usize * width + nx as usize;
                    if pixels[n_idx] == FOREGROUND && labels[n_idx] == 0 {
                        labels[n_idx] = label;
                        queue.push((nx as usize, ny as usize));
                    }
                }
            }
        }

        Region {
            label,
            seed: Point::new(seed_x as i32, seed_y as i32),
            area,
            bounding_box: BoundingBox {
                x: min_x as u32,
                y: min_y as u32,
                width: (max_x - min_x + 1) as u32,
                height: (max_y - min_y + 1) as u32,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BlobLocator {
    min_area: u32,
}

impl BlobLocator {
    pub fn new(config: &BlobConfig) -> Self {
        Self {
            min_area: config.min_area,
        }
    }

    /// Returns the dominant region of `mask`, or `None` when nothing reaches the
    /// minimum area.
    pub fn locate(&self, mask: &Mask) -> Option<Blob> {
        let (labels, regions) = labeling::label_regions(mask);

        let mut best: Option<&labeling::Region> = None;
        for region in regions.iter().filter(|r| r.area >= self.min_area) {
            if best.is_none_or(|b| region.area > b.area) {
                best = Some(region);
            }
        }
        let region = best?;

        let width = mask.width() as i32;
        let height = mask.height() as i32;
        let is_member = |x: i32, y: i32| {
            x >= 0
                && y >= 0
                && x < width
                && y < height
                && labels[(y * width + x) as usize] == region.label
        };
        let contour = outer_boundary(region.bounding_box, is_member);
        let (cx, cy) = contour_mean(&contour)?;

        Some(Blob {
            contour,
            bounding_box: region.bounding_box,
            centroid: Position::new(cx, cy),
            area: region.area,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn paint(mask: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }

    fn locator(min_area: u32) -> BlobLocator {
        BlobLocator::new(&BlobConfig { min_area })
    }

    #[test]
    fn picks_the_largest_qualifying_region() {
        let mut mask = GrayImage::new(100, 60);
        paint(&mut mask, 2, 2, 10, 10);
        paint(&mut mask, 40, 20, 30, 20);
        paint(&mut mask, 80, 50, 3, 3);

        let blob = locator(50).locate(&mask).expect("blob");
        assert_eq!(blob.area, 600);
        assert_eq!(
            blob.bounding_box,
            BoundingBox {
                x: 40,
                y: 20,
                width: 30,
                height: 20
            }
        );
        assert!((blob.centroid.x - 54.5).abs() < 1e-4);
        assert!((blob.centroid.y - 29.5).abs() < 1e-4);
        assert_eq!(blob.contour.len(), 2 * 30 + 2 * 20 - 4);
    }

    #[test]
    fn nothing_below_min_area() {
        let mut mask = GrayImage::new(40, 40);
        paint(&mut mask, 5, 5, 9, 9);
        assert!(locator(82).locate(&mask).is_none());
        assert_eq!(locator(81).locate(&mask).map(|b| b.area), Some(81));
        assert!(locator(1).locate(&GrayImage::new(40, 40)).is_none());
    }

    #[test]
    fn equal_areas_keep_the_first_in_scan_order() {
        let mut mask = GrayImage::new(60, 40);
        paint(&mut mask, 35, 5, 10, 10);
        paint(&mut mask, 5, 20, 10, 10);
        let blob = locator(10).locate(&mask).expect("blob");
        assert_eq!((blob.bounding_box.x, blob.bounding_box.y), (35, 5));
    }

    #[test]
    fn diagonal_pixels_are_connected() {
        let mut mask = GrayImage::new(10, 10);
        for i in 0..6 {
            mask.put_pixel(i, i, Luma([FOREGROUND]));
        }
        let (_, regions) = labeling::label_regions(&mask);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 6);
    }

    #[test]
    fn bounding_box_stays_inside_the_frame() {
        let mut mask = GrayImage::new(30, 20);
        paint(&mut mask, 0, 0, 30, 20);
        let blob = locator(1).locate(&mask).expect("blob");
        let bbox = blob.bounding_box;
        assert!(bbox.x + bbox.width <= 30);
        assert!(bbox.y + bbox.height <= 20);
        assert_eq!(blob.area, 600);
        assert_eq!(blob.contour[0], Point::new(0, 0));
        assert_eq!(blob.contour.len(), 2 * 30 + 2 * 20 - 4);
    }

    #[test]
    fn neighbouring_regions_stay_out_of_the_contour() {
        let mut mask = GrayImage::new(40, 40);
        paint(&mut mask, 5, 5, 20, 20);
        // Cut the bottom-right corner pixel loose; it stays inside the winner's box.
        for (x, y) in [(23, 23), (23, 24), (24, 23)] {
            mask.put_pixel(x, y, Luma([0]));
        }
        let blob = locator(10).locate(&mask).expect("blob");
        assert_eq!(blob.area, 400 - 4);
        assert_eq!((blob.bounding_box.width, blob.bounding_box.height), (20, 20));
        assert!(blob.contour.iter().all(|p| *p != Point::new(24, 24)));
    }
}
