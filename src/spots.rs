//! Mask parsing and spot region extraction.
//!
//! A static mask image marks spot interiors with non-zero pixels. Extraction
//! runs 8-connected component labeling over the binarized mask, drops
//! components below a minimum pixel area (annotation noise), and assigns
//! region ids in ascending (top-left y, then x) order. Region count and order
//! are immutable ground truth for the session: the external persistence layer
//! keys on region ids, so the ordering rule must stay deterministic across
//! runs on the same mask.

use std::path::Path;

use anyhow::Result;
use image::GrayImage;
use serde::Serialize;

use crate::frame::Rect;
use crate::PipelineError;

/// A fixed rectangular area of the frame corresponding to one parking spot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Region {
    /// Stable id, 0-indexed by discovery order.
    pub id: usize,
    pub rect: Rect,
}

/// Load a mask image from disk as grayscale.
pub fn load_mask<P: AsRef<Path>>(path: P) -> Result<GrayImage> {
    let path = path.as_ref();
    let mask = image::open(path)
        .map_err(|e| PipelineError::InvalidMask {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?
        .to_luma8();
    Ok(mask)
}

/// Extract spot regions from a binary mask.
///
/// Fails with `PipelineError::InvalidMask` when the mask is empty, yields no
/// component at or above `min_area`, or contains two components with the same
/// top-left corner (degenerate/overlapping markers are undefined input).
pub fn extract_regions(mask: &GrayImage, min_area: u32) -> Result<Vec<Region>> {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidMask {
            reason: "mask has zero dimensions".to_string(),
        }
        .into());
    }

    let components = label_components(mask);
    if components.is_empty() {
        return Err(PipelineError::InvalidMask {
            reason: "mask contains no foreground pixels".to_string(),
        }
        .into());
    }

    let mut boxes: Vec<ComponentBox> = components
        .into_iter()
        .filter(|c| c.area >= min_area as u64)
        .collect();
    if boxes.is_empty() {
        return Err(PipelineError::InvalidMask {
            reason: format!("no component reaches the minimum area of {} px", min_area),
        }
        .into());
    }

    boxes.sort_by_key(|c| (c.min_y, c.min_x));
    for pair in boxes.windows(2) {
        if pair[0].min_y == pair[1].min_y && pair[0].min_x == pair[1].min_x {
            return Err(PipelineError::InvalidMask {
                reason: format!(
                    "two components share top-left corner ({}, {}); spot order would be ambiguous",
                    pair[0].min_x, pair[0].min_y
                ),
            }
            .into());
        }
    }

    Ok(boxes
        .into_iter()
        .enumerate()
        .map(|(id, c)| Region {
            id,
            rect: Rect::new(
                c.min_x,
                c.min_y,
                c.max_x - c.min_x + 1,
                c.max_y - c.min_y + 1,
            ),
        })
        .collect())
}

struct ComponentBox {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    area: u64,
}

/// 8-connected component labeling via iterative flood fill.
fn label_components(mask: &GrayImage) -> Vec<ComponentBox> {
    let (width, height) = mask.dimensions();
    let w = width as usize;
    let raw = mask.as_raw();
    let mut visited = vec![false; raw.len()];
    let mut components = Vec::new();
    let mut stack: Vec<(u32, u32)> = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let idx = y as usize * w + x as usize;
            if raw[idx] == 0 || visited[idx] {
                continue;
            }
            visited[idx] = true;
            stack.push((x, y));
            let mut component = ComponentBox {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
                area: 0,
            };

            while let Some((cx, cy)) = stack.pop() {
                component.area += 1;
                component.min_x = component.min_x.min(cx);
                component.min_y = component.min_y.min(cy);
                component.max_x = component.max_x.max(cx);
                component.max_y = component.max_y.max(cy);

                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = cx as i64 + dx;
                        let ny = cy as i64 + dy;
                        if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                            continue;
                        }
                        let nidx = ny as usize * w + nx as usize;
                        if raw[nidx] != 0 && !visited[nidx] {
                            visited[nidx] = true;
                            stack.push((nx as u32, ny as u32));
                        }
                    }
                }
            }

            components.push(component);
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn mask_with_boxes(width: u32, height: u32, boxes: &[Rect]) -> GrayImage {
        let mut mask = GrayImage::from_pixel(width, height, Luma([0u8]));
        for rect in boxes {
            for y in rect.y..rect.y + rect.height {
                for x in rect.x..rect.x + rect.width {
                    mask.put_pixel(x, y, Luma([255u8]));
                }
            }
        }
        mask
    }

    #[test]
    fn extracts_one_region_per_component_with_matching_extents() {
        let boxes = [Rect::new(0, 0, 10, 10), Rect::new(20, 20, 10, 10)];
        let mask = mask_with_boxes(64, 64, &boxes);
        let regions = extract_regions(&mask, 4).unwrap();

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].id, 0);
        assert_eq!(regions[0].rect, boxes[0]);
        assert_eq!(regions[1].id, 1);
        assert_eq!(regions[1].rect, boxes[1]);
    }

    #[test]
    fn orders_regions_by_top_left_y_then_x() {
        let boxes = [
            Rect::new(40, 2, 6, 6),
            Rect::new(2, 2, 6, 6),
            Rect::new(2, 20, 6, 6),
        ];
        let mask = mask_with_boxes(64, 64, &boxes);
        let regions = extract_regions(&mask, 4).unwrap();

        let rects: Vec<Rect> = regions.iter().map(|r| r.rect).collect();
        assert_eq!(
            rects,
            vec![
                Rect::new(2, 2, 6, 6),
                Rect::new(40, 2, 6, 6),
                Rect::new(2, 20, 6, 6),
            ]
        );
    }

    #[test]
    fn ids_are_stable_across_repeated_extraction() {
        let boxes = [Rect::new(5, 5, 8, 8), Rect::new(30, 12, 8, 8)];
        let mask = mask_with_boxes(64, 64, &boxes);
        let first = extract_regions(&mask, 4).unwrap();
        let second = extract_regions(&mask, 4).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn diagonal_touch_is_one_component() {
        // Two 2x2 blocks meeting only at a corner: 8-connectivity joins them.
        let mut mask = GrayImage::from_pixel(8, 8, Luma([0u8]));
        for (x, y) in [(1u32, 1u32), (2, 1), (1, 2), (2, 2)] {
            mask.put_pixel(x, y, Luma([255u8]));
        }
        for (x, y) in [(3u32, 3u32), (4, 3), (3, 4), (4, 4)] {
            mask.put_pixel(x, y, Luma([255u8]));
        }
        let regions = extract_regions(&mask, 1).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].rect, Rect::new(1, 1, 4, 4));
    }

    #[test]
    fn drops_components_below_minimum_area() {
        let boxes = [Rect::new(0, 0, 10, 10), Rect::new(30, 30, 2, 2)];
        let mask = mask_with_boxes(64, 64, &boxes);
        let regions = extract_regions(&mask, 16).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].rect, boxes[0]);
    }

    #[test]
    fn empty_mask_is_invalid() {
        let mask = GrayImage::from_pixel(32, 32, Luma([0u8]));
        let err = extract_regions(&mask, 4).unwrap_err();
        let pipeline = err.downcast_ref::<PipelineError>().expect("typed error");
        assert!(matches!(pipeline, PipelineError::InvalidMask { .. }));
    }

    #[test]
    fn all_components_below_minimum_area_is_invalid() {
        let mask = mask_with_boxes(32, 32, &[Rect::new(1, 1, 2, 2)]);
        assert!(extract_regions(&mask, 100).is_err());
    }

    #[test]
    fn identical_top_left_corners_are_rejected() {
        // Two disjoint diagonal arms whose bounding boxes both start at
        // (2, 2): component A reaches x=2 and y=2 through different pixels,
        // and so does B, without the components touching.
        let mut mask = GrayImage::from_pixel(16, 16, Luma([0u8]));
        for (x, y) in [(4u32, 2u32), (3, 3), (2, 4), (2, 5)] {
            mask.put_pixel(x, y, Luma([255u8]));
        }
        for (x, y) in [
            (7u32, 2u32),
            (7, 3),
            (7, 4),
            (6, 5),
            (5, 6),
            (4, 7),
            (3, 8),
            (2, 9),
        ] {
            mask.put_pixel(x, y, Luma([255u8]));
        }

        let err = extract_regions(&mask, 1).unwrap_err();
        let pipeline = err.downcast_ref::<PipelineError>().expect("typed error");
        assert!(matches!(pipeline, PipelineError::InvalidMask { .. }));
    }
}
