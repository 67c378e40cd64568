//! Status overlay rendering.
//!
//! Pure function of (frame, regions, status vector): returns a new RGB image
//! with a 2-px outline per region colored by status and a summary banner in
//! the top-left corner. Text rendering needs a TTF font supplied at startup;
//! without one the banner falls back to a proportional fill bar.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect as DrawRect;

use crate::frame::FrameBuffer;
use crate::spots::Region;
use crate::{SpotState, SpotStatus, Statistics};

const FREE_COLOR: [u8; 3] = [0, 200, 0];
const OCCUPIED_COLOR: [u8; 3] = [220, 40, 40];
const UNKNOWN_COLOR: [u8; 3] = [230, 180, 40];

const BANNER_MARGIN: u32 = 12;
const BANNER_HEIGHT: u32 = 36;
const BANNER_WIDTH: u32 = 230;
const FONT_SIZE: f32 = 24.0;
const OUTLINE_THICKNESS: u32 = 2;

fn status_color(status: SpotStatus) -> Rgb<u8> {
    match status {
        SpotStatus::Free => Rgb(FREE_COLOR),
        SpotStatus::Occupied => Rgb(OCCUPIED_COLOR),
        SpotStatus::Unknown => Rgb(UNKNOWN_COLOR),
    }
}

pub struct FrameAnnotator {
    font: Option<FontVec>,
}

impl FrameAnnotator {
    pub fn new() -> Self {
        Self { font: None }
    }

    /// Load a TTF font for the banner text.
    pub fn with_font<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|_| anyhow!("invalid font file {}", path.display()))?;
        Ok(Self { font: Some(font) })
    }

    /// Render the overlay onto a copy of `frame`.
    pub fn annotate(
        &self,
        frame: &FrameBuffer,
        regions: &[Region],
        states: &[SpotState],
    ) -> Result<RgbImage> {
        if regions.len() != states.len() {
            return Err(anyhow!(
                "status vector has {} entries for {} regions",
                states.len(),
                regions.len()
            ));
        }

        let mut image = frame.to_rgb_image();
        for (region, state) in regions.iter().zip(states) {
            draw_outline(&mut image, region, status_color(state.status));
        }
        self.draw_banner(&mut image, &Statistics::from_states(states));
        Ok(image)
    }

    fn draw_banner(&self, image: &mut RgbImage, stats: &Statistics) {
        let (width, height) = image.dimensions();
        if width <= BANNER_MARGIN || height <= BANNER_MARGIN {
            return;
        }
        let banner_w = BANNER_WIDTH.min(width - BANNER_MARGIN);
        let banner_h = BANNER_HEIGHT.min(height - BANNER_MARGIN);

        draw_filled_rect_mut(
            image,
            DrawRect::at(BANNER_MARGIN as i32, BANNER_MARGIN as i32)
                .of_size(banner_w, banner_h),
            Rgb([0, 0, 0]),
        );

        match &self.font {
            Some(font) => {
                let text = format!("occupied {} / {}", stats.occupied, stats.total_spots);
                draw_text_mut(
                    image,
                    Rgb([255, 255, 255]),
                    BANNER_MARGIN as i32 + 8,
                    BANNER_MARGIN as i32 + 5,
                    PxScale::from(FONT_SIZE),
                    font,
                    &text,
                );
            }
            None => {
                // No font configured: show occupancy as a fill bar.
                if stats.total_spots > 0 && banner_w > 8 && banner_h > 8 {
                    let inner_w = banner_w - 8;
                    let fill =
                        (inner_w as f32 * stats.occupied as f32 / stats.total_spots as f32) as u32;
                    if fill > 0 {
                        draw_filled_rect_mut(
                            image,
                            DrawRect::at(BANNER_MARGIN as i32 + 4, BANNER_MARGIN as i32 + 4)
                                .of_size(fill, banner_h - 8),
                            Rgb([255, 255, 255]),
                        );
                    }
                }
            }
        }
    }
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

/// Draw a hollow rectangle clamped to the image, `OUTLINE_THICKNESS` px.
fn draw_outline(image: &mut RgbImage, region: &Region, color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    let Some(rect) = region.rect.clamp_to(width, height) else {
        return;
    };

    let x_min = rect.x;
    let y_min = rect.y;
    let x_max = rect.x + rect.width - 1;
    let y_max = rect.y + rect.height - 1;

    for t in 0..OUTLINE_THICKNESS {
        let top = y_min.saturating_add(t).min(y_max);
        let bottom = y_max.saturating_sub(t).max(y_min);
        for x in x_min..=x_max {
            image.put_pixel(x, top, color);
            image.put_pixel(x, bottom, color);
        }
        let left = x_min.saturating_add(t).min(x_max);
        let right = x_max.saturating_sub(t).max(x_min);
        for y in y_min..=y_max {
            image.put_pixel(left, y, color);
            image.put_pixel(right, y, color);
        }
    }
}
