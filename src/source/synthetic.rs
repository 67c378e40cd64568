//! Synthetic frame source for tests and demo runs.
//!
//! Renders a light pavement background with four dark blocks that come and
//! go on a fixed cadence, so a downstream stub classifier sees plausible
//! occupancy transitions without any camera attached.

use anyhow::Result;

use super::{FrameSource, SourceStats};
use crate::frame::{FrameBuffer, PixelFormat, Rect};

const PAVEMENT: u8 = 200;
const VEHICLE: u8 = 40;
/// Frames between occupancy flips of each synthetic block.
const DWELL_FRAMES: u64 = 40;

pub struct SyntheticSource {
    locator: String,
    width: u32,
    height: u32,
    frame_count: u64,
    /// `Some(n)` ends the stream after n frames; `None` streams forever.
    limit: Option<u64>,
}

impl SyntheticSource {
    pub fn new(locator: &str, width: u32, height: u32) -> Self {
        Self {
            locator: locator.to_string(),
            width,
            height,
            frame_count: 0,
            limit: None,
        }
    }

    /// End the stream after `limit` frames (used by tests).
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Block layout matching `synthetic_spot_rects` on a given frame size.
    fn spot_rects(width: u32, height: u32) -> Vec<Rect> {
        let w = width / 6;
        let h = height / 4;
        vec![
            Rect::new(w, h, w, h),
            Rect::new(3 * w, h, w, h),
            Rect::new(w, 2 * h + h / 2, w, h),
            Rect::new(3 * w, 2 * h + h / 2, w, h),
        ]
    }

    fn render(&self) -> FrameBuffer {
        let mut data = vec![PAVEMENT; (self.width * self.height) as usize];
        for (idx, rect) in Self::spot_rects(self.width, self.height).iter().enumerate() {
            let parked = (self.frame_count / DWELL_FRAMES + idx as u64) % 2 == 0;
            if !parked {
                continue;
            }
            let Some(rect) = rect.clamp_to(self.width, self.height) else {
                continue;
            };
            for y in rect.y..rect.y + rect.height {
                for x in rect.x..rect.x + rect.width {
                    data[(y * self.width + x) as usize] = VEHICLE;
                }
            }
        }
        FrameBuffer::new(data, self.width, self.height, PixelFormat::Gray)
            .expect("synthetic frame length is computed from its dimensions")
    }
}

/// Rectangles the synthetic scene uses as its spots. Exposed so demo setups
/// can build a matching mask.
pub fn synthetic_spot_rects(width: u32, height: u32) -> Vec<Rect> {
    SyntheticSource::spot_rects(width, height)
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        log::info!(
            "synthetic source {} at {}x{}",
            self.locator,
            self.width,
            self.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<FrameBuffer>> {
        if let Some(limit) = self.limit {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }
        let frame = self.render();
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_delivered: self.frame_count,
            locator: self.locator.clone(),
        }
    }

    fn close(&mut self) {}
}
