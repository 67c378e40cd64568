//! Change-gated classification scheduling.
//!
//! Classification is the expensive step, and most spots do not change
//! occupancy between consecutive sampled frames. The scheduler scores each
//! region by how much its pixels moved between the previous and current
//! frame and marks only the regions above a threshold as dirty; the tracker
//! re-classifies the dirty set and leaves the rest alone.
//!
//! Scores are normalized to [0, 1]: mean absolute per-pixel intensity
//! difference over the region crop, divided by the maximum possible
//! difference (255). The very first cycle has no previous frame and forces a
//! full classification pass so the system bootstraps.

use std::collections::BTreeSet;

use anyhow::Result;

use crate::frame::FrameBuffer;
use crate::spots::Region;
use crate::PipelineError;

pub const DEFAULT_DIFF_THRESHOLD: f32 = 0.4;

/// Selects which regions need re-classification this cycle.
#[derive(Clone, Copy, Debug)]
pub struct ChangeScheduler {
    threshold: f32,
}

impl Default for ChangeScheduler {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DIFF_THRESHOLD,
        }
    }
}

impl ChangeScheduler {
    /// `threshold` is clamped into [0, 1].
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Compute the dirty set for one cycle.
    ///
    /// - No previous frame: every region is dirty.
    /// - Region outside the frame entirely: dirty (fail open, force a
    ///   re-check rather than silently skipping the spot).
    /// - Previous/current dimensions differ: `FrameShapeMismatch`, fatal to
    ///   the cycle.
    pub fn select_dirty(
        &self,
        previous: Option<&FrameBuffer>,
        current: &FrameBuffer,
        regions: &[Region],
    ) -> Result<BTreeSet<usize>> {
        let Some(previous) = previous else {
            return Ok(regions.iter().map(|r| r.id).collect());
        };

        if previous.dimensions() != current.dimensions() {
            return Err(PipelineError::FrameShapeMismatch {
                expected: previous.dimensions(),
                actual: current.dimensions(),
            }
            .into());
        }

        let mut dirty = BTreeSet::new();
        for region in regions {
            match self.change_score(previous, current, region) {
                Some(score) => {
                    if score > self.threshold {
                        dirty.insert(region.id);
                    }
                }
                None => {
                    dirty.insert(region.id);
                }
            }
        }
        Ok(dirty)
    }

    /// Normalized difference score for one region, `None` when the region's
    /// intersection with the frame is empty. Callers must pass frames of
    /// equal dimensions.
    pub fn change_score(
        &self,
        previous: &FrameBuffer,
        current: &FrameBuffer,
        region: &Region,
    ) -> Option<f32> {
        let (width, height) = current.dimensions();
        let rect = region.rect.clamp_to(width, height)?;

        let mut total: u64 = 0;
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                let a = previous.intensity_at(x, y) as i32;
                let b = current.intensity_at(x, y) as i32;
                total += (a - b).unsigned_abs() as u64;
            }
        }

        Some(total as f32 / (rect.area() as f32 * 255.0))
    }
}
