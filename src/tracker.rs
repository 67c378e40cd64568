//! Per-spot occupancy state.
//!
//! The tracker owns one `SpotState` per region and applies classifier
//! results for the dirty set only; regions that were not re-checked keep
//! their previous status untouched. State changes for a cycle are published
//! to the shared status vector as a single batch after all classification
//! finishes, so concurrent readers never observe a half-applied cycle, and
//! the classifier is never invoked while a lock is held.

use std::collections::BTreeSet;

use crate::classify::OccupancyClassifier;
use crate::frame::FrameBuffer;
use crate::spots::Region;
use crate::{PipelineError, SpotState, Statistics, StatusHandle};

/// Outcome of one tracker update.
#[derive(Debug, Default)]
pub struct UpdateReport {
    /// Region ids that were re-classified this cycle.
    pub checked: Vec<usize>,
    /// Per-region classifier failures. The affected regions keep their
    /// prior status; failures never abort the cycle for other regions.
    pub failures: Vec<PipelineError>,
}

pub struct OccupancyTracker {
    regions: Vec<Region>,
    states: Vec<SpotState>,
    classifier: Box<dyn OccupancyClassifier>,
    input_width: u32,
    input_height: u32,
    handle: StatusHandle,
}

impl OccupancyTracker {
    /// Every region starts `Unknown` until its first classification.
    ///
    /// `regions` must come from `extract_regions`: ids are 0-indexed by
    /// discovery order, so id and vector position coincide.
    pub fn new(
        regions: Vec<Region>,
        classifier: Box<dyn OccupancyClassifier>,
        input_width: u32,
        input_height: u32,
    ) -> Self {
        debug_assert!(regions.iter().enumerate().all(|(idx, r)| r.id == idx));
        let states: Vec<SpotState> = regions
            .iter()
            .map(|region| SpotState::unknown(region.id))
            .collect();
        let handle = StatusHandle::new(states.clone());
        Self {
            regions,
            states,
            classifier,
            input_width,
            input_height,
            handle,
        }
    }

    /// Shared read handle for the annotation step and external consumers.
    pub fn status_handle(&self) -> StatusHandle {
        self.handle.clone()
    }

    /// Read-only copy of the current status vector.
    pub fn status(&self) -> Vec<SpotState> {
        self.handle.snapshot()
    }

    /// Derived statistics, recomputed on demand. Pure read, never blocks on
    /// classification.
    pub fn statistics(&self) -> Statistics {
        self.handle.statistics()
    }

    /// Re-classify the dirty regions against `frame` and publish the new
    /// status vector as one batch.
    pub fn update(
        &mut self,
        frame: &FrameBuffer,
        dirty: &BTreeSet<usize>,
        frame_index: u64,
    ) -> UpdateReport {
        let mut report = UpdateReport::default();
        let (frame_width, frame_height) = frame.dimensions();

        // Classification happens entirely before the batch is published.
        let mut results: Vec<(usize, crate::Occupancy)> = Vec::with_capacity(dirty.len());
        for &region_id in dirty {
            let Some(region) = self.regions.get(region_id) else {
                report.failures.push(PipelineError::Classifier {
                    region_id,
                    frame_index,
                    reason: "no such region".to_string(),
                });
                continue;
            };

            let label = region
                .rect
                .clamp_to(frame_width, frame_height)
                .ok_or_else(|| "region lies outside the frame".to_string())
                .and_then(|rect| {
                    frame
                        .crop(rect)
                        .and_then(|crop| crop.resize(self.input_width, self.input_height))
                        .and_then(|patch| self.classifier.classify(&patch))
                        .map_err(|e| e.to_string())
                });

            match label {
                Ok(label) => results.push((region_id, label)),
                Err(reason) => {
                    let failure = PipelineError::Classifier {
                        region_id,
                        frame_index,
                        reason,
                    };
                    log::warn!("{}", failure);
                    report.failures.push(failure);
                }
            }
        }

        for (region_id, label) in results {
            let state = &mut self.states[region_id];
            state.status = label.into();
            state.last_checked_frame = Some(frame_index);
            report.checked.push(region_id);
        }
        self.handle.publish(&self.states);

        report
    }
}
