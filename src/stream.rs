//! Per-cycle orchestration.
//!
//! One cycle: pull a frame, check dimension constancy, and on sampled frames
//! run the change scheduler, tracker update, and annotator. Frames between
//! sampling points are annotated with the existing status vector but not
//! re-classified. The driver is single-threaded and synchronous; the only
//! concurrency lives behind the optional `BufferedSource` wrapper and the
//! shared status handle.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use image::RgbImage;

use crate::annotate::FrameAnnotator;
use crate::frame::FrameBuffer;
use crate::schedule::ChangeScheduler;
use crate::source::FrameSource;
use crate::spots::Region;
use crate::tracker::OccupancyTracker;
use crate::{PipelineError, Statistics, StatusHandle};

#[derive(Clone, Copy, Debug)]
pub struct DriverOptions {
    /// Process every Nth frame through the scheduler and classifier.
    pub sample_step: u32,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self { sample_step: 30 }
    }
}

/// Result of one driver cycle.
pub enum Cycle {
    Frame(RgbImage),
    End,
}

/// Session counters, in the spirit of the status statistics but for frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames_seen: u64,
    pub frames_processed: u64,
}

pub struct StreamDriver {
    source: Box<dyn FrameSource>,
    regions: Vec<Region>,
    scheduler: ChangeScheduler,
    tracker: OccupancyTracker,
    annotator: FrameAnnotator,
    options: DriverOptions,
    previous: Option<FrameBuffer>,
    expected_dims: Option<(u32, u32)>,
    stats: StreamStats,
    released: bool,
}

impl StreamDriver {
    pub fn new(
        source: Box<dyn FrameSource>,
        regions: Vec<Region>,
        scheduler: ChangeScheduler,
        tracker: OccupancyTracker,
        annotator: FrameAnnotator,
        options: DriverOptions,
    ) -> Self {
        let options = DriverOptions {
            sample_step: options.sample_step.max(1),
        };
        Self {
            source,
            regions,
            scheduler,
            tracker,
            annotator,
            options,
            previous: None,
            expected_dims: None,
            stats: StreamStats::default(),
            released: false,
        }
    }

    pub fn statistics(&self) -> Statistics {
        self.tracker.statistics()
    }

    pub fn status_handle(&self) -> StatusHandle {
        self.tracker.status_handle()
    }

    pub fn stream_stats(&self) -> StreamStats {
        self.stats
    }

    /// Run one cycle. Does not release the source on error; `run` does, and
    /// direct callers are expected to call `release` themselves.
    pub fn next_cycle(&mut self) -> Result<Cycle> {
        let Some(frame) = self.source.next_frame()? else {
            self.release();
            return Ok(Cycle::End);
        };

        match self.expected_dims {
            None => self.expected_dims = Some(frame.dimensions()),
            Some(expected) if expected != frame.dimensions() => {
                return Err(PipelineError::FrameShapeMismatch {
                    expected,
                    actual: frame.dimensions(),
                }
                .into());
            }
            Some(_) => {}
        }

        let frame_index = self.stats.frames_seen;
        self.stats.frames_seen += 1;

        if frame_index % self.options.sample_step as u64 == 0 {
            let dirty = self
                .scheduler
                .select_dirty(self.previous.as_ref(), &frame, &self.regions)?;
            let report = self.tracker.update(&frame, &dirty, frame_index);
            log::debug!(
                "frame {}: {} dirty, {} checked, {} failed",
                frame_index,
                dirty.len(),
                report.checked.len(),
                report.failures.len()
            );
            self.previous = Some(frame.clone());
            self.stats.frames_processed += 1;
        }

        let annotated = self
            .annotator
            .annotate(&frame, &self.regions, &self.tracker.status())?;
        Ok(Cycle::Frame(annotated))
    }

    /// Loop until the source ends, `stop` is raised, or a cycle fails. The
    /// stop flag is checked between cycles only, and the source is released
    /// on every exit path.
    pub fn run<F>(&mut self, stop: &AtomicBool, mut on_frame: F) -> Result<StreamStats>
    where
        F: FnMut(&RgbImage) -> Result<()>,
    {
        let result = loop {
            if stop.load(Ordering::Relaxed) {
                log::info!("stop requested, ending stream");
                break Ok(());
            }
            match self.next_cycle() {
                Ok(Cycle::Frame(annotated)) => {
                    if let Err(e) = on_frame(&annotated) {
                        break Err(e);
                    }
                }
                Ok(Cycle::End) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.release();
        result.map(|()| self.stats)
    }

    /// Tear down the source. Idempotent.
    pub fn release(&mut self) {
        if !self.released {
            self.source.close();
            self.released = true;
        }
    }
}
