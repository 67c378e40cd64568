//! lotwatch - parking lot occupancy monitor
//!
//! A fixed camera watches a parking lot; a static mask image marks the spots.
//! The crate derives one rectangular region per spot from the mask, then
//! processes sampled frames through a change-gated pipeline: only regions
//! whose pixels plausibly changed since the previous sampled frame are
//! re-classified, and per-spot occupancy state is updated incrementally.
//!
//! # Module Structure
//!
//! - `spots`: mask parsing and region extraction (connected components)
//! - `frame`: pixel buffer container shared across the pipeline
//! - `schedule`: per-region change scoring and dirty-set selection
//! - `classify`: occupancy classifier trait and backends (stub, tract-onnx)
//! - `tracker`: per-spot occupancy state, batch updates, statistics
//! - `annotate`: status overlay rendering
//! - `source`: frame sources (image directory, synthetic, buffered ingest)
//! - `stream`: per-cycle orchestration
//! - `config`: immutable runtime configuration
//!
//! Per cycle: decode -> change score -> classify dirty regions -> batch state
//! update -> annotate. The published status vector is only ever replaced as a
//! whole batch, so concurrent readers never observe a half-applied cycle.

use std::sync::{Arc, RwLock};

use serde::Serialize;

pub mod annotate;
pub mod classify;
pub mod config;
pub mod frame;
pub mod schedule;
pub mod source;
pub mod spots;
pub mod stream;
pub mod tracker;

pub use annotate::FrameAnnotator;
pub use classify::{build_classifier, OccupancyClassifier, StubClassifier};
pub use config::LotwatchConfig;
pub use frame::{FrameBuffer, PixelFormat, Rect};
pub use schedule::ChangeScheduler;
pub use source::{open_source, BufferedSource, FrameSource, SourceStats};
pub use spots::{extract_regions, load_mask, Region};
pub use stream::{Cycle, DriverOptions, StreamDriver, StreamStats};
pub use tracker::{OccupancyTracker, UpdateReport};

// -------------------- Occupancy Status --------------------

/// Classifier output label for a single spot patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Occupancy {
    Free,
    Occupied,
}

impl Occupancy {
    /// Swap the two labels (for models trained with inverted classes).
    pub fn inverted(self) -> Self {
        match self {
            Occupancy::Free => Occupancy::Occupied,
            Occupancy::Occupied => Occupancy::Free,
        }
    }
}

/// Observable status of a spot. `Unknown` is only seen before a region's
/// first classification; no path returns a region to `Unknown` afterwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpotStatus {
    #[default]
    Unknown,
    Free,
    Occupied,
}

impl From<Occupancy> for SpotStatus {
    fn from(label: Occupancy) -> Self {
        match label {
            Occupancy::Free => SpotStatus::Free,
            Occupancy::Occupied => SpotStatus::Occupied,
        }
    }
}

/// Per-spot state, one entry per region, indexed by region id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SpotState {
    pub region_id: usize,
    pub status: SpotStatus,
    /// Frame index of the last classification, `None` until first checked.
    pub last_checked_frame: Option<u64>,
}

impl SpotState {
    pub fn unknown(region_id: usize) -> Self {
        Self {
            region_id,
            status: SpotStatus::Unknown,
            last_checked_frame: None,
        }
    }
}

// -------------------- Status Snapshot Handle --------------------

/// Shared read handle onto the published status vector.
///
/// The tracker replaces the vector as a single batch at the end of each
/// update, so readers always observe a consistent cycle. Clones are cheap and
/// may be handed to the annotation step or an external persistence/API layer.
#[derive(Clone, Default)]
pub struct StatusHandle {
    inner: Arc<RwLock<Vec<SpotState>>>,
}

impl StatusHandle {
    pub fn new(states: Vec<SpotState>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(states)),
        }
    }

    /// Read-only copy of the current status vector.
    pub fn snapshot(&self) -> Vec<SpotState> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Derived statistics, recomputed on demand from the current snapshot.
    pub fn statistics(&self) -> Statistics {
        Statistics::from_states(
            &self
                .inner
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    /// Replace the whole vector. Called by the tracker once per cycle.
    pub(crate) fn publish(&self, states: &[SpotState]) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clear();
        guard.extend_from_slice(states);
    }
}

// -------------------- Statistics --------------------

/// Aggregate occupancy statistics derived from a status vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total_spots: usize,
    pub occupied: usize,
    pub free: usize,
    pub unknown: usize,
    /// occupied / total, 0.0 when no spots are known.
    pub occupancy_rate: f32,
}

impl Statistics {
    pub fn from_states(states: &[SpotState]) -> Self {
        let mut occupied = 0usize;
        let mut free = 0usize;
        let mut unknown = 0usize;
        for state in states {
            match state.status {
                SpotStatus::Occupied => occupied += 1,
                SpotStatus::Free => free += 1,
                SpotStatus::Unknown => unknown += 1,
            }
        }
        let total_spots = states.len();
        let occupancy_rate = if total_spots > 0 {
            occupied as f32 / total_spots as f32
        } else {
            0.0
        };
        Self {
            total_spots,
            occupied,
            free,
            unknown,
            occupancy_rate,
        }
    }
}

// -------------------- Errors --------------------

/// Typed pipeline failures, carried through `anyhow::Result` and matchable
/// with `downcast_ref` at the call sites that care.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineError {
    /// Mask unreadable, empty, or degenerate. Fatal at startup, no retry.
    InvalidMask { reason: String },
    /// Frame dimensions differ from the previous/expected frame. Fatal to
    /// the cycle; the source is presumed broken.
    FrameShapeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// One region's classification failed. Isolated: the region keeps its
    /// prior status and the rest of the cycle proceeds.
    Classifier {
        region_id: usize,
        frame_index: u64,
        reason: String,
    },
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::InvalidMask { reason } => {
                write!(f, "invalid mask: {}", reason)
            }
            PipelineError::FrameShapeMismatch { expected, actual } => write!(
                f,
                "frame shape mismatch: expected {}x{}, got {}x{}",
                expected.0, expected.1, actual.0, actual.1
            ),
            PipelineError::Classifier {
                region_id,
                frame_index,
                reason,
            } => write!(
                f,
                "classifier failed for region {} at frame {}: {}",
                region_id, frame_index, reason
            ),
        }
    }
}

impl std::error::Error for PipelineError {}
