use anyhow::Result;

use crate::classify::backend::OccupancyClassifier;
use crate::frame::FrameBuffer;
use crate::Occupancy;

/// Stub backend for tests and demo runs. Calls a patch occupied when its
/// mean luma falls below a cutoff (a parked vehicle darkens the spot
/// relative to pavement).
pub struct StubClassifier {
    occupied_below: u8,
}

impl StubClassifier {
    pub fn new(occupied_below: u8) -> Self {
        Self { occupied_below }
    }
}

impl Default for StubClassifier {
    fn default() -> Self {
        Self::new(128)
    }
}

impl OccupancyClassifier for StubClassifier {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn classify(&mut self, patch: &FrameBuffer) -> Result<Occupancy> {
        let (width, height) = patch.dimensions();
        let mut total: u64 = 0;
        for y in 0..height {
            for x in 0..width {
                total += patch.intensity_at(x, y) as u64;
            }
        }
        let mean = (total / (width as u64 * height as u64).max(1)) as u8;

        if mean < self.occupied_below {
            Ok(Occupancy::Occupied)
        } else {
            Ok(Occupancy::Free)
        }
    }
}
