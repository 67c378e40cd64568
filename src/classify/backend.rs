use anyhow::Result;

use crate::frame::FrameBuffer;
use crate::Occupancy;

/// Occupancy classifier trait.
///
/// Implementations receive a patch already cropped to one spot and resized
/// to the backend's input dimensions. They must treat the pixels as
/// read-only and ephemeral, and must not retain them across calls.
pub trait OccupancyClassifier: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Classify one spot patch.
    fn classify(&mut self, patch: &FrameBuffer) -> Result<Occupancy>;

    /// Optional warm-up hook (model load verification, first-run JIT).
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Wrapper that flips the backend's labels, for models trained with the
/// opposite class order.
pub struct InvertLabels {
    inner: Box<dyn OccupancyClassifier>,
}

impl InvertLabels {
    pub fn new(inner: Box<dyn OccupancyClassifier>) -> Self {
        Self { inner }
    }
}

impl OccupancyClassifier for InvertLabels {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn classify(&mut self, patch: &FrameBuffer) -> Result<Occupancy> {
        Ok(self.inner.classify(patch)?.inverted())
    }

    fn warm_up(&mut self) -> Result<()> {
        self.inner.warm_up()
    }
}
