//! Frame sources.
//!
//! This module provides the sources the stream driver can pull frames from:
//! - Image-sequence directories (numbered stills from a camera or exporter)
//! - Synthetic `stub://` scenes (tests, demo runs)
//! - A bounded-queue wrapper that decouples decoding from processing
//!
//! Video container decoding is out of scope; a codec-owning process is
//! expected to drop decoded stills into a directory. All sources produce
//! fixed-size `FrameBuffer` values; `next_frame` returns `Ok(None)` when the
//! source is exhausted, which is a normal terminal signal rather than an
//! error. Dimension constancy across the session is enforced by the stream
//! driver.

mod buffered;
mod image_dir;
mod synthetic;

use anyhow::Result;

use crate::frame::FrameBuffer;

pub use buffered::BufferedSource;
pub use image_dir::ImageDirSource;
pub use synthetic::{synthetic_spot_rects, SyntheticSource};

/// A pull-based source of decoded frames.
pub trait FrameSource: Send {
    /// Prepare the source (scan the directory, open the device).
    fn connect(&mut self) -> Result<()>;

    /// Next decoded frame, `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<FrameBuffer>>;

    /// Delivery statistics.
    fn stats(&self) -> SourceStats;

    /// Scoped teardown. Safe to call more than once.
    fn close(&mut self);
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_delivered: u64,
    pub locator: String,
}

/// Open a source from its config locator.
///
/// `stub://<name>` yields a synthetic scene; anything else is treated as a
/// local image-sequence directory.
pub fn open_source(locator: &str, width: u32, height: u32) -> Result<Box<dyn FrameSource>> {
    if locator.starts_with("stub://") {
        Ok(Box::new(SyntheticSource::new(locator, width, height)))
    } else {
        Ok(Box::new(ImageDirSource::new(locator)))
    }
}
