//! Image-sequence directory source.
//!
//! Reads still frames from a local directory in lexicographic file-name
//! order (exporters are expected to zero-pad frame numbers). Only local
//! paths are accepted; decoding happens in-memory via the `image` crate.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{FrameSource, SourceStats};
use crate::frame::FrameBuffer;

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub struct ImageDirSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    position: usize,
    delivered: u64,
}

impl ImageDirSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            files: Vec::new(),
            position: 0,
            delivered: 0,
        }
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            FRAME_EXTENSIONS.iter().any(|known| *known == ext)
        })
        .unwrap_or(false)
}

impl FrameSource for ImageDirSource {
    fn connect(&mut self) -> Result<()> {
        if self.dir.to_string_lossy().contains("://") {
            return Err(anyhow!(
                "image sequence source only supports local paths (no URL schemes)"
            ));
        }
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read frame directory {}", self.dir.display()))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(anyhow!(
                "frame directory {} contains no decodable frames",
                self.dir.display()
            ));
        }

        log::info!(
            "image sequence source: {} frames in {}",
            files.len(),
            self.dir.display()
        );
        self.files = files;
        self.position = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<FrameBuffer>> {
        let Some(path) = self.files.get(self.position) else {
            return Ok(None);
        };
        let image = image::open(path)
            .with_context(|| format!("failed to decode frame {}", path.display()))?
            .to_rgb8();
        self.position += 1;
        self.delivered += 1;
        Ok(Some(FrameBuffer::from_rgb_image(&image)))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_delivered: self.delivered,
            locator: self.dir.display().to_string(),
        }
    }

    fn close(&mut self) {
        self.files.clear();
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn write_frame(dir: &Path, name: &str, value: u8) {
        let image = GrayImage::from_pixel(16, 12, Luma([value]));
        image.save(dir.join(name)).expect("write frame");
    }

    #[test]
    fn delivers_frames_in_name_order_then_ends() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_frame(dir.path(), "frame_0002.png", 20);
        write_frame(dir.path(), "frame_0001.png", 10);
        write_frame(dir.path(), "frame_0003.png", 30);
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut source = ImageDirSource::new(dir.path());
        source.connect().unwrap();

        let values: Vec<u8> = std::iter::from_fn(|| source.next_frame().unwrap())
            .map(|frame| frame.intensity_at(0, 0))
            .collect();
        assert_eq!(values, vec![10, 20, 30]);
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.stats().frames_delivered, 3);
    }

    #[test]
    fn empty_directory_fails_at_connect() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut source = ImageDirSource::new(dir.path());
        assert!(source.connect().is_err());
    }

    #[test]
    fn url_locator_is_rejected() {
        let mut source = ImageDirSource::new("rtsp://camera-1/stream");
        assert!(source.connect().is_err());
    }
}
