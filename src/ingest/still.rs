//! Still-image source.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

/// Yields one decoded image, once.
///
/// The first pass (first `connect`) decodes the file. Any later pass logs a
/// warning and yields nothing.
pub struct ImageSource {
    path: PathBuf,
    consumed: bool,
    pending: Option<Frame>,
    frames_captured: u64,
}

impl ImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            consumed: false,
            pending: None,
            frames_captured: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for ImageSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn connect(&mut self) -> Result<()> {
        if self.consumed {
            warn!("image source {} already consumed", self.path.display());
            return Ok(());
        }
        self.consumed = true;

        let decoded = image::open(&self.path)
            .with_context(|| format!("failed to read image {}", self.path.display()))?
            .to_rgb8();
        let frame = Frame::from_rgb_image(&decoded);
        info!(
            "loaded image {} ({}x{})",
            self.path.display(),
            frame.width(),
            frame.height()
        );
        self.pending = Some(frame);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = self.pending.take();
        if frame.is_some() {
            self.frames_captured += 1;
        }
        Ok(frame)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured,
            origin: self.describe(),
        }
    }
}
