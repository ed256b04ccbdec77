//! Frame ingestion sources.
//!
//! This module provides sources of BGR frames for the pipeline:
//! - Still images (always available)
//! - Local video files (feature: ingest-file-ffmpeg)
//! - USB/V4L2 cameras (feature: ingest-v4l2)
//! - Synthetic `stub://` clips for video and camera (testing)
//!
//! Sources are local-only. URL schemes other than `stub://` are rejected.
//!
//! Consumers usually go through [`frames`], which connects lazily and turns a
//! source into a plain iterator. Input errors (unreadable file, missing device)
//! are logged there and end the stream, so a broken source behaves like an
//! empty one.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod still;
mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::Result;
use log::error;

use crate::frame::Frame;

pub use file::VideoSource;
pub use still::ImageSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::CameraSource;

/// A producer of frames.
pub trait FrameSource {
    /// Human-readable origin (path or device) for logs.
    fn describe(&self) -> String;

    /// Open the underlying input. Called once before the first frame.
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub origin: String,
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}

/// Iterate a source's frames. Pass `&mut source` to keep the source around.
pub fn frames<S: FrameSource>(source: S) -> Frames<S> {
    Frames {
        source,
        state: FramesState::Pending,
    }
}

/// Iterator returned by [`frames`].
pub struct Frames<S> {
    source: S,
    state: FramesState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FramesState {
    Pending,
    Open,
    Done,
}

impl<S: FrameSource> Frames<S> {
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: FrameSource> Iterator for Frames<S> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.state == FramesState::Pending {
            if let Err(err) = self.source.connect() {
                error!("failed to open {}: {:#}", self.source.describe(), err);
                self.state = FramesState::Done;
                return None;
            }
            self.state = FramesState::Open;
        }
        if self.state == FramesState::Done {
            return None;
        }
        match self.source.next_frame() {
            Ok(Some(frame)) => Some(frame),
            Ok(None) => {
                self.state = FramesState::Done;
                None
            }
            Err(err) => {
                error!("error reading {}: {:#}", self.source.describe(), err);
                self.state = FramesState::Done;
                None
            }
        }
    }
}

/// True for plain filesystem paths and `stub://` test paths.
pub(crate) fn is_local_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(synthetic::STUB_SCHEME) {
        return true;
    }
    !path.contains("://")
}
