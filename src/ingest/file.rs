//! Local video file source.
//!
//! `VideoSource` reads frames from a local video file. Real files are decoded
//! with FFmpeg (feature: ingest-file-ffmpeg); `stub://` paths produce a short
//! synthetic clip. Remote URLs are rejected.

use anyhow::{anyhow, Result};
use log::info;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::synthetic::{
    SyntheticClip, STUB_SCHEME, SYNTHETIC_CLIP_FRAMES, SYNTHETIC_HEIGHT, SYNTHETIC_WIDTH,
};
use super::{is_local_path, FrameSource, SourceStats};
use crate::frame::Frame;

/// Configuration for a local video source.
#[derive(Clone, Debug, Default)]
pub struct VideoConfig {
    /// Local file path (e.g., "/data/field_run.mp4") or `stub://name`.
    pub path: String,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
}

impl VideoConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            max_frames: None,
        }
    }

    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }
}

/// Local video frame source.
///
/// Construction never fails; the file is opened on `connect`.
pub struct VideoSource {
    config: VideoConfig,
    backend: Option<VideoBackend>,
    frame_count: u64,
    finished: bool,
}

enum VideoBackend {
    Synthetic(SyntheticClip),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl VideoSource {
    pub fn new(config: VideoConfig) -> Self {
        Self {
            config,
            backend: None,
            frame_count: 0,
            finished: false,
        }
    }

    fn open_backend(&self) -> Result<VideoBackend> {
        let path = &self.config.path;
        if !is_local_path(path) {
            return Err(anyhow!(
                "video ingestion only supports local paths (no URL schemes): {}",
                path
            ));
        }
        if path.starts_with(STUB_SCHEME) {
            info!("VideoSource: opened {} (synthetic)", path);
            return Ok(VideoBackend::Synthetic(SyntheticClip::new(
                SYNTHETIC_WIDTH,
                SYNTHETIC_HEIGHT,
                Some(SYNTHETIC_CLIP_FRAMES),
            )));
        }

        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(VideoBackend::Ffmpeg(FfmpegFileSource::open(path)?))
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(anyhow!(
                "cannot open {}: video decoding requires the ingest-file-ffmpeg feature",
                path
            ))
        }
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            info!(
                "VideoSource: processed {} frames from {}",
                self.frame_count, self.config.path
            );
        }
    }
}

impl FrameSource for VideoSource {
    fn describe(&self) -> String {
        self.config.path.clone()
    }

    fn connect(&mut self) -> Result<()> {
        self.backend = Some(self.open_backend()?);
        self.frame_count = 0;
        self.finished = false;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }
        if let Some(max_frames) = self.config.max_frames {
            if self.frame_count >= max_frames {
                info!("VideoSource: reached max_frames limit: {}", max_frames);
                self.finish();
                return Ok(None);
            }
        }

        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| anyhow!("video source {} not connected", self.config.path))?;
        let next = match backend {
            VideoBackend::Synthetic(clip) => clip.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.next_frame()?,
        };

        match next {
            Some(frame) => {
                self.frame_count += 1;
                Ok(Some(frame))
            }
            None => {
                self.finish();
                Ok(None)
            }
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            origin: self.config.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::frames;

    #[test]
    fn stub_clip_runs_to_its_end() {
        let mut source = VideoSource::new(VideoConfig::new("stub://field"));
        assert_eq!(frames(&mut source).count() as u64, SYNTHETIC_CLIP_FRAMES);
        assert_eq!(source.stats().frames_captured, SYNTHETIC_CLIP_FRAMES);
    }

    #[test]
    fn max_frames_caps_the_stream() {
        let config = VideoConfig::new("stub://field").with_max_frames(Some(5));
        let mut source = VideoSource::new(config);
        let collected: Vec<Frame> = frames(&mut source).collect();
        assert_eq!(collected.len(), 5);
        assert_eq!(collected[0].width(), SYNTHETIC_WIDTH);
        assert_eq!(collected[0].height(), SYNTHETIC_HEIGHT);
    }

    #[test]
    fn zero_max_frames_yields_nothing() {
        let config = VideoConfig::new("stub://field").with_max_frames(Some(0));
        assert_eq!(frames(VideoSource::new(config)).count(), 0);
    }

    #[test]
    fn remote_urls_are_rejected() {
        let mut source = VideoSource::new(VideoConfig::new("rtsp://camera/stream"));
        assert!(source.connect().is_err());
        assert_eq!(frames(source).count(), 0);
    }

    #[test]
    fn unconnected_source_errors() {
        let mut source = VideoSource::new(VideoConfig::new("stub://field"));
        assert!(source.next_frame().is_err());
    }

    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    #[test]
    fn real_files_need_ffmpeg() {
        let mut source = VideoSource::new(VideoConfig::new("clip.mp4"));
        assert!(source.connect().is_err());
    }
}
