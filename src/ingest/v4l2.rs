//! V4L2 camera source.
//!
//! `CameraSource` captures frames from a local V4L2 device node (e.g.
//! `/dev/video0`). `stub://` device paths produce an endless synthetic feed.
//! Capture negotiates RGB3 and falls back to whatever the driver keeps, as long
//! as it is RGB3 or YUYV.

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use ouroboros::self_referencing;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::synthetic::{SyntheticClip, STUB_SCHEME};
use super::{FrameSource, SourceStats};
use crate::frame::Frame;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or `stub://name`.
    pub device: String,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Requested frame rate; 0 leaves the driver default.
    pub target_fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            max_frames: None,
            width: 640,
            height: 480,
            target_fps: 0,
        }
    }
}

/// Camera frame source.
pub struct CameraSource {
    config: CameraConfig,
    backend: Option<CameraBackend>,
    frame_count: u64,
    finished: bool,
}

enum CameraBackend {
    Synthetic(SyntheticClip),
    Device(DeviceCapture),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            backend: None,
            frame_count: 0,
            finished: false,
        }
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            info!(
                "CameraSource: captured {} frames from {}",
                self.frame_count, self.config.device
            );
        }
    }
}

impl FrameSource for CameraSource {
    fn describe(&self) -> String {
        self.config.device.clone()
    }

    fn connect(&mut self) -> Result<()> {
        let backend = if self.config.device.starts_with(STUB_SCHEME) {
            info!("CameraSource: connected to {} (synthetic)", self.config.device);
            CameraBackend::Synthetic(SyntheticClip::new(self.config.width, self.config.height, None))
        } else {
            CameraBackend::Device(DeviceCapture::open(&self.config)?)
        };
        self.backend = Some(backend);
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
                info!("CameraSource: reached max_frames limit: {}", max_frames);
                self.finish();
                return Ok(None);
            }
        }

        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| anyhow!("camera {} not connected", self.config.device))?;
        let next = match backend {
            CameraBackend::Synthetic(clip) => clip.next_frame(),
            CameraBackend::Device(capture) => match capture.next_frame() {
                Ok(frame) => Some(frame),
                Err(err) => {
                    warn!("CameraSource: failed to read frame: {:#}", err);
                    None
                }
            },
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
            origin: self.config.device.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Device capture using libv4l
// ----------------------------------------------------------------------------

struct DeviceCapture {
    state: DeviceState,
    width: u32,
    height: u32,
    format: PixelFormat,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl DeviceCapture {
    fn open(config: &CameraConfig) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&config.device)
            .with_context(|| format!("open v4l2 device {}", config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                warn!(
                    "CameraSource: failed to set format on {}: {}",
                    config.device, err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "{} captures {}, which is neither RGB3 nor YUYV",
                config.device,
                format.fourcc
            )
        })?;

        if config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.target_fps);
            if let Err(err) = device.set_params(&params) {
                warn!(
                    "CameraSource: failed to set fps on {}: {}",
                    config.device, err
                );
            }
        }

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        info!(
            "CameraSource: connected to {} ({}x{}, {:?})",
            config.device, format.width, format.height, pixel_format
        );
        Ok(Self {
            state,
            width: format.width,
            height: format.height,
            format: pixel_format,
        })
    }

    fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let (width, height, format) = (self.width, self.height, self.format);
        let rgb = self.state.with_mut(|fields| -> Result<Vec<u8>> {
            let (buf, _meta) = fields.stream.next().context("capture v4l2 frame")?;
            normalize_to_rgb(buf, width, height, format)
        })?;
        Frame::from_rgb(&rgb, width, height)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::frames;

    fn stub_config(max_frames: Option<u64>) -> CameraConfig {
        CameraConfig {
            device: "stub://test".to_string(),
            max_frames,
            width: 64,
            height: 48,
            target_fps: 10,
        }
    }

    #[test]
    fn stub_camera_produces_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config(None));
        source.connect()?;

        let frame = source.next_frame()?.context("stub camera yields frames")?;
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        Ok(())
    }

    #[test]
    fn max_frames_caps_camera() {
        let mut source = CameraSource::new(stub_config(Some(3)));
        assert_eq!(frames(&mut source).count(), 3);
        assert_eq!(source.stats().frames_captured, 3);
    }

    #[test]
    fn missing_device_is_an_empty_stream() {
        let config = CameraConfig {
            device: "/dev/does-not-exist".to_string(),
            ..CameraConfig::default()
        };
        assert_eq!(frames(CameraSource::new(config)).count(), 0);
    }
}
