use anyhow::Result;

use crate::frame::Frame;
use crate::Detection;

/// Detector backend trait.
///
/// Implementations read the frame and return zero or more detections in frame
/// pixel coordinates. The frame is borrowed for the duration of the call only.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a BGR frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
