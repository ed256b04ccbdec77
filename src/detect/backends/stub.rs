use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::frame::Frame;
use crate::Detection;

/// Stub backend for testing. Returns the same detections for every frame.
#[derive(Clone, Debug, Default)]
pub struct StubBackend {
    detections: Vec<Detection>,
}

impl StubBackend {
    /// Backend that never detects anything.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detections(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn set_detections(&mut self, detections: Vec<Detection>) {
        self.detections = detections;
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        Ok(self.detections.clone())
    }
}
