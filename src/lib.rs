//! Strawberry Vision
//!
//! This crate counts strawberries in images and video and sorts them by ripeness.
//!
//! # Architecture
//!
//! Every frame goes through the same five steps, driven by `InferencePipeline`:
//!
//! 1. **Detect**: a `DetectorBackend` returns bounding boxes with scores and labels.
//! 2. **Classify**: each box is mapped to a `Ripeness` from its mean red level.
//! 3. **Track**: untracked entities receive sequential identifiers.
//! 4. **Count**: entities are tallied by ripeness and confidence bucket.
//! 5. **Draw**: overlays are rendered onto the frame (presentation only).
//!
//! Timing and frame counters accumulate across calls; nothing else outlives a frame.
//!
//! # Module Structure
//!
//! - `frame`: BGR pixel buffer shared by every stage
//! - `ingest`: frame sources (single image, video file, V4L2 camera)
//! - `detect`: detector contract, stub and ONNX backends, YOLO wrapper
//! - `classify`, `tracking`, `counting`, `visualize`: per-stage services
//! - `pipeline`: per-frame orchestration and metrics
//! - `config`: file + environment configuration
//! - Core types: Ripeness, BBox, Detection, Strawberry

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod classify;
pub mod config;
pub mod counting;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod tracking;
pub mod visualize;

pub use classify::classify_ripeness;
pub use config::Config;
pub use counting::{CountingService, Statistics};
pub use detect::{DetectorBackend, StubBackend, YoloDetector};
pub use frame::{Frame, Region};
#[cfg(feature = "ingest-v4l2")]
pub use ingest::{v4l2::CameraConfig, CameraSource};
pub use ingest::{
    file::VideoConfig, frames, FrameSource, Frames, ImageSource, SourceStats, VideoSource,
};
pub use pipeline::{InferencePipeline, PipelineMetrics, PipelineResult, Summary};
pub use tracking::TrackingService;
pub use visualize::Visualizer;

// -------------------- Validation --------------------

/// Rejected entity construction.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("score must be between 0 and 1, got {0}")]
    ScoreOutOfRange(f32),

    #[error("bbox values must be non-negative, got {0:?}")]
    NegativeBBox(BBox),
}

// -------------------- Ripeness --------------------

/// Maturity state of a strawberry.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Ripeness {
    /// Red dominant, ready for harvest.
    Ripe,
    /// Mixed red and white.
    SemiRipe,
    /// Green or pale.
    Unripe,
}

impl Ripeness {
    pub const ALL: [Ripeness; 3] = [Ripeness::Ripe, Ripeness::SemiRipe, Ripeness::Unripe];

    /// Case-insensitive parse. Anything unrecognized maps to `Unripe`.
    pub fn from_string(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "ripe" => Ripeness::Ripe,
            "semi_ripe" => Ripeness::SemiRipe,
            _ => Ripeness::Unripe,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Ripeness::Ripe => "ripe",
            Ripeness::SemiRipe => "semi_ripe",
            Ripeness::Unripe => "unripe",
        }
    }
}

impl fmt::Display for Ripeness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -------------------- Confidence --------------------

const HIGH_CONFIDENCE: f32 = 0.9;
const MEDIUM_CONFIDENCE: f32 = 0.7;

/// Coarse bucket for a detection score.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_score(score: f32) -> Self {
        if score >= HIGH_CONFIDENCE {
            ConfidenceLevel::High
        } else if score >= MEDIUM_CONFIDENCE {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -------------------- Bounding Boxes --------------------

/// Axis-aligned box in frame pixels: origin plus width and height.
///
/// Components are signed so that bad detector output can be represented and
/// rejected by `Detection::new` instead of silently wrapping.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BBox {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn is_non_negative(&self) -> bool {
        self.x >= 0 && self.y >= 0 && self.w >= 0 && self.h >= 0
    }

    pub fn area(&self) -> i64 {
        self.w as i64 * self.h as i64
    }

    /// Computed in i64 so boxes near `i32::MAX` cannot overflow.
    pub fn center(&self) -> (i64, i64) {
        (
            self.x as i64 + self.w as i64 / 2,
            self.y as i64 + self.h as i64 / 2,
        )
    }
}

// -------------------- Detections --------------------

/// Raw detector output for one object.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Detection {
    bbox: BBox,
    score: f32,
    label: String,
}

impl Detection {
    /// Build a detection, rejecting scores outside `[0, 1]` (including NaN)
    /// and boxes with any negative component.
    pub fn new(bbox: BBox, score: f32, label: impl Into<String>) -> Result<Self, ValidationError> {
        if !(0.0..=1.0).contains(&score) {
            return Err(ValidationError::ScoreOutOfRange(score));
        }
        if !bbox.is_non_negative() {
            return Err(ValidationError::NegativeBBox(bbox));
        }
        Ok(Self {
            bbox,
            score,
            label: label.into(),
        })
    }

    pub fn bbox(&self) -> &BBox {
        &self.bbox
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn area(&self) -> i64 {
        self.bbox.area()
    }

    pub fn center(&self) -> (i64, i64) {
        self.bbox.center()
    }
}

// -------------------- Entities --------------------

/// One detected strawberry: detection, ripeness and an identifier once tracked.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Strawberry {
    id: Option<u64>,
    detection: Detection,
    ripeness: Ripeness,
}

impl Strawberry {
    /// Untracked entity.
    pub fn new(detection: Detection, ripeness: Ripeness) -> Self {
        Self {
            id: None,
            detection,
            ripeness,
        }
    }

    pub fn with_id(id: u64, detection: Detection, ripeness: Ripeness) -> Self {
        Self {
            id: Some(id),
            detection,
            ripeness,
        }
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Set the identifier. Refused (returns false) when one is already present.
    pub fn assign_id(&mut self, id: u64) -> bool {
        if self.id.is_some() {
            return false;
        }
        self.id = Some(id);
        true
    }

    pub fn detection(&self) -> &Detection {
        &self.detection
    }

    pub fn ripeness(&self) -> Ripeness {
        self.ripeness
    }

    pub fn is_tracked(&self) -> bool {
        self.id.is_some()
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.detection.score)
    }
}

// -------------------- Tests --------------------
