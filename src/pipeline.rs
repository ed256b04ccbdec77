//! Per-frame orchestration.
//!
//! One `run` call: detect, classify ripeness, assign identifiers, count, draw
//! overlays. Errors from any stage are logged and degrade that frame to an
//! empty result; the next frame is processed normally.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::classify::classify_ripeness;
use crate::config::Config;
use crate::counting::{CountingService, Statistics};
use crate::detect::{DetectorBackend, YoloDetector};
use crate::frame::Frame;
use crate::tracking::TrackingService;
use crate::visualize::Visualizer;
use crate::{Ripeness, Strawberry};

// ----------------------------------------------------------------------------
// Results
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineResult {
    pub counts: BTreeMap<Ripeness, usize>,
    pub total: usize,
    pub statistics: Statistics,
    pub processing_time: Duration,
    /// Sequence number of this frame within the pipeline's lifetime.
    pub frame_processed: u64,
}

/// Compact, printable form of a `PipelineResult`.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Summary {
    pub counts: BTreeMap<Ripeness, usize>,
    pub total: usize,
    /// Seconds, rounded to milliseconds.
    pub processing_time: f64,
    pub frames: u64,
}

impl PipelineResult {
    /// Result carrying no entities, used for frames that failed.
    pub fn empty(processing_time: Duration, frame_processed: u64) -> Self {
        Self {
            processing_time,
            frame_processed,
            ..Self::default()
        }
    }

    pub fn count(&self, ripeness: Ripeness) -> usize {
        self.counts.get(&ripeness).copied().unwrap_or(0)
    }

    pub fn summary(&self) -> Summary {
        Summary {
            counts: self.counts.clone(),
            total: self.total,
            processing_time: round_to(self.processing_time.as_secs_f64(), 3),
            frames: self.frame_processed,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq)]
pub struct PipelineMetrics {
    pub total_frames: u64,
    /// Seconds spent on frames that completed.
    pub total_time: f64,
    pub avg_time_per_frame: f64,
    pub fps: f64,
    pub total_tracked: u64,
}

// ----------------------------------------------------------------------------
// Pipeline
// ----------------------------------------------------------------------------

pub struct InferencePipeline {
    detector: Box<dyn DetectorBackend>,
    tracker: TrackingService,
    counter: CountingService,
    visualizer: Visualizer,
    enable_logging: bool,
    frame_count: u64,
    total_processing_time: Duration,
}

/// Entities and tallies produced by a frame that completed.
struct FrameOutput {
    strawberries: Vec<Strawberry>,
    counts: BTreeMap<Ripeness, usize>,
    statistics: Statistics,
}

impl InferencePipeline {
    /// Pipeline over `detector` with default tracker, counter and visualizer.
    pub fn new(detector: Box<dyn DetectorBackend>) -> Self {
        Self {
            detector,
            tracker: TrackingService::new(),
            counter: CountingService::new(),
            visualizer: Visualizer::default(),
            enable_logging: true,
            frame_count: 0,
            total_processing_time: Duration::ZERO,
        }
    }

    /// Pipeline with a `YoloDetector` and visualizer built from `config`.
    pub fn from_config(config: &Config) -> Self {
        let mut pipeline = Self::new(Box::new(YoloDetector::from_config(config)))
            .with_visualizer(Visualizer::from_settings(&config.visualizer))
            .with_logging(config.pipeline.enable_logging);
        pipeline.warm_up();
        if pipeline.enable_logging {
            info!("inference pipeline initialized (detector: {})", pipeline.detector.name());
        }
        pipeline
    }

    pub fn with_tracker(mut self, tracker: TrackingService) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_counter(mut self, counter: CountingService) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_visualizer(mut self, visualizer: Visualizer) -> Self {
        self.visualizer = visualizer;
        self
    }

    /// Toggle the pipeline's own progress logging. Errors are always logged.
    pub fn with_logging(mut self, enable_logging: bool) -> Self {
        self.enable_logging = enable_logging;
        self
    }

    /// Process one frame. Overlays are drawn into `frame` in place.
    pub fn run(&mut self, frame: &mut Frame) -> PipelineResult {
        let start = Instant::now();
        self.frame_count += 1;

        match self.process(frame) {
            Ok(output) => {
                let processing_time = start.elapsed();
                self.total_processing_time += processing_time;
                if self.enable_logging {
                    info!(
                        "frame {}: {} strawberries, {:.3}s",
                        self.frame_count,
                        output.strawberries.len(),
                        processing_time.as_secs_f64()
                    );
                }
                PipelineResult {
                    total: output.strawberries.len(),
                    counts: output.counts,
                    statistics: output.statistics,
                    processing_time,
                    frame_processed: self.frame_count,
                }
            }
            Err(err) => {
                error!("pipeline error on frame {}: {:#}", self.frame_count, err);
                PipelineResult::empty(start.elapsed(), self.frame_count)
            }
        }
    }

    fn process(&mut self, frame: &mut Frame) -> Result<FrameOutput> {
        let detections = self.detector.detect(frame).context("detection failed")?;
        if self.enable_logging {
            debug!("detected {} objects", detections.len());
        }

        let mut strawberries: Vec<Strawberry> = detections
            .into_iter()
            .map(|det| {
                let ripeness = classify_ripeness(frame, det.bbox());
                Strawberry::new(det, ripeness)
            })
            .collect();

        self.tracker.assign_ids(&mut strawberries);

        let counts = self.counter.count_by_ripeness(&strawberries);
        let statistics = self.counter.statistics(&strawberries);

        self.visualizer
            .draw(frame, &strawberries)
            .context("overlay drawing failed")?;

        Ok(FrameOutput {
            strawberries,
            counts,
            statistics,
        })
    }

    /// Run the detector's warm-up hook. Failures are logged and leave the
    /// pipeline usable.
    pub fn warm_up(&mut self) -> bool {
        match self.detector.warm_up() {
            Ok(()) => {
                debug!("{} warm-up complete", self.detector.name());
                true
            }
            Err(err) => {
                warn!("{} warm-up failed: {:#}", self.detector.name(), err);
                false
            }
        }
    }

    pub fn get_metrics(&self) -> PipelineMetrics {
        let total_time = self.total_processing_time.as_secs_f64();
        let avg_time_per_frame = if self.frame_count > 0 {
            total_time / self.frame_count as f64
        } else {
            0.0
        };
        let fps = if avg_time_per_frame > 0.0 {
            1.0 / avg_time_per_frame
        } else {
            0.0
        };
        PipelineMetrics {
            total_frames: self.frame_count,
            total_time,
            avg_time_per_frame,
            fps,
            total_tracked: self.tracker.total_tracked(),
        }
    }

    pub fn reset(&mut self) {
        self.frame_count = 0;
        self.total_processing_time = Duration::ZERO;
        self.tracker.reset();
        if self.enable_logging {
            info!("pipeline reset");
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn total_processing_time(&self) -> Duration {
        self.total_processing_time
    }

    pub fn tracker(&self) -> &TrackingService {
        &self.tracker
    }

    pub fn visualizer(&self) -> &Visualizer {
        &self.visualizer
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BBox, Detection, StubBackend};
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct WarmingBackend {
        warm_ups: Arc<AtomicUsize>,
        fail: bool,
    }

    impl DetectorBackend for WarmingBackend {
        fn name(&self) -> &'static str {
            "warming"
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
            Ok(vec![Detection::new(BBox::new(0, 0, 2, 2), 0.8, "strawberry")?])
        }

        fn warm_up(&mut self) -> Result<()> {
            self.warm_ups.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("model not ready"));
            }
            Ok(())
        }
    }

    #[test]
    fn summary_rounds_to_milliseconds() {
        let result = PipelineResult {
            processing_time: Duration::from_micros(12_345),
            frame_processed: 4,
            total: 0,
            ..PipelineResult::default()
        };
        let summary = result.summary();
        assert_eq!(summary.processing_time, 0.012);
        assert_eq!(summary.frames, 4);
    }

    #[test]
    fn summary_serializes_snake_case_counts() -> Result<()> {
        let result = PipelineResult {
            counts: BTreeMap::from([(Ripeness::SemiRipe, 2), (Ripeness::Ripe, 1)]),
            total: 3,
            ..PipelineResult::default()
        };
        let json = serde_json::to_value(result.summary())?;
        assert_eq!(json["counts"]["semi_ripe"], 2);
        assert_eq!(json["counts"]["ripe"], 1);
        assert_eq!(json["total"], 3);
        Ok(())
    }

    #[test]
    fn empty_frame_counts_as_processed() {
        let mut pipeline = InferencePipeline::new(Box::new(StubBackend::new())).with_logging(false);
        let result = pipeline.run(&mut Frame::zeros(8, 8));
        assert_eq!(result.total, 0);
        assert!(result.counts.is_empty());
        assert_eq!(result.frame_processed, 1);
        assert_eq!(pipeline.frame_count(), 1);
    }

    #[test]
    fn ids_continue_across_frames() -> Result<()> {
        let det = Detection::new(BBox::new(0, 0, 4, 4), 0.9, "strawberry")?;
        let stub = StubBackend::with_detections(vec![det.clone(), det]);
        let mut pipeline = InferencePipeline::new(Box::new(stub)).with_logging(false);

        pipeline.run(&mut Frame::zeros(8, 8));
        let second = pipeline.run(&mut Frame::zeros(8, 8));

        assert_eq!(second.statistics.tracked, 2);
        assert_eq!(pipeline.tracker().next_id(), 5);
        assert_eq!(pipeline.get_metrics().total_tracked, 4);
        Ok(())
    }

    #[test]
    fn metrics_before_any_frame_are_zero() {
        let pipeline = InferencePipeline::new(Box::new(StubBackend::new()));
        assert_eq!(pipeline.get_metrics(), PipelineMetrics::default());
    }

    #[test]
    fn warm_up_reaches_the_detector() {
        let warm_ups = Arc::new(AtomicUsize::new(0));
        let backend = WarmingBackend {
            warm_ups: Arc::clone(&warm_ups),
            fail: false,
        };
        let mut pipeline = InferencePipeline::new(Box::new(backend)).with_logging(false);

        assert!(pipeline.warm_up());
        assert_eq!(warm_ups.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.frame_count(), 0);
    }

    #[test]
    fn failed_warm_up_leaves_pipeline_usable() {
        let warm_ups = Arc::new(AtomicUsize::new(0));
        let backend = WarmingBackend {
            warm_ups: Arc::clone(&warm_ups),
            fail: true,
        };
        let mut pipeline = InferencePipeline::new(Box::new(backend)).with_logging(false);

        assert!(!pipeline.warm_up());
        let result = pipeline.run(&mut Frame::zeros(4, 4));
        assert_eq!(result.total, 1);
        assert_eq!(warm_ups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn from_config_without_model_warms_up_cleanly() {
        let mut pipeline = InferencePipeline::from_config(&Config::default());
        assert!(pipeline.warm_up());
        assert_eq!(pipeline.get_metrics().total_frames, 0);
    }
}
