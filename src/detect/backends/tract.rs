#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::decode::{decode_yolo_output, non_max_suppression};
use crate::frame::Frame;
use crate::Detection;

/// Tract-based backend for YOLOv8-style ONNX detectors.
///
/// The model is loaded once from a local file. Each frame is resized to the
/// square model input, normalized to `[0, 1]` NCHW RGB and the raw head output
/// is decoded into frame-space detections.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
    class_names: Vec<String>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)))
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            class_names: Vec::new(),
        })
    }

    pub fn with_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.confidence_threshold = confidence;
        self.iou_threshold = iou;
        self
    }

    pub fn with_class_names(mut self, class_names: Vec<String>) -> Self {
        self.class_names = class_names;
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.is_empty() {
            return Err(anyhow!("cannot run inference on an empty frame"));
        }
        let side = self.input_size;
        let resized = image::imageops::resize(&frame.to_rgb_image(), side, side, FilterType::Triangle);

        let side = side as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
        });

        Ok(input.into_tensor())
    }

    fn label_for(&self, class_id: usize) -> String {
        self.class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| class_id.to_string())
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let shape = view.shape();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(anyhow!("unexpected YOLO output shape {:?}", shape));
        }
        let (attributes, proposals) = (shape[1], shape[2]);
        let data: Vec<f32> = view.iter().copied().collect();

        let candidates =
            decode_yolo_output(&data, attributes, proposals, self.confidence_threshold)?;
        let kept = non_max_suppression(candidates, self.iou_threshold);

        let scale_x = frame.width() as f32 / self.input_size as f32;
        let scale_y = frame.height() as f32 / self.input_size as f32;
        let mut detections = Vec::with_capacity(kept.len());
        for raw in kept {
            let bbox = raw.to_bbox(scale_x, scale_y, frame.width(), frame.height());
            let score = raw.score.clamp(0.0, 1.0);
            detections.push(Detection::new(bbox, score, self.label_for(raw.class_id))?);
        }
        Ok(detections)
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size;
        self.detect(&Frame::zeros(side, side)).map(|_| ())
    }
}
