//! YOLOv8 output decoding.
//!
//! The head emits a `[1, 4 + num_classes, proposals]` tensor stored attribute
//! major: row 0..4 are `cx, cy, w, h` in model-input pixels, the remaining rows
//! are per-class scores. Decoding picks each proposal's best class, drops those
//! under the confidence threshold and runs greedy NMS over the survivors.

use anyhow::{anyhow, Result};

use crate::BBox;

const BOX_ATTRIBUTES: usize = 4;

/// Corner-form box in model-input coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    pub class_id: usize,
}

impl RawBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn iou(&self, other: &RawBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        let union = self.width() * self.height() + other.width() * other.height() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }

    /// Scale into frame pixels, clamp to the frame and round to an integer box.
    pub fn to_bbox(&self, scale_x: f32, scale_y: f32, frame_w: u32, frame_h: u32) -> BBox {
        let x1 = (self.x1 * scale_x).clamp(0.0, frame_w as f32);
        let y1 = (self.y1 * scale_y).clamp(0.0, frame_h as f32);
        let x2 = (self.x2 * scale_x).clamp(0.0, frame_w as f32);
        let y2 = (self.y2 * scale_y).clamp(0.0, frame_h as f32);
        BBox::new(
            x1.round() as i32,
            y1.round() as i32,
            (x2 - x1).max(0.0).round() as i32,
            (y2 - y1).max(0.0).round() as i32,
        )
    }
}

/// Decode a flat attribute-major output buffer.
///
/// `attributes` is `4 + num_classes`; `data.len()` must equal
/// `attributes * proposals`.
pub fn decode_yolo_output(
    data: &[f32],
    attributes: usize,
    proposals: usize,
    confidence_threshold: f32,
) -> Result<Vec<RawBox>> {
    if attributes <= BOX_ATTRIBUTES {
        return Err(anyhow!(
            "YOLO output has {} attributes, expected at least {}",
            attributes,
            BOX_ATTRIBUTES + 1
        ));
    }
    let expected = attributes
        .checked_mul(proposals)
        .ok_or_else(|| anyhow!("YOLO output dimensions overflow"))?;
    if data.len() != expected {
        return Err(anyhow!(
            "YOLO output length mismatch: expected {}, got {}",
            expected,
            data.len()
        ));
    }

    let num_classes = attributes - BOX_ATTRIBUTES;
    let mut candidates = Vec::new();
    for i in 0..proposals {
        let at = |row: usize| data[row * proposals + i];

        let (class_id, score) = (0..num_classes)
            .map(|c| (c, at(BOX_ATTRIBUTES + c)))
            .fold((0, f32::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });
        if !score.is_finite() || score < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(0), at(1), at(2), at(3));
        candidates.push(RawBox {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
            score,
            class_id,
        });
    }
    Ok(candidates)
}

/// Greedy NMS: sort by score descending, suppress overlapping boxes.
///
/// Suppression is class-agnostic.
pub fn non_max_suppression(mut boxes: Vec<RawBox>, iou_threshold: f32) -> Vec<RawBox> {
    boxes.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<RawBox> = Vec::new();
    let mut suppressed = vec![false; boxes.len()];

    for i in 0..boxes.len() {
        if suppressed[i] {
            continue;
        }
        kept.push(boxes[i]);
        for j in (i + 1)..boxes.len() {
            if boxes[i].iou(&boxes[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    kept
}
