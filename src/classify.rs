//! Ripeness heuristic.
//!
//! Placeholder classifier: the mean red level inside a box decides the bucket.
//! It is not calibrated against labelled data.

use crate::frame::{Frame, RED};
use crate::{BBox, Ripeness};

/// Mean red strictly above this is ripe.
pub const RIPE_RED_MEAN: f64 = 150.0;
/// Mean red strictly above this (and not ripe) is semi-ripe.
pub const SEMI_RIPE_RED_MEAN: f64 = 100.0;

/// Classify the region of `frame` covered by `bbox`.
///
/// The box is clipped to the frame first; an empty region is `Unripe`.
pub fn classify_ripeness(frame: &Frame, bbox: &BBox) -> Ripeness {
    let region = frame.clip(bbox);
    match frame.channel_mean(&region, RED) {
        Some(red_mean) => ripeness_for_red_mean(red_mean),
        None => Ripeness::Unripe,
    }
}

pub fn ripeness_for_red_mean(red_mean: f64) -> Ripeness {
    if red_mean > RIPE_RED_MEAN {
        Ripeness::Ripe
    } else if red_mean > SEMI_RIPE_RED_MEAN {
        Ripeness::SemiRipe
    } else {
        Ripeness::Unripe
    }
}
