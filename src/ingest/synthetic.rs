//! Synthetic clips for `stub://` paths.
//!
//! Each frame is black with a 16x16 square whose red level cycles through the
//! ripe, semi-ripe and unripe bands, so a stub detector pointed at the square
//! sees every class over a short clip.

use crate::frame::{Frame, RED};
use crate::BBox;

pub(crate) const STUB_SCHEME: &str = "stub://";

/// Frames in a synthetic video before it ends.
pub(crate) const SYNTHETIC_CLIP_FRAMES: u64 = 30;

pub(crate) const SYNTHETIC_WIDTH: u32 = 64;
pub(crate) const SYNTHETIC_HEIGHT: u32 = 48;

const SQUARE_ORIGIN: i32 = 8;
const SQUARE_SIZE: i32 = 16;
const RED_CYCLE: [u8; 3] = [200, 120, 50];

pub(crate) struct SyntheticClip {
    width: u32,
    height: u32,
    /// `None` runs forever, as a camera would.
    length: Option<u64>,
    frame_count: u64,
}

impl SyntheticClip {
    pub(crate) fn new(width: u32, height: u32, length: Option<u64>) -> Self {
        Self {
            width,
            height,
            length,
            frame_count: 0,
        }
    }

    /// Box covering the coloured square in every frame.
    pub(crate) fn square() -> BBox {
        BBox::new(SQUARE_ORIGIN, SQUARE_ORIGIN, SQUARE_SIZE, SQUARE_SIZE)
    }

    pub(crate) fn next_frame(&mut self) -> Option<Frame> {
        if let Some(length) = self.length {
            if self.frame_count >= length {
                return None;
            }
        }
        let red = RED_CYCLE[(self.frame_count % RED_CYCLE.len() as u64) as usize];
        self.frame_count += 1;

        let mut frame = Frame::zeros(self.width, self.height);
        let region = frame.clip(&Self::square());
        frame.fill_channel(&region, RED, red);
        Some(frame)
    }

    pub(crate) fn frames_served(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_ripeness;
    use crate::Ripeness;

    #[test]
    fn clip_ends_after_its_length() {
        let mut clip = SyntheticClip::new(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, Some(2));
        assert!(clip.next_frame().is_some());
        assert!(clip.next_frame().is_some());
        assert!(clip.next_frame().is_none());
        assert_eq!(clip.frames_served(), 2);
    }

    #[test]
    fn square_cycles_through_ripeness_bands() {
        let mut clip = SyntheticClip::new(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, None);
        let seen: Vec<Ripeness> = (0..4)
            .filter_map(|_| clip.next_frame())
            .map(|frame| classify_ripeness(&frame, &SyntheticClip::square()))
            .collect();
        assert_eq!(
            seen,
            vec![
                Ripeness::Ripe,
                Ripeness::SemiRipe,
                Ripeness::Unripe,
                Ripeness::Ripe
            ]
        );
    }
}
