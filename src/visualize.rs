//! Frame overlays.
//!
//! Boxes are drawn straight into the BGR buffer via `imageproc`. Text needs a
//! TrueType font loaded from disk; when none is configured only boxes are drawn.

use std::collections::BTreeMap;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use log::{debug, error, info, warn};

use crate::config::VisualizerSettings;
use crate::frame::Frame;
use crate::{BBox, Ripeness, Strawberry};

const BOX_THICKNESS: u32 = 2;
const LABEL_SCALE: f32 = 16.0;
const LABEL_PADDING: i32 = 10;
const SUMMARY_TITLE_SCALE: f32 = 22.0;
const SUMMARY_LINE_SCALE: f32 = 19.0;
const SUMMARY_MARGIN: i32 = 10;
const SUMMARY_LINE_STEP: i32 = 25;

/// BGR white.
const TEXT_COLOR: [u8; 3] = [255, 255, 255];

pub struct Visualizer {
    show_id: bool,
    show_confidence: bool,
    font: Option<FontVec>,
}

impl Visualizer {
    pub fn new(show_id: bool, show_confidence: bool) -> Self {
        Self {
            show_id,
            show_confidence,
            font: None,
        }
    }

    /// Attach a TrueType/OpenType font for labels and summaries.
    pub fn with_font<P: AsRef<Path>>(mut self, font_path: P) -> Result<Self> {
        self.set_font(font_path)?;
        Ok(self)
    }

    pub fn set_font<P: AsRef<Path>>(&mut self, font_path: P) -> Result<()> {
        let font_path = font_path.as_ref();
        let bytes = std::fs::read(font_path)
            .with_context(|| format!("failed to read font {}", font_path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| anyhow!("invalid font {}: {}", font_path.display(), e))?;
        self.font = Some(font);
        Ok(())
    }

    /// Build from settings. A font that fails to load is logged and skipped.
    pub fn from_settings(settings: &VisualizerSettings) -> Self {
        let mut visualizer = Self::new(settings.show_id, settings.show_confidence);
        if let Some(path) = settings.font_path.as_deref() {
            if let Err(err) = visualizer.set_font(path) {
                warn!("labels disabled: {:#}", err);
            }
        }
        visualizer
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// BGR overlay color for a ripeness class.
    pub fn color_for(ripeness: Ripeness) -> [u8; 3] {
        match ripeness {
            Ripeness::Ripe => [0, 255, 0],
            Ripeness::SemiRipe => [0, 165, 255],
            Ripeness::Unripe => [0, 0, 255],
        }
    }

    /// Label text: ripeness, then the score and identifier when enabled.
    pub fn label_for(&self, strawberry: &Strawberry) -> String {
        let mut parts = vec![strawberry.ripeness().as_str().to_string()];
        if self.show_confidence {
            parts.push(format!("{:.2}", strawberry.detection().score()));
        }
        if self.show_id {
            if let Some(id) = strawberry.id() {
                parts.push(format!("ID:{}", id));
            }
        }
        parts.join(" ")
    }

    /// Draw one box (and label, when a font is available) per entity.
    pub fn draw(&self, frame: &mut Frame, strawberries: &[Strawberry]) -> Result<()> {
        if strawberries.is_empty() || frame.is_empty() {
            return Ok(());
        }
        let labels: Vec<String> = strawberries.iter().map(|s| self.label_for(s)).collect();
        let visible: Vec<bool> = strawberries
            .iter()
            .map(|s| !frame.clip(&outline(s.detection().bbox())).is_empty())
            .collect();
        frame.with_canvas(|canvas| {
            for ((strawberry, label), _) in strawberries
                .iter()
                .zip(&labels)
                .zip(&visible)
                .filter(|(_, shown)| **shown)
            {
                let color = Rgb(Self::color_for(strawberry.ripeness()));
                let bbox = strawberry.detection().bbox();
                draw_box(canvas, bbox, color);

                if let Some(font) = self.font.as_ref() {
                    let scale = PxScale::from(LABEL_SCALE);
                    let (text_w, text_h) = text_size(scale, font, label);
                    let text_h = text_h as i32;
                    let top = bbox.y - text_h - LABEL_PADDING;
                    draw_filled_rect_mut(
                        canvas,
                        Rect::at(bbox.x, top).of_size(text_w.max(1), (text_h + LABEL_PADDING) as u32),
                        color,
                    );
                    draw_text_mut(
                        canvas,
                        Rgb(TEXT_COLOR),
                        bbox.x,
                        top + LABEL_PADDING / 2,
                        scale,
                        font,
                        label,
                    );
                }
            }
        })
    }

    /// Write a `Total: N` line and one line per ripeness class in its color.
    pub fn add_summary_overlay(
        &self,
        frame: &mut Frame,
        counts: &BTreeMap<Ripeness, usize>,
        total: usize,
    ) -> Result<()> {
        let Some(font) = self.font.as_ref() else {
            debug!("summary overlay skipped: no font configured");
            return Ok(());
        };
        frame.with_canvas(|canvas| {
            let mut y = SUMMARY_MARGIN;
            draw_text_mut(
                canvas,
                Rgb(TEXT_COLOR),
                SUMMARY_MARGIN,
                y,
                PxScale::from(SUMMARY_TITLE_SCALE),
                font,
                &format!("Total: {}", total),
            );
            y += SUMMARY_LINE_STEP + 5;
            for (ripeness, count) in counts {
                draw_text_mut(
                    canvas,
                    Rgb(Self::color_for(*ripeness)),
                    SUMMARY_MARGIN,
                    y,
                    PxScale::from(SUMMARY_LINE_SCALE),
                    font,
                    &format!("{}: {}", ripeness, count),
                );
                y += SUMMARY_LINE_STEP;
            }
        })
    }

    /// Encode the frame (as RGB) to `path`, creating parent directories.
    /// The format follows the file extension.
    pub fn save_frame(&self, frame: &Frame, path: &Path) -> bool {
        if frame.is_empty() {
            error!("cannot save empty frame to {}", path.display());
            return false;
        }
        match write_image(frame, path) {
            Ok(()) => {
                info!("frame saved: {}", path.display());
                true
            }
            Err(err) => {
                error!("failed to save frame to {}: {:#}", path.display(), err);
                false
            }
        }
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new(true, true)
    }
}

/// The drawn outline spans `x..=x+w` and `y..=y+h`.
fn outline(bbox: &BBox) -> BBox {
    BBox::new(bbox.x, bbox.y, bbox.w.saturating_add(1), bbox.h.saturating_add(1))
}

fn draw_box(canvas: &mut RgbImage, bbox: &BBox, color: Rgb<u8>) {
    // Edges beyond the margin never reach the canvas. Clamped so imageproc's
    // i32 edge arithmetic stays in range.
    let margin = BOX_THICKNESS as i64;
    let (width, height) = (canvas.width() as i64, canvas.height() as i64);
    let clamp_x = |v: i64| v.clamp(-margin, width + margin);
    let clamp_y = |v: i64| v.clamp(-margin, height + margin);
    let left = clamp_x(bbox.x as i64);
    let top = clamp_y(bbox.y as i64);
    let right = clamp_x(bbox.x as i64 + bbox.w as i64);
    let bottom = clamp_y(bbox.y as i64 + bbox.h as i64);

    for inset in 0..margin {
        let (l, t, r, b) = (left + inset, top + inset, right - inset, bottom - inset);
        if r < l || b < t {
            break;
        }
        let rect = Rect::at(l as i32, t as i32).of_size((r - l + 1) as u32, (b - t + 1) as u32);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

fn write_image(frame: &Frame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    frame
        .to_rgb_image()
        .save(path)
        .with_context(|| format!("failed to encode {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Detection;

    fn berry(id: Option<u64>, bbox: BBox, ripeness: Ripeness) -> Strawberry {
        let det = Detection::new(bbox, 0.876, "strawberry").unwrap();
        match id {
            Some(id) => Strawberry::with_id(id, det, ripeness),
            None => Strawberry::new(det, ripeness),
        }
    }

    #[test]
    fn labels_follow_flags() {
        let tracked = berry(Some(7), BBox::new(0, 0, 5, 5), Ripeness::SemiRipe);
        let untracked = berry(None, BBox::new(0, 0, 5, 5), Ripeness::Ripe);

        assert_eq!(Visualizer::new(true, true).label_for(&tracked), "semi_ripe 0.88 ID:7");
        assert_eq!(Visualizer::new(false, true).label_for(&tracked), "semi_ripe 0.88");
        assert_eq!(Visualizer::new(true, false).label_for(&tracked), "semi_ripe ID:7");
        assert_eq!(Visualizer::new(true, true).label_for(&untracked), "ripe 0.88");
    }

    #[test]
    fn draws_two_pixel_border_in_ripeness_color() -> Result<()> {
        let mut frame = Frame::zeros(20, 20);
        let batch = vec![berry(Some(1), BBox::new(5, 5, 10, 10), Ripeness::Ripe)];

        Visualizer::default().draw(&mut frame, &batch)?;

        assert_eq!(frame.pixel(5, 5), Some([0, 255, 0]));
        assert_eq!(frame.pixel(6, 6), Some([0, 255, 0]));
        assert_eq!(frame.pixel(14, 14), Some([0, 255, 0]));
        assert_eq!(frame.pixel(15, 15), Some([0, 255, 0]));
        assert_eq!(frame.pixel(15, 10), Some([0, 255, 0]));
        assert_eq!(frame.pixel(16, 16), Some([0, 0, 0]));
        assert_eq!(frame.pixel(7, 7), Some([0, 0, 0]));
        assert_eq!(frame.pixel(2, 2), Some([0, 0, 0]));
        Ok(())
    }

    #[test]
    fn boxes_partly_outside_are_clipped() -> Result<()> {
        let mut frame = Frame::zeros(10, 10);
        let batch = vec![berry(None, BBox::new(6, 6, 10, 10), Ripeness::Unripe)];

        Visualizer::default().draw(&mut frame, &batch)?;

        assert_eq!(frame.pixel(6, 6), Some([0, 0, 255]));
        assert_eq!(frame.pixel(9, 9), Some([0, 0, 0]));
        Ok(())
    }

    #[test]
    fn boxes_beyond_the_frame_are_skipped() -> Result<()> {
        let mut frame = Frame::zeros(40, 40);
        let batch = vec![
            berry(None, BBox::new(2_000_000_000, 0, 500_000_000, 10), Ripeness::Ripe),
            berry(None, BBox::new(0, i32::MAX, i32::MAX, i32::MAX), Ripeness::Ripe),
        ];

        Visualizer::default().draw(&mut frame, &batch)?;

        assert_eq!(frame, Frame::zeros(40, 40));
        Ok(())
    }

    #[test]
    fn huge_box_anchored_inside_draws_near_edges_only() -> Result<()> {
        let mut frame = Frame::zeros(10, 10);
        let batch = vec![berry(None, BBox::new(2, 2, i32::MAX, i32::MAX), Ripeness::Unripe)];

        Visualizer::default().draw(&mut frame, &batch)?;

        assert_eq!(frame.pixel(2, 2), Some([0, 0, 255]));
        assert_eq!(frame.pixel(9, 3), Some([0, 0, 255]));
        assert_eq!(frame.pixel(9, 9), Some([0, 0, 0]));
        Ok(())
    }

    #[test]
    fn summary_without_font_leaves_frame_untouched() -> Result<()> {
        let mut frame = Frame::zeros(8, 8);
        let counts = BTreeMap::from([(Ripeness::Ripe, 2)]);
        Visualizer::default().add_summary_overlay(&mut frame, &counts, 2)?;
        assert_eq!(frame, Frame::zeros(8, 8));
        Ok(())
    }

    #[test]
    fn missing_font_is_skipped() {
        let settings = VisualizerSettings {
            font_path: Some("/nonexistent/font.ttf".into()),
            ..VisualizerSettings::default()
        };
        assert!(!Visualizer::from_settings(&settings).has_font());
    }

    #[test]
    fn save_frame_creates_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/out/frame.png");
        let frame = Frame::from_rgb(&[200, 10, 20, 0, 0, 0], 2, 1).unwrap();

        assert!(Visualizer::default().save_frame(&frame, &path));

        let saved = image::open(&path).expect("reopen").to_rgb8();
        assert_eq!(saved.get_pixel(0, 0).0, [200, 10, 20]);
    }

    #[test]
    fn save_frame_reports_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("frame.unknownext");
        assert!(!Visualizer::default().save_frame(&Frame::zeros(2, 2), &path));
    }
}
