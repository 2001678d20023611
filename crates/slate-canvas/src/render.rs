//! Deterministic rasterization of a whiteboard project.

use std::fmt;
use std::io::Cursor;

use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use slate_core::config::{DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, MAX_CANVAS_DIMENSION, RenderConfig};
use slate_core::error::{Result, SlateError};
use slate_core::types::{
    DEFAULT_FONT_SIZE, DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH, DEFAULT_TEXT_COLOR,
    MAX_FONT_SIZE, MIN_FONT_SIZE, WhiteboardProject,
};
use tracing::{debug, warn};

use crate::draw::{self, WHITE};
use crate::font;
use crate::glyphs::{self, ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH, LINE_HEIGHT};

/// Bitmap glyph cells per unit of font size.
const GLYPH_SCALE_DIVISOR: f64 = 8.0;
/// Line advance for TrueType text, as a multiple of the font size.
const LINE_SPACING: f64 = 1.2;
/// Far-off coordinates are pulled in to keep integer drawing math in range.
const COORD_LIMIT: f64 = 100_000.0;

#[derive(Clone)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    /// `None` draws text with the bitmap glyphs.
    pub font: Option<FontArc>,
}

impl RenderOptions {
    /// Canvas of the given size without a TrueType font.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            font: None,
        }
    }

    pub fn with_font(mut self, font: Option<FontArc>) -> Self {
        self.font = font;
        self
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("font", &self.font.is_some())
            .finish()
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT).with_font(font::system_font())
    }
}

impl From<&RenderConfig> for RenderOptions {
    fn from(config: &RenderConfig) -> Self {
        Self::new(config.width, config.height).with_font(font::resolve_font(config.font_path.as_deref()))
    }
}

fn to_canvas(v: f64) -> f32 {
    v.clamp(-COORD_LIMIT, COORD_LIMIT) as f32
}

/// Paint `project` onto a white canvas.
///
/// Strokes are drawn first in list order, then text. Items that cannot be
/// interpreted (no usable points, missing text position, blank text) are
/// skipped.
pub fn rasterize(project: &WhiteboardProject, opts: &RenderOptions) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(opts.width, opts.height, WHITE);
    let (w, h) = (opts.width as f64, opts.height as f64);

    for stroke in &project.strokes {
        let normalized = stroke.is_normalized();
        let points: Vec<(f32, f32)> = stroke
            .points
            .iter()
            .map(|p| if normalized { (p.x * w, p.y * h) } else { (p.x, p.y) })
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(x, y)| (to_canvas(x), to_canvas(y)))
            .collect();
        if points.is_empty() {
            continue;
        }
        let width = stroke
            .stroke_width
            .filter(|v| v.is_finite())
            .unwrap_or(DEFAULT_STROKE_WIDTH)
            .clamp(1.0, COORD_LIMIT) as f32;
        let color = draw::from_argb(stroke.color.unwrap_or(DEFAULT_STROKE_COLOR));

        if let [(x, y)] = points.as_slice() {
            draw::fill_disc(&mut img, *x, *y, (width / 2.0).max(1.0), color);
        } else {
            draw::stroke_polyline(&mut img, &points, width, color);
        }
    }

    for item in &project.texts {
        let text = item.text.trim_end();
        if text.trim().is_empty() {
            continue;
        }
        let (Some(x), Some(y)) = (item.x, item.y) else {
            debug!(id = ?item.id, "Skipping text item without position");
            continue;
        };
        let (px, py) = if item.is_normalized() { (x * w, y * h) } else { (x, y) };
        if !px.is_finite() || !py.is_finite() {
            continue;
        }
        let font_size = item
            .font_size
            .filter(|v| v.is_finite())
            .unwrap_or(DEFAULT_FONT_SIZE)
            .clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        let color = draw::from_argb(item.color.unwrap_or(DEFAULT_TEXT_COLOR));
        let (px, py) = (to_canvas(px) as i32, to_canvas(py) as i32);
        match &opts.font {
            Some(font) => draw_font_text(&mut img, font, text, px, py, font_size, color),
            None => draw_glyph_text(&mut img, text, px, py, font_size, color),
        }
    }

    img
}

/// TrueType text with its top-left corner at (`x`, `y`).
fn draw_font_text(img: &mut RgbaImage, font: &FontArc, text: &str, x: i32, y: i32, size: f64, color: Rgba<u8>) {
    let scale = PxScale::from(size as f32);
    let line_height = (size * LINE_SPACING).round() as i32;
    for (line_no, line) in text.lines().enumerate() {
        let top = y.saturating_add(line_height.saturating_mul(line_no as i32));
        draw_text_mut(img, color, x, top, scale, font, line);
    }
}

/// Bitmap text with its top-left corner at (`x`, `y`).
fn draw_glyph_text(img: &mut RgbaImage, text: &str, x: i32, y: i32, size: f64, color: Rgba<u8>) {
    let cell = (size / GLYPH_SCALE_DIVISOR).round().max(1.0) as i32;
    for (line_no, line) in text.lines().enumerate() {
        let top = y + (line_no as i32) * LINE_HEIGHT as i32 * cell;
        for (col_no, c) in line.chars().enumerate() {
            let left = x + (col_no as i32) * ADVANCE as i32 * cell;
            let rows = glyphs::glyph(c).unwrap_or(glyphs::MISSING);
            for row in 0..GLYPH_HEIGHT {
                for col in 0..GLYPH_WIDTH {
                    if glyphs::is_set(&rows, col, row) {
                        let cx = left + col as i32 * cell;
                        let cy = top + row as i32 * cell;
                        draw::fill_cell(img, cx, cy, cell as u32, color);
                    }
                }
            }
        }
    }
}

/// Render `project` to PNG bytes.
///
/// Returns `None` for an unusable canvas size or when encoding fails;
/// callers fall back to text-only feedback.
pub fn render_png(project: &WhiteboardProject, opts: &RenderOptions) -> Option<Vec<u8>> {
    if opts.width == 0 || opts.height == 0 || opts.width > MAX_CANVAS_DIMENSION || opts.height > MAX_CANVAS_DIMENSION {
        warn!(width = opts.width, height = opts.height, "Whiteboard: invalid canvas size, cannot render");
        return None;
    }
    let img = rasterize(project, opts);
    match encode_png(img) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("Whiteboard: failed to render image from strokes: {e}");
            None
        }
    }
}

/// Flatten to RGB and encode.
fn encode_png(img: RgbaImage) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(img).to_rgb8();
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| SlateError::RenderUnavailable(e.to_string()))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slate_core::types::{Point, Stroke, TextItem};

    fn small() -> RenderOptions {
        RenderOptions::new(100, 80)
    }

    fn text_board(text: &str, font_size: f64) -> WhiteboardProject {
        let mut project = WhiteboardProject::default();
        project
            .texts
            .push(TextItem::new("t1", text, 0.1, 0.1, 0xFF00_0000, font_size));
        project
    }

    fn is_blank(img: &RgbaImage) -> bool {
        img.pixels().all(|p| *p == WHITE)
    }

    #[test]
    fn test_empty_project_is_white() {
        let img = rasterize(&WhiteboardProject::default(), &small());
        assert_eq!(img.dimensions(), (100, 80));
        assert!(is_blank(&img));
    }

    #[test]
    fn test_normalized_stroke_scales_to_canvas() {
        let mut project = WhiteboardProject::default();
        project.strokes.push(Stroke::new(
            "s1",
            vec![Point::new(0.1, 0.5), Point::new(0.9, 0.5)],
            0xFFFF_0000,
            4.0,
        ));
        let img = rasterize(&project, &small());
        assert_eq!(*img.get_pixel(50, 40), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(50, 10), WHITE);
    }

    #[test]
    fn test_absolute_stroke_when_not_normalized() {
        let mut stroke = Stroke::new("s1", vec![Point::new(10.0, 10.0)], 0xFF00_00FF, 6.0);
        stroke.normalized = Some(false);
        let mut project = WhiteboardProject::default();
        project.strokes.push(stroke);
        let img = rasterize(&project, &small());
        assert_eq!(*img.get_pixel(10, 10), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_missing_normalized_flag_means_absolute() {
        let mut stroke = Stroke::new("s1", vec![Point::new(0.5, 0.5)], 0xFF00_00FF, 6.0);
        stroke.normalized = None;
        let mut project = WhiteboardProject::default();
        project.strokes.push(stroke);
        let img = rasterize(&project, &small());
        assert_eq!(*img.get_pixel(50, 40), WHITE);
        assert_eq!(*img.get_pixel(0, 0), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_far_off_points_do_not_panic() {
        let mut stroke = Stroke::new(
            "s1",
            vec![Point::new(-1.0e12, 5.0), Point::new(1.0e12, 5.0)],
            0xFF00_0000,
            1.0e9,
        );
        stroke.normalized = Some(false);
        let mut project = WhiteboardProject::default();
        project.strokes.push(stroke);
        rasterize(&project, &small());
    }

    #[test]
    fn test_malformed_items_are_skipped() {
        let mut project = WhiteboardProject::default();
        project.strokes.push(Stroke::new("empty", vec![], 0xFF00_0000, 3.0));
        let mut text = TextItem::new("t1", "hi", 0.5, 0.5, 0xFF00_0000, 30.0);
        text.x = None;
        project.texts.push(text);
        project.texts.push(TextItem::new("t2", "   ", 0.5, 0.5, 0xFF00_0000, 30.0));
        assert!(is_blank(&rasterize(&project, &small())));
    }

    #[test]
    fn test_bitmap_text_is_drawn() {
        let mut project = WhiteboardProject::default();
        project
            .texts
            .push(TextItem::new("t1", "1", 0.0, 0.0, 0xFF00_0000, 16.0));
        let img = rasterize(&project, &small());
        // Font 16 gives 2px cells; the stem of '1' is column 2.
        assert_eq!(*img.get_pixel(4, 4), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(0, 0), WHITE);
    }

    #[test]
    fn test_bitmap_text_loses_case() {
        let lower = rasterize(&text_board("x", 30.0), &small());
        let upper = rasterize(&text_board("X", 30.0), &small());
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_font_text_keeps_case_and_symbols() {
        let Some(font) = font::system_font() else {
            eprintln!("Skipping: {} not installed", font::DEFAULT_FONT_FILE);
            return;
        };
        let opts = RenderOptions::new(200, 120).with_font(Some(font));

        let lower = rasterize(&text_board("x", 40.0), &opts);
        let upper = rasterize(&text_board("X", 40.0), &opts);
        assert!(!is_blank(&lower));
        assert_ne!(lower, upper);

        // U+E000 has no glyph in DejaVu Sans and draws the missing-glyph box.
        let pi = rasterize(&text_board("π", 40.0), &opts);
        let missing = rasterize(&text_board("\u{E000}", 40.0), &opts);
        assert!(!is_blank(&pi));
        assert_ne!(pi, missing);

        let bitmap = rasterize(&text_board("x", 40.0), &RenderOptions::new(200, 120));
        assert_ne!(lower, bitmap);
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut project = WhiteboardProject::default();
        project.strokes.push(Stroke::new(
            "s1",
            vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
            0xFF0E_72ED,
            4.0,
        ));
        project.texts.push(TextItem::new("t1", "a² + b²", 0.2, 0.6, 0xFF11_1827, 24.0));
        let opts = RenderOptions::default();
        assert_eq!(rasterize(&project, &opts), rasterize(&project, &opts));
    }

    #[test]
    fn test_render_png_rejects_bad_sizes() {
        let board = WhiteboardProject::default();
        assert!(render_png(&board, &RenderOptions::new(0, 10)).is_none());
        assert!(render_png(&board, &RenderOptions::new(MAX_CANVAS_DIMENSION + 1, 10)).is_none());
    }

    #[test]
    fn test_render_png_decodes() {
        let mut project = WhiteboardProject::default();
        project.strokes.push(Stroke::new(
            "s1",
            vec![Point::new(0.0, 0.5), Point::new(1.0, 0.5)],
            0xFF00_0000,
            6.0,
        ));
        let bytes = render_png(&project, &small()).expect("png bytes");
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (100, 80));
        assert_eq!(decoded.get_pixel(50, 40).0, [0, 0, 0]);
        assert_eq!(decoded.get_pixel(50, 5).0, [255, 255, 255]);
    }
}
