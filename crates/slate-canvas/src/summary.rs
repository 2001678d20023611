//! Textual board summary used as reply metadata or as the whole prompt when
//! no image can be rendered.

use serde::Serialize;
use slate_core::types::WhiteboardProject;

const MAX_SAMPLE_COLORS: usize = 4;
const MAX_SAMPLE_TEXT_CHARS: usize = 80;

/// Normalized bounding box of all stroke points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSummary {
    pub stroke_count: usize,
    pub text_count: usize,
    pub point_count: usize,
    /// `None` for an empty board or strokes without points.
    pub bounds: Option<Bounds>,
    /// Up to four stroke colors, as ARGB integers, in stroke order.
    pub sample_colors: Vec<u32>,
    /// First non-blank text item, trimmed and truncated to 80 characters.
    pub sample_text: Option<String>,
}

impl BoardSummary {
    pub fn from_project(project: &WhiteboardProject) -> Self {
        let point_count = project.point_count();

        // Seeded with the inverted unit box.
        let mut bounds = Bounds { min_x: 1.0, max_x: 0.0, min_y: 1.0, max_y: 0.0 };
        for point in project.strokes.iter().flat_map(|s| &s.points) {
            if point.x.is_finite() && point.y.is_finite() {
                bounds.min_x = bounds.min_x.min(point.x);
                bounds.max_x = bounds.max_x.max(point.x);
                bounds.min_y = bounds.min_y.min(point.y);
                bounds.max_y = bounds.max_y.max(point.y);
            }
        }

        let sample_colors = project
            .strokes
            .iter()
            .filter_map(|s| s.color)
            .take(MAX_SAMPLE_COLORS)
            .collect();

        let sample_text = project
            .texts
            .iter()
            .map(|t| t.text.trim())
            .find(|t| !t.is_empty())
            .map(|t| t.chars().take(MAX_SAMPLE_TEXT_CHARS).collect());

        Self {
            stroke_count: project.strokes.len(),
            text_count: project.texts.len(),
            point_count,
            bounds: (!project.strokes.is_empty() && point_count > 0).then_some(bounds),
            sample_colors,
            sample_text,
        }
    }

    /// One-line summary tagged with the change `action` that triggered it.
    pub fn to_prompt(&self, action: &str) -> String {
        let bounds_text = match (&self.bounds, self.stroke_count) {
            (_, 0) => "empty board".to_string(),
            (None, _) => "strokes present but no point data".to_string(),
            (Some(b), _) => format!(
                "bounds normalized x {:.2} to {:.2}, y {:.2} to {:.2}",
                b.min_x, b.max_x, b.min_y, b.max_y
            ),
        };
        let color_text = if self.sample_colors.is_empty() {
            "no color data".to_string()
        } else {
            self.sample_colors
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let sample_text = match &self.sample_text {
            Some(text) => format!("'{text}'"),
            None => "none".to_string(),
        };
        format!(
            "Whiteboard update: action={action}. strokes={}. text_items={}. points={}. {bounds_text}. \
             sample colors={color_text}. sample text={sample_text}.",
            self.stroke_count, self.text_count, self.point_count
        )
    }
}
