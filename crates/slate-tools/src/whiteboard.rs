//! Whiteboard mutations issued by the agent.
//!
//! Every mutation edits a copy of the stored project, publishes the whole
//! document on each project topic and, once published, mirrors it back into
//! the [`ProjectStore`]. With `lock` set, student drawing is disabled first
//! and re-enabled afterwards, even when the mutation fails.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use slate_channels::DataChannel;
use slate_core::error::{Result, SlateError};
use slate_core::protocol::WireMessage;
use slate_core::store::ProjectStore;
use slate_core::types::{
    MAX_FONT_SIZE, MAX_TEXT_CHARS, MIN_FONT_SIZE, PROJECT_VERSION, Point, Stroke, TextItem,
    WhiteboardProject,
};
use tracing::{info, warn};

pub const MAX_ERASE_COUNT: i64 = 50;

static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{9,}").expect("static regex is valid"));

/// Which list `erase_last` removes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseTarget {
    Strokes,
    Texts,
    Any,
}

impl EraseTarget {
    /// Unrecognized targets mean "any".
    pub fn parse(target: &str) -> Self {
        match target.trim().to_lowercase().as_str() {
            "strokes" => Self::Strokes,
            "texts" | "text" => Self::Texts,
            _ => Self::Any,
        }
    }
}

/// Counts removed by an erase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Erased {
    pub strokes: usize,
    pub texts: usize,
}

impl std::fmt::Display for Erased {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Erased {} stroke(s) and {} text item(s) from the whiteboard.",
            self.strokes, self.texts
        )
    }
}

pub struct WhiteboardBridge {
    channel: Arc<dyn DataChannel>,
    store: Arc<ProjectStore>,
    project_topics: Vec<String>,
}

impl WhiteboardBridge {
    pub fn new(channel: Arc<dyn DataChannel>, store: Arc<ProjectStore>, project_topics: Vec<String>) -> Self {
        Self {
            channel,
            store,
            project_topics,
        }
    }

    pub fn store(&self) -> &Arc<ProjectStore> {
        &self.store
    }

    /// Publish `message` on every project topic. A project message becomes
    /// the stored state once all publishes succeeded.
    async fn publish(&self, message: &WireMessage) -> Result<()> {
        let encoded = message.encode()?;
        for topic in &self.project_topics {
            self.channel
                .publish(&encoded, topic)
                .await
                .map_err(|e| SlateError::Publish(format!("{} on '{topic}': {e}", message.message_type())))?;
        }
        if let WireMessage::Project(project) = message {
            self.store.replace(project);
        }
        Ok(())
    }

    async fn publish_permission(&self, enabled: bool) -> Result<()> {
        self.publish(&WireMessage::StudentDrawingPermission { enabled }).await
    }

    pub async fn set_student_drawing(&self, enabled: bool) -> Result<&'static str> {
        self.publish_permission(enabled).await?;
        Ok(if enabled {
            "Student drawing enabled."
        } else {
            "Student drawing disabled while the agent draws."
        })
    }

    /// Run `edit` on a copy of the current board and publish the result,
    /// bracketed by the drawing lock when `lock` is set.
    async fn mutate<T, F>(&self, lock: bool, edit: F) -> Result<T>
    where
        F: FnOnce(&mut WhiteboardProject) -> Result<T>,
    {
        if lock {
            self.publish_permission(false).await?;
        }

        let result = self.edit_and_publish(edit).await;

        if lock {
            let unlocked = self.publish_permission(true).await;
            match (&result, unlocked) {
                (Ok(_), Err(e)) => return Err(e),
                (Err(_), Err(e)) => warn!("Whiteboard: failed to re-enable student drawing: {e}"),
                _ => {}
            }
        }
        result
    }

    async fn edit_and_publish<T, F>(&self, edit: F) -> Result<T>
    where
        F: FnOnce(&mut WhiteboardProject) -> Result<T>,
    {
        let mut project = self.store.snapshot();
        let out = edit(&mut project)?;
        project.version = PROJECT_VERSION;
        self.publish(&WireMessage::Project(project)).await?;
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn draw_line(
        &self,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        color: u32,
        stroke_width: f64,
        lock: bool,
    ) -> Result<&'static str> {
        let points = vec![
            Point::new(clamp01(x1), clamp01(y1)),
            Point::new(clamp01(x2), clamp01(y2)),
        ];
        self.mutate(lock, |project| {
            let stroke = new_stroke(project, points, color, stroke_width)?;
            project.strokes.push(stroke);
            Ok(())
        })
        .await?;
        info!(color, "Whiteboard: agent drew a line");
        Ok("Drew a line on the whiteboard.")
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn draw_rectangle(
        &self,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        color: u32,
        stroke_width: f64,
        lock: bool,
    ) -> Result<&'static str> {
        let (ax, bx) = (clamp01(x1.min(x2)), clamp01(x1.max(x2)));
        let (ay, by) = (clamp01(y1.min(y2)), clamp01(y1.max(y2)));
        let points = vec![
            Point::new(ax, ay),
            Point::new(bx, ay),
            Point::new(bx, by),
            Point::new(ax, by),
            Point::new(ax, ay),
        ];
        self.mutate(lock, |project| {
            let stroke = new_stroke(project, points, color, stroke_width)?;
            project.strokes.push(stroke);
            Ok(())
        })
        .await?;
        info!(color, "Whiteboard: agent drew a rectangle");
        Ok("Drew a rectangle on the whiteboard.")
    }

    pub async fn write_text(
        &self,
        text: &str,
        x: f64,
        y: f64,
        color: u32,
        font_size: f64,
        lock: bool,
    ) -> Result<&'static str> {
        self.add_text(text, x, y, color, font_size, lock).await?;
        Ok("Wrote text on the whiteboard.")
    }

    pub async fn write_equation(
        &self,
        equation: &str,
        x: f64,
        y: f64,
        color: u32,
        font_size: f64,
        lock: bool,
    ) -> Result<&'static str> {
        self.add_text(equation, x, y, color, font_size, lock).await?;
        Ok("Wrote an equation on the whiteboard.")
    }

    async fn add_text(&self, text: &str, x: f64, y: f64, color: u32, font_size: f64, lock: bool) -> Result<()> {
        self.mutate(lock, |project| {
            let item = new_text_item(project, text, x, y, color, font_size)?;
            project.texts.push(item);
            Ok(())
        })
        .await?;
        info!(chars = text.trim().chars().count(), "Whiteboard: agent wrote text");
        Ok(())
    }

    pub async fn erase_last(&self, count: i64, target: EraseTarget, lock: bool) -> Result<Erased> {
        let count = count.clamp(1, MAX_ERASE_COUNT) as usize;
        let erased = self
            .mutate(lock, |project| Ok(erase_last(project, count, target)))
            .await?;
        info!(strokes = erased.strokes, texts = erased.texts, "Whiteboard: agent erased items");
        Ok(erased)
    }

    pub async fn clear(&self, lock: bool) -> Result<&'static str> {
        self.mutate(lock, |project| {
            *project = WhiteboardProject::default();
            Ok(())
        })
        .await?;
        info!("Whiteboard: agent cleared the board");
        Ok("Cleared the whiteboard.")
    }
}

pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// `make(ms)` for the current millisecond, advanced until it is not in `taken`.
fn unique_id(taken: &HashSet<String>, make: impl Fn(i64) -> String) -> String {
    let mut ms = now_ms();
    loop {
        let id = make(ms);
        if !taken.contains(&id) {
            return id;
        }
        ms += 1;
    }
}

fn new_stroke(project: &WhiteboardProject, points: Vec<Point>, color: u32, stroke_width: f64) -> Result<Stroke> {
    if !stroke_width.is_finite() || stroke_width <= 0.0 {
        return Err(SlateError::Validation(format!(
            "stroke width must be positive, got {stroke_width}"
        )));
    }
    let n = points.len();
    let id = unique_id(&project.item_ids(), |ms| format!("agent_{ms}_{n}"));
    Ok(Stroke::new(id, points, color, stroke_width))
}

fn new_text_item(
    project: &WhiteboardProject,
    text: &str,
    x: f64,
    y: f64,
    color: u32,
    font_size: f64,
) -> Result<TextItem> {
    let clean = text.trim();
    if clean.is_empty() {
        return Err(SlateError::Validation("text cannot be empty".into()));
    }
    let len = clean.chars().count();
    let truncated: String = clean.chars().take(MAX_TEXT_CHARS).collect();
    let font_size = if font_size.is_finite() {
        font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
    } else {
        MIN_FONT_SIZE
    };
    let id = unique_id(&project.item_ids(), |ms| format!("agent_text_{ms}_{len}"));
    Ok(TextItem::new(id, truncated, clamp01(x), clamp01(y), color, font_size))
}

/// Recency key for an item: the first run of nine or more digits in its id,
/// or its list index when there is none. Runs too long for `u128` saturate.
fn item_timestamp(id: Option<&str>, fallback: usize) -> u128 {
    match id.and_then(|id| TIMESTAMP_RE.find(id)) {
        Some(m) => m.as_str().parse::<u128>().unwrap_or(u128::MAX),
        None => fallback as u128,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    Stroke,
    Text,
}

fn erase_last(project: &mut WhiteboardProject, count: usize, target: EraseTarget) -> Erased {
    match target {
        EraseTarget::Strokes => {
            let n = count.min(project.strokes.len());
            project.strokes.truncate(project.strokes.len() - n);
            Erased { strokes: n, texts: 0 }
        }
        EraseTarget::Texts => {
            let n = count.min(project.texts.len());
            project.texts.truncate(project.texts.len() - n);
            Erased { strokes: 0, texts: n }
        }
        EraseTarget::Any => {
            let mut combined: Vec<(u128, ItemKind, usize)> = project
                .strokes
                .iter()
                .enumerate()
                .map(|(i, s)| (item_timestamp(s.id.as_deref(), i), ItemKind::Stroke, i))
                .chain(
                    project
                        .texts
                        .iter()
                        .enumerate()
                        .map(|(i, t)| (item_timestamp(t.id.as_deref(), i), ItemKind::Text, i)),
                )
                .collect();
            // Stable sort on reversed input: equal keys keep the later
            // combined entry first.
            combined.reverse();
            combined.sort_by(|a, b| (b.0, b.2).cmp(&(a.0, a.2)));

            let mut stroke_idx = HashSet::new();
            let mut text_idx = HashSet::new();
            for (_, kind, idx) in combined.into_iter().take(count) {
                match kind {
                    ItemKind::Stroke => stroke_idx.insert(idx),
                    ItemKind::Text => text_idx.insert(idx),
                };
            }

            let mut i = 0;
            project.strokes.retain(|_| {
                i += 1;
                !stroke_idx.contains(&(i - 1))
            });
            let mut i = 0;
            project.texts.retain(|_| {
                i += 1;
                !text_idx.contains(&(i - 1))
            });
            Erased {
                strokes: stroke_idx.len(),
                texts: text_idx.len(),
            }
        }
    }
}
