//! TrueType font lookup for board text.
//!
//! Boards are drawn with DejaVu Sans when it can be found: an explicit path
//! from the render config, the working directory, the user font directory,
//! then the usual system locations. Without it, text falls back to the
//! built-in bitmap glyphs.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ab_glyph::FontArc;
use tracing::{debug, warn};

pub const DEFAULT_FONT_FILE: &str = "DejaVuSans.ttf";

const SYSTEM_FONT_DIRS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/dejavu",
    "/usr/share/fonts/TTF",
    "/usr/local/share/fonts",
    "/Library/Fonts",
    "C:\\Windows\\Fonts",
];

/// Load a font file. Unreadable or invalid files yield `None`.
pub fn load_font_file(path: &Path) -> Option<FontArc> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %path.display(), "Font not readable: {e}");
            return None;
        }
    };
    match FontArc::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!(path = %path.display(), "Whiteboard: invalid font file: {e}");
            None
        }
    }
}

fn candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(DEFAULT_FONT_FILE)];
    if let Some(dir) = dirs::font_dir() {
        paths.push(dir.join(DEFAULT_FONT_FILE));
    }
    paths.extend(SYSTEM_FONT_DIRS.iter().map(|d| Path::new(d).join(DEFAULT_FONT_FILE)));
    paths
}

/// The first DejaVu Sans found on this machine. Looked up once per process.
pub fn system_font() -> Option<FontArc> {
    static FONT: OnceLock<Option<FontArc>> = OnceLock::new();
    FONT.get_or_init(|| {
        let found = candidates().iter().find_map(|p| load_font_file(p));
        if found.is_none() {
            warn!("Whiteboard: {DEFAULT_FONT_FILE} not found, board text uses bitmap glyphs");
        }
        found
    })
    .clone()
}

/// The configured font, else the system font.
pub fn resolve_font(configured: Option<&str>) -> Option<FontArc> {
    if let Some(path) = configured {
        match load_font_file(Path::new(path)) {
            Some(font) => return Some(font),
            None => warn!(path, "Whiteboard: configured font unusable, searching system fonts"),
        }
    }
    system_font()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_and_invalid_files() {
        let dir = std::env::temp_dir();
        assert!(load_font_file(&dir.join("slate-no-such-font.ttf")).is_none());

        let bogus = dir.join(format!("slate-bogus-{}.ttf", std::process::id()));
        std::fs::write(&bogus, b"not a font").unwrap();
        assert!(load_font_file(&bogus).is_none());
        std::fs::remove_file(&bogus).unwrap();
    }

    #[test]
    fn test_candidates_end_with_font_file() {
        let paths = candidates();
        assert_eq!(paths[0], PathBuf::from(DEFAULT_FONT_FILE));
        assert!(paths.iter().all(|p| p.ends_with(DEFAULT_FONT_FILE)));
    }

    #[test]
    fn test_bad_configured_path_falls_back() {
        assert_eq!(
            resolve_font(Some("/nonexistent/font.ttf")).is_some(),
            system_font().is_some()
        );
    }
}
