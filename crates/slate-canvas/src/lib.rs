//! Whiteboard canvas: rasterization and textual summaries of a board.
//!
//! The agent reacts to board changes by handing the reply generator either a
//! rendered image of the board or, when no image can be produced, a short
//! textual summary.

pub mod draw;
pub mod font;
pub mod glyphs;
pub mod render;
pub mod summary;

pub use render::{RenderOptions, rasterize, render_png};
pub use summary::BoardSummary;
