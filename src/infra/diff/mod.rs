//! Unified diff parsing.
//!
//! Pure functions from diff text to [`DiffMarkers`](crate::domain::DiffMarkers);
//! nothing here touches a process or the filesystem.

pub mod markers;
pub mod parser;

pub use markers::{collect_markers, collect_markers_from_text};
pub use parser::{parse_hunk_header, parse_hunk_range};
