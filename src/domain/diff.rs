use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a file changed within a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    #[default]
    Modified,
    Deleted,
    Renamed,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "A"),
            Self::Modified => write!(f, "M"),
            Self::Deleted => write!(f, "D"),
            Self::Renamed => write!(f, "R"),
        }
    }
}

/// Start of one file section in the rendered diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffFileMarker {
    /// New-side path, or the old-side path for deletions.
    pub path: String,
    /// Old-side path when the file was renamed.
    #[serde(default)]
    pub old_path: Option<String>,
    pub status: FileStatus,
    pub displayed_line: usize,
    pub additions: usize,
    pub deletions: usize,
}

/// Start of one `@@` hunk in the rendered diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunkMarker {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub displayed_line: usize,
}

/// Old/new file line numbers behind a displayed diff line.
///
/// `old_line` is absent for additions, `new_line` for deletions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LineContext {
    pub old_line: Option<u32>,
    pub new_line: Option<u32>,
}

impl LineContext {
    pub fn is_addition(&self) -> bool {
        self.old_line.is_none() && self.new_line.is_some()
    }

    pub fn is_deletion(&self) -> bool {
        self.old_line.is_some() && self.new_line.is_none()
    }
}

/// Old and new line ranges of a hunk, as `(start, count)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HunkRange {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
}

/// Where a displayed line sits in terms of the file it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineAnchor {
    pub path: String,
    pub context: LineContext,
}

/// Everything the diff parser produces for one rendering of a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct DiffMarkers {
    pub files: Vec<DiffFileMarker>,
    pub hunks: Vec<DiffHunkMarker>,
    pub line_context: BTreeMap<usize, LineContext>,
}

impl DiffMarkers {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.hunks.is_empty()
    }

    /// File whose section contains `line`.
    pub fn file_at(&self, line: usize) -> Option<&DiffFileMarker> {
        self.files.iter().rev().find(|f| f.displayed_line <= line)
    }

    /// Hunk whose section contains `line`, if that hunk belongs to the same
    /// file as `line`.
    pub fn hunk_at(&self, line: usize) -> Option<&DiffHunkMarker> {
        let hunk = self.hunks.iter().rev().find(|h| h.displayed_line <= line)?;
        match self.file_at(line) {
            Some(file) if file.displayed_line > hunk.displayed_line => None,
            _ => Some(hunk),
        }
    }

    /// First hunk strictly below `line`.
    pub fn next_hunk(&self, line: usize) -> Option<&DiffHunkMarker> {
        self.hunks.iter().find(|h| h.displayed_line > line)
    }

    /// Last hunk strictly above `line`.
    pub fn prev_hunk(&self, line: usize) -> Option<&DiffHunkMarker> {
        self.hunks.iter().rev().find(|h| h.displayed_line < line)
    }

    pub fn context_at(&self, line: usize) -> Option<LineContext> {
        self.line_context.get(&line).copied()
    }

    /// Path and line numbers for a content line, used to anchor a comment at
    /// the cursor. Headers and metadata lines have no anchor.
    pub fn anchor_at(&self, line: usize) -> Option<LineAnchor> {
        let context = self.context_at(line)?;
        let file = self.file_at(line)?;
        Some(LineAnchor {
            path: file.path.clone(),
            context,
        })
    }

    /// Re-derive each hunk's ranges from the line-context map.
    ///
    /// For well-formed diffs this matches the ranges in the hunk headers. A
    /// side with no lines keeps the header's start, as git encodes it.
    pub fn hunk_spans(&self) -> Vec<HunkRange> {
        self.hunks
            .iter()
            .enumerate()
            .map(|(idx, hunk)| {
                let end = self.section_end(idx);
                let mut range = HunkRange {
                    old_start: hunk.old_start,
                    old_lines: 0,
                    new_start: hunk.new_start,
                    new_lines: 0,
                };
                let mut first_old = None;
                let mut first_new = None;
                for ctx in self
                    .line_context
                    .range(hunk.displayed_line + 1..end)
                    .map(|(_, ctx)| ctx)
                {
                    if let Some(old) = ctx.old_line {
                        first_old.get_or_insert(old);
                        range.old_lines += 1;
                    }
                    if let Some(new) = ctx.new_line {
                        first_new.get_or_insert(new);
                        range.new_lines += 1;
                    }
                }
                if let Some(old) = first_old {
                    range.old_start = old;
                }
                if let Some(new) = first_new {
                    range.new_start = new;
                }
                range
            })
            .collect()
    }

    fn section_end(&self, hunk_idx: usize) -> usize {
        let start = self.hunks[hunk_idx].displayed_line;
        let next_hunk = self.hunks.get(hunk_idx + 1).map(|h| h.displayed_line);
        let next_file = self
            .files
            .iter()
            .map(|f| f.displayed_line)
            .find(|&line| line > start);
        match (next_hunk, next_file) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => usize::MAX,
        }
    }
}
