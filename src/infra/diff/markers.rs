//! Single-pass marker collection over rendered unified diff lines.
//!
//! Displayed lines are 1-based: the line at index `i` is shown at
//! `offset + i + 1`. Markers and line-context keys all use that numbering,
//! so diff text rendered below other content only needs a different offset.

use super::parser::{is_dev_null, normalize_diff_path, parse_hunk_range, path_from_diff_line};
use crate::domain::{DiffFileMarker, DiffHunkMarker, DiffMarkers, FileStatus, LineContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    /// Before the first file header (commit message, stat block, ...).
    Preamble,
    /// Between a file header and its first hunk.
    FileHeader,
    /// Inside a hunk body with the header's remaining old/new line budget.
    Hunk { old_left: u32, new_left: u32 },
}

struct Collector {
    markers: DiffMarkers,
    section: Section,
    old_cursor: u32,
    new_cursor: u32,
}

/// Build file markers, hunk markers and the line-context map for `lines`.
pub fn collect_markers<S: AsRef<str>>(lines: &[S], offset: usize) -> DiffMarkers {
    let mut collector = Collector {
        markers: DiffMarkers::default(),
        section: Section::Preamble,
        old_cursor: 0,
        new_cursor: 0,
    };

    for (idx, line) in lines.iter().enumerate() {
        collector.feed(line.as_ref(), offset + idx + 1);
    }

    collector.markers
}

/// Convenience wrapper over [`collect_markers`] for raw diff text.
pub fn collect_markers_from_text(text: &str, offset: usize) -> DiffMarkers {
    let lines: Vec<&str> = text.lines().collect();
    collect_markers(&lines, offset)
}

impl Collector {
    fn feed(&mut self, line: &str, displayed: usize) {
        if line.starts_with("diff ") {
            let path = path_from_diff_line(line).unwrap_or_default();
            self.open_file(path, displayed);
            return;
        }

        if let Some(range) = parse_hunk_range(line) {
            self.markers.hunks.push(DiffHunkMarker {
                old_start: range.old_start,
                old_lines: range.old_lines,
                new_start: range.new_start,
                new_lines: range.new_lines,
                displayed_line: displayed,
            });
            self.old_cursor = range.old_start;
            self.new_cursor = range.new_start;
            self.section = Section::Hunk {
                old_left: range.old_lines,
                new_left: range.new_lines,
            };
            return;
        }

        if let Section::Hunk { old_left, new_left } = self.section {
            // Once the header's budget is spent, `---`/`+++` starts the next
            // file of a plain `diff -u`. Before that they are ordinary
            // deleted/added content.
            let exhausted = old_left == 0 && new_left == 0;
            let header_like = line.starts_with("---")
                || line.starts_with("+++")
                || !line.starts_with(['+', '-', ' ', '\\']);
            if !(exhausted && header_like) {
                self.content_line(line, displayed);
                return;
            }
        }

        self.header_line(line, displayed);
    }

    fn content_line(&mut self, line: &str, displayed: usize) {
        // "\ No newline at end of file" annotates the previous line.
        if line.starts_with('\\') {
            return;
        }

        let Section::Hunk {
            mut old_left,
            mut new_left,
        } = self.section
        else {
            return;
        };

        let context = match line.as_bytes().first() {
            Some(b'+') => {
                let ctx = LineContext {
                    old_line: None,
                    new_line: Some(self.new_cursor),
                };
                self.new_cursor = self.new_cursor.saturating_add(1);
                new_left = new_left.saturating_sub(1);
                if let Some(file) = self.markers.files.last_mut() {
                    file.additions += 1;
                }
                ctx
            }
            Some(b'-') => {
                let ctx = LineContext {
                    old_line: Some(self.old_cursor),
                    new_line: None,
                };
                self.old_cursor = self.old_cursor.saturating_add(1);
                old_left = old_left.saturating_sub(1);
                if let Some(file) = self.markers.files.last_mut() {
                    file.deletions += 1;
                }
                ctx
            }
            _ => {
                let ctx = LineContext {
                    old_line: Some(self.old_cursor),
                    new_line: Some(self.new_cursor),
                };
                self.old_cursor = self.old_cursor.saturating_add(1);
                self.new_cursor = self.new_cursor.saturating_add(1);
                old_left = old_left.saturating_sub(1);
                new_left = new_left.saturating_sub(1);
                ctx
            }
        };

        self.section = Section::Hunk { old_left, new_left };
        self.markers.line_context.insert(displayed, context);
    }

    fn header_line(&mut self, line: &str, displayed: usize) {
        if let Some(old) = line.strip_prefix("--- ") {
            // Plain `diff -u` output has no `diff --git` line; the old-path
            // line opens the section instead.
            if self.section != Section::FileHeader {
                self.open_file(normalize_diff_path(old), displayed);
            }
            if is_dev_null(old) {
                self.set_status(FileStatus::Added);
            }
            return;
        }

        if let Some(new) = line.strip_prefix("+++ ") {
            if is_dev_null(new) {
                self.set_status(FileStatus::Deleted);
            } else if let Some(file) = self.current_file() {
                file.path = normalize_diff_path(new);
            }
            return;
        }

        if line.starts_with("new file mode") {
            self.set_status(FileStatus::Added);
        } else if line.starts_with("deleted file mode") {
            self.set_status(FileStatus::Deleted);
        } else if let Some(from) = line.strip_prefix("rename from ") {
            if let Some(file) = self.current_file() {
                file.old_path = Some(from.trim().to_string());
                file.status = FileStatus::Renamed;
            }
        } else if let Some(to) = line.strip_prefix("rename to ") {
            if let Some(file) = self.current_file() {
                file.path = to.trim().to_string();
                file.status = FileStatus::Renamed;
            }
        }
    }

    fn open_file(&mut self, path: String, displayed: usize) {
        self.markers.files.push(DiffFileMarker {
            path,
            old_path: None,
            status: FileStatus::Modified,
            displayed_line: displayed,
            additions: 0,
            deletions: 0,
        });
        self.section = Section::FileHeader;
    }

    /// The file whose header is being read; None once its hunks started.
    fn current_file(&mut self) -> Option<&mut DiffFileMarker> {
        if self.section == Section::FileHeader {
            self.markers.files.last_mut()
        } else {
            None
        }
    }

    fn set_status(&mut self, status: FileStatus) {
        if let Some(file) = self.current_file()
            && file.status != FileStatus::Renamed
        {
            file.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILES: &str = "diff --git a/src/main.rs b/src/main.rs
index 0123456..789abcd 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,3 +1,4 @@
 fn main() {
-    println!(\"Hello\");
+    println!(\"Hello, World!\");
+    println!(\"Goodbye!\");
 }
diff --git a/docs/new.md b/docs/new.md
new file mode 100644
index 0000000..e69de29
--- /dev/null
+++ b/docs/new.md
@@ -0,0 +1,2 @@
+# Title
+body";

    #[test]
    fn test_collects_files_hunks_and_context() {
        let markers = collect_markers_from_text(TWO_FILES, 0);

        assert_eq!(markers.files.len(), 2);
        assert_eq!(markers.files[0].path, "src/main.rs");
        assert_eq!(markers.files[0].status, FileStatus::Modified);
        assert_eq!(markers.files[0].displayed_line, 1);
        assert_eq!(markers.files[0].additions, 2);
        assert_eq!(markers.files[0].deletions, 1);
        assert_eq!(markers.files[1].path, "docs/new.md");
        assert_eq!(markers.files[1].status, FileStatus::Added);
        assert_eq!(markers.files[1].displayed_line, 11);

        assert_eq!(markers.hunks.len(), 2);
        assert_eq!(markers.hunks[0].displayed_line, 5);
        assert_eq!((markers.hunks[0].old_start, markers.hunks[0].new_start), (1, 1));

        // " fn main() {" is context on both sides.
        assert_eq!(
            markers.context_at(6),
            Some(LineContext {
                old_line: Some(1),
                new_line: Some(1)
            })
        );
        // The deletion has no new line, the additions no old line.
        assert_eq!(
            markers.context_at(7),
            Some(LineContext {
                old_line: Some(2),
                new_line: None
            })
        );
        assert_eq!(
            markers.context_at(9),
            Some(LineContext {
                old_line: None,
                new_line: Some(3)
            })
        );
        assert_eq!(
            markers.context_at(10),
            Some(LineContext {
                old_line: Some(3),
                new_line: Some(4)
            })
        );
        assert_eq!(markers.context_at(1), None);
        assert_eq!(markers.context_at(5), None);
    }

    #[test]
    fn test_markers_precede_their_content() {
        let markers = collect_markers_from_text(TWO_FILES, 0);
        for hunk in &markers.hunks {
            let file = markers.file_at(hunk.displayed_line).unwrap();
            assert!(file.displayed_line < hunk.displayed_line);
        }
        let first_content = *markers.line_context.keys().next().unwrap();
        assert!(markers.hunks[0].displayed_line < first_content);
    }

    #[test]
    fn test_offset_shifts_every_key() {
        let base = collect_markers_from_text(TWO_FILES, 0);
        for offset in [1usize, 7, 250] {
            let shifted = collect_markers_from_text(TWO_FILES, offset);
            for (a, b) in base.files.iter().zip(&shifted.files) {
                assert_eq!(a.displayed_line + offset, b.displayed_line);
            }
            for (a, b) in base.hunks.iter().zip(&shifted.hunks) {
                assert_eq!(a.displayed_line + offset, b.displayed_line);
            }
            let expected: Vec<_> = base
                .line_context
                .iter()
                .map(|(line, ctx)| (line + offset, *ctx))
                .collect();
            let actual: Vec<_> = shifted
                .line_context
                .iter()
                .map(|(line, ctx)| (*line, *ctx))
                .collect();
            assert_eq!(expected, actual);
        }
    }

    #[test]
    fn test_dash_dash_dash_inside_hunk_is_a_deletion() {
        let diff = "diff --git a/notes.md b/notes.md
--- a/notes.md
+++ b/notes.md
@@ -1,3 +1,3 @@
 intro
--- removed content that looks like a header
+++ added content that looks like a header
 outro";
        let markers = collect_markers_from_text(diff, 0);

        assert_eq!(markers.files.len(), 1);
        assert_eq!(markers.files[0].path, "notes.md");
        assert_eq!(
            markers.context_at(6),
            Some(LineContext {
                old_line: Some(2),
                new_line: None
            })
        );
        assert_eq!(
            markers.context_at(7),
            Some(LineContext {
                old_line: None,
                new_line: Some(2)
            })
        );
        assert_eq!(markers.files[0].additions, 1);
        assert_eq!(markers.files[0].deletions, 1);
    }

    #[test]
    fn test_plain_unified_diff_without_git_header() {
        let diff = "--- a/one.txt\t2024-01-01
+++ b/one.txt\t2024-01-02
@@ -1 +1 @@
-old
+new
--- a/two.txt
+++ b/two.txt
@@ -4,2 +4,2 @@
 keep
-gone
+here";
        let markers = collect_markers_from_text(diff, 0);

        let paths: Vec<_> = markers.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["one.txt", "two.txt"]);
        assert_eq!(markers.files[1].displayed_line, 6);
        assert_eq!(markers.hunks.len(), 2);
        assert_eq!(
            markers.context_at(9),
            Some(LineContext {
                old_line: Some(4),
                new_line: Some(4)
            })
        );
    }

    #[test]
    fn test_deleted_and_renamed_status() {
        let diff = "diff --git a/gone.rs b/gone.rs
deleted file mode 100644
index e69de29..0000000
--- a/gone.rs
+++ /dev/null
@@ -1,1 +0,0 @@
-bye
diff --git a/old/name.rs b/new/name.rs
similarity index 90%
rename from old/name.rs
rename to new/name.rs
index 1111111..2222222 100644
--- a/old/name.rs
+++ b/new/name.rs
@@ -2,1 +2,1 @@
-a
+b";
        let markers = collect_markers_from_text(diff, 0);

        assert_eq!(markers.files[0].status, FileStatus::Deleted);
        assert_eq!(markers.files[0].path, "gone.rs");
        assert_eq!(markers.files[1].status, FileStatus::Renamed);
        assert_eq!(markers.files[1].path, "new/name.rs");
        assert_eq!(markers.files[1].old_path.as_deref(), Some("old/name.rs"));
    }

    #[test]
    fn test_no_newline_marker_consumes_no_line() {
        let diff = "diff --git a/a.txt b/a.txt
--- a/a.txt
+++ b/a.txt
@@ -1,1 +1,2 @@
-last
\\ No newline at end of file
+last
+extra";
        let markers = collect_markers_from_text(diff, 0);

        assert_eq!(markers.context_at(6), None);
        assert_eq!(
            markers.context_at(7),
            Some(LineContext {
                old_line: None,
                new_line: Some(1)
            })
        );
        assert_eq!(
            markers.context_at(8),
            Some(LineContext {
                old_line: None,
                new_line: Some(2)
            })
        );
    }

    #[test]
    fn test_preamble_lines_are_ignored() {
        let diff = "commit 0123456789abcdef0123456789abcdef01234567
Author: A <a@example.com>

    --- not a header in a commit message

diff --git a/x b/x
--- a/x
+++ b/x
@@ -1 +1 @@
-1
+2";
        let markers = collect_markers_from_text(diff, 0);
        // The indented message line is not a `--- ` header.
        assert_eq!(markers.files.len(), 1);
        assert_eq!(markers.files[0].displayed_line, 6);
        assert_eq!(markers.line_context.len(), 2);
    }

    #[test]
    fn test_hunk_spans_match_headers() {
        let diff = "diff --git a/lib.rs b/lib.rs
--- a/lib.rs
+++ b/lib.rs
@@ -10,4 +10,5 @@ impl Foo {
 a
-b
+c
+d
 e
 f
@@ -30,2 +31,1 @@
 g
-h
diff --git a/new.rs b/new.rs
new file mode 100644
--- /dev/null
+++ b/new.rs
@@ -0,0 +1,2 @@
+x
+y";
        let markers = collect_markers_from_text(diff, 3);
        let spans = markers.hunk_spans();
        assert_eq!(spans.len(), markers.hunks.len());
        for (span, hunk) in spans.iter().zip(&markers.hunks) {
            assert_eq!(
                (span.old_start, span.old_lines, span.new_start, span.new_lines),
                (hunk.old_start, hunk.old_lines, hunk.new_start, hunk.new_lines)
            );
        }
    }

    #[test]
    fn test_navigation_helpers() {
        let markers = collect_markers_from_text(TWO_FILES, 0);

        assert_eq!(markers.next_hunk(1).map(|h| h.displayed_line), Some(5));
        assert_eq!(markers.next_hunk(5).map(|h| h.displayed_line), Some(16));
        assert_eq!(markers.prev_hunk(16).map(|h| h.displayed_line), Some(5));
        assert!(markers.prev_hunk(5).is_none());
        // Line 12 is the second file's header, before its first hunk.
        assert!(markers.hunk_at(12).is_none());
        assert_eq!(markers.hunk_at(8).map(|h| h.displayed_line), Some(5));

        let anchor = markers.anchor_at(17).unwrap();
        assert_eq!(anchor.path, "docs/new.md");
        assert_eq!(anchor.context.new_line, Some(1));
        assert!(markers.anchor_at(11).is_none());
    }

    #[test]
    fn test_line_numbers_near_u32_max_saturate() {
        let diff = "diff --git a/big.txt b/big.txt\n--- a/big.txt\n+++ b/big.txt\n@@ -1 +4294967295,2 @@\n+a\n+b\n";
        let markers = collect_markers_from_text(diff, 0);

        assert_eq!(markers.hunks.len(), 1);
        assert_eq!(markers.files[0].additions, 2);
        assert_eq!(markers.line_context[&5].new_line, Some(u32::MAX));
        assert_eq!(markers.line_context[&6].new_line, Some(u32::MAX));
    }

    #[test]
    fn test_empty_input() {
        let markers = collect_markers::<&str>(&[], 5);
        assert!(markers.is_empty());
        assert!(markers.line_context.is_empty());
    }
}
