//! Line-level helpers for unified diff headers.

use crate::domain::HunkRange;

const DEV_NULL: &str = "/dev/null";

/// `(old_start, new_start)` of a `@@ -a,b +c,d @@` header.
///
/// Anything unreadable degrades to line 1 instead of failing.
pub fn parse_hunk_header(line: &str) -> (u32, u32) {
    let range = parse_hunk_range(line).unwrap_or(HunkRange {
        old_start: 1,
        old_lines: 1,
        new_start: 1,
        new_lines: 1,
    });
    (range.old_start, range.new_start)
}

/// Both ranges of a hunk header. A bare start (`-5`) has a span of 1.
/// Returns None only when `line` is not a hunk header at all.
pub fn parse_hunk_range(line: &str) -> Option<HunkRange> {
    let rest = line.strip_prefix("@@")?;
    let ranges = rest.split("@@").next().unwrap_or(rest);

    let mut old = None;
    let mut new = None;
    for token in ranges.split_whitespace() {
        if let Some(range) = token.strip_prefix('-') {
            old.get_or_insert_with(|| parse_span(range));
        } else if let Some(range) = token.strip_prefix('+') {
            new.get_or_insert_with(|| parse_span(range));
        }
    }

    let (old_start, old_lines) = old.unwrap_or((1, 1));
    let (new_start, new_lines) = new.unwrap_or((1, 1));
    Some(HunkRange {
        old_start,
        old_lines,
        new_start,
        new_lines,
    })
}

fn parse_span(range: &str) -> (u32, u32) {
    match range.split_once(',') {
        Some((start, count)) => (start.parse().unwrap_or(1), count.parse().unwrap_or(1)),
        None => (range.parse().unwrap_or(1), 1),
    }
}

/// Strip the `a/` or `b/` prefix git puts on diff paths, and any trailing
/// timestamp `diff -u` appends after a tab.
pub fn normalize_diff_path(path: &str) -> String {
    let path = path.split('\t').next().unwrap_or(path).trim();
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
        .to_string()
}

pub fn is_dev_null(path: &str) -> bool {
    path.split('\t').next().unwrap_or(path).trim() == DEV_NULL
}

/// New-side path from a `diff --git a/X b/Y` line.
pub fn path_from_diff_line(line: &str) -> Option<String> {
    let rest = line.strip_prefix("diff --git ")?;
    match rest.rsplit_once(" b/") {
        Some((_, new_path)) => Some(new_path.trim().to_string()),
        None => rest.split_whitespace().last().map(normalize_diff_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hunk_header_with_counts() {
        assert_eq!(parse_hunk_header("@@ -10,2 +10,3 @@ local M = {}"), (10, 10));
        let range = parse_hunk_range("@@ -10,2 +12,3 @@ fn main() {").unwrap();
        assert_eq!(range.old_lines, 2);
        assert_eq!(range.new_start, 12);
        assert_eq!(range.new_lines, 3);
    }

    #[test]
    fn test_parse_hunk_header_bare_start_defaults_span() {
        assert_eq!(parse_hunk_header("@@ -1 +1,5 @@"), (1, 1));
        let range = parse_hunk_range("@@ -1 +1,5 @@").unwrap();
        assert_eq!(range.old_lines, 1);
        assert_eq!(range.new_lines, 5);
    }

    #[test]
    fn test_parse_hunk_header_new_file() {
        let range = parse_hunk_range("@@ -0,0 +1,3 @@").unwrap();
        assert_eq!((range.old_start, range.old_lines), (0, 0));
        assert_eq!((range.new_start, range.new_lines), (1, 3));
    }

    #[test]
    fn test_parse_hunk_header_malformed_degrades() {
        assert_eq!(parse_hunk_header("@@ garbage @@"), (1, 1));
        assert_eq!(parse_hunk_header("@@ -x,y +7,z @@"), (1, 7));
        assert!(parse_hunk_range("not a header").is_none());
    }

    #[test]
    fn test_normalize_diff_path() {
        assert_eq!(normalize_diff_path("a/src/lib.rs"), "src/lib.rs");
        assert_eq!(
            normalize_diff_path("b/src/lib.rs\t2024-01-01 00:00:00"),
            "src/lib.rs"
        );
        assert_eq!(normalize_diff_path("plain.txt"), "plain.txt");
        assert!(is_dev_null("/dev/null\t1970-01-01"));
    }

    #[test]
    fn test_path_from_diff_line() {
        assert_eq!(
            path_from_diff_line("diff --git a/src/old name.rs b/src/new name.rs").as_deref(),
            Some("src/new name.rs")
        );
        assert_eq!(path_from_diff_line("--- a/x"), None);
    }
}
