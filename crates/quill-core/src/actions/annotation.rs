//! Annotated change regions
//!
//! Inserted content is wrapped in a highlighted `<div>` whose opening and closing lines
//! both carry the change id, so a region can be found again after the user has edited
//! the rest of the document. All edits here are line based: inserting a region and then
//! removing it gives back the original text byte for byte.

use once_cell::sync::Lazy;
use regex::Regex;

pub const ANNOTATION_CLASS: &str = "quill-change";

const ANNOTATION_STYLE: &str = "background-color: rgba(144, 238, 144, 0.2); padding: 10px; border-left: 3px solid #4caf50; margin: 10px 0;";

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#+\s+.+$").expect("heading regex"));

pub fn open_tag(id: &str) -> String {
    format!(
        "<div class=\"{}\" data-change-id=\"{}\" style=\"{}\">",
        ANNOTATION_CLASS, id, ANNOTATION_STYLE
    )
}

pub fn close_tag(id: &str) -> String {
    format!("</div><!-- {}:{} -->", ANNOTATION_CLASS, id)
}

/// Opening line, blank padding, content lines, blank padding, closing line.
pub fn region_lines(id: &str, content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(open_tag(id));
    lines.push(String::new());
    lines.extend(content.split('\n').map(str::to_string));
    lines.push(String::new());
    lines.push(close_tag(id));
    lines
}

/// Line indices of the opening and closing delimiters for `id`.
pub fn find_region<S: AsRef<str>>(lines: &[S], id: &str) -> Option<(usize, usize)> {
    let open_prefix = format!(
        "<div class=\"{}\" data-change-id=\"{}\"",
        ANNOTATION_CLASS, id
    );
    let close = close_tag(id);
    let open = lines
        .iter()
        .position(|line| line.as_ref().trim_start().starts_with(&open_prefix))?;
    let close = lines[open + 1..]
        .iter()
        .position(|line| line.as_ref().trim() == close)?;
    Some((open, open + 1 + close))
}

fn is_heading(line: &str) -> bool {
    HEADING.is_match(line)
}

/// Line index just past the section that starts at `heading`.
fn section_end(lines: &[&str], heading: usize) -> usize {
    lines[heading + 1..]
        .iter()
        .position(|line| is_heading(line))
        .map(|offset| heading + 1 + offset)
        .unwrap_or(lines.len())
}

/// Where new content goes: the end of the last heading's section, or the end of the
/// document when there are no headings. A trailing newline stays at the very end.
pub fn insertion_line(lines: &[&str]) -> usize {
    let end = match lines.iter().rposition(|line| is_heading(line)) {
        Some(heading) => section_end(lines, heading),
        None => lines.len(),
    };
    if end == lines.len() && lines.len() > 1 && lines.last() == Some(&"") {
        end - 1
    } else {
        end
    }
}

pub fn insert_region(document: &str, id: &str, content: &str) -> String {
    let region = region_lines(id, content);
    if document.is_empty() {
        return region.join("\n");
    }
    let mut lines: Vec<&str> = document.split('\n').collect();
    let at = insertion_line(&lines);
    lines.splice(at..at, region.iter().map(String::as_str));
    lines.join("\n")
}

/// Replaces the region with its inner content. `None` when the region is gone.
pub fn accept_region(document: &str, id: &str) -> Option<String> {
    let mut lines: Vec<&str> = document.split('\n').collect();
    let (open, close) = find_region(&lines, id)?;

    let mut inner: Vec<&str> = lines[open + 1..close].to_vec();
    if inner.first() == Some(&"") {
        inner.remove(0);
    }
    if inner.last() == Some(&"") {
        inner.pop();
    }
    lines.splice(open..=close, inner);
    Some(lines.join("\n"))
}

/// Removes the region together with its delimiters. `None` when the region is gone.
pub fn reject_region(document: &str, id: &str) -> Option<String> {
    let mut lines: Vec<&str> = document.split('\n').collect();
    let (open, close) = find_region(&lines, id)?;
    lines.drain(open..=close);
    Some(lines.join("\n"))
}

pub fn line_count(document: &str) -> usize {
    document.split('\n').count()
}

/// Removes lines `start..=end` (0-indexed). `None` unless `start <= end < line_count`.
pub fn remove_lines(document: &str, start: usize, end: usize) -> Option<String> {
    let mut lines: Vec<&str> = document.split('\n').collect();
    if start > end || end >= lines.len() {
        return None;
    }
    lines.drain(start..=end);
    Some(lines.join("\n"))
}
