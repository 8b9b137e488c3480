//! Markdown segmentation: cut oversized page text into line-bounded chunks.
//!
//! The formatting collaborator works on bounded inputs, so long pages are
//! split before they are handed over. Cuts prefer structural boundaries
//! (before a heading, after a blank line) and never fall inside an open
//! fenced code block; when neither is possible the chunk is hard-cut.
//!
//! Segments come back in **reverse** document order (last chunk first), the
//! order in which bottom-up insertion consumes them. Concatenating the
//! reversed result reproduces the input byte for byte.

use crate::config::DEFAULT_MAX_SEGMENT_LINES;
use tracing::debug;

/// Splits Markdown lines into chunks of at most `max_lines` lines.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownSegmentor {
    max_lines: usize,
}

impl Default for MarkdownSegmentor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SEGMENT_LINES)
    }
}

/// Fence and boundary state for the chunk currently being built.
#[derive(Debug, Default)]
struct ScanState {
    /// Marker of the open fence, if any.
    fence: Option<&'static str>,
    /// Line index before which the chunk may be cut.
    last_safe: Option<usize>,
}

impl ScanState {
    /// Rebuild the state for a chunk starting at `start` that already holds
    /// `lines[start..end]`.
    fn rescan<S: AsRef<str>>(lines: &[S], start: usize, end: usize) -> Self {
        let mut state = Self::default();
        for (idx, line) in lines.iter().enumerate().take(end).skip(start) {
            state.observe(line.as_ref(), idx, start);
        }
        state
    }

    fn observe(&mut self, line: &str, idx: usize, start: usize) {
        let trimmed = line.trim_start();
        if let Some(marker) = fence_marker(trimmed) {
            match self.fence {
                None => self.fence = Some(marker),
                Some(open) if open == marker => self.fence = None,
                // A `~~~` line inside a ``` block is content.
                Some(_) => {}
            }
            return;
        }
        if self.fence.is_some() {
            return;
        }
        if trimmed.starts_with('#') {
            if idx > start {
                self.last_safe = Some(idx);
            }
        } else if trimmed.trim_end().is_empty() {
            self.last_safe = Some(idx + 1);
        }
    }
}

fn fence_marker(trimmed: &str) -> Option<&'static str> {
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

impl MarkdownSegmentor {
    /// `max_lines` is clamped to at least 1.
    pub fn new(max_lines: usize) -> Self {
        Self {
            max_lines: max_lines.max(1),
        }
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Split `text` at its line terminators, then [`split`](Self::split).
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        self.split(&lines)
    }

    /// Split lines (each carrying its own terminator) into chunks.
    ///
    /// Returns the chunks last-first.
    pub fn split<S: AsRef<str>>(&self, lines: &[S]) -> Vec<String> {
        let mut segments = Vec::new();
        let mut start = 0;
        let mut state = ScanState::default();

        for (i, line) in lines.iter().enumerate() {
            if i - start >= self.max_lines {
                let cut = match state.last_safe {
                    Some(b) if b > start => Some(b),
                    _ if state.fence.is_some() => None,
                    _ => Some(i),
                };
                match cut {
                    Some(cut) => {
                        segments.push(concat(&lines[start..cut]));
                        start = cut;
                        state = ScanState::rescan(lines, start, i);
                    }
                    None => debug!(
                        "Segment starting at line {} overflows {} lines inside a code fence",
                        start + 1,
                        self.max_lines
                    ),
                }
            }
            state.observe(line.as_ref(), i, start);
        }

        if start < lines.len() {
            segments.push(concat(&lines[start..]));
        }

        debug!(
            "Split {} lines into {} segment(s) of ≤{} lines",
            lines.len(),
            segments.len(),
            self.max_lines
        );

        segments.reverse();
        segments
    }
}

fn concat<S: AsRef<str>>(lines: &[S]) -> String {
    lines.iter().map(AsRef::as_ref).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward(mut segments: Vec<String>) -> Vec<String> {
        segments.reverse();
        segments
    }

    fn fence_lines(segment: &str) -> usize {
        segment
            .lines()
            .filter(|l| l.trim_start().starts_with("```"))
            .count()
    }

    #[test]
    fn short_text_is_one_segment() {
        let segs = MarkdownSegmentor::new(10).split_text("# Title\nbody\n");
        assert_eq!(segs, vec!["# Title\nbody\n".to_string()]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(MarkdownSegmentor::new(3).split_text("").is_empty());
    }

    #[test]
    fn splits_before_heading() {
        let text = "intro 1\nintro 2\n# Part two\nbody a\nbody b\n";
        let segs = forward(MarkdownSegmentor::new(4).split_text(text));
        assert_eq!(segs, vec!["intro 1\nintro 2\n", "# Part two\nbody a\nbody b\n"]);
    }

    #[test]
    fn splits_after_blank_line() {
        let text = "p1 a\np1 b\n\np2 a\np2 b\np2 c\n";
        let segs = forward(MarkdownSegmentor::new(4).split_text(text));
        assert_eq!(segs[0], "p1 a\np1 b\n\n");
        assert_eq!(segs[1], "p2 a\np2 b\np2 c\n");
    }

    #[test]
    fn hard_cut_without_boundaries() {
        let text: String = (0..7).map(|i| format!("line {i}\n")).collect();
        let segs = forward(MarkdownSegmentor::new(3).split_text(&text));
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0].lines().count(), 3);
        assert_eq!(segs[1].lines().count(), 3);
        assert_eq!(segs[2], "line 6\n");
    }

    #[test]
    fn segments_come_back_last_first() {
        let segs = MarkdownSegmentor::new(1).split_text("a\nb\nc\n");
        assert_eq!(segs, vec!["c\n", "b\n", "a\n"]);
    }

    #[test]
    fn fence_overflows_instead_of_splitting() {
        let mut text = String::from("x\ny\nz\n```rust\n");
        for i in 0..5 {
            text.push_str(&format!("let v{i} = {i};\n"));
        }
        text.push_str("```\nafter\n");

        let segs = forward(MarkdownSegmentor::new(4).split_text(&text));
        assert_eq!(segs.len(), 2);
        assert!(segs[0].ends_with("```\n"));
        assert_eq!(segs[1], "after\n");
        for s in &segs {
            assert_eq!(fence_lines(s) % 2, 0, "segment splits a fence: {s:?}");
        }
    }

    #[test]
    fn tilde_inside_backtick_fence_is_content() {
        let text = "```\n~~~\n\nstill code\n```\n\nafter\n";
        let segs = forward(MarkdownSegmentor::new(2).split_text(text));
        // The blank line inside the fence is not a boundary; the chunk
        // overflows until the fence closes and is cut right after it.
        assert_eq!(segs[0], "```\n~~~\n\nstill code\n```\n");
        assert_eq!(segs[1], "\nafter\n");
    }

    #[test]
    fn round_trip_reconstructs_input() {
        let text = "# A\n\npara one\npara two\n\n```\ncode\n\nmore code\n```\n## B\n\
                    text\n~~~\nx\n~~~\n\nend without newline";
        for max in 1..=8 {
            let segs = MarkdownSegmentor::new(max).split_text(text);
            let rebuilt: String = segs.iter().rev().map(String::as_str).collect();
            assert_eq!(rebuilt, text, "max_lines = {max}");
        }
    }

    #[test]
    fn zero_max_lines_is_clamped() {
        assert_eq!(MarkdownSegmentor::new(0).max_lines(), 1);
    }

    #[test]
    fn accepts_owned_lines() {
        let lines = vec!["a\n".to_string(), "b\n".to_string()];
        let segs = MarkdownSegmentor::new(1).split(&lines);
        assert_eq!(segs, vec!["b\n", "a\n"]);
    }
}
