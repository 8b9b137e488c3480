//! Anchor matching: locate an instruction's anchor text in the page Markdown.
//!
//! ## Tiers
//!
//! Three strategies are tried in order and the first hit wins:
//!
//! 1. **Exact**: literal substring search.
//! 2. **Normalized**: runs of ASCII whitespace collapse to one space in both
//!    the text and the anchor; hits are mapped back to original offsets.
//! 3. **Regex**: the anchor's tokens joined by `\s+`, which also bridges
//!    Unicode spaces (NBSP, ideographic space) the normalized tier keeps.
//!
//! When a tier finds several occurrences and the caller supplied a bounding
//! box and page height, the occurrence whose linearly estimated vertical
//! position (`offset / len · page_height`) is closest to the box centre wins.
//!
//! All offsets are byte offsets into the UTF-8 text, always on char
//! boundaries.

use crate::instruction::BoundingBox;
use crate::report::MatchStrategy;
use regex::Regex;
use tracing::debug;

/// A located anchor span.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorMatch {
    pub start: usize,
    pub end: usize,
    /// Tier that produced the match.
    pub strategy: MatchStrategy,
    /// Distance used by the spatial tie-break, when it ran.
    pub spatial_distance: Option<f64>,
    /// Start offsets of the other occurrences the tier found.
    pub alternatives: Vec<usize>,
    /// The matched bytes of the text.
    pub matched: String,
}

/// Spatial hint for choosing between several occurrences.
#[derive(Debug, Clone, Copy)]
struct Hint {
    center_y: f64,
    page_height: f64,
}

impl Hint {
    fn from_parts(bbox: Option<&BoundingBox>, page_height: Option<f64>) -> Option<Self> {
        match (bbox, page_height) {
            (Some(b), Some(h)) if h > 0.0 => Some(Self {
                center_y: b.center_y(),
                page_height: h,
            }),
            _ => None,
        }
    }
}

/// Occurrences found by one tier, in the tier's own coordinate space.
struct Picked {
    span: (usize, usize),
    distance: Option<f64>,
    alternatives: Vec<(usize, usize)>,
}

/// Choose among `spans` (sorted by start) within a text of `len` bytes.
fn pick(spans: Vec<(usize, usize)>, len: usize, hint: Option<Hint>) -> Option<Picked> {
    let first = *spans.first()?;
    let (chosen, distance) = match hint {
        Some(h) if spans.len() > 1 && len > 0 => {
            let mut best = first;
            let mut best_d = f64::INFINITY;
            for &span in &spans {
                let estimated = span.0 as f64 / len as f64 * h.page_height;
                let d = (h.center_y - estimated).abs();
                if d < best_d {
                    best = span;
                    best_d = d;
                }
            }
            (best, Some(best_d))
        }
        _ => (first, None),
    };
    Some(Picked {
        span: chosen,
        distance,
        alternatives: spans.into_iter().filter(|s| *s != chosen).collect(),
    })
}

/// Three-tier anchor search. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnchorMatcher;

impl AnchorMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Locate `anchor` in `text`.
    ///
    /// Empty or whitespace-only anchors never match.
    pub fn find(
        &self,
        text: &str,
        anchor: &str,
        bbox: Option<&BoundingBox>,
        page_height: Option<f64>,
    ) -> Option<AnchorMatch> {
        if anchor.trim().is_empty() {
            return None;
        }
        let hint = Hint::from_parts(bbox, page_height);

        // ── Tier 1: exact ─────────────────────────────────────────────────
        let exact: Vec<(usize, usize)> = text
            .match_indices(anchor)
            .map(|(s, m)| (s, s + m.len()))
            .collect();
        if let Some(p) = pick(exact, text.len(), hint) {
            return Some(self.build(text, p, MatchStrategy::Exact, |o| o));
        }

        // ── Tier 2: whitespace-normalized ─────────────────────────────────
        let norm_text = Normalized::new(text);
        let norm_anchor = Normalized::new(anchor);
        let needle = norm_anchor.text.trim();
        if !needle.is_empty() {
            let spans: Vec<(usize, usize)> = norm_text
                .text
                .match_indices(needle)
                .map(|(s, m)| (s, s + m.len()))
                .collect();
            if let Some(p) = pick(spans, norm_text.text.len(), hint) {
                return Some(self.build(text, p, MatchStrategy::Normalized, |o| {
                    norm_text.origin(o)
                }));
            }
        }

        // ── Tier 3: regex-fuzzy ───────────────────────────────────────────
        let pattern = anchor
            .split_whitespace()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(r"\s+");
        match Regex::new(&pattern) {
            Ok(re) => {
                let spans: Vec<(usize, usize)> =
                    re.find_iter(text).map(|m| (m.start(), m.end())).collect();
                if let Some(p) = pick(spans, text.len(), hint) {
                    return Some(self.build(text, p, MatchStrategy::Regex, |o| o));
                }
            }
            Err(e) => debug!("Anchor pattern rejected by regex engine: {}", e),
        }

        debug!("Anchor not found by any tier: {:?}", truncate(anchor));
        None
    }

    /// [`find`](Self::find) reduced to a start offset, `-1` when not found.
    pub fn find_position(
        &self,
        text: &str,
        anchor: &str,
        bbox: Option<&BoundingBox>,
        page_height: Option<f64>,
    ) -> i64 {
        self.find(text, anchor, bbox, page_height)
            .map_or(-1, |m| m.start as i64)
    }

    /// Re-locate a previously matched anchor after `text` was edited.
    ///
    /// The earlier span is kept if the same bytes are still at its offset;
    /// otherwise the full search runs again.
    pub fn relocate(
        &self,
        text: &str,
        previous: &AnchorMatch,
        anchor: &str,
        bbox: Option<&BoundingBox>,
        page_height: Option<f64>,
    ) -> Option<AnchorMatch> {
        if text.get(previous.start..previous.end) == Some(previous.matched.as_str()) {
            return Some(previous.clone());
        }
        debug!(
            "Anchor moved from offset {}; searching again",
            previous.start
        );
        self.find(text, anchor, bbox, page_height)
    }

    fn build(
        &self,
        text: &str,
        picked: Picked,
        strategy: MatchStrategy,
        to_original: impl Fn(usize) -> usize,
    ) -> AnchorMatch {
        let start = to_original(picked.span.0);
        let end = to_original(picked.span.1);
        AnchorMatch {
            start,
            end,
            strategy,
            spatial_distance: picked.distance,
            alternatives: picked
                .alternatives
                .iter()
                .map(|&(s, _)| to_original(s))
                .collect(),
            matched: text[start..end].to_string(),
        }
    }
}

// ── Whitespace normalization ─────────────────────────────────────────────────

/// Text with ASCII whitespace runs collapsed, plus an offset table back into
/// the source.
struct Normalized {
    text: String,
    /// `origin[k]` is the source offset of normalized byte `k`; one extra
    /// entry maps the end of the normalized text to the end of the source.
    origin: Vec<usize>,
}

impl Normalized {
    fn new(source: &str) -> Self {
        let mut text = String::with_capacity(source.len());
        let mut origin = Vec::with_capacity(source.len() + 1);
        let mut in_run = false;
        for (i, c) in source.char_indices() {
            if matches!(c, ' ' | '\t' | '\r' | '\n') {
                if !in_run {
                    text.push(' ');
                    origin.push(i);
                }
                in_run = true;
            } else {
                text.push(c);
                origin.extend(i..i + c.len_utf8());
                in_run = false;
            }
        }
        origin.push(source.len());
        Self { text, origin }
    }

    fn origin(&self, offset: usize) -> usize {
        self.origin[offset]
    }
}

fn truncate(s: &str) -> String {
    s.chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(text: &str, anchor: &str) -> Option<AnchorMatch> {
        AnchorMatcher::new().find(text, anchor, None, None)
    }

    #[test]
    fn exact_match_takes_precedence() {
        let text = "Intro\nFigure 1 shows results.\n";
        let m = find(text, "Figure 1 shows results.").unwrap();
        assert_eq!(m.strategy, MatchStrategy::Exact);
        assert_eq!(m.start, 6);
        assert_eq!(&text[m.start..m.end], "Figure 1 shows results.");
    }

    #[test]
    fn newline_in_anchor_matches_spaces_in_text() {
        let text = "xx a   b yy";
        let m = find(text, "a\nb").unwrap();
        assert_eq!(m.strategy, MatchStrategy::Normalized);
        assert_eq!(m.start, 3);
        assert_eq!(&text[m.start..m.end], "a   b");
    }

    #[test]
    fn normalized_offsets_map_back_through_multibyte_text() {
        let text = "前言\n\n图片  说明\t如下";
        let m = find(text, "图片 说明 如下").unwrap();
        assert_eq!(m.strategy, MatchStrategy::Normalized);
        assert_eq!(&text[m.start..m.end], "图片  说明\t如下");
    }

    #[test]
    fn regex_tier_bridges_unicode_spaces() {
        let text = "see Figure\u{00A0}2 below";
        let m = find(text, "Figure 2").unwrap();
        assert_eq!(m.strategy, MatchStrategy::Regex);
        assert_eq!(&text[m.start..m.end], "Figure\u{00A0}2");
    }

    #[test]
    fn regex_tier_escapes_metacharacters() {
        let text = "cost (in $)\u{3000}[approx.]";
        let m = find(text, "(in $) [approx.]").unwrap();
        assert_eq!(m.strategy, MatchStrategy::Regex);
        assert_eq!(m.start, 5);
    }

    #[test]
    fn missing_anchor_is_none() {
        assert!(find("nothing to see", "Figure 9").is_none());
        assert_eq!(
            AnchorMatcher::new().find_position("nothing", "Figure 9", None, None),
            -1
        );
    }

    #[test]
    fn blank_anchor_never_matches() {
        assert!(find("a b c", "").is_none());
        assert!(find("a b c", "  \n").is_none());
    }

    #[test]
    fn spatial_hint_picks_nearest_occurrence() {
        // Two occurrences: one near the top, one near the bottom.
        let text = format!("Result A\n{}Result A\n", "filler line\n".repeat(20));
        let bottom = BoundingBox::new(0.0, 900.0, 100.0, 980.0);
        let m = AnchorMatcher::new()
            .find(&text, "Result A", Some(&bottom), Some(1000.0))
            .unwrap();
        assert_eq!(m.start, text.rfind("Result A").unwrap());
        assert_eq!(m.alternatives, vec![0]);
        assert!(m.spatial_distance.is_some());

        let top = BoundingBox::new(0.0, 0.0, 100.0, 40.0);
        let m = AnchorMatcher::new()
            .find(&text, "Result A", Some(&top), Some(1000.0))
            .unwrap();
        assert_eq!(m.start, 0);
    }

    #[test]
    fn spatial_hint_applies_to_normalized_matches() {
        // Neither occurrence matches verbatim: the anchor has a single space.
        let text = format!("Total  cost\n{}Total\tcost\n", "filler line\n".repeat(20));
        let bottom = BoundingBox::new(0.0, 900.0, 100.0, 980.0);
        let m = AnchorMatcher::new()
            .find(&text, "Total cost", Some(&bottom), Some(1000.0))
            .unwrap();
        assert_eq!(m.strategy, MatchStrategy::Normalized);
        assert_eq!(m.start, text.rfind("Total\tcost").unwrap());
        assert_eq!(m.matched, "Total\tcost");
        assert_eq!(m.alternatives, vec![0]);
        assert!(m.spatial_distance.is_some());

        let top = BoundingBox::new(0.0, 0.0, 100.0, 40.0);
        let m = AnchorMatcher::new()
            .find(&text, "Total cost", Some(&top), Some(1000.0))
            .unwrap();
        assert_eq!(m.start, 0);
        assert_eq!(m.matched, "Total  cost");
        assert_eq!(m.alternatives, vec![text.rfind("Total\tcost").unwrap()]);
    }

    #[test]
    fn without_hint_first_occurrence_wins() {
        let m = find("x y x", "x").unwrap();
        assert_eq!(m.start, 0);
        assert_eq!(m.spatial_distance, None);
        assert_eq!(m.alternatives, vec![4]);
    }

    #[test]
    fn zero_page_height_disables_tie_break() {
        let bbox = BoundingBox::new(0.0, 90.0, 10.0, 100.0);
        let m = AnchorMatcher::new()
            .find("x y x", "x", Some(&bbox), Some(0.0))
            .unwrap();
        assert_eq!(m.start, 0);
        assert_eq!(m.spatial_distance, None);
    }

    #[test]
    fn relocate_keeps_unmoved_span() {
        let text = "alpha beta gamma";
        let m = find(text, "gamma").unwrap();
        let edited = "alpha beta gamma\n\n![x](y)\n";
        let again = AnchorMatcher::new()
            .relocate(edited, &m, "gamma", None, None)
            .unwrap();
        assert_eq!(again, m);
    }

    #[test]
    fn relocate_searches_when_span_moved() {
        let text = "alpha beta";
        let m = find(text, "beta").unwrap();
        let edited = "\n![x](y)\n\nalpha beta";
        let again = AnchorMatcher::new()
            .relocate(edited, &m, "beta", None, None)
            .unwrap();
        assert_eq!(&edited[again.start..again.end], "beta");
        assert!(again.start > m.start);
    }
}
