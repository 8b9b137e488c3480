//! Page analysis: gather the structural metrics of one PDF page.
//!
//! PDF parsing itself is a collaborator behind [`PageSource`]. The analyzer
//! only aggregates what the source reports into a [`PageMetrics`] snapshot.
//!
//! ## Primary vs. secondary metrics
//!
//! Text, images and drawings drive the strategy decision, so a failure to
//! read them fails the page. Tables, line/rect/curve breakdowns, text blocks
//! and links come from secondary extractors that are often unavailable
//! (no table detector, partially broken content streams); those degrade to
//! zero with a warning.

use crate::error::FusionError;
use crate::metrics::PageMetrics;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Metrics every page source must be able to provide.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimaryMetrics {
    pub width: f64,
    pub height: f64,
    pub raw_text: String,
    pub image_count: usize,
    pub drawing_count: usize,
    /// Source-level knowledge of CID-keyed fonts, if the backend has it.
    pub has_cid_fonts: bool,
}

/// Metrics from optional extractors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecondaryMetrics {
    pub table_count: usize,
    pub line_count: usize,
    pub rect_count: usize,
    pub curve_count: usize,
    pub text_blocks_count: usize,
    pub link_count: usize,
}

/// A parsed PDF document the analyzer can query page by page.
///
/// Page indices are 0-based.
pub trait PageSource {
    fn page_count(&self) -> usize;

    fn read_primary(&self, index: usize) -> Result<PrimaryMetrics, FusionError>;

    /// Secondary metrics; sources without such extractors keep the default.
    fn read_secondary(&self, index: usize) -> Result<SecondaryMetrics, FusionError> {
        Err(FusionError::Collaborator(format!(
            "no secondary metric extractor for page {}",
            index + 1
        )))
    }
}

/// Builds [`PageMetrics`] from a [`PageSource`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PageAnalyzer;

impl PageAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyse the page at 0-based `index`.
    ///
    /// # Errors
    /// * [`FusionError::PageOutOfRange`] when `index` is past the last page.
    /// * Whatever the source returns for the primary metrics.
    pub fn analyze<S: PageSource + ?Sized>(
        &self,
        source: &S,
        index: usize,
    ) -> Result<PageMetrics, FusionError> {
        let total = source.page_count();
        if index >= total {
            return Err(FusionError::PageOutOfRange {
                page: index + 1,
                total,
            });
        }
        let page_number = index + 1;

        let primary = source.read_primary(index)?;
        let secondary = source.read_secondary(index).unwrap_or_else(|e| {
            warn!("Page {}: secondary metrics unavailable, using zeros: {}", page_number, e);
            SecondaryMetrics::default()
        });

        let trimmed = primary.raw_text.trim();
        let text_length = trimmed.chars().count();
        let word_count = trimmed.split_whitespace().count();
        let has_cid_fonts = primary.has_cid_fonts || looks_cid_garbled(&primary.raw_text);

        let metrics = PageMetrics {
            page_number: page_number as u32,
            width: primary.width,
            height: primary.height,
            text_length,
            word_count,
            table_count: secondary.table_count,
            image_count: primary.image_count,
            line_count: secondary.line_count,
            rect_count: secondary.rect_count,
            curve_count: secondary.curve_count,
            text_blocks_count: secondary.text_blocks_count,
            link_count: secondary.link_count,
            drawing_count: primary.drawing_count,
            raw_text: primary.raw_text,
            has_cid_fonts,
        };

        debug!(
            "Page {}: {} chars, {} words, {} images, {} drawings, {} tables, cid={}",
            page_number,
            metrics.text_length,
            metrics.word_count,
            metrics.image_count,
            metrics.drawing_count,
            metrics.table_count,
            metrics.has_cid_fonts
        );

        Ok(metrics)
    }
}

// ── CID garbling heuristic ───────────────────────────────────────────────────
//
// Backends that cannot see font encodings still see their symptom: glyphs
// without a Unicode mapping come out as `(cid:123)` markers, U+FFFD, private
// use code points or stray control characters.

static RE_CID_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(cid:\d+\)").unwrap());

/// Share of suspicious characters from which text is treated as garbled.
const GARBLED_RATIO: f64 = 0.1;

/// Whether extracted text shows the symptoms of unmapped CID glyphs.
pub fn looks_cid_garbled(text: &str) -> bool {
    if RE_CID_MARKER.is_match(text) {
        return true;
    }
    let mut visible = 0usize;
    let mut suspicious = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        visible += 1;
        let private_use = matches!(c as u32, 0xE000..=0xF8FF | 0xF0000..=0xFFFFD | 0x100000..=0x10FFFD);
        if c == '\u{FFFD}' || private_use || c.is_control() {
            suspicious += 1;
        }
    }
    visible > 0 && suspicious as f64 / visible as f64 >= GARBLED_RATIO
}
