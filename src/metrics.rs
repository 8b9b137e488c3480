//! Per-page structural metrics and the extraction-strategy vocabulary.
//!
//! [`PageMetrics`] is an immutable snapshot produced once per page by
//! [`crate::pipeline::analyze::PageAnalyzer`]. Its derived scores feed the
//! ordered rule list in [`crate::pipeline::strategy`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ── Score ceilings ───────────────────────────────────────────────────────────

/// Text length at which the length sub-scores saturate.
const TEXT_LENGTH_CEILING: f64 = 500.0;
/// Word count at which the word sub-score saturates.
const WORD_COUNT_CEILING: f64 = 100.0;
/// Average word length band considered natural prose.
const NATURAL_WORD_LEN: (f64, f64) = (4.0, 10.0);
/// Text block count at which the block sub-score saturates.
const TEXT_BLOCK_CEILING: f64 = 10.0;
/// Above this many blocks the page is fragmented (tables of single cells,
/// scattered labels) and the block sub-score is halved.
const TEXT_BLOCK_FRAGMENTED: usize = 50;

const DRAWING_CEILING: f64 = 200.0;
const IMAGE_CEILING: f64 = 5.0;
const CURVE_CEILING: f64 = 100.0;
const TABLE_CEILING: f64 = 5.0;

/// Raw structural metrics of one PDF page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    /// 1-based page number.
    pub page_number: u32,
    pub width: f64,
    pub height: f64,
    /// Unicode scalar values in the trimmed raw text.
    pub text_length: usize,
    /// Whitespace-separated tokens in the raw text.
    pub word_count: usize,
    pub table_count: usize,
    pub image_count: usize,
    pub line_count: usize,
    pub rect_count: usize,
    pub curve_count: usize,
    pub text_blocks_count: usize,
    pub link_count: usize,
    pub drawing_count: usize,
    pub raw_text: String,
    /// Text is drawn with CID-keyed fonts (e.g. Identity-H without a usable
    /// ToUnicode map), so the extracted characters cannot be trusted.
    pub has_cid_fonts: bool,
}

fn ratio(value: f64, ceiling: f64) -> f64 {
    (value / ceiling).clamp(0.0, 1.0)
}

impl PageMetrics {
    /// Weighted visual complexity in `[0, 1]`.
    ///
    /// Drawing 0.3, image 0.2, curve 0.2, table 0.1, text deficit 0.2;
    /// each term is normalised against its ceiling first.
    pub fn complexity_score(&self) -> f64 {
        let drawing = ratio(self.drawing_count as f64, DRAWING_CEILING);
        let image = ratio(self.image_count as f64, IMAGE_CEILING);
        let curve = ratio(self.curve_count as f64, CURVE_CEILING);
        let table = ratio(self.table_count as f64, TABLE_CEILING);
        let text_deficit = 1.0 - ratio(self.text_length as f64, TEXT_LENGTH_CEILING);

        (0.3 * drawing + 0.2 * image + 0.2 * curve + 0.1 * table + 0.2 * text_deficit)
            .clamp(0.0, 1.0)
    }

    /// How trustworthy the directly extracted text looks, in `[0, 1]`.
    pub fn text_quality_score(&self) -> f64 {
        let length = ratio(self.text_length as f64, TEXT_LENGTH_CEILING);
        let words = ratio(self.word_count as f64, WORD_COUNT_CEILING);
        let word_len = self.word_length_score();

        let mut blocks = ratio(self.text_blocks_count as f64, TEXT_BLOCK_CEILING);
        if self.text_blocks_count > TEXT_BLOCK_FRAGMENTED {
            blocks *= 0.5;
        }

        (0.3 * length + 0.3 * words + 0.2 * word_len + 0.2 * blocks).clamp(0.0, 1.0)
    }

    fn word_length_score(&self) -> f64 {
        if self.word_count == 0 {
            return 0.0;
        }
        let letters = self.raw_text.chars().filter(|c| !c.is_whitespace()).count();
        let avg = letters as f64 / self.word_count as f64;
        let (low, high) = NATURAL_WORD_LEN;
        if avg < low {
            avg / low
        } else if avg <= high {
            1.0
        } else {
            (1.0 - (avg - high) / high).max(0.0)
        }
    }

    pub fn is_text_rich(&self) -> bool {
        self.text_length >= 500 || self.word_count >= 100
    }

    pub fn is_image_dominant(&self) -> bool {
        self.image_count >= 1 && self.text_length < 100
    }

    pub fn is_complex_drawing(&self) -> bool {
        self.drawing_count >= 100 || self.curve_count >= 50
    }
}

/// How the textual content of a page should be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// Use the PDF's embedded text layer as-is.
    DirectText,
    /// Render the page and run OCR / a vision model over the image.
    Ocr,
    /// Keep the text layer and enrich it from the rendered image.
    Hybrid,
    /// Only extract the tables; the page carries little running text.
    TableOnly,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStrategy::DirectText => "direct_text",
            ExtractionStrategy::Ocr => "ocr",
            ExtractionStrategy::Hybrid => "hybrid",
            ExtractionStrategy::TableOnly => "table_only",
        }
    }
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the strategy decision for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub strategy: ExtractionStrategy,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Human-readable rationale, prefixed with the name of the rule that fired.
    pub reason: String,
    /// Metric snapshot the decision was based on.
    pub metrics: BTreeMap<String, f64>,
}
