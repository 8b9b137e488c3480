//! # pdf2md-fusion
//!
//! Page analysis and image fusion for PDF-to-Markdown pipelines.
//!
//! ## Why this crate?
//!
//! Turning a PDF page into Markdown takes two decisions no model should make
//! blindly. First, *how* to read the page: a clean text layer is cheaper
//! and more faithful than OCR, but CID-encoded fonts and scanned pages make
//! it worthless. Second, *where* the page's images go: a vision model can
//! name the sentence an image belongs to, but its answer has to be woven
//! back into text that was produced separately, without destroying a single
//! character of it.
//!
//! This crate does both deterministically, with the models kept behind
//! narrow seams ([`PageSource`], [`SegmentFormatter`] and the JSON
//! instruction format).
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF page
//!  │
//!  ├─ 1. Analyse   structural metrics (text, images, drawings, tables, fonts)
//!  ├─ 2. Decide    direct text / OCR / hybrid / table-only
//!  ├─ 3. Segment   fence-safe chunks for the formatting model
//!  ├─ 4. Anchor    exact → whitespace-normalized → regex search
//!  ├─ 5. Insert    bottom-up image references + fallback section
//!  └─ 6. Report    insertion_report.json per page
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use pdf2md_fusion::{fuse_page, FusionConfig, InsertOperation, InsertionInstruction};
//!
//! let text = "## Intro\nFigure 1 shows results.\n";
//! let instructions = [InsertionInstruction::new(
//!     1,
//!     "Figure 1 shows results.",
//!     InsertOperation::InsertAfter,
//! )];
//!
//! let fusion = fuse_page(text, &instructions, 1, None, &FusionConfig::default());
//! assert_eq!(
//!     fusion.markdown,
//!     "## Intro\nFigure 1 shows results.\n\n![图片1](page_1/image_1.png)\n\n"
//! );
//! assert_eq!(fusion.report.successful_insertions, 1);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `pdfium` | off     | [`PageSource`] over real PDFs via `pdfium-render` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod instruction;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DocumentContext, FusionConfig, FusionConfigBuilder, StrategyThresholds};
pub use convert::{
    analyze_document, analyze_page, format_segmented, fuse_page, fuse_page_response,
    SegmentFormatter,
};
pub use error::{FusionError, InstructionIssue};
pub use instruction::{BoundingBox, ImageType, InsertOperation, InsertionInstruction};
pub use metrics::{ExtractionStrategy, PageMetrics, StrategyDecision};
pub use output::{FormattedSegment, PageAnalysis, PageFusion};
pub use pipeline::analyze::{PageAnalyzer, PageSource, PrimaryMetrics, SecondaryMetrics};
pub use pipeline::anchor::{AnchorMatch, AnchorMatcher};
pub use pipeline::insert::{InsertionEngine, InsertionOutcome};
pub use pipeline::response::{parse_instructions, ParsedInstructions};
pub use pipeline::segment::MarkdownSegmentor;
pub use pipeline::strategy::ExtractionStrategyDecider;
pub use report::{InsertionReport, MatchResult, MatchStrategy};
