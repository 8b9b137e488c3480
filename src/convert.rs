//! Page-level entry points.
//!
//! ## Why page-level?
//!
//! Pages are independent: nothing here touches state shared between pages,
//! so a caller may run these functions for different pages on different
//! threads. Document-wide state (the heading-rule cache) lives in a
//! [`DocumentContext`] the caller owns and passes in explicitly.
//!
//! None of the fusion functions fail. A bad collaborator response or a lost
//! anchor degrades to fallback placement and a warning in the report; only
//! page access ([`analyze_page`]) and report persistence return errors.

use crate::config::{DocumentContext, FusionConfig, StrategyThresholds};
use crate::error::FusionError;
use crate::instruction::InsertionInstruction;
use crate::output::{FormattedSegment, PageAnalysis, PageFusion};
use crate::pipeline::analyze::{PageAnalyzer, PageSource};
use crate::pipeline::insert::InsertionEngine;
use crate::pipeline::response::parse_instructions;
use crate::pipeline::segment::MarkdownSegmentor;
use crate::pipeline::strategy::ExtractionStrategyDecider;
use crate::report::InsertionReport;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Analyse the page at 0-based `index` and decide its extraction strategy.
///
/// # Errors
/// [`FusionError::PageOutOfRange`] or whatever the source reports for the
/// page's primary metrics.
pub fn analyze_page<S: PageSource + ?Sized>(
    source: &S,
    index: usize,
    thresholds: &StrategyThresholds,
) -> Result<PageAnalysis, FusionError> {
    let metrics = PageAnalyzer::new().analyze(source, index)?;
    let decision = ExtractionStrategyDecider::new(*thresholds).decide(&metrics);
    info!(
        "Page {}: {} (confidence {:.2}), {}",
        metrics.page_number, decision.strategy, decision.confidence, decision.reason
    );
    Ok(PageAnalysis { metrics, decision })
}

/// Analyse every page of `source`.
///
/// A page that cannot be read does not stop the others; its slot holds the
/// error.
pub fn analyze_document<S: PageSource + ?Sized>(
    source: &S,
    thresholds: &StrategyThresholds,
) -> Vec<Result<PageAnalysis, FusionError>> {
    let total = source.page_count();
    info!("Analysing {} page(s)", total);
    (0..total)
        .map(|index| {
            analyze_page(source, index, thresholds).inspect_err(|e| {
                warn!("Page {} analysis failed: {}", index + 1, e);
            })
        })
        .collect()
}

/// Insert image references into `text` and build the page's report.
pub fn fuse_page(
    text: &str,
    instructions: &[InsertionInstruction],
    page_number: u32,
    page_height: Option<f64>,
    config: &FusionConfig,
) -> PageFusion {
    let start = Instant::now();
    let engine = InsertionEngine::new(config.task_id.clone());
    let outcome = engine.apply(text, instructions, page_number, page_height);

    let mut report = InsertionReport::generate(
        page_number,
        outcome.match_results,
        start.elapsed().as_millis() as u64,
    );
    report.warnings.extend(outcome.warnings);
    debug!("{}", report.format_summary());

    PageFusion {
        markdown: outcome.text,
        report,
    }
}

/// [`fuse_page`] on a raw collaborator response.
///
/// Parse problems are carried into the report's warnings.
pub fn fuse_page_response(
    text: &str,
    raw_response: &str,
    page_number: u32,
    page_height: Option<f64>,
    config: &FusionConfig,
) -> PageFusion {
    let parsed = parse_instructions(raw_response);
    let mut fusion = fuse_page(text, &parsed.instructions, page_number, page_height, config);
    let mut warnings = parsed.warnings;
    warnings.append(&mut fusion.report.warnings);
    fusion.report.warnings = warnings;
    fusion
}

/// The formatting collaborator: rewrites one Markdown segment.
pub trait SegmentFormatter {
    /// Format `segment`. `heading_rules` carries the rules derived from an
    /// earlier segment of the same document, if any.
    fn format_segment(
        &self,
        segment: &str,
        heading_rules: Option<&str>,
    ) -> Result<FormattedSegment, FusionError>;
}

/// Format `text` segment by segment, in document order.
///
/// The first heading rules the formatter returns are cached in `ctx` and
/// handed to every later segment (and to later calls with the same `ctx`).
/// A segment whose formatting fails is kept as-is.
pub fn format_segmented<F: SegmentFormatter + ?Sized>(
    text: &str,
    formatter: &F,
    ctx: &mut DocumentContext,
    config: &FusionConfig,
) -> String {
    let segments = MarkdownSegmentor::new(config.max_segment_lines).split_text(text);
    let total = segments.len();
    let mut out = String::with_capacity(text.len());

    for (n, segment) in segments.iter().rev().enumerate() {
        match formatter.format_segment(segment, ctx.heading_rules.as_deref()) {
            Ok(formatted) => {
                if ctx.heading_rules.is_none() {
                    if let Some(rules) = formatted.heading_rules {
                        debug!("Caching heading rules from segment {}/{}", n + 1, total);
                        ctx.heading_rules = Some(rules);
                    }
                }
                out.push_str(&formatted.text);
                if segment.ends_with('\n') && !formatted.text.ends_with('\n') {
                    out.push('\n');
                }
            }
            Err(e) => {
                warn!("Segment {}/{} kept unformatted: {}", n + 1, total, e);
                out.push_str(segment);
            }
        }
    }
    out
}
