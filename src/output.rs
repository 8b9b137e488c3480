//! Result types returned by the page-level entry points in [`crate::convert`].

use crate::metrics::{PageMetrics, StrategyDecision};
use crate::report::InsertionReport;
use serde::{Deserialize, Serialize};

/// Analysis of one page: what it contains and how to extract it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAnalysis {
    pub metrics: PageMetrics,
    pub decision: StrategyDecision,
}

/// A page's Markdown after image fusion, with its placement report.
///
/// The report is not persisted automatically; call
/// [`InsertionReport::save`] with the page's output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFusion {
    pub markdown: String,
    pub report: InsertionReport,
}

impl PageFusion {
    /// `true` when every image was placed at its anchor.
    pub fn fully_placed(&self) -> bool {
        self.report.failed_insertions == 0
    }
}

/// Output of the formatting collaborator for one segment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormattedSegment {
    pub text: String,
    /// Heading rules derived from this segment, if the collaborator produced
    /// any. Only the first rules seen in a document are kept.
    pub heading_rules: Option<String>,
}

impl FormattedSegment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            heading_rules: None,
        }
    }

    pub fn with_heading_rules(mut self, rules: impl Into<String>) -> Self {
        self.heading_rules = Some(rules.into());
        self
    }
}
