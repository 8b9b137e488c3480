//! Configuration types for page analysis and image fusion.
//!
//! Two kinds of state live here:
//!
//! * [`FusionConfig`]: immutable per-run settings (strategy thresholds,
//!   segment size, task id), built via [`FusionConfigBuilder`].
//! * [`DocumentContext`]: mutable per-document state (cached heading
//!   rules) owned by the caller and passed explicitly into every call that
//!   needs it. Nothing in this crate keeps process-global state, so pages
//!   and documents can be processed on independent threads.

use crate::error::FusionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default segment size (lines) for [`crate::pipeline::segment::MarkdownSegmentor`].
pub const DEFAULT_MAX_SEGMENT_LINES: usize = 200;

/// Thresholds driving [`crate::pipeline::strategy::ExtractionStrategyDecider`].
///
/// The defaults are empirical. Deserialises from a map containing any subset
/// of the keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyThresholds {
    /// Minimum character count for a page to count as having real text. Default: 50.
    pub text_length_min: f64,
    /// Minimum word count for a page to count as word-rich. Default: 10.
    pub word_count_min: f64,
    /// Image count from which an almost text-less page goes to OCR. Default: 1.
    pub ocr_image_threshold: f64,
    /// Drawing count from which a text page is considered visually complex. Default: 100.
    pub ocr_drawing_threshold: f64,
    /// Complexity score from which an almost text-less page goes to OCR. Default: 0.4.
    pub ocr_complexity_threshold: f64,
    /// Text quality below which existing text is only trusted in hybrid mode. Default: 0.3.
    pub hybrid_text_quality_threshold: f64,
    /// Table count from which a text-poor page is extracted as tables only. Default: 2.
    pub table_dominant_threshold: f64,
}

impl Default for StrategyThresholds {
    fn default() -> Self {
        Self {
            text_length_min: 50.0,
            word_count_min: 10.0,
            ocr_image_threshold: 1.0,
            ocr_drawing_threshold: 100.0,
            ocr_complexity_threshold: 0.4,
            hybrid_text_quality_threshold: 0.3,
            table_dominant_threshold: 2.0,
        }
    }
}

impl StrategyThresholds {
    /// Apply a `name → value` override map on top of `self`.
    ///
    /// Unknown keys are rejected.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, f64>) -> Result<Self, FusionError> {
        for (key, &value) in overrides {
            let slot = match key.as_str() {
                "text_length_min" => &mut self.text_length_min,
                "word_count_min" => &mut self.word_count_min,
                "ocr_image_threshold" => &mut self.ocr_image_threshold,
                "ocr_drawing_threshold" => &mut self.ocr_drawing_threshold,
                "ocr_complexity_threshold" => &mut self.ocr_complexity_threshold,
                "hybrid_text_quality_threshold" => &mut self.hybrid_text_quality_threshold,
                "table_dominant_threshold" => &mut self.table_dominant_threshold,
                other => {
                    return Err(FusionError::InvalidConfig(format!(
                        "unknown strategy threshold '{other}'"
                    )))
                }
            };
            *slot = value;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check that every threshold is finite and in its meaningful range.
    pub fn validate(&self) -> Result<(), FusionError> {
        let counts = [
            ("text_length_min", self.text_length_min),
            ("word_count_min", self.word_count_min),
            ("ocr_image_threshold", self.ocr_image_threshold),
            ("ocr_drawing_threshold", self.ocr_drawing_threshold),
            ("table_dominant_threshold", self.table_dominant_threshold),
        ];
        for (name, v) in counts {
            if !v.is_finite() || v < 0.0 {
                return Err(FusionError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {v}"
                )));
            }
        }
        let scores = [
            ("ocr_complexity_threshold", self.ocr_complexity_threshold),
            ("hybrid_text_quality_threshold", self.hybrid_text_quality_threshold),
        ];
        for (name, v) in scores {
            if !(0.0..=1.0).contains(&v) {
                return Err(FusionError::InvalidConfig(format!(
                    "{name} must be within 0–1, got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for fusing image placements into page Markdown.
///
/// Built via [`FusionConfig::builder()`] or using [`FusionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2md_fusion::FusionConfig;
///
/// let config = FusionConfig::builder()
///     .task_id("task-42")
///     .max_segment_lines(120)
///     .build()
///     .unwrap();
/// assert_eq!(config.task_id.as_deref(), Some("task-42"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Thresholds for the extraction-strategy decision.
    pub thresholds: StrategyThresholds,

    /// Maximum lines per segment handed to the formatting collaborator. Default: 200.
    ///
    /// Chunks may still overflow this while a fenced code block is open.
    pub max_segment_lines: usize,

    /// Extraction task identifier. Default: None.
    ///
    /// When set, image references point into the task's media directory;
    /// otherwise they are page-relative paths.
    pub task_id: Option<String>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            thresholds: StrategyThresholds::default(),
            max_segment_lines: DEFAULT_MAX_SEGMENT_LINES,
            task_id: None,
        }
    }
}

impl FusionConfig {
    /// Create a new builder for `FusionConfig`.
    pub fn builder() -> FusionConfigBuilder {
        FusionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`FusionConfig`].
#[derive(Debug)]
pub struct FusionConfigBuilder {
    config: FusionConfig,
}

impl FusionConfigBuilder {
    pub fn thresholds(mut self, thresholds: StrategyThresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn max_segment_lines(mut self, n: usize) -> Self {
        self.config.max_segment_lines = n.max(1);
        self
    }

    pub fn task_id(mut self, id: impl Into<String>) -> Self {
        self.config.task_id = Some(id.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<FusionConfig, FusionError> {
        let c = &self.config;
        c.thresholds.validate()?;
        if let Some(id) = &c.task_id {
            if id.trim().is_empty() || id.contains('/') {
                return Err(FusionError::InvalidConfig(format!(
                    "task_id must be a non-empty path segment, got {id:?}"
                )));
            }
        }
        Ok(self.config)
    }
}

/// Per-document state shared across the pages and segments of one document.
///
/// Owned by whoever drives the document; passed `&mut` into
/// [`crate::convert::format_segmented`]. Two documents processed in parallel
/// simply use two contexts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentContext {
    /// Heading rules derived by the formatting collaborator from the first
    /// segment it saw, reused so later segments keep the same heading levels.
    pub heading_rules: Option<String>,
}

impl DocumentContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the context with heading rules from an earlier run.
    pub fn with_heading_rules(rules: impl Into<String>) -> Self {
        Self {
            heading_rules: Some(rules.into()),
        }
    }
}
