//! Insertion reports: per-image match outcomes for one page.
//!
//! An [`InsertionReport`] is built once per page after every instruction has
//! been processed and persisted next to the page output as
//! `insertion_report.json` for audit and debugging.
//!
//! Invariant: `successful_insertions + failed_insertions == total_images ==
//! match_results.len()` for every report produced by [`InsertionReport::generate`].

use crate::error::FusionError;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name used by [`InsertionReport::save`].
pub const REPORT_FILE_NAME: &str = "insertion_report.json";

/// Which matcher tier (or fallback path) produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Exact,
    Normalized,
    Regex,
    /// Anchor not found; image appended to the end-of-page section.
    Fallback,
    /// Nothing was inserted.
    None,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::Normalized => "normalized",
            MatchStrategy::Regex => "regex",
            MatchStrategy::Fallback => "fallback",
            MatchStrategy::None => "none",
        }
    }
}

/// Outcome of placing one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub image_index: i64,
    pub success: bool,
    pub strategy_used: MatchStrategy,
    /// Byte offset of the anchor in the page text, `-1` when not found.
    pub anchor_position: i64,
    pub confidence_score: Option<f64>,
    pub fallback_reason: Option<String>,
    /// Distance between the image centre and the chosen occurrence's
    /// estimated vertical position, when a spatial tie-break ran.
    pub spatial_distance: Option<f64>,
    /// Offsets of the other occurrences considered during the tie-break.
    pub alternative_anchors: Option<Vec<i64>>,
}

impl MatchResult {
    /// Result for an image placed at its anchor.
    pub fn matched(image_index: i64, strategy: MatchStrategy, position: usize) -> Self {
        Self {
            image_index,
            success: true,
            strategy_used: strategy,
            anchor_position: position as i64,
            confidence_score: None,
            fallback_reason: None,
            spatial_distance: None,
            alternative_anchors: None,
        }
    }

    /// Result for an image that was not placed at an anchor.
    pub fn failed(image_index: i64, strategy: MatchStrategy, reason: impl Into<String>) -> Self {
        Self {
            image_index,
            success: false,
            strategy_used: strategy,
            anchor_position: -1,
            confidence_score: None,
            fallback_reason: Some(reason.into()),
            spatial_distance: None,
            alternative_anchors: None,
        }
    }
}

/// Aggregated placement outcome for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertionReport {
    pub page_number: u32,
    pub total_images: usize,
    pub successful_insertions: usize,
    pub failed_insertions: usize,
    pub match_results: Vec<MatchResult>,
    pub warnings: Vec<String>,
    pub processing_time_ms: u64,
    /// ISO-8601 UTC timestamp with a `Z` suffix.
    pub timestamp: String,
}

impl InsertionReport {
    /// Build a report from the per-image results.
    ///
    /// Every failed result contributes one warning.
    pub fn generate(page_number: u32, match_results: Vec<MatchResult>, processing_time_ms: u64) -> Self {
        let successful = match_results.iter().filter(|r| r.success).count();
        let warnings = match_results
            .iter()
            .filter(|r| !r.success)
            .map(|r| {
                format!(
                    "图片{}: {} ({})",
                    r.image_index,
                    r.fallback_reason.as_deref().unwrap_or("未知原因"),
                    r.strategy_used.as_str()
                )
            })
            .collect();

        Self {
            page_number,
            total_images: match_results.len(),
            successful_insertions: successful,
            failed_insertions: match_results.len() - successful,
            match_results,
            warnings,
            processing_time_ms,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }

    /// Fraction of images placed at their anchor; 1.0 for a page without images.
    pub fn success_rate(&self) -> f64 {
        if self.total_images == 0 {
            1.0
        } else {
            self.successful_insertions as f64 / self.total_images as f64
        }
    }

    /// Write the report as `insertion_report.json` inside `dir`.
    ///
    /// The directory is created if missing. Output is UTF-8 with a 2-space
    /// indent and non-ASCII characters left unescaped.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf, FusionError> {
        let dir = dir.as_ref();
        let path = dir.join(REPORT_FILE_NAME);

        fs::create_dir_all(dir).map_err(|e| FusionError::ReportWriteFailed {
            path: path.clone(),
            source: e,
        })?;

        let json = serde_json::to_string_pretty(self).map_err(|e| FusionError::ReportWriteFailed {
            path: path.clone(),
            source: std::io::Error::other(e),
        })?;

        fs::write(&path, json).map_err(|e| FusionError::ReportWriteFailed {
            path: path.clone(),
            source: e,
        })?;

        info!("Page {}: insertion report saved to {}", self.page_number, path.display());
        Ok(path)
    }

    /// Read a report written by [`InsertionReport::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FusionError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| FusionError::ReportReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let report = serde_json::from_str(&json).map_err(|e| FusionError::ReportParseFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!("Loaded insertion report from {}", path.display());
        Ok(report)
    }

    /// Human-readable multi-line digest for logs.
    pub fn format_summary(&self) -> String {
        let mut by_strategy: BTreeMap<MatchStrategy, usize> = BTreeMap::new();
        for r in &self.match_results {
            *by_strategy.entry(r.strategy_used).or_default() += 1;
        }
        let strategies = by_strategy
            .iter()
            .map(|(s, n)| format!("{}={}", s.as_str(), n))
            .collect::<Vec<_>>()
            .join(", ");

        let mut out = String::new();
        let _ = writeln!(out, "Insertion report, page {}", self.page_number);
        let _ = writeln!(out, "  images:     {}", self.total_images);
        let _ = writeln!(out, "  inserted:   {}", self.successful_insertions);
        let _ = writeln!(out, "  failed:     {}", self.failed_insertions);
        let _ = writeln!(out, "  success:    {:.1}%", self.success_rate() * 100.0);
        if !strategies.is_empty() {
            let _ = writeln!(out, "  strategies: {strategies}");
        }
        let _ = writeln!(out, "  time:       {}ms", self.processing_time_ms);
        let _ = writeln!(out, "  timestamp:  {}", self.timestamp);
        if !self.warnings.is_empty() {
            let _ = writeln!(out, "  warnings:");
            for w in &self.warnings {
                let _ = writeln!(out, "    - {w}");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_results() -> Vec<MatchResult> {
        let mut ok = MatchResult::matched(1, MatchStrategy::Exact, 12);
        ok.confidence_score = Some(1.0);
        let miss = MatchResult::failed(2, MatchStrategy::Fallback, "锚点未找到");
        vec![ok, miss]
    }

    #[test]
    fn generate_counts_add_up() {
        let report = InsertionReport::generate(3, sample_results(), 5);
        assert_eq!(report.total_images, 2);
        assert_eq!(report.successful_insertions, 1);
        assert_eq!(report.failed_insertions, 1);
        assert_eq!(
            report.successful_insertions + report.failed_insertions,
            report.match_results.len()
        );
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("图片2"));
    }

    #[test]
    fn timestamp_is_utc_with_z_suffix() {
        let report = InsertionReport::generate(1, vec![], 0);
        assert!(report.timestamp.ends_with('Z'), "got {}", report.timestamp);
        assert!(chrono::DateTime::parse_from_rfc3339(&report.timestamp).is_ok());
    }

    #[test]
    fn empty_report_has_full_success_rate() {
        let report = InsertionReport::generate(1, vec![], 0);
        assert_eq!(report.success_rate(), 1.0);
    }

    #[test]
    fn optional_fields_serialise_as_null() {
        let json = serde_json::to_value(MatchResult::matched(1, MatchStrategy::Regex, 0)).unwrap();
        assert!(json["fallback_reason"].is_null());
        assert!(json["alternative_anchors"].is_null());
        assert_eq!(json["strategy_used"], "regex");
    }

    #[test]
    fn summary_mentions_strategies_and_warnings() {
        let report = InsertionReport::generate(9, sample_results(), 42);
        let summary = report.format_summary();
        assert!(summary.contains("page 9"));
        assert!(summary.contains("exact=1"));
        assert!(summary.contains("fallback=1"));
        assert!(summary.contains("50.0%"));
        assert!(summary.contains("锚点未找到"));
    }
}
