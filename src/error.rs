//! Error types for the pdf2md-fusion library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`FusionError`] is **fatal** for the call that returned it, e.g. the
//!   page does not exist or the report could not be written.
//!   Returned as `Err(FusionError)`.
//!
//! * [`InstructionIssue`] is **non-fatal**: one insertion instruction is
//!   malformed (empty anchor, inverted bbox). The instruction is still
//!   attempted and the issue ends up as a warning in the
//!   [`crate::report::InsertionReport`].
//!
//! Nothing in the algorithmic core returns `FusionError` for bad anchors or
//! bad collaborator output; those degrade to fallback placement instead.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2md-fusion library.
#[derive(Debug, Error)]
pub enum FusionError {
    // ── Page errors ───────────────────────────────────────────────────────
    /// Requested page number exceeds the document's page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// The page exists but its primary metrics could not be read.
    #[error("Failed to read page {page}: {detail}")]
    PageReadFailed { page: usize, detail: String },

    /// The PDF could not be opened by the page-source backend.
    #[error("Failed to open PDF '{path}': {detail}")]
    PdfOpenFailed { path: PathBuf, detail: String },

    // ── Report I/O errors ─────────────────────────────────────────────────
    /// Could not create the report directory or write the report file.
    #[error("Failed to write insertion report '{path}': {source}")]
    ReportWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read a previously saved report.
    #[error("Failed to read insertion report '{path}': {source}")]
    ReportReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The report file exists but is not a valid report.
    #[error("Insertion report '{path}' is malformed: {source}")]
    ReportParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or threshold validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Collaborators ─────────────────────────────────────────────────────
    /// An external collaborator (formatter, page source) reported a failure.
    #[error("Collaborator failed: {0}")]
    Collaborator(String),
}

/// A non-fatal problem found while validating one insertion instruction.
///
/// Instructions carrying issues are still handed to the anchor matcher;
/// the issue is only recorded so the report explains odd placements.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InstructionIssue {
    /// `image_index` must be a positive, 1-based index.
    #[error("image_index must be > 0, got {image_index}")]
    NonPositiveIndex { image_index: i64 },

    /// Anchor text is empty or whitespace only.
    #[error("image {image_index}: anchor_text is empty")]
    EmptyAnchor { image_index: i64 },

    /// Anchor text is longer than the collaborator contract allows.
    #[error("image {image_index}: anchor_text has {len} chars (max {max})")]
    AnchorTooLong {
        image_index: i64,
        len: usize,
        max: usize,
    },

    /// Bounding box is degenerate (`x2 <= x1` or `y2 <= y1`).
    #[error("image {image_index}: bbox [{x1}, {y1}, {x2}, {y2}] is not a valid rectangle")]
    InvalidBbox {
        image_index: i64,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_out_of_range_display() {
        let e = FusionError::PageOutOfRange { page: 7, total: 5 };
        let msg = e.to_string();
        assert!(msg.contains("Page 7"), "got: {msg}");
        assert!(msg.contains("5 pages"), "got: {msg}");
    }

    #[test]
    fn report_write_failed_keeps_source() {
        use std::error::Error as _;
        let e = FusionError::ReportWriteFailed {
            path: PathBuf::from("/nope/insertion_report.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.to_string().contains("insertion_report.json"));
        assert!(e.source().is_some());
    }

    #[test]
    fn anchor_too_long_display() {
        let issue = InstructionIssue::AnchorTooLong {
            image_index: 3,
            len: 250,
            max: 200,
        };
        let msg = issue.to_string();
        assert!(msg.contains("image 3"));
        assert!(msg.contains("250"));
    }

    #[test]
    fn invalid_bbox_display() {
        let issue = InstructionIssue::InvalidBbox {
            image_index: 1,
            x1: 10.0,
            y1: 10.0,
            x2: 5.0,
            y2: 20.0,
        };
        assert!(issue.to_string().contains("not a valid rectangle"));
    }
}
