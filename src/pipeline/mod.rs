//! Pipeline stages for page analysis and image fusion.
//!
//! Each submodule implements exactly one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! PageSource ──▶ analyze ──▶ strategy            (how to extract the page)
//!
//! page markdown ──▶ segment ──▶ formatting collaborator
//!
//! collaborator JSON ──▶ response ──▶ insert ◀── anchor
//!                                     │
//!                                     ▼
//!                              InsertionReport
//! ```
//!
//! 1. [`analyze`]: collect [`crate::metrics::PageMetrics`] from a page source
//! 2. [`strategy`]: ordered rules choosing direct text, OCR, hybrid or tables
//! 3. [`segment`]: cut long Markdown into fence-safe chunks
//! 4. [`response`]: recover insertion instructions from collaborator output
//! 5. [`anchor`]: exact / normalized / regex anchor search
//! 6. [`insert`]: bottom-up image insertion with a fallback section
//!
//! With the `pdfium` feature, [`pdfium`] provides a [`analyze::PageSource`]
//! over real PDF files.

pub mod analyze;
pub mod anchor;
pub mod insert;
#[cfg(feature = "pdfium")]
pub mod pdfium;
pub mod response;
pub mod segment;
pub mod strategy;
