//! [`PageSource`] backed by pdfium (feature `pdfium`).
//!
//! pdfium has no notion of tables, so `table_count` stays zero; everything
//! else is counted from the page object list. Path objects are classified
//! by their segments: any Bézier segment makes a curve, four or five
//! segments a rectangle, anything else a line.

use crate::error::FusionError;
use crate::pipeline::analyze::{PageSource, PrimaryMetrics, SecondaryMetrics};
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Bind to a pdfium library next to the executable, else the system one.
pub fn bind_pdfium() -> Result<Pdfium, FusionError> {
    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| FusionError::Collaborator(format!("pdfium library unavailable: {e:?}")))
}

/// An open PDF document.
pub struct PdfiumPageSource<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumPageSource<'a> {
    pub fn open(
        pdfium: &'a Pdfium,
        path: &Path,
        password: Option<&'a str>,
    ) -> Result<Self, FusionError> {
        let document =
            pdfium
                .load_pdf_from_file(path, password)
                .map_err(|e| FusionError::PdfOpenFailed {
                    path: path.to_path_buf(),
                    detail: format!("{:?}", e),
                })?;
        info!(
            "PDF loaded: {} ({} pages)",
            path.display(),
            document.pages().len()
        );
        Ok(Self { document })
    }

    fn page(&self, index: usize) -> Result<PdfPage<'a>, FusionError> {
        self.document
            .pages()
            .get(index as u16)
            .map_err(|e| FusionError::PageReadFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            })
    }
}

impl PageSource for PdfiumPageSource<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn read_primary(&self, index: usize) -> Result<PrimaryMetrics, FusionError> {
        let page = self.page(index)?;
        let raw_text = page
            .text()
            .map_err(|e| FusionError::PageReadFailed {
                page: index + 1,
                detail: format!("text layer: {:?}", e),
            })?
            .all();

        let mut image_count = 0;
        let mut drawing_count = 0;
        for object in page.objects().iter() {
            match object.object_type() {
                PdfPageObjectType::Image => image_count += 1,
                PdfPageObjectType::Path => drawing_count += 1,
                _ => {}
            }
        }

        Ok(PrimaryMetrics {
            width: page.width().value as f64,
            height: page.height().value as f64,
            raw_text,
            image_count,
            drawing_count,
            // pdfium exposes no reliable encoding flag; the analyzer falls
            // back to inspecting the extracted text.
            has_cid_fonts: false,
        })
    }

    fn read_secondary(&self, index: usize) -> Result<SecondaryMetrics, FusionError> {
        let page = self.page(index)?;
        let mut m = SecondaryMetrics::default();

        for object in page.objects().iter() {
            match object.object_type() {
                PdfPageObjectType::Text => m.text_blocks_count += 1,
                PdfPageObjectType::Path => {
                    let Some(path) = object.as_path_object() else {
                        continue;
                    };
                    let segments = path.segments();
                    let curved = segments
                        .iter()
                        .any(|s| s.segment_type() == PdfPathSegmentType::BezierTo);
                    match (curved, segments.len()) {
                        (true, _) => m.curve_count += 1,
                        (false, 4..=5) => m.rect_count += 1,
                        _ => m.line_count += 1,
                    }
                }
                _ => {}
            }
        }
        m.link_count = page.links().len() as usize;

        debug!(
            "Page {}: {} text objects, {} lines, {} rects, {} curves, {} links",
            index + 1,
            m.text_blocks_count,
            m.line_count,
            m.rect_count,
            m.curve_count,
            m.link_count
        );
        Ok(m)
    }
}
