//! Prompts for the collaborators around the fusion core.
//!
//! Centralising every prompt here keeps the JSON contract the vision
//! collaborator is asked for next to nothing but itself, and lets unit tests
//! check that the prompt and [`crate::pipeline::response`] agree on field
//! names and operations.

use crate::instruction::{BoundingBox, MAX_ANCHOR_CHARS};
use std::fmt::Write as _;

/// System prompt asking a vision model where each detected image belongs.
///
/// The answer is parsed by [`crate::pipeline::response::parse_instructions`].
pub const INSERTION_SYSTEM_PROMPT: &str = r#"You are given the rendered image of one PDF page, the Markdown extracted from that page, and a numbered list of image regions detected on it. Decide where each image belongs in the Markdown.

Follow these rules precisely:

1. ANCHORS
   - For every image, pick a short excerpt of the Markdown that the image belongs next to (usually its caption or the sentence referring to it)
   - Copy the excerpt VERBATIM from the Markdown; do not paraphrase, translate or fix it
   - Keep each excerpt at most 200 characters and unique on the page where possible

2. OPERATIONS
   - "insert_after": the image goes right after the excerpt (captions above figures, references in text)
   - "insert_before": the image goes right before the excerpt (captions below figures)
   - Never remove or replace any text

3. IMAGE TYPES
   - One of: "chart", "table", "formula", "diagram", "image_text", "image"

4. OUTPUT FORMAT
   - Output ONLY a JSON array, one object per image region
   - Each object has: "image_index" (integer from the list), "image_type", "description" (short alt text), "anchor_text", "bbox" ([x1, y1, x2, y2] as given), "operation", "reason"
   - Do NOT add commentary or explanations"#;

/// A detected image region offered to the vision collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageRegion {
    /// 1-based index the collaborator must echo back.
    pub index: i64,
    pub bbox: BoundingBox,
}

/// Build the user message for one page.
pub fn insertion_user_prompt(page_markdown: &str, regions: &[ImageRegion]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Detected image regions ({}):", regions.len());
    for r in regions {
        let _ = writeln!(
            out,
            "- image_index {}: bbox [{}, {}, {}, {}]",
            r.index, r.bbox.x1, r.bbox.y1, r.bbox.x2, r.bbox.y2
        );
    }
    let _ = write!(
        out,
        "\nAnchors must be verbatim and at most {MAX_ANCHOR_CHARS} characters.\n\nPage Markdown:\n\n\"\"\"{page_markdown}\"\"\""
    );
    out
}

/// Context message carrying heading rules cached from an earlier segment.
pub fn heading_rules_context(rules: &str) -> String {
    format!(
        "Apply the following heading rules so heading levels stay consistent with earlier parts of the document:\n\n\"\"\"{}\"\"\"",
        rules
    )
}
